use anyhow::Context;
use clap::{Parser, Subcommand};
use ggp_assets::{TextureData, TextureStore, load_gltf};
use ggp_common::SamplerKind;
use ggp_input::{InputState, Key};
use ggp_render::{DebugTextRenderer, Renderer, SceneDescription, Stage};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "ggp-cli", about = "CLI tool for Game Graphics Programming scenes")]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print version and crate info
    Info,
    /// Print the draw list of the first frame
    Dump {
        /// Scene description (YAML or JSON); the built-in lab scene when omitted
        #[arg(long)]
        scene: Option<PathBuf>,
        /// Directory asset paths are relative to
        #[arg(long)]
        content: Option<PathBuf>,
    },
    /// Drive the camera with fixed input and print its path
    Simulate {
        /// Number of frames to run
        #[arg(short, long, default_value = "10")]
        frames: u32,
        /// Seconds per frame
        #[arg(long, default_value = "0.016")]
        dt: f32,
        /// Hold the forward key every frame
        #[arg(long)]
        forward: bool,
        /// Horizontal mouse movement per frame
        #[arg(long, default_value = "0", allow_hyphen_values = true)]
        mouse_x: i32,
        /// Vertical mouse movement per frame
        #[arg(long, default_value = "0", allow_hyphen_values = true)]
        mouse_y: i32,
        #[arg(long)]
        scene: Option<PathBuf>,
        #[arg(long)]
        content: Option<PathBuf>,
    },
    /// Print the meshes, materials, skeleton and clips of a glTF model
    InspectModel { path: PathBuf },
    /// Print the size and mip chain of an image
    InspectTexture { path: PathBuf },
}

fn load_stage(
    scene: Option<&Path>,
    content: Option<&Path>,
    textures: &mut TextureStore,
) -> anyhow::Result<Stage> {
    let description = match scene {
        Some(path) => SceneDescription::load(path)
            .with_context(|| format!("loading scene {}", path.display()))?,
        None => SceneDescription::builtin(),
    };
    let base_dir = content
        .or_else(|| scene.and_then(Path::parent))
        .unwrap_or(Path::new("."));
    Ok(description.stage(textures, base_dir, 800, 600)?)
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .init();

    match cli.command {
        Commands::Info => {
            println!("ggp-cli v{}", env!("CARGO_PKG_VERSION"));
            println!("assets: {}", ggp_assets::crate_info());
            println!("render: {}", ggp_render::crate_info());
            let bindings = InputState::default();
            for key in [Key::W, Key::A, Key::S, Key::D, Key::Space, Key::Shift] {
                if let Some(direction) = bindings.bindings().direction(key) {
                    println!("  {key:?} -> {direction:?}");
                }
            }
        }
        Commands::Dump { scene, content } => {
            let mut textures = TextureStore::new();
            let mut stage = load_stage(scene.as_deref(), content.as_deref(), &mut textures)?;
            stage.update(0.0)?;
            let frame = stage.frame()?;
            print!("{}", DebugTextRenderer::new().render(&frame));
            println!("textures: {}", textures.len());
        }
        Commands::Simulate {
            frames,
            dt,
            forward,
            mouse_x,
            mouse_y,
            scene,
            content,
        } => {
            let mut textures = TextureStore::new();
            let mut stage = load_stage(scene.as_deref(), content.as_deref(), &mut textures)?;
            let mut input = InputState::default();
            if forward {
                input.key_down(Key::W);
            }
            println!("Simulating {frames} frames at dt={dt}");
            for i in 0..frames {
                input.mouse_moved(mouse_x, mouse_y);
                stage.handle_input(input.directions(), input.mouse_relative_movement(), dt);
                input.reset_mouse_movement();
                stage.update(dt)?;
                let camera = stage.camera();
                let eye = camera.eye();
                println!(
                    "frame {i}: eye=({:.3}, {:.3}, {:.3}) yaw={:.3} pitch={:.3}",
                    eye.x,
                    eye.y,
                    eye.z,
                    camera.yaw(),
                    camera.pitch()
                );
            }
            let frame = stage.frame()?;
            println!("draw calls: {}", frame.draw_call_count());
        }
        Commands::InspectModel { path } => {
            let mut textures = TextureStore::new();
            let model = load_gltf(&path, &mut textures)
                .with_context(|| format!("loading model {}", path.display()))?;
            let mesh = &model.mesh;
            println!("Model: {}", model.name);
            println!(
                "  vertices={} indices={} submeshes={} skinned={}",
                mesh.num_vertices(),
                mesh.num_indices(),
                mesh.submeshes.len(),
                model.is_skinned()
            );
            for (i, sub) in mesh.submeshes.iter().enumerate() {
                let material = mesh
                    .material(sub.material_index)
                    .map(|m| m.name.as_str())
                    .unwrap_or("-");
                println!(
                    "  submesh {i}: indices={}@{}{:+} material={material}",
                    sub.num_indices, sub.base_index, sub.base_vertex
                );
            }
            for material in &mesh.materials {
                let diffuse = material
                    .diffuse
                    .and_then(|id| textures.name(id))
                    .unwrap_or("-");
                let normal = material
                    .normal
                    .and_then(|id| textures.name(id))
                    .unwrap_or("-");
                println!(
                    "  material {}: diffuse={diffuse} normal={normal}",
                    material.name
                );
            }
            if let Some(skeleton) = &model.skeleton {
                println!("  skeleton: {} joints", skeleton.len());
            }
            for clip in &model.clips {
                println!(
                    "  clip {}: {:.2}s, {} channels",
                    clip.name,
                    clip.duration,
                    clip.channels.len()
                );
            }
        }
        Commands::InspectTexture { path } => {
            let texture = TextureData::load(&path, SamplerKind::TrilinearWrap)
                .with_context(|| format!("loading texture {}", path.display()))?;
            println!("Texture: {}", path.display());
            println!(
                "  {}x{} rgba8, {} mip levels",
                texture.width,
                texture.height,
                texture.mip_level_count()
            );
        }
    }

    Ok(())
}
