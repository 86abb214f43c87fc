use anyhow::{Context, Result, anyhow};
use clap::Parser;
use egui::Context as EguiContext;
use ggp_assets::TextureStore;
use ggp_input::{InputState, Key};
use ggp_render::{FrameDraws, SceneDescription, SceneError, Stage};
use ggp_render_wgpu::WgpuRenderer;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use tracing_subscriber::EnvFilter;
use winit::application::ApplicationHandler;
use winit::dpi::PhysicalSize;
use winit::event::{DeviceEvent, ElementState, KeyEvent, MouseButton, WindowEvent};
use winit::event_loop::{ActiveEventLoop, ControlFlow, EventLoop};
use winit::keyboard::{KeyCode, PhysicalKey};
use winit::window::{CursorGrabMode, Window, WindowId};

#[derive(Parser)]
#[command(name = "ggp-desktop", about = "Game Graphics Programming scene viewer")]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Scene description (YAML or JSON). The built-in lab scene is used when omitted.
    #[arg(long)]
    scene: Option<PathBuf>,

    /// Directory that asset paths in the scene are relative to
    #[arg(long)]
    content: Option<PathBuf>,

    /// Initial window width
    #[arg(long, default_value = "800")]
    width: u32,

    /// Initial window height
    #[arg(long, default_value = "600")]
    height: u32,
}

fn load_stage(cli: &Cli, textures: &mut TextureStore) -> Result<Stage> {
    let description = match &cli.scene {
        Some(path) => SceneDescription::load(path)
            .with_context(|| format!("loading scene {}", path.display()))?,
        None => SceneDescription::builtin(),
    };
    let base_dir = cli
        .content
        .clone()
        .or_else(|| {
            cli.scene
                .as_ref()
                .and_then(|p| p.parent())
                .map(|p| p.to_path_buf())
        })
        .unwrap_or_else(|| PathBuf::from("."));
    let stage = description.stage(textures, &base_dir, cli.width, cli.height)?;
    Ok(stage)
}

fn map_key(code: KeyCode) -> Key {
    match code {
        KeyCode::KeyW => Key::W,
        KeyCode::KeyA => Key::A,
        KeyCode::KeyS => Key::S,
        KeyCode::KeyD => Key::D,
        KeyCode::Space => Key::Space,
        KeyCode::ShiftLeft | KeyCode::ShiftRight => Key::Shift,
        _ => Key::Other,
    }
}

/// Application state independent of the GPU.
struct AppState {
    stage: Stage,
    textures: TextureStore,
    input: InputState,
    show_overlay: bool,
    mouse_captured: bool,
    last_frame: Instant,
    fps: f32,
    draw_calls: usize,
}

impl AppState {
    fn new(stage: Stage, textures: TextureStore) -> Self {
        Self {
            stage,
            textures,
            input: InputState::default(),
            show_overlay: true,
            mouse_captured: false,
            last_frame: Instant::now(),
            fps: 0.0,
            draw_calls: 0,
        }
    }

    /// Feed this frame's input to the camera, then advance the scene.
    fn advance(&mut self, dt: f32) -> Result<FrameDraws, SceneError> {
        self.stage.handle_input(
            self.input.directions(),
            self.input.mouse_relative_movement(),
            dt,
        );
        self.input.reset_mouse_movement();
        self.stage.update(dt)?;
        let frame = self.stage.frame()?;

        if dt > 0.0 {
            let instant = 1.0 / dt;
            self.fps = if self.fps == 0.0 {
                instant
            } else {
                self.fps * 0.9 + instant * 0.1
            };
        }
        self.draw_calls = frame.draw_call_count();
        Ok(frame)
    }

    fn handle_key(&mut self, code: KeyCode, pressed: bool) {
        let key = map_key(code);
        if pressed {
            self.input.key_down(key);
        } else {
            self.input.key_up(key);
        }
        if pressed && code == KeyCode::F1 {
            self.show_overlay = !self.show_overlay;
        }
    }

    fn draw_ui(&self, ctx: &EguiContext) {
        if !self.show_overlay {
            return;
        }
        let camera = self.stage.camera();
        let eye = camera.eye();
        egui::Window::new("Stats")
            .default_pos([10.0, 10.0])
            .resizable(false)
            .show(ctx, |ui| {
                ui.label(format!("FPS: {:.0}", self.fps));
                ui.label(format!(
                    "Camera: ({:.2}, {:.2}, {:.2})",
                    eye.x, eye.y, eye.z
                ));
                ui.label(format!(
                    "Yaw: {:.1}  Pitch: {:.1}",
                    camera.yaw().to_degrees(),
                    camera.pitch().to_degrees()
                ));
                ui.label(format!("Draw calls: {}", self.draw_calls));
                ui.separator();
                ui.small("F1: Toggle overlay | RMB: Look | WASD/Space/Shift: Move | Esc: Release");
            });
    }
}

/// Window, device and the two renderers drawing into it.
struct Gpu {
    window: Arc<Window>,
    surface: wgpu::Surface<'static>,
    device: wgpu::Device,
    queue: wgpu::Queue,
    config: wgpu::SurfaceConfiguration,
    renderer: WgpuRenderer,
    egui_winit: egui_winit::State,
    egui_renderer: egui_wgpu::Renderer,
}

impl Gpu {
    fn new(
        event_loop: &ActiveEventLoop,
        state: &AppState,
        egui_ctx: &EguiContext,
    ) -> Result<Self> {
        let (width, height) = state.stage.size();
        let attrs = Window::default_attributes()
            .with_title("Game Graphics Programming")
            .with_inner_size(PhysicalSize::new(width, height));
        let window = Arc::new(event_loop.create_window(attrs)?);

        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::all(),
            ..Default::default()
        });
        let surface = instance.create_surface(window.clone())?;

        let adapter = pollster::block_on(instance.request_adapter(&wgpu::RequestAdapterOptions {
            power_preference: wgpu::PowerPreference::HighPerformance,
            compatible_surface: Some(&surface),
            force_fallback_adapter: false,
        }))
        .ok_or_else(|| anyhow!("no compatible GPU adapter"))?;

        let (device, queue) = pollster::block_on(adapter.request_device(
            &wgpu::DeviceDescriptor {
                label: Some("ggp_device"),
                required_features: wgpu::Features::empty(),
                required_limits: wgpu::Limits::default(),
                memory_hints: Default::default(),
            },
            None,
        ))?;

        let size = window.inner_size();
        let surface_caps = surface.get_capabilities(&adapter);
        let surface_format = surface_caps
            .formats
            .iter()
            .find(|f| f.is_srgb())
            .or_else(|| surface_caps.formats.first())
            .copied()
            .ok_or_else(|| anyhow!("surface reports no formats"))?;
        let alpha_mode = surface_caps
            .alpha_modes
            .first()
            .copied()
            .unwrap_or(wgpu::CompositeAlphaMode::Auto);

        let config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format: surface_format,
            width: size.width.max(1),
            height: size.height.max(1),
            present_mode: wgpu::PresentMode::AutoVsync,
            alpha_mode,
            view_formats: vec![],
            desired_maximum_frame_latency: 2,
        };
        surface.configure(&device, &config);

        let mut renderer =
            WgpuRenderer::new(&device, &queue, surface_format, config.width, config.height);
        let scene = state
            .stage
            .main_scene()
            .ok_or(SceneError::NoMainScene)?;
        renderer.upload_scene(&device, &queue, scene, &state.textures)?;

        let egui_winit = egui_winit::State::new(
            egui_ctx.clone(),
            egui::ViewportId::ROOT,
            &window,
            Some(window.scale_factor() as f32),
            None,
            None,
        );
        let egui_renderer = egui_wgpu::Renderer::new(&device, surface_format, None, 1, false);

        tracing::info!(
            "GPU initialized with {} backend",
            adapter.get_info().backend.to_str()
        );

        Ok(Self {
            window,
            surface,
            device,
            queue,
            config,
            renderer,
            egui_winit,
            egui_renderer,
        })
    }

    fn resize(&mut self, width: u32, height: u32) {
        self.config.width = width.max(1);
        self.config.height = height.max(1);
        self.surface.configure(&self.device, &self.config);
        self.renderer
            .resize(&self.device, self.config.width, self.config.height);
    }

    fn set_mouse_capture(&self, captured: bool) {
        let grab = if captured {
            self.window
                .set_cursor_grab(CursorGrabMode::Confined)
                .or_else(|_| self.window.set_cursor_grab(CursorGrabMode::Locked))
        } else {
            self.window.set_cursor_grab(CursorGrabMode::None)
        };
        if let Err(e) = grab {
            tracing::warn!("cursor grab failed: {e}");
        }
        self.window.set_cursor_visible(!captured);
    }

    fn draw(&mut self, state: &AppState, egui_ctx: &EguiContext, frame: &FrameDraws) {
        let output = match self.surface.get_current_texture() {
            Ok(t) => t,
            Err(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated) => {
                self.surface.configure(&self.device, &self.config);
                return;
            }
            Err(e) => {
                tracing::error!("surface error: {e}");
                return;
            }
        };
        let view = output
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());

        if let Err(e) = self.renderer.render(&self.device, &self.queue, &view, frame) {
            tracing::error!("render failed: {e}");
        }

        let raw_input = self.egui_winit.take_egui_input(&self.window);
        let full_output = egui_ctx.run(raw_input, |ctx| state.draw_ui(ctx));
        self.egui_winit
            .handle_platform_output(&self.window, full_output.platform_output);

        let paint_jobs = egui_ctx.tessellate(full_output.shapes, full_output.pixels_per_point);
        let screen_descriptor = egui_wgpu::ScreenDescriptor {
            size_in_pixels: [self.config.width, self.config.height],
            pixels_per_point: full_output.pixels_per_point,
        };

        for (id, image_delta) in &full_output.textures_delta.set {
            self.egui_renderer
                .update_texture(&self.device, &self.queue, *id, image_delta);
        }
        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("egui_encoder"),
            });
        self.egui_renderer.update_buffers(
            &self.device,
            &self.queue,
            &mut encoder,
            &paint_jobs,
            &screen_descriptor,
        );
        {
            let mut pass = encoder
                .begin_render_pass(&wgpu::RenderPassDescriptor {
                    label: Some("egui_pass"),
                    color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                        view: &view,
                        resolve_target: None,
                        ops: wgpu::Operations {
                            load: wgpu::LoadOp::Load,
                            store: wgpu::StoreOp::Store,
                        },
                    })],
                    depth_stencil_attachment: None,
                    ..Default::default()
                })
                .forget_lifetime();
            self.egui_renderer
                .render(&mut pass, &paint_jobs, &screen_descriptor);
        }
        self.queue.submit(std::iter::once(encoder.finish()));
        for id in &full_output.textures_delta.free {
            self.egui_renderer.free_texture(id);
        }

        output.present();
    }
}

struct GpuApp {
    state: AppState,
    gpu: Option<Gpu>,
    egui_ctx: EguiContext,
}

impl GpuApp {
    fn new(state: AppState) -> Self {
        Self {
            state,
            gpu: None,
            egui_ctx: EguiContext::default(),
        }
    }

    fn set_mouse_capture(&mut self, captured: bool) {
        self.state.mouse_captured = captured;
        if !captured {
            self.state.input.reset_mouse_movement();
        }
        if let Some(gpu) = &self.gpu {
            gpu.set_mouse_capture(captured);
        }
    }
}

impl ApplicationHandler for GpuApp {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.gpu.is_some() {
            return;
        }
        match Gpu::new(event_loop, &self.state, &self.egui_ctx) {
            Ok(gpu) => self.gpu = Some(gpu),
            Err(e) => {
                tracing::error!("failed to initialize GPU: {e:#}");
                event_loop.exit();
            }
        }
    }

    fn window_event(
        &mut self,
        event_loop: &ActiveEventLoop,
        _window_id: WindowId,
        event: WindowEvent,
    ) {
        if let Some(gpu) = &mut self.gpu {
            let response = gpu.egui_winit.on_window_event(&gpu.window, &event);
            if response.consumed {
                return;
            }
        }

        match event {
            WindowEvent::CloseRequested => {
                event_loop.exit();
            }
            WindowEvent::Resized(new_size) => {
                self.state.stage.resize(new_size.width, new_size.height);
                if let Some(gpu) = &mut self.gpu {
                    gpu.resize(new_size.width, new_size.height);
                }
            }
            WindowEvent::Focused(false) => {
                self.state.input.release_all();
                self.set_mouse_capture(false);
            }
            WindowEvent::KeyboardInput {
                event:
                    KeyEvent {
                        physical_key: PhysicalKey::Code(key),
                        state: key_state,
                        ..
                    },
                ..
            } => {
                let pressed = key_state == ElementState::Pressed;
                self.state.handle_key(key, pressed);
                if pressed && key == KeyCode::Escape {
                    self.set_mouse_capture(false);
                }
            }
            WindowEvent::MouseInput {
                button: MouseButton::Right,
                state: ElementState::Pressed,
                ..
            } => {
                self.set_mouse_capture(true);
            }
            WindowEvent::RedrawRequested => {
                let now = Instant::now();
                let dt = (now - self.state.last_frame).as_secs_f32().min(0.1);
                self.state.last_frame = now;

                let frame = match self.state.advance(dt) {
                    Ok(frame) => frame,
                    Err(e) => {
                        tracing::error!("scene update failed: {e}");
                        event_loop.exit();
                        return;
                    }
                };

                if let Some(gpu) = &mut self.gpu {
                    gpu.draw(&self.state, &self.egui_ctx, &frame);
                    gpu.window.request_redraw();
                }
            }
            _ => {}
        }
    }

    fn device_event(
        &mut self,
        _event_loop: &ActiveEventLoop,
        _device_id: winit::event::DeviceId,
        event: DeviceEvent,
    ) {
        if let DeviceEvent::MouseMotion { delta } = event {
            if self.state.mouse_captured {
                self.state
                    .input
                    .mouse_moved(delta.0.round() as i32, delta.1.round() as i32);
            }
        }
    }

    fn about_to_wait(&mut self, _event_loop: &ActiveEventLoop) {
        if let Some(gpu) = &self.gpu {
            gpu.window.request_redraw();
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .init();

    tracing::info!("ggp-desktop starting");

    let mut textures = TextureStore::new();
    let stage = load_stage(&cli, &mut textures)?;

    let event_loop = EventLoop::new()?;
    event_loop.set_control_flow(ControlFlow::Poll);

    let mut app = GpuApp::new(AppState::new(stage, textures));
    event_loop.run_app(&mut app)?;

    Ok(())
}
