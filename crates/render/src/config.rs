//! Scene description files.
//!
//! A scene is described in YAML or JSON. Paths inside the description are
//! relative to a content directory passed to [`SceneDescription::build`].

use crate::SceneError;
use crate::camera::Camera;
use crate::light::PointLight;
use crate::motion::Motion;
use crate::object::{Model, Renderable, Skybox, Voxel, height_map_positions};
use crate::scene::Scene;
use crate::stage::Stage;
use ggp_assets::{
    AssetError, CubeTextureData, Material, TextureData, TextureId, TextureStore, cube_mesh,
    load_gltf,
};
use ggp_common::{NUM_LIGHTS, SamplerKind};
use glam::{Mat4, Quat, Vec3, Vec4};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("invalid YAML scene: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("invalid JSON scene: {0}")]
    Json(#[from] serde_json::Error),
    #[error("unknown scene format (expected .yaml, .yml or .json): {0}")]
    UnknownFormat(PathBuf),
    #[error("scene declares {0} lights, at most {NUM_LIGHTS} are supported")]
    TooManyLights(usize),
    #[error("asset error: {0}")]
    Asset(#[from] AssetError),
    #[error("scene error: {0}")]
    Scene(#[from] SceneError),
}

/// Starting camera of a scene.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CameraSettings {
    pub position: Vec3,
    pub travel_speed: f32,
    pub rotation_speed: f32,
}

impl Default for CameraSettings {
    fn default() -> Self {
        Self {
            position: Vec3::new(0.0, 3.0, -6.0),
            travel_speed: 10.0,
            rotation_speed: 10.0,
        }
    }
}

impl CameraSettings {
    pub fn camera(&self) -> Camera {
        let mut camera = Camera::new(self.position);
        camera.set_travel_speed(self.travel_speed);
        camera.set_rotation_speed(self.rotation_speed);
        camera
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum MotionDescription {
    #[default]
    Static,
    Spin {
        speed: f32,
    },
    Orbit {
        scale: Vec3,
        offset: Vec3,
        #[serde(default)]
        spin_speed: f32,
        orbit_speed: f32,
    },
    Bob {
        offset_x: f32,
    },
}

impl MotionDescription {
    pub fn motion(&self) -> Motion {
        match *self {
            Self::Static => Motion::Static,
            Self::Spin { speed } => Motion::Spin { speed },
            Self::Orbit {
                scale,
                offset,
                spin_speed,
                orbit_speed,
            } => Motion::orbit(scale, offset, spin_speed, orbit_speed),
            Self::Bob { offset_x } => Motion::bob(offset_x),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CubeDescription {
    pub name: String,
    #[serde(default)]
    pub position: Vec3,
    #[serde(default = "white")]
    pub color: Vec4,
    #[serde(default)]
    pub texture: Option<PathBuf>,
    #[serde(default)]
    pub normal_map: Option<PathBuf>,
    #[serde(default)]
    pub motion: MotionDescription,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkyboxDescription {
    /// +X, -X, +Y, -Y, +Z, -Z. Without faces a generated gradient is used.
    #[serde(default)]
    pub faces: Option<[PathBuf; 6]>,
    #[serde(default = "default_sky_scale")]
    pub scale: f32,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct VoxelDescription {
    #[serde(default)]
    pub origin: Vec3,
    #[serde(default)]
    pub positions: Vec<Vec3>,
    /// Column heights indexed `[z][x]`, added after `positions`.
    #[serde(default)]
    pub height_map: Vec<Vec<u32>>,
    #[serde(default = "white")]
    pub color: Vec4,
    #[serde(default)]
    pub texture: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelDescription {
    pub name: String,
    pub path: PathBuf,
    #[serde(default)]
    pub position: Vec3,
    #[serde(default = "unit_scale")]
    pub scale: f32,
    #[serde(default)]
    pub clip: Option<String>,
    #[serde(default = "white")]
    pub color: Vec4,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SceneDescription {
    pub name: String,
    #[serde(default)]
    pub camera: CameraSettings,
    #[serde(default)]
    pub cubes: Vec<CubeDescription>,
    #[serde(default)]
    pub skybox: Option<SkyboxDescription>,
    #[serde(default)]
    pub voxels: Vec<VoxelDescription>,
    #[serde(default)]
    pub models: Vec<ModelDescription>,
    #[serde(default)]
    pub lights: Vec<PointLight>,
}

fn white() -> Vec4 {
    Vec4::ONE
}

fn unit_scale() -> f32 {
    1.0
}

fn default_sky_scale() -> f32 {
    500.0
}

const BUILTIN_CRATE: &str = "builtin:crate";
const BUILTIN_SKY: &str = "builtin:sky";

impl SceneDescription {
    /// Read a description, picking the format from the file extension.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase);
        let description = match ext.as_deref() {
            Some("yaml" | "yml") => serde_yaml::from_str(&text)?,
            Some("json") => serde_json::from_str(&text)?,
            _ => return Err(ConfigError::UnknownFormat(path.to_path_buf())),
        };
        Ok(description)
    }

    /// The lab scene: a static cube, a spinning cube, two orbiting cubes, a
    /// bobbing textured cube, a voxel field and two lights. Needs no files.
    pub fn builtin() -> Self {
        Self {
            name: "lab".to_string(),
            camera: CameraSettings::default(),
            cubes: vec![
                CubeDescription {
                    name: "cube".into(),
                    position: Vec3::ZERO,
                    color: Vec4::new(1.0, 1.0, 1.0, 1.0),
                    texture: None,
                    normal_map: None,
                    motion: MotionDescription::Static,
                },
                CubeDescription {
                    name: "my_cube".into(),
                    position: Vec3::new(0.0, 2.5, 0.0),
                    color: Vec4::new(0.2, 0.8, 0.3, 1.0),
                    texture: None,
                    normal_map: None,
                    motion: MotionDescription::Spin { speed: 1.0 },
                },
                CubeDescription {
                    name: "small_cube".into(),
                    position: Vec3::ZERO,
                    color: Vec4::new(1.0, 0.6, 0.1, 1.0),
                    texture: None,
                    normal_map: None,
                    motion: MotionDescription::Orbit {
                        scale: Vec3::splat(0.3),
                        offset: Vec3::new(-4.0, 0.0, 0.0),
                        spin_speed: -1.0,
                        orbit_speed: -2.0,
                    },
                },
                CubeDescription {
                    name: "third_cube".into(),
                    position: Vec3::ZERO,
                    color: Vec4::new(0.6, 0.2, 0.9, 1.0),
                    texture: None,
                    normal_map: None,
                    motion: MotionDescription::Orbit {
                        scale: Vec3::new(0.5, 1.5, 0.5),
                        offset: Vec3::new(-2.0, 1.0, 0.0),
                        spin_speed: 0.0,
                        orbit_speed: -1.5,
                    },
                },
                CubeDescription {
                    name: "texture_cube".into(),
                    position: Vec3::ZERO,
                    color: Vec4::ONE,
                    texture: Some(PathBuf::from(BUILTIN_CRATE)),
                    normal_map: None,
                    motion: MotionDescription::Bob { offset_x: 5.0 },
                },
            ],
            skybox: Some(SkyboxDescription {
                faces: None,
                scale: default_sky_scale(),
            }),
            voxels: vec![VoxelDescription {
                origin: Vec3::new(-8.0, -3.0, 4.0),
                positions: Vec::new(),
                height_map: (0..8)
                    .map(|z| (0..16).map(|x| 1 + ((x + z) % 4) as u32 / 2).collect())
                    .collect(),
                color: Vec4::new(0.45, 0.7, 0.35, 1.0),
                texture: None,
            }],
            models: Vec::new(),
            lights: vec![
                PointLight::new(Vec3::new(-5.77, 5.77, -5.77), Vec4::new(1.0, 1.0, 1.0, 1.0)),
                PointLight::new(Vec3::new(0.0, 3.0, 8.0), Vec4::new(0.6, 0.3, 0.3, 1.0))
                    .orbiting(0.5),
            ],
        }
    }

    /// Load every referenced asset and assemble the scene.
    ///
    /// Missing textures fall back to the checker texture. Missing models and
    /// skybox faces are errors.
    pub fn build(
        &self,
        textures: &mut TextureStore,
        base_dir: &Path,
    ) -> Result<(Scene, CameraSettings), ConfigError> {
        if self.lights.len() > NUM_LIGHTS {
            return Err(ConfigError::TooManyLights(self.lights.len()));
        }

        let mut scene = Scene::new();
        let cube = Arc::new(cube_mesh());

        for desc in &self.cubes {
            let mesh = match &desc.texture {
                Some(texture) => {
                    let diffuse = load_texture(textures, base_dir, texture);
                    let normal = desc
                        .normal_map
                        .as_ref()
                        .map(|n| load_texture(textures, base_dir, n));
                    Arc::new(cube_mesh().with_material(Material::textured(
                        desc.name.clone(),
                        diffuse,
                        normal,
                    )))
                }
                None => cube.clone(),
            };
            let renderable = Renderable::new(mesh, Mat4::from_translation(desc.position))
                .with_color(desc.color)
                .with_motion(desc.motion.motion());
            scene.add_renderable(desc.name.clone(), renderable)?;
        }

        if let Some(sky) = &self.skybox {
            let id = match &sky.faces {
                Some(faces) => textures.load_cube(&faces.clone().map(|f| base_dir.join(f)))?,
                None => textures.insert_cube(BUILTIN_SKY, CubeTextureData::gradient()),
            };
            scene.set_skybox(Skybox::new(id, sky.scale));
        }

        for desc in &self.voxels {
            let mesh = match &desc.texture {
                Some(texture) => {
                    let diffuse = load_texture(textures, base_dir, texture);
                    Arc::new(cube_mesh().with_material(Material::textured("voxel", diffuse, None)))
                }
                None => cube.clone(),
            };
            let mut positions = desc.positions.clone();
            positions.extend(height_map_positions(&desc.height_map));
            let voxel = Voxel::from_positions(mesh, &positions)
                .with_world(Mat4::from_translation(desc.origin))
                .with_color(desc.color);
            scene.add_voxel(voxel);
        }

        for desc in &self.models {
            let data = load_gltf(base_dir.join(&desc.path), textures)?;
            let world = Mat4::from_scale_rotation_translation(
                Vec3::splat(desc.scale),
                Quat::IDENTITY,
                desc.position,
            );
            let mut model = Model::new(Arc::new(data), world);
            model.output_color = desc.color;
            if let Some(clip) = &desc.clip {
                if !model.play(clip) {
                    tracing::warn!(model = %desc.name, clip = %clip, "unknown animation clip");
                }
            }
            scene.add_model(desc.name.clone(), model)?;
        }

        for (index, light) in self.lights.iter().enumerate() {
            scene.set_point_light(index, *light)?;
        }

        tracing::info!(
            scene = %self.name,
            objects = scene.object_count(),
            textures = textures.len(),
            "scene built"
        );
        Ok((scene, self.camera))
    }

    /// Build the scene and make it the main scene of a new stage.
    pub fn stage(
        &self,
        textures: &mut TextureStore,
        base_dir: &Path,
        width: u32,
        height: u32,
    ) -> Result<Stage, ConfigError> {
        let (scene, settings) = self.build(textures, base_dir)?;
        let mut stage = Stage::new(settings.camera(), width, height);
        stage.add_scene(self.name.clone(), scene)?;
        stage.set_main_scene(&self.name)?;
        Ok(stage)
    }
}

fn load_texture(textures: &mut TextureStore, base_dir: &Path, path: &Path) -> TextureId {
    if path == Path::new(BUILTIN_CRATE) {
        return textures.insert(BUILTIN_CRATE, crate_texture());
    }
    textures.load_or_invalid(base_dir.join(path), SamplerKind::TrilinearWrap)
}

/// Wooden-looking planks with darker borders.
fn crate_texture() -> TextureData {
    const SIZE: u32 = 64;
    let mut pixels = Vec::with_capacity((SIZE * SIZE * 4) as usize);
    for y in 0..SIZE {
        for x in 0..SIZE {
            let border = x < 4 || y < 4 || x >= SIZE - 4 || y >= SIZE - 4;
            let plank = (y / 8) % 2 == 0;
            let rgba = match (border, plank) {
                (true, _) => [90, 56, 28, 255],
                (false, true) => [176, 122, 64, 255],
                (false, false) => [158, 106, 54, 255],
            };
            pixels.extend_from_slice(&rgba);
        }
    }
    TextureData {
        width: SIZE,
        height: SIZE,
        pixels,
        sampler: SamplerKind::TrilinearWrap,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::draw::DrawPass;
    use crate::stage::projection;

    #[test]
    fn builtin_scene_builds_without_files() {
        let mut textures = TextureStore::new();
        let (scene, camera) = SceneDescription::builtin()
            .build(&mut textures, Path::new("does-not-exist"))
            .unwrap();
        assert_eq!(camera, CameraSettings::default());
        assert_eq!(scene.renderables().count(), 5);
        assert_eq!(scene.voxels().len(), 1);
        assert!(scene.voxels()[0].instance_count() > 128);
        assert!(scene.skybox().is_some());
        assert_eq!(textures.cubes().count(), 1);
        assert_eq!(textures.len(), 2);
        assert_eq!(scene.lights()[1].orbit_speed, 0.5);

        let textured = scene.renderable("texture_cube").unwrap();
        assert!(textured.mesh.has_texture());
    }

    #[test]
    fn builtin_frame_draws_every_object() {
        let mut textures = TextureStore::new();
        let mut stage = SceneDescription::builtin()
            .stage(&mut textures, Path::new("."), 800, 600)
            .unwrap();
        assert_eq!(stage.main_scene_name(), Some("lab"));
        stage.update(0.016).unwrap();
        let frame = stage.frame().unwrap();
        // Skybox, five cubes, one voxel field.
        assert_eq!(frame.draw_call_count(), 7);
        assert_eq!(frame.commands[0].pass, DrawPass::Skybox);
        assert_eq!(frame.constants.projection, projection(800, 600));
    }

    #[test]
    fn yaml_scene_with_missing_texture_uses_checker() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("scene.yaml");
        std::fs::write(
            &path,
            r#"
name: yard
camera:
  position: [1.0, 2.0, 3.0]
cubes:
  - name: box
    texture: missing.png
    motion:
      kind: orbit
      scale: [0.3, 0.3, 0.3]
      offset: [-4.0, 0.0, 0.0]
      orbit_speed: -2.0
voxels:
  - positions: [[0.0, 0.0, 0.0], [1.0, 0.0, 0.0]]
lights:
  - position: [0.0, 5.0, 0.0, 1.0]
    color: [1.0, 1.0, 1.0, 1.0]
"#,
        )
        .unwrap();

        let desc = SceneDescription::load(&path).unwrap();
        assert_eq!(desc.camera.position, Vec3::new(1.0, 2.0, 3.0));
        assert_eq!(desc.camera.travel_speed, 10.0);
        assert_eq!(desc.cubes[0].color, Vec4::ONE);

        let mut textures = TextureStore::new();
        let (scene, _) = desc.build(&mut textures, dir.path()).unwrap();
        let cube = scene.renderable("box").unwrap();
        assert_eq!(cube.motion.name(), "orbit");
        let id = cube.mesh.materials[0].diffuse.unwrap();
        assert_eq!(textures.get(id).unwrap(), &TextureData::invalid());
        assert_eq!(scene.voxels()[0].instance_count(), 2);
        assert!(scene.skybox().is_none());
    }

    #[test]
    fn json_scene_loads() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("scene.json");
        std::fs::write(
            &path,
            r#"{"name": "empty", "cubes": [{"name": "a", "motion": {"kind": "spin", "speed": 2.0}}]}"#,
        )
        .unwrap();
        let desc = SceneDescription::load(&path).unwrap();
        assert_eq!(desc.cubes[0].motion, MotionDescription::Spin { speed: 2.0 });
    }

    #[test]
    fn bob_cube_keeps_its_yaml_position() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("scene.yaml");
        std::fs::write(
            &path,
            r#"
name: shelf
cubes:
  - name: bobber
    position: [3.0, 0.0, 0.0]
    motion:
      kind: bob
      offset_x: 5.0
"#,
        )
        .unwrap();

        let desc = SceneDescription::load(&path).unwrap();
        let (mut scene, _) = desc.build(&mut TextureStore::new(), dir.path()).unwrap();
        scene.update(0.0);
        let p = scene
            .renderable("bobber")
            .unwrap()
            .world
            .transform_point3(Vec3::ZERO);
        assert!(p.abs_diff_eq(Vec3::new(8.0, 0.0, 0.0), 1e-5));
    }

    #[test]
    fn unknown_extension_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("scene.toml");
        std::fs::write(&path, "name = 'x'").unwrap();
        assert!(matches!(
            SceneDescription::load(&path),
            Err(ConfigError::UnknownFormat(_))
        ));
    }

    #[test]
    fn too_many_lights_is_rejected() {
        let mut desc = SceneDescription::builtin();
        desc.lights.push(PointLight::default());
        let err = desc
            .build(&mut TextureStore::new(), Path::new("."))
            .unwrap_err();
        assert!(matches!(err, ConfigError::TooManyLights(3)));
    }

    #[test]
    fn duplicate_cube_names_are_scene_errors() {
        let mut desc = SceneDescription::builtin();
        let first = desc.cubes[0].clone();
        desc.cubes.push(first);
        let err = desc
            .build(&mut TextureStore::new(), Path::new("."))
            .unwrap_err();
        assert!(matches!(
            err,
            ConfigError::Scene(SceneError::DuplicateObject(_))
        ));
    }

    #[test]
    fn missing_model_file_fails() {
        let mut desc = SceneDescription::builtin();
        desc.models.push(ModelDescription {
            name: "hero".into(),
            path: "hero.gltf".into(),
            position: Vec3::ZERO,
            scale: 1.0,
            clip: None,
            color: Vec4::ONE,
        });
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            desc.build(&mut TextureStore::new(), dir.path()),
            Err(ConfigError::Asset(_))
        ));
    }
}
