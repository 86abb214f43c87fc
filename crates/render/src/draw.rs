use crate::camera::Camera;
use crate::scene::Scene;
use ggp_assets::{MeshData, SubMesh, TextureId};
use ggp_common::NUM_LIGHTS;
use glam::{Mat4, Vec3, Vec4};
use std::collections::BTreeMap;

/// Which pipeline a command is drawn with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum DrawPass {
    Skybox,
    Renderable,
    Voxel,
    Model,
}

impl DrawPass {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Skybox => "skybox",
            Self::Renderable => "renderable",
            Self::Voxel => "voxel",
            Self::Model => "model",
        }
    }
}

/// Identifies the scene object a command draws, so a backend can find the
/// GPU buffers it uploaded for it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ObjectKey {
    Skybox,
    Renderable(String),
    Voxel(usize),
    Model(String),
}

impl std::fmt::Display for ObjectKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Skybox => write!(f, "skybox"),
            Self::Renderable(name) => write!(f, "renderable:{name}"),
            Self::Voxel(index) => write!(f, "voxel:{index}"),
            Self::Model(name) => write!(f, "model:{name}"),
        }
    }
}

/// Textures bound for one command. For the skybox `diffuse` is a cube map.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MaterialBinding {
    pub diffuse: TextureId,
    pub normal: Option<TextureId>,
}

/// Slice of the object's index buffer drawn by one command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexRange {
    pub count: u32,
    pub base_index: u32,
    pub base_vertex: i32,
}

impl From<&SubMesh> for IndexRange {
    fn from(sub: &SubMesh) -> Self {
        Self {
            count: sub.num_indices,
            base_index: sub.base_index,
            base_vertex: sub.base_vertex,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DrawCommand {
    pub pass: DrawPass,
    pub object: ObjectKey,
    pub world: Mat4,
    pub output_color: Vec4,
    pub has_normal_map: bool,
    pub material: Option<MaterialBinding>,
    pub indices: IndexRange,
    pub instances: u32,
}

/// Per-frame shader constants shared by every command.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameConstants {
    pub view: Mat4,
    pub projection: Mat4,
    pub eye: Vec3,
    pub light_positions: [Vec4; NUM_LIGHTS],
    pub light_colors: [Vec4; NUM_LIGHTS],
    /// View-projection of light 0, used by the shadow pass.
    pub light_view_projection: Mat4,
}

/// Everything a backend needs to draw one frame, in submission order.
#[derive(Debug, Clone, PartialEq)]
pub struct FrameDraws {
    pub constants: FrameConstants,
    pub commands: Vec<DrawCommand>,
    pub shadow_casters: Vec<DrawCommand>,
    /// Bone palettes of skinned models, keyed by model name.
    pub bone_palettes: BTreeMap<String, Vec<Mat4>>,
}

impl FrameDraws {
    /// Walk the scene: skybox, renderables by name, voxels in insertion
    /// order, then models by name.
    pub fn build(scene: &Scene, camera: &Camera, projection: Mat4) -> Self {
        let lights = scene.lights();
        let constants = FrameConstants {
            view: camera.view(),
            projection,
            eye: camera.eye(),
            light_positions: lights.map(|l| l.position),
            light_colors: lights.map(|l| l.color),
            light_view_projection: lights[0].view_projection(1.0),
        };

        let mut commands = Vec::new();
        let mut shadow_casters = Vec::new();
        let mut bone_palettes = BTreeMap::new();

        if let Some(skybox) = scene.skybox() {
            let material = MaterialBinding {
                diffuse: skybox.texture,
                normal: None,
            };
            for range in submesh_ranges(&skybox.mesh) {
                commands.push(DrawCommand {
                    pass: DrawPass::Skybox,
                    object: ObjectKey::Skybox,
                    world: skybox.world,
                    output_color: Vec4::ONE,
                    has_normal_map: false,
                    material: Some(material),
                    indices: range,
                    instances: 1,
                });
            }
        }

        for (name, renderable) in scene.renderables() {
            let template = Template {
                pass: DrawPass::Renderable,
                object: ObjectKey::Renderable(name.to_string()),
                world: renderable.world,
                output_color: renderable.output_color,
                instances: 1,
            };
            template.emit(&renderable.mesh, &mut commands, &mut shadow_casters);
        }

        for (index, voxel) in scene.voxels().iter().enumerate() {
            if voxel.instances.is_empty() {
                continue;
            }
            let template = Template {
                pass: DrawPass::Voxel,
                object: ObjectKey::Voxel(index),
                world: voxel.world,
                output_color: voxel.output_color,
                instances: voxel.instance_count(),
            };
            template.emit(&voxel.mesh, &mut commands, &mut shadow_casters);
        }

        for (name, model) in scene.models() {
            let template = Template {
                pass: DrawPass::Model,
                object: ObjectKey::Model(name.to_string()),
                world: model.world,
                output_color: model.output_color,
                instances: 1,
            };
            template.emit(&model.data.mesh, &mut commands, &mut shadow_casters);
            if model.is_skinned() {
                bone_palettes.insert(name.to_string(), model.bone_palette());
            }
        }

        Self {
            constants,
            commands,
            shadow_casters,
            bone_palettes,
        }
    }

    pub fn draw_call_count(&self) -> usize {
        self.commands.len()
    }

    pub fn commands_for(&self, pass: DrawPass) -> impl Iterator<Item = &DrawCommand> {
        self.commands.iter().filter(move |c| c.pass == pass)
    }
}

struct Template {
    pass: DrawPass,
    object: ObjectKey,
    world: Mat4,
    output_color: Vec4,
    instances: u32,
}

impl Template {
    fn command(&self, material: Option<MaterialBinding>, indices: IndexRange) -> DrawCommand {
        DrawCommand {
            pass: self.pass,
            object: self.object.clone(),
            world: self.world,
            output_color: self.output_color,
            has_normal_map: material.is_some_and(|m| m.normal.is_some()),
            material,
            indices,
            instances: self.instances,
        }
    }

    fn emit(&self, mesh: &MeshData, commands: &mut Vec<DrawCommand>, shadows: &mut Vec<DrawCommand>) {
        let ranges: Vec<_> = mesh
            .submeshes
            .iter()
            .map(|sub| (IndexRange::from(sub), sub.material_index))
            .collect();

        for (range, _) in &ranges {
            shadows.push(self.command(None, *range));
        }

        let shares_vertex_base = mesh.submeshes.iter().all(|s| s.base_vertex == 0);
        if !mesh.has_texture() && shares_vertex_base {
            commands.push(self.command(
                None,
                IndexRange {
                    count: mesh.num_indices(),
                    base_index: 0,
                    base_vertex: 0,
                },
            ));
            return;
        }

        for (range, material_index) in ranges {
            let material = mesh.material(material_index).and_then(|m| {
                m.diffuse.map(|diffuse| MaterialBinding {
                    diffuse,
                    normal: m.normal,
                })
            });
            commands.push(self.command(material, range));
        }
    }
}

fn submesh_ranges(mesh: &MeshData) -> impl Iterator<Item = IndexRange> + '_ {
    mesh.submeshes.iter().map(IndexRange::from)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::light::PointLight;
    use crate::object::{Model, Renderable, Skybox, Voxel};
    use ggp_assets::{Material, ModelData, cube_mesh};
    use std::sync::Arc;

    fn projection() -> Mat4 {
        Mat4::perspective_lh(std::f32::consts::FRAC_PI_4, 4.0 / 3.0, 0.01, 1000.0)
    }

    fn textured_cube() -> Arc<MeshData> {
        Arc::new(cube_mesh().with_material(Material::textured(
            "crate",
            TextureId(7),
            Some(TextureId(8)),
        )))
    }

    /// Two submeshes with their own vertex base and one textured material.
    fn split_mesh() -> Arc<MeshData> {
        let mut mesh = cube_mesh();
        mesh.submeshes = vec![
            SubMesh {
                num_indices: 18,
                base_index: 0,
                base_vertex: 0,
                material_index: 0,
            },
            SubMesh {
                num_indices: 18,
                base_index: 18,
                base_vertex: 0,
                material_index: 1,
            },
        ];
        mesh.materials = vec![
            Material::textured("a", TextureId(1), None),
            Material::default(),
        ];
        Arc::new(mesh)
    }

    #[test]
    fn index_range_from_submesh() {
        let sub = SubMesh {
            num_indices: 12,
            base_index: 6,
            base_vertex: -4,
            material_index: 2,
        };
        assert_eq!(
            IndexRange::from(&sub),
            IndexRange {
                count: 12,
                base_index: 6,
                base_vertex: -4,
            }
        );
    }

    #[test]
    fn empty_scene_draws_nothing() {
        let frame = FrameDraws::build(&Scene::new(), &Camera::default(), projection());
        assert_eq!(frame.draw_call_count(), 0);
        assert!(frame.shadow_casters.is_empty());
    }

    #[test]
    fn traversal_order_is_skybox_renderables_voxels_models() {
        let mut scene = Scene::new();
        scene.set_skybox(Skybox::new(TextureId(99), 10.0));
        scene
            .add_model(
                "a_model",
                Model::new(
                    Arc::new(ModelData::from_mesh("m", cube_mesh())),
                    Mat4::IDENTITY,
                ),
            )
            .unwrap();
        scene.add_voxel(Voxel::from_positions(Arc::new(cube_mesh()), &[Vec3::ZERO, Vec3::X]));
        scene
            .add_renderable("z", Renderable::new(Arc::new(cube_mesh()), Mat4::IDENTITY))
            .unwrap();
        scene
            .add_renderable("b", Renderable::new(Arc::new(cube_mesh()), Mat4::IDENTITY))
            .unwrap();

        let frame = FrameDraws::build(&scene, &Camera::default(), projection());
        let keys: Vec<_> = frame.commands.iter().map(|c| c.object.to_string()).collect();
        assert_eq!(
            keys,
            [
                "skybox",
                "renderable:b",
                "renderable:z",
                "voxel:0",
                "model:a_model"
            ]
        );
        assert_eq!(frame.commands[0].material.unwrap().diffuse, TextureId(99));
        assert_eq!(frame.commands[3].instances, 2);
        // Skybox never casts shadows.
        assert_eq!(frame.shadow_casters.len(), 4);
        assert!(
            frame
                .shadow_casters
                .iter()
                .all(|c| c.pass != DrawPass::Skybox)
        );
    }

    #[test]
    fn untextured_mesh_is_one_call() {
        let mut scene = Scene::new();
        scene
            .add_renderable(
                "plain",
                Renderable::new(Arc::new(cube_mesh()), Mat4::IDENTITY).with_color(Vec4::X),
            )
            .unwrap();
        let frame = FrameDraws::build(&scene, &Camera::default(), projection());
        let cmd = &frame.commands[0];
        assert_eq!(frame.draw_call_count(), 1);
        assert_eq!(cmd.indices.count, 36);
        assert_eq!(cmd.material, None);
        assert_eq!(cmd.output_color, Vec4::X);
        assert!(!cmd.has_normal_map);
    }

    #[test]
    fn textured_mesh_binds_material_per_submesh() {
        let mut scene = Scene::new();
        scene
            .add_renderable("crate", Renderable::new(textured_cube(), Mat4::IDENTITY))
            .unwrap();
        scene
            .add_renderable("split", Renderable::new(split_mesh(), Mat4::IDENTITY))
            .unwrap();
        let frame = FrameDraws::build(&scene, &Camera::default(), projection());

        let crate_cmd = &frame.commands[0];
        assert_eq!(
            crate_cmd.material,
            Some(MaterialBinding {
                diffuse: TextureId(7),
                normal: Some(TextureId(8))
            })
        );
        assert!(crate_cmd.has_normal_map);

        let split: Vec<_> = frame
            .commands
            .iter()
            .filter(|c| c.object == ObjectKey::Renderable("split".into()))
            .collect();
        assert_eq!(split.len(), 2);
        assert_eq!(split[0].material.map(|m| m.diffuse), Some(TextureId(1)));
        assert_eq!(split[1].material, None);
        assert_eq!(split[1].indices.base_index, 18);
    }

    #[test]
    fn empty_voxel_field_is_skipped() {
        let mut scene = Scene::new();
        scene.add_voxel(Voxel::from_positions(Arc::new(cube_mesh()), &[]));
        let frame = FrameDraws::build(&scene, &Camera::default(), projection());
        assert_eq!(frame.draw_call_count(), 0);
    }

    #[test]
    fn constants_carry_camera_and_lights() {
        let mut scene = Scene::new();
        let light = PointLight::new(Vec3::new(0.0, 4.0, -4.0), Vec4::new(1.0, 0.5, 0.0, 1.0));
        scene.set_point_light(0, light).unwrap();
        let camera = Camera::default();
        let frame = FrameDraws::build(&scene, &camera, projection());
        assert_eq!(frame.constants.view, camera.view());
        assert_eq!(frame.constants.eye, camera.eye());
        assert_eq!(frame.constants.light_positions[0], light.position);
        assert_eq!(frame.constants.light_colors[0], light.color);
        assert_eq!(frame.constants.light_view_projection, light.view_projection(1.0));
    }

    #[test]
    fn static_models_have_no_palette() {
        let mut scene = Scene::new();
        scene
            .add_model(
                "box",
                Model::new(
                    Arc::new(ModelData::from_mesh("box", cube_mesh())),
                    Mat4::IDENTITY,
                ),
            )
            .unwrap();
        let frame = FrameDraws::build(&scene, &Camera::default(), projection());
        assert!(frame.bone_palettes.is_empty());
        assert_eq!(frame.commands_for(DrawPass::Model).count(), 1);
    }
}
