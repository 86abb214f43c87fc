use crate::motion::Motion;
use ggp_assets::{Animator, MeshData, ModelData, TextureId, skybox_mesh};
use ggp_common::{InstanceData, MAX_NUM_BONES};
use glam::{Mat4, Vec3, Vec4};
use std::sync::Arc;

/// A single mesh drawn with one world matrix.
#[derive(Debug, Clone)]
pub struct Renderable {
    pub mesh: Arc<MeshData>,
    pub world: Mat4,
    /// Transform the motion is applied on top of; the initial `world`.
    pub origin: Mat4,
    pub output_color: Vec4,
    pub motion: Motion,
}

impl Renderable {
    pub fn new(mesh: Arc<MeshData>, world: Mat4) -> Self {
        Self {
            mesh,
            world,
            origin: world,
            output_color: Vec4::ONE,
            motion: Motion::Static,
        }
    }

    pub fn with_color(mut self, color: Vec4) -> Self {
        self.output_color = color;
        self
    }

    pub fn with_motion(mut self, motion: Motion) -> Self {
        self.motion = motion;
        self
    }

    pub fn update(&mut self, delta_time: f32) {
        self.motion.update(self.origin, &mut self.world, delta_time);
    }
}

/// One mesh drawn many times through the instance stream.
#[derive(Debug, Clone)]
pub struct Voxel {
    pub mesh: Arc<MeshData>,
    pub instances: Vec<InstanceData>,
    pub world: Mat4,
    pub output_color: Vec4,
}

impl Voxel {
    pub fn from_positions(mesh: Arc<MeshData>, positions: &[Vec3]) -> Self {
        let instances = positions
            .iter()
            .map(|p| InstanceData::from_matrix(Mat4::from_translation(*p)))
            .collect();
        Self {
            mesh,
            instances,
            world: Mat4::IDENTITY,
            output_color: Vec4::ONE,
        }
    }

    /// A column of `heights[z][x]` unit cubes stacked on every grid cell.
    pub fn from_height_map(mesh: Arc<MeshData>, heights: &[Vec<u32>]) -> Self {
        Self::from_positions(mesh, &height_map_positions(heights))
    }

    pub fn with_color(mut self, color: Vec4) -> Self {
        self.output_color = color;
        self
    }

    pub fn with_world(mut self, world: Mat4) -> Self {
        self.world = world;
        self
    }

    pub fn instance_count(&self) -> u32 {
        self.instances.len() as u32
    }
}

/// Cell positions of a height map, bottom cube first in every column.
pub fn height_map_positions(heights: &[Vec<u32>]) -> Vec<Vec3> {
    let mut positions = Vec::new();
    for (z, row) in heights.iter().enumerate() {
        for (x, &height) in row.iter().enumerate() {
            for y in 0..height {
                positions.push(Vec3::new(x as f32, y as f32, z as f32));
            }
        }
    }
    positions
}

/// A loaded model with its animation playback state.
#[derive(Debug, Clone)]
pub struct Model {
    pub data: Arc<ModelData>,
    pub world: Mat4,
    pub output_color: Vec4,
    pub animator: Animator,
    bone_transforms: Vec<Mat4>,
}

impl Model {
    pub fn new(data: Arc<ModelData>, world: Mat4) -> Self {
        let animator = if data.clips.is_empty() {
            Animator::default()
        } else {
            Animator::playing(0)
        };
        let bone_transforms = data.bone_transforms(&animator);
        Self {
            data,
            world,
            output_color: Vec4::ONE,
            animator,
            bone_transforms,
        }
    }

    /// Select a clip by name. Unknown names leave the animator untouched.
    pub fn play(&mut self, clip: &str) -> bool {
        match self.data.clip_index(clip) {
            Some(index) => {
                self.animator.clip = Some(index);
                self.animator.time = 0.0;
                self.bone_transforms = self.data.bone_transforms(&self.animator);
                true
            }
            None => false,
        }
    }

    pub fn is_skinned(&self) -> bool {
        self.data.is_skinned()
    }

    pub fn update(&mut self, delta_time: f32) {
        if !self.is_skinned() {
            return;
        }
        if let Some(clip) = self.animator.clip {
            let duration = self.data.clip_duration(clip);
            self.animator.advance(delta_time, duration);
        }
        self.bone_transforms = self.data.bone_transforms(&self.animator);
    }

    pub fn bone_transforms(&self) -> &[Mat4] {
        &self.bone_transforms
    }

    /// Bone palette padded with identity to `MAX_NUM_BONES` entries.
    pub fn bone_palette(&self) -> Vec<Mat4> {
        let mut palette = vec![Mat4::IDENTITY; MAX_NUM_BONES];
        for (slot, bone) in palette.iter_mut().zip(&self.bone_transforms) {
            *slot = *bone;
        }
        palette
    }
}

/// Inside-out cube textured with a cube map, centred on the camera.
#[derive(Debug, Clone)]
pub struct Skybox {
    pub mesh: Arc<MeshData>,
    pub texture: TextureId,
    pub scale: f32,
    pub world: Mat4,
}

impl Skybox {
    pub fn new(texture: TextureId, scale: f32) -> Self {
        Self {
            mesh: Arc::new(skybox_mesh()),
            texture,
            scale,
            world: Mat4::from_scale(Vec3::splat(scale)),
        }
    }

    pub fn follow(&mut self, eye: Vec3) {
        self.world = Mat4::from_translation(eye) * Mat4::from_scale(Vec3::splat(self.scale));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ggp_assets::{AnimationClip, Joint, JointTransform, Skeleton, cube_mesh};
    use ggp_assets::animation::{Channel, ChannelValues, Interpolation};
    use ggp_common::AnimationData;

    fn cube() -> Arc<MeshData> {
        Arc::new(cube_mesh())
    }

    #[test]
    fn renderable_runs_motion() {
        let mut r = Renderable::new(cube(), Mat4::from_translation(Vec3::X))
            .with_motion(Motion::Spin { speed: 1.0 });
        r.update(0.5);
        assert_ne!(r.world, Mat4::from_translation(Vec3::X));
    }

    #[test]
    fn renderable_bob_keeps_its_position() {
        let start = Mat4::from_translation(Vec3::new(0.0, 0.0, 7.0));
        let mut r = Renderable::new(cube(), start).with_motion(Motion::bob(2.0));
        r.update(0.0);
        let p = r.world.transform_point3(Vec3::ZERO);
        assert!(p.abs_diff_eq(Vec3::new(2.0, 0.0, 7.0), 1e-6));
        assert_eq!(r.origin, start);
    }

    #[test]
    fn height_map_stacks_columns() {
        let voxel = Voxel::from_height_map(cube(), &[vec![1, 0, 3], vec![2]]);
        assert_eq!(voxel.instance_count(), 6);
        let top = voxel
            .instances
            .iter()
            .map(|i| i.matrix().transform_point3(Vec3::ZERO))
            .fold(0.0_f32, |acc, p| acc.max(p.y));
        assert_eq!(top, 2.0);
        assert!(
            voxel
                .instances
                .iter()
                .any(|i| i.matrix().transform_point3(Vec3::ZERO) == Vec3::new(0.0, 1.0, 1.0))
        );
    }

    #[test]
    fn empty_height_map_has_no_instances() {
        let voxel = Voxel::from_height_map(cube(), &[vec![0, 0]]);
        assert_eq!(voxel.instance_count(), 0);
    }

    #[test]
    fn skybox_follows_eye() {
        let mut sky = Skybox::new(TextureId(1), 50.0);
        sky.follow(Vec3::new(1.0, 2.0, 3.0));
        assert_eq!(
            sky.world.transform_point3(Vec3::ZERO),
            Vec3::new(1.0, 2.0, 3.0)
        );
        let corner = sky.world.transform_point3(Vec3::ONE);
        assert_eq!(corner, Vec3::new(51.0, 52.0, 53.0));
    }

    #[test]
    fn static_model_has_identity_palette() {
        let model = Model::new(
            Arc::new(ModelData::from_mesh("box", cube_mesh())),
            Mat4::IDENTITY,
        );
        assert!(model.bone_transforms().is_empty());
        let palette = model.bone_palette();
        assert_eq!(palette.len(), MAX_NUM_BONES);
        assert!(palette.iter().all(|m| *m == Mat4::IDENTITY));
    }

    fn skinned_model() -> ModelData {
        let joint = Joint {
            name: "root".into(),
            parent: None,
            local: JointTransform::default(),
            inverse_bind: Mat4::IDENTITY,
        };
        let skeleton = Skeleton::new(vec![joint], Mat4::IDENTITY).unwrap();
        let clip = AnimationClip::new(
            "lift",
            vec![Channel {
                joint: 0,
                interpolation: Interpolation::Linear,
                times: vec![0.0, 2.0],
                values: ChannelValues::Translation(vec![Vec3::ZERO, Vec3::new(0.0, 2.0, 0.0)]),
            }],
        );
        let mut mesh = cube_mesh();
        mesh.animation = Some(vec![
            AnimationData {
                bone_indices: [0; 4],
                bone_weights: [1.0, 0.0, 0.0, 0.0],
            };
            mesh.vertices.len()
        ]);
        ModelData {
            name: "lifter".into(),
            mesh,
            skeleton: Some(skeleton),
            clips: vec![clip],
        }
    }

    #[test]
    fn skinned_model_advances_clip() {
        let mut model = Model::new(Arc::new(skinned_model()), Mat4::IDENTITY);
        assert_eq!(model.animator.clip, Some(0));
        model.update(1.0);
        let lifted = model.bone_transforms()[0].transform_point3(Vec3::ZERO);
        assert!(lifted.abs_diff_eq(Vec3::new(0.0, 1.0, 0.0), 1e-5));
        // Loops back past the end of the clip.
        model.update(1.5);
        assert!((model.animator.time - 0.5).abs() < 1e-5);
    }

    #[test]
    fn play_unknown_clip_is_rejected() {
        let mut model = Model::new(Arc::new(skinned_model()), Mat4::IDENTITY);
        assert!(!model.play("run"));
        assert!(model.play("lift"));
        assert_eq!(model.animator.time, 0.0);
    }
}
