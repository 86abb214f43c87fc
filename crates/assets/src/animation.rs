//! Skeletons, keyframe clips and the bone palette they produce.
//!
//! Joints are stored parents-first so a single forward pass resolves global
//! transforms. Bone matrices follow the column-vector convention:
//! `bone = root * global(joint) * inverse_bind`.

use crate::AssetError;
use ggp_common::MAX_NUM_BONES;
use glam::{Mat4, Quat, Vec3};

/// Translation, rotation and scale of a joint relative to its parent.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct JointTransform {
    pub translation: Vec3,
    pub rotation: Quat,
    pub scale: Vec3,
}

impl Default for JointTransform {
    fn default() -> Self {
        Self {
            translation: Vec3::ZERO,
            rotation: Quat::IDENTITY,
            scale: Vec3::ONE,
        }
    }
}

impl JointTransform {
    pub fn matrix(&self) -> Mat4 {
        Mat4::from_scale_rotation_translation(self.scale, self.rotation, self.translation)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Joint {
    pub name: String,
    pub parent: Option<usize>,
    pub local: JointTransform,
    pub inverse_bind: Mat4,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Skeleton {
    pub joints: Vec<Joint>,
    /// Transform of the nodes above the root joints.
    pub root: Mat4,
}

impl Skeleton {
    pub fn new(joints: Vec<Joint>, root: Mat4) -> Result<Self, AssetError> {
        if joints.len() > MAX_NUM_BONES {
            return Err(AssetError::TooManyBones {
                count: joints.len(),
                max: MAX_NUM_BONES,
            });
        }
        for (i, joint) in joints.iter().enumerate() {
            if let Some(parent) = joint.parent {
                if parent >= i {
                    return Err(AssetError::InvalidSkeleton(format!(
                        "joint {i} ({}) has parent {parent} that does not precede it",
                        joint.name
                    )));
                }
            }
        }
        Ok(Self { joints, root })
    }

    pub fn len(&self) -> usize {
        self.joints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.joints.is_empty()
    }

    pub fn bind_pose(&self) -> Vec<JointTransform> {
        self.joints.iter().map(|j| j.local).collect()
    }

    /// Model-space transform of every joint for the given local pose.
    pub fn global_transforms(&self, pose: &[JointTransform]) -> Vec<Mat4> {
        let mut globals: Vec<Mat4> = Vec::with_capacity(self.joints.len());
        for (joint, local) in self.joints.iter().zip(pose) {
            let parent = joint.parent.map(|p| globals[p]).unwrap_or(self.root);
            globals.push(parent * local.matrix());
        }
        globals
    }

    /// Skinning matrices for the given pose.
    pub fn bone_transforms(&self, pose: &[JointTransform]) -> Vec<Mat4> {
        self.global_transforms(pose)
            .into_iter()
            .zip(&self.joints)
            .map(|(global, joint)| global * joint.inverse_bind)
            .collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Interpolation {
    Step,
    #[default]
    Linear,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ChannelValues {
    Translation(Vec<Vec3>),
    Rotation(Vec<Quat>),
    Scale(Vec<Vec3>),
}

impl ChannelValues {
    fn len(&self) -> usize {
        match self {
            Self::Translation(v) | Self::Scale(v) => v.len(),
            Self::Rotation(v) => v.len(),
        }
    }
}

/// Keyframes animating one property of one joint.
#[derive(Debug, Clone, PartialEq)]
pub struct Channel {
    pub joint: usize,
    pub interpolation: Interpolation,
    pub times: Vec<f32>,
    pub values: ChannelValues,
}

impl Channel {
    /// Keyframe pair around `time` and the blend factor between them.
    fn keys(&self, time: f32) -> Option<(usize, usize, f32)> {
        let n = self.times.len().min(self.values.len());
        if n == 0 {
            return None;
        }
        if time <= self.times[0] || n == 1 {
            return Some((0, 0, 0.0));
        }
        if time >= self.times[n - 1] {
            return Some((n - 1, n - 1, 0.0));
        }
        let next = self.times[..n].partition_point(|&t| t <= time);
        let prev = next - 1;
        let span = self.times[next] - self.times[prev];
        let f = if span > f32::EPSILON {
            (time - self.times[prev]) / span
        } else {
            0.0
        };
        match self.interpolation {
            Interpolation::Step => Some((prev, prev, 0.0)),
            Interpolation::Linear => Some((prev, next, f)),
        }
    }

    /// Write this channel's value at `time` into the pose.
    pub fn apply(&self, time: f32, pose: &mut [JointTransform]) {
        let Some(target) = pose.get_mut(self.joint) else {
            return;
        };
        let Some((a, b, f)) = self.keys(time) else {
            return;
        };
        match &self.values {
            ChannelValues::Translation(v) => target.translation = v[a].lerp(v[b], f),
            ChannelValues::Rotation(v) => target.rotation = v[a].slerp(v[b], f).normalize(),
            ChannelValues::Scale(v) => target.scale = v[a].lerp(v[b], f),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct AnimationClip {
    pub name: String,
    pub duration: f32,
    pub channels: Vec<Channel>,
}

impl AnimationClip {
    /// Build a clip whose duration is the last keyframe time.
    pub fn new(name: impl Into<String>, channels: Vec<Channel>) -> Self {
        let duration = channels
            .iter()
            .filter_map(|c| c.times.last().copied())
            .fold(0.0_f32, f32::max);
        Self {
            name: name.into(),
            duration,
            channels,
        }
    }

    /// Local pose at `time`, starting from the skeleton's bind pose.
    pub fn sample(&self, skeleton: &Skeleton, time: f32) -> Vec<JointTransform> {
        let mut pose = skeleton.bind_pose();
        for channel in &self.channels {
            channel.apply(time, &mut pose);
        }
        pose
    }
}

/// Playback state of one model.
#[derive(Debug, Clone, PartialEq)]
pub struct Animator {
    pub clip: Option<usize>,
    pub time: f32,
    pub speed: f32,
    pub looping: bool,
}

impl Default for Animator {
    fn default() -> Self {
        Self {
            clip: None,
            time: 0.0,
            speed: 1.0,
            looping: true,
        }
    }
}

impl Animator {
    pub fn playing(clip: usize) -> Self {
        Self {
            clip: Some(clip),
            ..Self::default()
        }
    }

    /// Advance playback, wrapping or clamping at `duration`.
    pub fn advance(&mut self, dt: f32, duration: f32) {
        self.time += dt * self.speed;
        if duration <= 0.0 {
            self.time = 0.0;
        } else if self.looping {
            self.time = self.time.rem_euclid(duration);
        } else {
            self.time = self.time.clamp(0.0, duration);
        }
    }

    /// Bone palette for the current time. Bind pose when no clip is selected.
    pub fn bone_transforms(&self, skeleton: &Skeleton, clips: &[AnimationClip]) -> Vec<Mat4> {
        let pose = match self.clip.and_then(|i| clips.get(i)) {
            Some(clip) => clip.sample(skeleton, self.time),
            None => skeleton.bind_pose(),
        };
        skeleton.bone_transforms(&pose)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn two_joint_skeleton() -> Skeleton {
        let root = Joint {
            name: "root".into(),
            parent: None,
            local: JointTransform::default(),
            inverse_bind: Mat4::IDENTITY,
        };
        let child_local = JointTransform {
            translation: Vec3::new(0.0, 1.0, 0.0),
            ..Default::default()
        };
        let child = Joint {
            name: "child".into(),
            parent: Some(0),
            local: child_local,
            inverse_bind: child_local.matrix().inverse(),
        };
        Skeleton::new(vec![root, child], Mat4::IDENTITY).unwrap()
    }

    #[test]
    fn bind_pose_gives_identity_palette() {
        let skeleton = two_joint_skeleton();
        let bones = skeleton.bone_transforms(&skeleton.bind_pose());
        for bone in bones {
            assert!(bone.abs_diff_eq(Mat4::IDENTITY, 1e-5));
        }
    }

    #[test]
    fn parent_motion_propagates() {
        let skeleton = two_joint_skeleton();
        let mut pose = skeleton.bind_pose();
        pose[0].translation = Vec3::new(2.0, 0.0, 0.0);
        let globals = skeleton.global_transforms(&pose);
        assert!(
            globals[1]
                .transform_point3(Vec3::ZERO)
                .abs_diff_eq(Vec3::new(2.0, 1.0, 0.0), 1e-5)
        );
    }

    #[test]
    fn parents_must_precede_children() {
        let joint = Joint {
            name: "loop".into(),
            parent: Some(0),
            local: JointTransform::default(),
            inverse_bind: Mat4::IDENTITY,
        };
        assert!(matches!(
            Skeleton::new(vec![joint], Mat4::IDENTITY),
            Err(AssetError::InvalidSkeleton(_))
        ));
    }

    #[test]
    fn too_many_bones() {
        let joints = (0..MAX_NUM_BONES + 1)
            .map(|i| Joint {
                name: format!("j{i}"),
                parent: None,
                local: JointTransform::default(),
                inverse_bind: Mat4::IDENTITY,
            })
            .collect();
        assert!(matches!(
            Skeleton::new(joints, Mat4::IDENTITY),
            Err(AssetError::TooManyBones { .. })
        ));
    }

    #[test]
    fn linear_translation_sampling() {
        let channel = Channel {
            joint: 0,
            interpolation: Interpolation::Linear,
            times: vec![0.0, 1.0, 2.0],
            values: ChannelValues::Translation(vec![
                Vec3::ZERO,
                Vec3::new(2.0, 0.0, 0.0),
                Vec3::new(2.0, 4.0, 0.0),
            ]),
        };
        let mut pose = vec![JointTransform::default()];
        channel.apply(0.5, &mut pose);
        assert!(pose[0].translation.abs_diff_eq(Vec3::new(1.0, 0.0, 0.0), 1e-5));
        channel.apply(1.5, &mut pose);
        assert!(pose[0].translation.abs_diff_eq(Vec3::new(2.0, 2.0, 0.0), 1e-5));
        // Clamped outside the key range.
        channel.apply(-1.0, &mut pose);
        assert_eq!(pose[0].translation, Vec3::ZERO);
        channel.apply(10.0, &mut pose);
        assert_eq!(pose[0].translation, Vec3::new(2.0, 4.0, 0.0));
    }

    #[test]
    fn step_holds_previous_key() {
        let channel = Channel {
            joint: 0,
            interpolation: Interpolation::Step,
            times: vec![0.0, 1.0],
            values: ChannelValues::Scale(vec![Vec3::ONE, Vec3::splat(3.0)]),
        };
        let mut pose = vec![JointTransform::default()];
        channel.apply(0.9, &mut pose);
        assert_eq!(pose[0].scale, Vec3::ONE);
    }

    #[test]
    fn rotation_slerps() {
        let channel = Channel {
            joint: 0,
            interpolation: Interpolation::Linear,
            times: vec![0.0, 1.0],
            values: ChannelValues::Rotation(vec![
                Quat::IDENTITY,
                Quat::from_rotation_y(std::f32::consts::FRAC_PI_2),
            ]),
        };
        let mut pose = vec![JointTransform::default()];
        channel.apply(0.5, &mut pose);
        let expected = Quat::from_rotation_y(std::f32::consts::FRAC_PI_4);
        assert!(pose[0].rotation.abs_diff_eq(expected, 1e-5));
    }

    #[test]
    fn clip_duration_is_last_key() {
        let clip = AnimationClip::new(
            "walk",
            vec![Channel {
                joint: 1,
                interpolation: Interpolation::Linear,
                times: vec![0.0, 0.75],
                values: ChannelValues::Translation(vec![Vec3::ZERO, Vec3::X]),
            }],
        );
        assert_eq!(clip.duration, 0.75);
    }

    #[test]
    fn animator_loops_and_clamps() {
        let mut a = Animator::playing(0);
        a.advance(2.5, 1.0);
        assert!((a.time - 0.5).abs() < 1e-5);

        a.looping = false;
        a.advance(3.0, 1.0);
        assert_eq!(a.time, 1.0);

        a.advance(1.0, 0.0);
        assert_eq!(a.time, 0.0);
    }

    #[test]
    fn animator_uses_clip_pose() {
        let skeleton = two_joint_skeleton();
        let clip = AnimationClip::new(
            "lift",
            vec![Channel {
                joint: 0,
                interpolation: Interpolation::Linear,
                times: vec![0.0, 1.0],
                values: ChannelValues::Translation(vec![Vec3::ZERO, Vec3::new(0.0, 2.0, 0.0)]),
            }],
        );
        let mut animator = Animator::playing(0);
        animator.advance(0.5, clip.duration);
        let bones = animator.bone_transforms(&skeleton, &[clip]);
        assert!(
            bones[0]
                .transform_point3(Vec3::ZERO)
                .abs_diff_eq(Vec3::new(0.0, 1.0, 0.0), 1e-5)
        );

        let idle = Animator::default().bone_transforms(&skeleton, &[]);
        assert!(idle[1].abs_diff_eq(Mat4::IDENTITY, 1e-5));
    }
}
