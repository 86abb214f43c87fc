use crate::animation::{AnimationClip, Animator, Skeleton};
use crate::mesh::MeshData;
use glam::Mat4;

/// A loaded model: geometry, optional skeleton and its clips.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ModelData {
    pub name: String,
    pub mesh: MeshData,
    pub skeleton: Option<Skeleton>,
    pub clips: Vec<AnimationClip>,
}

impl ModelData {
    /// A static model with no skeleton.
    pub fn from_mesh(name: impl Into<String>, mesh: MeshData) -> Self {
        Self {
            name: name.into(),
            mesh,
            skeleton: None,
            clips: Vec::new(),
        }
    }

    pub fn is_skinned(&self) -> bool {
        self.skeleton.is_some() && self.mesh.is_skinned()
    }

    pub fn clip_index(&self, name: &str) -> Option<usize> {
        self.clips.iter().position(|c| c.name == name)
    }

    pub fn clip_duration(&self, index: usize) -> f32 {
        self.clips.get(index).map(|c| c.duration).unwrap_or(0.0)
    }

    /// Bone palette at the animator's current time. Empty without a skeleton.
    pub fn bone_transforms(&self, animator: &Animator) -> Vec<Mat4> {
        match &self.skeleton {
            Some(skeleton) => animator.bone_transforms(skeleton, &self.clips),
            None => Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mesh::cube_mesh;

    #[test]
    fn static_model_has_no_bones() {
        let model = ModelData::from_mesh("box", cube_mesh());
        assert!(!model.is_skinned());
        assert!(model.bone_transforms(&Animator::default()).is_empty());
        assert_eq!(model.clip_index("walk"), None);
        assert_eq!(model.clip_duration(0), 0.0);
    }
}
