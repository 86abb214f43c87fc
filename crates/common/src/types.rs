use bytemuck::{Pod, Zeroable};
use glam::{Mat4, Vec2, Vec3};
use serde::{Deserialize, Serialize};

/// Number of point lights every scene carries.
pub const NUM_LIGHTS: usize = 2;

/// Size of the bone palette uploaded for a skinned model.
pub const MAX_NUM_BONES: usize = 128;

/// Position, texture coordinate and normal of one vertex.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Default, Pod, Zeroable)]
pub struct SimpleVertex {
    pub position: [f32; 3],
    pub tex_coord: [f32; 2],
    pub normal: [f32; 3],
}

impl SimpleVertex {
    pub fn new(position: Vec3, tex_coord: Vec2, normal: Vec3) -> Self {
        Self {
            position: position.to_array(),
            tex_coord: tex_coord.to_array(),
            normal: normal.to_array(),
        }
    }

    pub fn position(&self) -> Vec3 {
        Vec3::from_array(self.position)
    }

    pub fn tex_coord(&self) -> Vec2 {
        Vec2::from_array(self.tex_coord)
    }

    pub fn normal(&self) -> Vec3 {
        Vec3::from_array(self.normal)
    }
}

/// Tangent frame used for normal mapping. Lives in its own vertex stream.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Default, Pod, Zeroable)]
pub struct NormalData {
    pub tangent: [f32; 3],
    pub bitangent: [f32; 3],
}

/// Per-instance world matrix for instanced draws, column-major.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct InstanceData {
    pub transform: [[f32; 4]; 4],
}

impl InstanceData {
    pub fn from_matrix(m: Mat4) -> Self {
        Self {
            transform: m.to_cols_array_2d(),
        }
    }

    pub fn matrix(&self) -> Mat4 {
        Mat4::from_cols_array_2d(&self.transform)
    }
}

impl Default for InstanceData {
    fn default() -> Self {
        Self::from_matrix(Mat4::IDENTITY)
    }
}

/// Bone influences of one vertex. Weights of unused slots are zero.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Default, Pod, Zeroable)]
pub struct AnimationData {
    pub bone_indices: [u32; 4],
    pub bone_weights: [f32; 4],
}

impl AnimationData {
    /// Sum of the four weights. A well-formed vertex sums to 1.
    pub fn total_weight(&self) -> f32 {
        self.bone_weights.iter().sum()
    }

    /// Rescale weights so they sum to 1. Vertices with no weight bind fully to bone 0.
    pub fn normalized(mut self) -> Self {
        let total = self.total_weight();
        if total > f32::EPSILON {
            for w in &mut self.bone_weights {
                *w /= total;
            }
        } else {
            self.bone_indices = [0; 4];
            self.bone_weights = [1.0, 0.0, 0.0, 0.0];
        }
        self
    }
}

/// Texture sampler a texture asks for.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum SamplerKind {
    #[default]
    TrilinearWrap,
    TrilinearClamp,
}

impl SamplerKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::TrilinearWrap => "trilinear_wrap",
            Self::TrilinearClamp => "trilinear_clamp",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vertex_layout_sizes() {
        assert_eq!(std::mem::size_of::<SimpleVertex>(), 32);
        assert_eq!(std::mem::size_of::<NormalData>(), 24);
        assert_eq!(std::mem::size_of::<InstanceData>(), 64);
        assert_eq!(std::mem::size_of::<AnimationData>(), 32);
    }

    #[test]
    fn instance_matrix_round_trip() {
        let m = Mat4::from_translation(Vec3::new(1.0, 2.0, 3.0));
        assert_eq!(InstanceData::from_matrix(m).matrix(), m);
    }

    #[test]
    fn weights_normalize() {
        let data = AnimationData {
            bone_indices: [1, 2, 0, 0],
            bone_weights: [1.0, 3.0, 0.0, 0.0],
        }
        .normalized();
        assert!((data.total_weight() - 1.0).abs() < 1e-6);
        assert_eq!(data.bone_weights[0], 0.25);
    }

    #[test]
    fn zero_weights_bind_to_root() {
        let data = AnimationData::default().normalized();
        assert_eq!(data.bone_indices, [0; 4]);
        assert_eq!(data.bone_weights, [1.0, 0.0, 0.0, 0.0]);
    }

    #[test]
    fn sampler_kind_names() {
        assert_eq!(SamplerKind::default(), SamplerKind::TrilinearWrap);
        assert_eq!(SamplerKind::TrilinearClamp.as_str(), "trilinear_clamp");
    }

    #[test]
    fn sampler_kind_orders_as_map_key() {
        let mut ids = std::collections::BTreeMap::new();
        ids.insert((3usize, SamplerKind::TrilinearClamp), "clamp");
        ids.insert((3usize, SamplerKind::TrilinearWrap), "wrap");
        assert!(SamplerKind::TrilinearWrap < SamplerKind::TrilinearClamp);
        assert_eq!(ids.get(&(3, SamplerKind::TrilinearWrap)), Some(&"wrap"));
        assert_eq!(ids.len(), 2);
    }
}
