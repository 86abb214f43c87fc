//! Asset loading: textures, generated meshes, glTF models and skeletal animation.
//!
//! Textures are identified by content-addressed ids. Scenes reference
//! textures by id, never by raw file paths, and a texture that fails to
//! load is replaced by a visible checker instead of failing the scene.

pub mod animation;
mod gltf_loader;
pub mod mesh;
mod model;
pub mod texture;

pub use animation::{AnimationClip, Animator, Joint, JointTransform, Skeleton};
pub use gltf_loader::load_gltf;
pub use mesh::{Material, MeshData, SubMesh, compute_tangents, cube_mesh, skybox_mesh};
pub use model::ModelData;
pub use texture::{CubeTextureData, TextureData, TextureId, TextureStore};

use std::path::PathBuf;

/// Errors from asset operations.
#[derive(Debug, thiserror::Error)]
pub enum AssetError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("can't decode image {path}: {source}")]
    Image {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },
    #[error("can't import glTF {path}: {source}")]
    Gltf {
        path: PathBuf,
        #[source]
        source: gltf::Error,
    },
    #[error("invalid texture: {0}")]
    InvalidTexture(String),
    #[error("cube map faces mismatch: {0}")]
    CubeFaceMismatch(String),
    #[error("invalid mesh: {0}")]
    InvalidMesh(String),
    #[error("invalid skeleton: {0}")]
    InvalidSkeleton(String),
    #[error("skeleton has {count} joints, at most {max} are supported")]
    TooManyBones { count: usize, max: usize },
}

pub fn crate_info() -> &'static str {
    "ggp-assets v0.1.0"
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn crate_loads() {
        assert!(crate_info().contains("assets"));
    }

    #[test]
    fn errors_render_context() {
        let err = AssetError::TooManyBones { count: 200, max: 128 };
        assert_eq!(
            err.to_string(),
            "skeleton has 200 joints, at most 128 are supported"
        );
    }
}
