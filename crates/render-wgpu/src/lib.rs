//! wgpu render backend for the course scene.
//!
//! Executes a [`ggp_render::FrameDraws`] list as a shadow pass from the first
//! point light followed by the main lit pass.
//!
//! # Invariants
//! - Renderer never mutates scene state.
//! - Every command's object must have been uploaded with
//!   [`WgpuRenderer::upload_scene`] before it is drawn.

mod gpu;
mod resources;
mod shaders;

use ggp_assets::{AssetError, TextureId};

pub use gpu::{MAX_INSTANCES, WgpuRenderer};

#[derive(Debug, thiserror::Error)]
pub enum GpuError {
    #[error("object {0} was not uploaded")]
    UnknownObject(String),
    #[error("texture {0:?} has no GPU copy")]
    TextureMissing(TextureId),
    #[error("voxel field has {count} instances, limit is {max}")]
    TooManyInstances { count: u32, max: u32 },
    #[error("mesh {0} has no indices")]
    EmptyMesh(String),
    #[error("invalid mesh: {0}")]
    InvalidMesh(#[from] AssetError),
}
