//! Scene side of the renderer: camera, lights, scene objects and the
//! per-frame draw list.
//!
//! # Invariants
//! - A renderer never mutates the scene. It consumes a [`FrameDraws`].
//! - Only the stage's main scene is updated and drawn.
//! - Camera input is accumulated between frames and applied exactly once
//!   per [`Stage::update`].

pub mod camera;
pub mod config;
pub mod draw;
pub mod light;
pub mod motion;
pub mod object;
mod renderer;
pub mod scene;
pub mod stage;

pub use camera::Camera;
pub use config::{CameraSettings, ConfigError, SceneDescription};
pub use draw::{
    DrawCommand, DrawPass, FrameConstants, FrameDraws, IndexRange, MaterialBinding, ObjectKey,
};
pub use light::PointLight;
pub use motion::Motion;
pub use object::{Model, Renderable, Skybox, Voxel};
pub use renderer::{DebugTextRenderer, Renderer};
pub use scene::Scene;
pub use stage::Stage;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SceneError {
    #[error("object already exists: {0}")]
    DuplicateObject(String),
    #[error("scene already exists: {0}")]
    DuplicateScene(String),
    #[error("scene not found: {0}")]
    SceneNotFound(String),
    #[error("no main scene selected")]
    NoMainScene,
    #[error("light index {0} out of range")]
    LightIndexOutOfRange(usize),
}

pub fn crate_info() -> &'static str {
    "ggp-render v0.1.0"
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn crate_loads() {
        assert!(crate_info().contains("render"));
    }

    #[test]
    fn errors_name_the_object() {
        let err = SceneError::DuplicateObject("cube".into());
        assert_eq!(err.to_string(), "object already exists: cube");
    }
}
