use crate::SceneError;
use crate::camera::Camera;
use crate::draw::FrameDraws;
use crate::scene::Scene;
use ggp_input::{DirectionsInput, MouseRelativeMovement};
use glam::Mat4;
use std::collections::BTreeMap;
use std::f32::consts::FRAC_PI_4;

pub const NEAR_PLANE: f32 = 0.01;
pub const FAR_PLANE: f32 = 1000.0;

/// Left-handed perspective used for the main camera.
pub fn projection(width: u32, height: u32) -> Mat4 {
    let aspect = width.max(1) as f32 / height.max(1) as f32;
    Mat4::perspective_lh(FRAC_PI_4, aspect, NEAR_PLANE, FAR_PLANE)
}

/// Owns the scenes, the camera and the projection. Only the main scene is
/// updated and drawn.
#[derive(Debug, Clone)]
pub struct Stage {
    scenes: BTreeMap<String, Scene>,
    main_scene: Option<String>,
    camera: Camera,
    projection: Mat4,
    width: u32,
    height: u32,
}

impl Stage {
    pub fn new(camera: Camera, width: u32, height: u32) -> Self {
        Self {
            scenes: BTreeMap::new(),
            main_scene: None,
            camera,
            projection: projection(width, height),
            width: width.max(1),
            height: height.max(1),
        }
    }

    pub fn add_scene(&mut self, name: impl Into<String>, scene: Scene) -> Result<(), SceneError> {
        let name = name.into();
        if self.scenes.contains_key(&name) {
            return Err(SceneError::DuplicateScene(name));
        }
        tracing::debug!(scene = %name, objects = scene.object_count(), "scene added");
        self.scenes.insert(name, scene);
        Ok(())
    }

    pub fn scene(&self, name: &str) -> Option<&Scene> {
        self.scenes.get(name)
    }

    pub fn scene_mut(&mut self, name: &str) -> Option<&mut Scene> {
        self.scenes.get_mut(name)
    }

    pub fn set_main_scene(&mut self, name: &str) -> Result<(), SceneError> {
        if !self.scenes.contains_key(name) {
            return Err(SceneError::SceneNotFound(name.to_string()));
        }
        self.main_scene = Some(name.to_string());
        Ok(())
    }

    pub fn main_scene_name(&self) -> Option<&str> {
        self.main_scene.as_deref()
    }

    pub fn main_scene(&self) -> Option<&Scene> {
        self.main_scene.as_deref().and_then(|n| self.scenes.get(n))
    }

    pub fn camera(&self) -> &Camera {
        &self.camera
    }

    pub fn camera_mut(&mut self) -> &mut Camera {
        &mut self.camera
    }

    pub fn projection(&self) -> Mat4 {
        self.projection
    }

    pub fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn handle_input(
        &mut self,
        directions: &DirectionsInput,
        mouse: &MouseRelativeMovement,
        delta_time: f32,
    ) {
        self.camera.handle_input(directions, mouse, delta_time);
    }

    /// Advance the main scene, then the camera, then keep the skybox on the eye.
    pub fn update(&mut self, delta_time: f32) -> Result<(), SceneError> {
        let name = self.main_scene.as_deref().ok_or(SceneError::NoMainScene)?;
        let scene = self
            .scenes
            .get_mut(name)
            .ok_or_else(|| SceneError::SceneNotFound(name.to_string()))?;
        scene.update(delta_time);
        self.camera.update(delta_time);
        if let Some(skybox) = scene.skybox_mut() {
            skybox.follow(self.camera.eye());
        }
        Ok(())
    }

    pub fn resize(&mut self, width: u32, height: u32) {
        self.width = width.max(1);
        self.height = height.max(1);
        self.projection = projection(self.width, self.height);
    }

    pub fn frame(&self) -> Result<FrameDraws, SceneError> {
        let scene = self.main_scene().ok_or(SceneError::NoMainScene)?;
        Ok(FrameDraws::build(scene, &self.camera, self.projection))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::object::{Renderable, Skybox};
    use ggp_assets::{TextureId, cube_mesh};
    use glam::Vec3;
    use std::sync::Arc;

    fn stage_with(name: &str) -> Stage {
        let mut stage = Stage::new(Camera::default(), 800, 600);
        stage.add_scene(name, Scene::new()).unwrap();
        stage
    }

    #[test]
    fn update_without_main_scene_fails() {
        let mut stage = stage_with("lab");
        assert_eq!(stage.update(0.016), Err(SceneError::NoMainScene));
        assert!(stage.frame().is_err());
    }

    #[test]
    fn scene_bookkeeping() {
        let mut stage = stage_with("lab");
        assert_eq!(
            stage.add_scene("lab", Scene::new()),
            Err(SceneError::DuplicateScene("lab".into()))
        );
        assert!(stage.scene("lab").is_some());
        assert!(stage.scene("nope").is_none());
        assert_eq!(
            stage.set_main_scene("nope"),
            Err(SceneError::SceneNotFound("nope".into()))
        );
        stage.set_main_scene("lab").unwrap();
        assert_eq!(stage.main_scene_name(), Some("lab"));
    }

    #[test]
    fn skybox_follows_camera_after_update() {
        let mut stage = stage_with("lab");
        stage
            .scene_mut("lab")
            .unwrap()
            .set_skybox(Skybox::new(TextureId(3), 100.0));
        stage.set_main_scene("lab").unwrap();

        let mut held = DirectionsInput::default();
        held.front = true;
        stage.handle_input(&held, &MouseRelativeMovement::default(), 0.5);
        stage.update(0.5).unwrap();

        let eye = stage.camera().eye();
        assert!(eye.abs_diff_eq(Vec3::new(0.0, 3.0, -1.0), 1e-5));
        let sky = stage.main_scene().unwrap().skybox().unwrap();
        assert!(sky.world.transform_point3(Vec3::ZERO).abs_diff_eq(eye, 1e-5));
    }

    #[test]
    fn frame_uses_projection_and_main_scene() {
        let mut stage = stage_with("lab");
        stage
            .scene_mut("lab")
            .unwrap()
            .add_renderable("cube", Renderable::new(Arc::new(cube_mesh()), Mat4::IDENTITY))
            .unwrap();
        stage.add_scene("other", Scene::new()).unwrap();
        stage.set_main_scene("lab").unwrap();
        let frame = stage.frame().unwrap();
        assert_eq!(frame.draw_call_count(), 1);
        assert_eq!(frame.constants.projection, projection(800, 600));
    }

    #[test]
    fn resize_clamps_zero_height() {
        let mut stage = stage_with("lab");
        stage.resize(640, 0);
        assert_eq!(stage.size(), (640, 1));
        assert_eq!(stage.projection(), projection(640, 1));
        assert!(!stage.projection().is_nan());
    }
}
