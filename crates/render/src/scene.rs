use crate::SceneError;
use crate::light::PointLight;
use crate::object::{Model, Renderable, Skybox, Voxel};
use ggp_common::NUM_LIGHTS;
use std::collections::BTreeMap;

/// Everything drawn in one frame: named objects, voxel fields, an optional
/// skybox and a fixed set of point lights.
#[derive(Debug, Clone, Default)]
pub struct Scene {
    renderables: BTreeMap<String, Renderable>,
    voxels: Vec<Voxel>,
    models: BTreeMap<String, Model>,
    skybox: Option<Skybox>,
    lights: [PointLight; NUM_LIGHTS],
}

impl Scene {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_renderable(
        &mut self,
        name: impl Into<String>,
        renderable: Renderable,
    ) -> Result<(), SceneError> {
        let name = name.into();
        if self.renderables.contains_key(&name) || self.models.contains_key(&name) {
            return Err(SceneError::DuplicateObject(name));
        }
        self.renderables.insert(name, renderable);
        Ok(())
    }

    pub fn add_model(&mut self, name: impl Into<String>, model: Model) -> Result<(), SceneError> {
        let name = name.into();
        if self.renderables.contains_key(&name) || self.models.contains_key(&name) {
            return Err(SceneError::DuplicateObject(name));
        }
        self.models.insert(name, model);
        Ok(())
    }

    pub fn add_voxel(&mut self, voxel: Voxel) -> usize {
        self.voxels.push(voxel);
        self.voxels.len() - 1
    }

    pub fn set_skybox(&mut self, skybox: Skybox) {
        self.skybox = Some(skybox);
    }

    pub fn set_point_light(&mut self, index: usize, light: PointLight) -> Result<(), SceneError> {
        let slot = self
            .lights
            .get_mut(index)
            .ok_or(SceneError::LightIndexOutOfRange(index))?;
        *slot = light;
        Ok(())
    }

    pub fn renderable(&self, name: &str) -> Option<&Renderable> {
        self.renderables.get(name)
    }

    pub fn renderable_mut(&mut self, name: &str) -> Option<&mut Renderable> {
        self.renderables.get_mut(name)
    }

    pub fn model(&self, name: &str) -> Option<&Model> {
        self.models.get(name)
    }

    pub fn model_mut(&mut self, name: &str) -> Option<&mut Model> {
        self.models.get_mut(name)
    }

    pub fn renderables(&self) -> impl Iterator<Item = (&str, &Renderable)> {
        self.renderables.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn voxels(&self) -> &[Voxel] {
        &self.voxels
    }

    pub fn models(&self) -> impl Iterator<Item = (&str, &Model)> {
        self.models.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn skybox(&self) -> Option<&Skybox> {
        self.skybox.as_ref()
    }

    pub fn skybox_mut(&mut self) -> Option<&mut Skybox> {
        self.skybox.as_mut()
    }

    pub fn lights(&self) -> &[PointLight; NUM_LIGHTS] {
        &self.lights
    }

    /// Number of named objects plus voxel fields.
    pub fn object_count(&self) -> usize {
        self.renderables.len() + self.voxels.len() + self.models.len()
    }

    pub fn update(&mut self, delta_time: f32) {
        for renderable in self.renderables.values_mut() {
            renderable.update(delta_time);
        }
        for model in self.models.values_mut() {
            model.update(delta_time);
        }
        for light in &mut self.lights {
            light.update(delta_time);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::motion::Motion;
    use ggp_assets::{ModelData, cube_mesh};
    use glam::{Mat4, Vec3, Vec4};
    use std::sync::Arc;

    fn cube() -> Renderable {
        Renderable::new(Arc::new(cube_mesh()), Mat4::IDENTITY)
    }

    #[test]
    fn duplicate_names_are_rejected() {
        let mut scene = Scene::new();
        scene.add_renderable("cube", cube()).unwrap();
        let err = scene.add_renderable("cube", cube()).unwrap_err();
        assert_eq!(err, SceneError::DuplicateObject("cube".into()));

        let model = Model::new(
            Arc::new(ModelData::from_mesh("cube", cube_mesh())),
            Mat4::IDENTITY,
        );
        assert!(scene.add_model("cube", model).is_err());
        assert_eq!(scene.object_count(), 1);
    }

    #[test]
    fn light_index_is_checked() {
        let mut scene = Scene::new();
        let light = PointLight::new(Vec3::Y, Vec4::ONE);
        scene.set_point_light(1, light).unwrap();
        assert_eq!(scene.lights()[1], light);
        assert_eq!(
            scene.set_point_light(NUM_LIGHTS, light),
            Err(SceneError::LightIndexOutOfRange(NUM_LIGHTS))
        );
    }

    #[test]
    fn update_moves_objects_and_lights() {
        let mut scene = Scene::new();
        scene
            .add_renderable(
                "spinner",
                cube()
                    .with_motion(Motion::Spin { speed: 1.0 })
                    .with_color(Vec4::X),
            )
            .unwrap();
        scene.add_renderable("still", cube()).unwrap();
        scene
            .set_point_light(0, PointLight::new(Vec3::X, Vec4::ONE).orbiting(1.0))
            .unwrap();

        scene.update(0.5);
        assert_ne!(scene.renderable("spinner").unwrap().world, Mat4::IDENTITY);
        assert_eq!(scene.renderable("still").unwrap().world, Mat4::IDENTITY);
        assert_ne!(scene.lights()[0].position3(), Vec3::X);
    }

    #[test]
    fn renderables_iterate_by_name() {
        let mut scene = Scene::new();
        scene.add_renderable("b", cube()).unwrap();
        scene.add_renderable("a", cube()).unwrap();
        let names: Vec<_> = scene.renderables().map(|(n, _)| n).collect();
        assert_eq!(names, ["a", "b"]);
    }
}
