use glam::{Mat4, Vec3, Vec4};
use serde::{Deserialize, Serialize};
use std::f32::consts::FRAC_PI_2;

/// A point light. Lights with a non-zero `orbit_speed` circle the Y axis.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PointLight {
    pub position: Vec4,
    pub color: Vec4,
    #[serde(default)]
    pub orbit_speed: f32,
}

impl Default for PointLight {
    fn default() -> Self {
        Self {
            position: Vec4::new(0.0, 0.0, 0.0, 1.0),
            color: Vec4::ZERO,
            orbit_speed: 0.0,
        }
    }
}

impl PointLight {
    pub fn new(position: Vec3, color: Vec4) -> Self {
        Self {
            position: position.extend(1.0),
            color,
            orbit_speed: 0.0,
        }
    }

    pub fn orbiting(mut self, speed: f32) -> Self {
        self.orbit_speed = speed;
        self
    }

    pub fn position3(&self) -> Vec3 {
        self.position.truncate()
    }

    pub fn update(&mut self, delta_time: f32) {
        if self.orbit_speed != 0.0 {
            let rotation = Mat4::from_rotation_y(-self.orbit_speed * delta_time);
            self.position = rotation.transform_point3(self.position3()).extend(1.0);
        }
    }

    /// View from the light towards the origin.
    pub fn view(&self) -> Mat4 {
        let eye = self.position3();
        let up = if eye.cross(Vec3::Y).length_squared() < 1e-6 {
            Vec3::Z
        } else {
            Vec3::Y
        };
        Mat4::look_at_lh(eye, Vec3::ZERO, up)
    }

    /// 90° perspective used when rendering the shadow map.
    pub fn projection(&self, aspect: f32) -> Mat4 {
        Mat4::perspective_lh(FRAC_PI_2, aspect.max(f32::EPSILON), 0.01, 1000.0)
    }

    pub fn view_projection(&self, aspect: f32) -> Mat4 {
        self.projection(aspect) * self.view()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn static_light_stays_put() {
        let mut light = PointLight::new(Vec3::new(1.0, 2.0, 3.0), Vec4::ONE);
        light.update(1.0);
        assert_eq!(light.position3(), Vec3::new(1.0, 2.0, 3.0));
        assert_eq!(light.position.w, 1.0);
    }

    #[test]
    fn orbiting_light_keeps_radius_and_height() {
        let mut light = PointLight::new(Vec3::new(4.0, 2.0, 0.0), Vec4::ONE).orbiting(2.0);
        light.update(0.25);
        let p = light.position3();
        assert!((p.y - 2.0).abs() < 1e-5);
        assert!((Vec3::new(p.x, 0.0, p.z).length() - 4.0).abs() < 1e-4);
        assert_ne!(p, Vec3::new(4.0, 2.0, 0.0));
    }

    #[test]
    fn light_view_points_at_origin() {
        let light = PointLight::new(Vec3::new(0.0, 5.0, -5.0), Vec4::ONE);
        let origin = light.view().transform_point3(Vec3::ZERO);
        assert!(origin.x.abs() < 1e-5 && origin.y.abs() < 1e-5);
        assert!(origin.z > 0.0);
    }

    #[test]
    fn light_straight_above_has_valid_view() {
        let light = PointLight::new(Vec3::new(0.0, 10.0, 0.0), Vec4::ONE);
        assert!(!light.view_projection(1.0).is_nan());
    }
}
