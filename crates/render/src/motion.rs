use glam::{Mat4, Vec3};

/// Per-frame animation of a renderable's world matrix.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Motion {
    /// World matrix never changes.
    #[default]
    Static,
    /// Turns the world matrix around the world Y axis.
    Spin { speed: f32 },
    /// Scaled, offset and spun around Z, then carried around the Y axis of
    /// the renderable's origin.
    Orbit {
        scale: Vec3,
        offset: Vec3,
        spin_speed: f32,
        orbit_speed: f32,
        spin: f32,
        orbit: f32,
    },
    /// Bobs up and down at `offset_x` from the origin while tumbling around
    /// X and Y.
    Bob { offset_x: f32, elapsed: f32 },
}

impl Motion {
    pub fn orbit(scale: Vec3, offset: Vec3, spin_speed: f32, orbit_speed: f32) -> Self {
        Self::Orbit {
            scale,
            offset,
            spin_speed,
            orbit_speed,
            spin: 0.0,
            orbit: 0.0,
        }
    }

    pub fn bob(offset_x: f32) -> Self {
        Self::Bob {
            offset_x,
            elapsed: 0.0,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Static => "static",
            Self::Spin { .. } => "spin",
            Self::Orbit { .. } => "orbit",
            Self::Bob { .. } => "bob",
        }
    }

    /// Advance by `delta_time`. Orbit and bob rebuild `world` on top of
    /// `origin` every frame; spin accumulates onto the current `world`.
    pub fn update(&mut self, origin: Mat4, world: &mut Mat4, delta_time: f32) {
        match self {
            Self::Static => {}
            Self::Spin { speed } => {
                *world = Mat4::from_rotation_y(*speed * delta_time) * *world;
            }
            Self::Orbit {
                scale,
                offset,
                spin_speed,
                orbit_speed,
                spin,
                orbit,
            } => {
                *spin += *spin_speed * delta_time;
                *orbit += *orbit_speed * delta_time;
                *world = origin
                    * Mat4::from_rotation_y(*orbit)
                    * Mat4::from_rotation_z(*spin)
                    * Mat4::from_translation(*offset)
                    * Mat4::from_scale(*scale);
            }
            Self::Bob { offset_x, elapsed } => {
                *elapsed += delta_time;
                let t = *elapsed;
                *world = origin
                    * Mat4::from_rotation_x(t)
                    * Mat4::from_rotation_y(t)
                    * Mat4::from_translation(Vec3::new(*offset_x, t.sin(), 0.0));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f32::consts::PI;

    #[test]
    fn static_keeps_world() {
        let mut world = Mat4::from_translation(Vec3::X);
        Motion::Static.update(Mat4::IDENTITY, &mut world, 1.0);
        assert_eq!(world, Mat4::from_translation(Vec3::X));
    }

    #[test]
    fn spin_accumulates_on_world() {
        let mut world = Mat4::from_translation(Vec3::new(1.0, 0.0, 0.0));
        let mut m = Motion::Spin { speed: 1.0 };
        m.update(Mat4::IDENTITY, &mut world, PI / 2.0);
        let p = world.transform_point3(Vec3::ZERO);
        // Rotating (1,0,0) by +90° around Y gives (0,0,-1).
        assert!(p.abs_diff_eq(Vec3::new(0.0, 0.0, -1.0), 1e-5));
    }

    #[test]
    fn orbit_keeps_radius() {
        let mut world = Mat4::IDENTITY;
        let mut m = Motion::orbit(Vec3::splat(0.3), Vec3::new(-4.0, 0.0, 0.0), 0.0, -2.0);
        for _ in 0..10 {
            m.update(Mat4::IDENTITY, &mut world, 0.1);
            let p = world.transform_point3(Vec3::ZERO);
            assert!((p.length() - 4.0).abs() < 1e-4);
        }
        let p = world.transform_point3(Vec3::ZERO);
        assert!(!p.abs_diff_eq(Vec3::new(-4.0, 0.0, 0.0), 1e-3));
    }

    #[test]
    fn orbit_applies_scale() {
        let mut world = Mat4::IDENTITY;
        let mut m = Motion::orbit(Vec3::new(0.5, 1.5, 0.5), Vec3::ZERO, 0.0, 0.0);
        m.update(Mat4::IDENTITY, &mut world, 0.0);
        let top = world.transform_point3(Vec3::new(0.0, 0.5, 0.0));
        assert!(top.abs_diff_eq(Vec3::new(0.0, 0.75, 0.0), 1e-6));
    }

    #[test]
    fn bob_follows_sine() {
        let mut world = Mat4::IDENTITY;
        let mut m = Motion::bob(5.0);
        m.update(Mat4::IDENTITY, &mut world, 0.0);
        assert!(world.transform_point3(Vec3::ZERO).abs_diff_eq(Vec3::new(5.0, 0.0, 0.0), 1e-6));
        m.update(Mat4::IDENTITY, &mut world, 0.5);
        let expected = Mat4::from_rotation_x(0.5)
            * Mat4::from_rotation_y(0.5)
            * Mat4::from_translation(Vec3::new(5.0, 0.5_f32.sin(), 0.0));
        assert!(world.abs_diff_eq(expected, 1e-6));
    }

    #[test]
    fn bob_and_orbit_stay_relative_to_origin() {
        let origin = Mat4::from_translation(Vec3::new(3.0, 0.0, 0.0));
        let mut world = origin;
        let mut bob = Motion::bob(0.0);
        bob.update(origin, &mut world, 0.0);
        assert!(world.transform_point3(Vec3::ZERO).abs_diff_eq(Vec3::new(3.0, 0.0, 0.0), 1e-6));

        let mut orbit = Motion::orbit(Vec3::ONE, Vec3::new(-4.0, 0.0, 0.0), 0.0, 1.0);
        for _ in 0..5 {
            orbit.update(origin, &mut world, 0.3);
            let p = world.transform_point3(Vec3::ZERO);
            assert!((p.distance(Vec3::new(3.0, 0.0, 0.0)) - 4.0).abs() < 1e-4);
        }
    }

    #[test]
    fn names() {
        assert_eq!(Motion::default().name(), "static");
        assert_eq!(Motion::bob(1.0).name(), "bob");
    }
}
