use ggp_input::{DirectionsInput, MouseRelativeMovement};
use glam::{EulerRot, Mat4, Vec3};
use std::f32::consts::FRAC_PI_2;

/// Forward axis of an unrotated camera. The camera space is left-handed.
pub const DEFAULT_FORWARD: Vec3 = Vec3::Z;
pub const DEFAULT_RIGHT: Vec3 = Vec3::X;
pub const DEFAULT_UP: Vec3 = Vec3::Y;

/// First-person camera.
///
/// Input is accumulated by [`Camera::handle_input`] and applied once per frame
/// by [`Camera::update`], which also rebuilds the view matrix. Movement
/// follows the yaw-only basis, so looking up or down never changes height.
#[derive(Debug, Clone, PartialEq)]
pub struct Camera {
    yaw: f32,
    pitch: f32,
    move_left_right: f32,
    move_back_forward: f32,
    move_up_down: f32,
    travel_speed: f32,
    rotation_speed: f32,
    camera_forward: Vec3,
    camera_right: Vec3,
    camera_up: Vec3,
    eye: Vec3,
    at: Vec3,
    up: Vec3,
    rotation: Mat4,
    view: Mat4,
}

impl Camera {
    pub fn new(position: Vec3) -> Self {
        let mut camera = Self {
            yaw: 0.0,
            pitch: 0.0,
            move_left_right: 0.0,
            move_back_forward: 0.0,
            move_up_down: 0.0,
            travel_speed: 10.0,
            rotation_speed: 10.0,
            camera_forward: DEFAULT_FORWARD,
            camera_right: DEFAULT_RIGHT,
            camera_up: DEFAULT_UP,
            eye: position,
            at: position + DEFAULT_FORWARD,
            up: DEFAULT_UP,
            rotation: Mat4::IDENTITY,
            view: Mat4::IDENTITY,
        };
        camera.view = Mat4::look_at_lh(camera.eye, camera.at, camera.up);
        camera
    }

    pub fn eye(&self) -> Vec3 {
        self.eye
    }

    pub fn at(&self) -> Vec3 {
        self.at
    }

    pub fn up(&self) -> Vec3 {
        self.up
    }

    pub fn view(&self) -> Mat4 {
        self.view
    }

    pub fn rotation(&self) -> Mat4 {
        self.rotation
    }

    pub fn yaw(&self) -> f32 {
        self.yaw
    }

    pub fn pitch(&self) -> f32 {
        self.pitch
    }

    /// Horizontal forward direction (yaw only).
    pub fn forward(&self) -> Vec3 {
        self.camera_forward
    }

    pub fn right(&self) -> Vec3 {
        self.camera_right
    }

    pub fn travel_speed(&self) -> f32 {
        self.travel_speed
    }

    pub fn rotation_speed(&self) -> f32 {
        self.rotation_speed
    }

    pub fn set_travel_speed(&mut self, speed: f32) {
        self.travel_speed = speed;
    }

    pub fn set_rotation_speed(&mut self, speed: f32) {
        self.rotation_speed = speed;
    }

    /// Movement still waiting to be applied by the next [`Camera::update`].
    pub fn pending_movement(&self) -> Vec3 {
        Vec3::new(
            self.move_left_right,
            self.move_back_forward,
            self.move_up_down,
        )
    }

    /// Accumulate one frame of keyboard and mouse input.
    ///
    /// The direction and the mouse delta are normalized first, so speed does
    /// not depend on how many keys are held or how far the mouse moved.
    pub fn handle_input(
        &mut self,
        directions: &DirectionsInput,
        mouse: &MouseRelativeMovement,
        delta_time: f32,
    ) {
        let dir = directions.axes();
        if dir != Vec3::ZERO {
            let step = dir.normalize() * self.travel_speed * delta_time;
            self.move_left_right += step.x;
            self.move_back_forward += step.y;
            self.move_up_down += step.z;
        }

        let rot = mouse.as_vec2();
        if rot != glam::Vec2::ZERO {
            let step = rot.normalize() * self.rotation_speed * delta_time;
            self.yaw += step.x;
            self.pitch = (self.pitch + step.y).clamp(-FRAC_PI_2, FRAC_PI_2);
        }
    }

    /// Apply accumulated movement and rebuild the view matrix.
    pub fn update(&mut self, _delta_time: f32) {
        self.rotation = Mat4::from_euler(EulerRot::YXZ, self.yaw, self.pitch, 0.0);
        let look = self.rotation.transform_vector3(DEFAULT_FORWARD);

        let yaw_only = Mat4::from_rotation_y(self.yaw);
        self.camera_right = yaw_only.transform_vector3(DEFAULT_RIGHT);
        self.camera_up = yaw_only.transform_vector3(DEFAULT_UP);
        self.camera_forward = yaw_only.transform_vector3(DEFAULT_FORWARD);

        self.eye += self.move_left_right * self.camera_right;
        self.eye += self.move_back_forward * self.camera_forward;
        self.eye += self.move_up_down * self.camera_up;

        self.move_left_right = 0.0;
        self.move_back_forward = 0.0;
        self.move_up_down = 0.0;

        // Rotated up stays perpendicular to `look`, even at ±90° pitch.
        self.up = self.rotation.transform_vector3(DEFAULT_UP);
        self.at = self.eye + look;
        self.view = Mat4::look_at_lh(self.eye, self.at, self.up);
    }
}

impl Default for Camera {
    fn default() -> Self {
        Self::new(Vec3::new(0.0, 3.0, -6.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f32::consts::FRAC_PI_4;

    fn held(f: impl FnOnce(&mut DirectionsInput)) -> DirectionsInput {
        let mut d = DirectionsInput::default();
        f(&mut d);
        d
    }

    const NO_MOUSE: MouseRelativeMovement = MouseRelativeMovement { x: 0, y: 0 };

    #[test]
    fn default_camera_looks_down_z() {
        let mut cam = Camera::default();
        cam.update(0.0);
        assert_eq!(cam.eye(), Vec3::new(0.0, 3.0, -6.0));
        assert!((cam.at() - cam.eye()).abs_diff_eq(DEFAULT_FORWARD, 1e-6));
        // The eye maps to the view-space origin, +Z is in front.
        let origin = cam.view().transform_point3(cam.eye());
        assert!(origin.abs_diff_eq(Vec3::ZERO, 1e-5));
        let ahead = cam.view().transform_point3(cam.eye() + Vec3::Z);
        assert!(ahead.z > 0.0);
    }

    #[test]
    fn forward_moves_by_speed_times_dt() {
        let mut cam = Camera::new(Vec3::ZERO);
        cam.handle_input(&held(|d| d.front = true), &NO_MOUSE, 0.5);
        assert_eq!(cam.pending_movement(), Vec3::new(0.0, 5.0, 0.0));
        cam.update(0.5);
        assert!(cam.eye().abs_diff_eq(Vec3::new(0.0, 0.0, 5.0), 1e-5));
        assert_eq!(cam.pending_movement(), Vec3::ZERO);
    }

    #[test]
    fn diagonal_is_normalized() {
        let mut cam = Camera::new(Vec3::ZERO);
        cam.handle_input(
            &held(|d| {
                d.front = true;
                d.right = true;
            }),
            &NO_MOUSE,
            1.0,
        );
        assert!((cam.pending_movement().length() - 10.0).abs() < 1e-4);
    }

    #[test]
    fn accumulators_reset_after_update() {
        let mut cam = Camera::new(Vec3::ZERO);
        cam.handle_input(&held(|d| d.up = true), &NO_MOUSE, 0.1);
        cam.handle_input(&held(|d| d.up = true), &NO_MOUSE, 0.1);
        cam.update(0.1);
        assert!(cam.eye().abs_diff_eq(Vec3::new(0.0, 2.0, 0.0), 1e-5));
        cam.update(0.1);
        assert!(cam.eye().abs_diff_eq(Vec3::new(0.0, 2.0, 0.0), 1e-5));
    }

    #[test]
    fn right_and_front_win_over_their_opposites() {
        let mut cam = Camera::new(Vec3::ZERO);
        cam.handle_input(
            &held(|d| {
                d.left = true;
                d.right = true;
                d.front = true;
                d.back = true;
            }),
            &NO_MOUSE,
            1.0,
        );
        let step = 10.0 * std::f32::consts::FRAC_1_SQRT_2;
        assert!(cam.pending_movement().abs_diff_eq(Vec3::new(step, step, 0.0), 1e-4));
    }

    #[test]
    fn mouse_turns_by_rotation_speed() {
        let mut cam = Camera::new(Vec3::ZERO);
        cam.set_rotation_speed(1.0);
        cam.handle_input(
            &DirectionsInput::default(),
            &MouseRelativeMovement { x: 40, y: 0 },
            FRAC_PI_4,
        );
        assert!((cam.yaw() - FRAC_PI_4).abs() < 1e-6);
        assert_eq!(cam.pitch(), 0.0);
    }

    #[test]
    fn pitch_is_clamped() {
        let mut cam = Camera::new(Vec3::ZERO);
        for _ in 0..100 {
            cam.handle_input(
                &DirectionsInput::default(),
                &MouseRelativeMovement { x: 0, y: 5 },
                0.1,
            );
        }
        assert_eq!(cam.pitch(), FRAC_PI_2);
        for _ in 0..200 {
            cam.handle_input(
                &DirectionsInput::default(),
                &MouseRelativeMovement { x: 0, y: -5 },
                0.1,
            );
        }
        assert_eq!(cam.pitch(), -FRAC_PI_2);
        cam.update(0.1);
        assert!(!cam.view().is_nan());
    }

    #[test]
    fn yaw_turns_movement_basis() {
        let mut cam = Camera::new(Vec3::ZERO);
        cam.set_rotation_speed(1.0);
        cam.handle_input(
            &DirectionsInput::default(),
            &MouseRelativeMovement { x: 1, y: 0 },
            FRAC_PI_2,
        );
        cam.update(0.0);
        assert!(cam.forward().abs_diff_eq(Vec3::X, 1e-5));
        assert!(cam.right().abs_diff_eq(Vec3::NEG_Z, 1e-5));

        cam.handle_input(&held(|d| d.front = true), &NO_MOUSE, 0.1);
        cam.update(0.1);
        assert!(cam.eye().abs_diff_eq(Vec3::new(1.0, 0.0, 0.0), 1e-5));
    }

    #[test]
    fn looking_down_keeps_travel_horizontal() {
        let mut cam = Camera::new(Vec3::ZERO);
        cam.set_rotation_speed(1.0);
        cam.handle_input(
            &DirectionsInput::default(),
            &MouseRelativeMovement { x: 0, y: 1 },
            FRAC_PI_4,
        );
        cam.handle_input(&held(|d| d.front = true), &NO_MOUSE, 0.1);
        cam.update(0.1);
        assert_eq!(cam.eye().y, 0.0);
        // Positive pitch looks down.
        assert!(cam.at().y < 0.0);
    }
}
