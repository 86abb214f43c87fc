use crate::action::{Direction, Key, KeyBindings};
use glam::{Vec2, Vec3};

/// Which movement keys are currently held.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DirectionsInput {
    pub front: bool,
    pub back: bool,
    pub left: bool,
    pub right: bool,
    pub up: bool,
    pub down: bool,
}

impl DirectionsInput {
    /// Movement axes: x = right/left, y = front/back, z = up/down.
    ///
    /// Each component is -1, 0 or 1. When both keys of an axis are held,
    /// right, front and up take precedence.
    pub fn axes(&self) -> Vec3 {
        Vec3::new(
            axis(self.right, self.left),
            axis(self.front, self.back),
            axis(self.up, self.down),
        )
    }

    pub fn is_idle(&self) -> bool {
        self.axes() == Vec3::ZERO
    }

    fn set(&mut self, direction: Direction, held: bool) {
        match direction {
            Direction::Front => self.front = held,
            Direction::Back => self.back = held,
            Direction::Left => self.left = held,
            Direction::Right => self.right = held,
            Direction::Up => self.up = held,
            Direction::Down => self.down = held,
        }
    }
}

fn axis(positive: bool, negative: bool) -> f32 {
    if positive {
        1.0
    } else if negative {
        -1.0
    } else {
        0.0
    }
}

/// Relative mouse movement since the last frame, in raw device counts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MouseRelativeMovement {
    pub x: i32,
    pub y: i32,
}

impl MouseRelativeMovement {
    pub fn as_vec2(&self) -> Vec2 {
        Vec2::new(self.x as f32, self.y as f32)
    }

    pub fn is_zero(&self) -> bool {
        self.x == 0 && self.y == 0
    }
}

/// Input collected between two frames.
#[derive(Debug, Clone, Default)]
pub struct InputState {
    bindings: KeyBindings,
    directions: DirectionsInput,
    mouse: MouseRelativeMovement,
}

impl InputState {
    pub fn new(bindings: KeyBindings) -> Self {
        Self {
            bindings,
            directions: DirectionsInput::default(),
            mouse: MouseRelativeMovement::default(),
        }
    }

    pub fn key_down(&mut self, key: Key) {
        if let Some(direction) = self.bindings.direction(key) {
            self.directions.set(direction, true);
        }
    }

    pub fn key_up(&mut self, key: Key) {
        if let Some(direction) = self.bindings.direction(key) {
            self.directions.set(direction, false);
        }
    }

    /// Record a raw mouse delta. Several events in one frame add up.
    pub fn mouse_moved(&mut self, dx: i32, dy: i32) {
        self.mouse.x = self.mouse.x.saturating_add(dx);
        self.mouse.y = self.mouse.y.saturating_add(dy);
    }

    pub fn reset_mouse_movement(&mut self) {
        self.mouse = MouseRelativeMovement::default();
    }

    /// Release every held key, e.g. when the window loses focus.
    pub fn release_all(&mut self) {
        if !self.directions.is_idle() {
            tracing::debug!("releasing held direction keys");
        }
        self.directions = DirectionsInput::default();
    }

    pub fn directions(&self) -> &DirectionsInput {
        &self.directions
    }

    pub fn mouse_relative_movement(&self) -> &MouseRelativeMovement {
        &self.mouse
    }

    pub fn bindings(&self) -> &KeyBindings {
        &self.bindings
    }
}
