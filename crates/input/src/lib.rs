//! Desktop input mapped to camera directions.
//!
//! The window layer translates platform key codes into [`Key`] and raw mouse
//! deltas into [`InputState::mouse_moved`]. The camera only ever sees
//! [`DirectionsInput`] and [`MouseRelativeMovement`].
//!
//! # Invariants
//! - Opposite direction flags cancel each other.
//! - Mouse movement is consumed once per frame and then reset.

pub mod action;
pub mod state;

pub use action::{Direction, Key, KeyBindings};
pub use state::{DirectionsInput, InputState, MouseRelativeMovement};
