use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Physical keys the sample cares about.
///
/// The window layer maps its own key codes onto this; everything else is `Other`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Key {
    W,
    A,
    S,
    D,
    Space,
    Shift,
    Other,
}

/// A movement direction relative to the camera.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    Front,
    Back,
    Left,
    Right,
    Up,
    Down,
}

/// Key-to-direction table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeyBindings {
    bindings: BTreeMap<Key, Direction>,
}

impl Default for KeyBindings {
    fn default() -> Self {
        let mut bindings = BTreeMap::new();
        bindings.insert(Key::W, Direction::Front);
        bindings.insert(Key::S, Direction::Back);
        bindings.insert(Key::A, Direction::Left);
        bindings.insert(Key::D, Direction::Right);
        bindings.insert(Key::Space, Direction::Up);
        bindings.insert(Key::Shift, Direction::Down);
        Self { bindings }
    }
}

impl KeyBindings {
    /// A table with nothing bound.
    pub fn empty() -> Self {
        Self {
            bindings: BTreeMap::new(),
        }
    }

    /// Bind `key` to `direction`, replacing any previous binding of that key.
    pub fn bind(&mut self, key: Key, direction: Direction) {
        self.bindings.insert(key, direction);
    }

    pub fn unbind(&mut self, key: Key) -> Option<Direction> {
        self.bindings.remove(&key)
    }

    pub fn direction(&self, key: Key) -> Option<Direction> {
        self.bindings.get(&key).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_bindings_cover_wasd() {
        let b = KeyBindings::default();
        assert_eq!(b.direction(Key::W), Some(Direction::Front));
        assert_eq!(b.direction(Key::S), Some(Direction::Back));
        assert_eq!(b.direction(Key::A), Some(Direction::Left));
        assert_eq!(b.direction(Key::D), Some(Direction::Right));
        assert_eq!(b.direction(Key::Space), Some(Direction::Up));
        assert_eq!(b.direction(Key::Shift), Some(Direction::Down));
        assert_eq!(b.direction(Key::Other), None);
    }

    #[test]
    fn rebind_replaces() {
        let mut b = KeyBindings::empty();
        b.bind(Key::W, Direction::Up);
        b.bind(Key::W, Direction::Back);
        assert_eq!(b.direction(Key::W), Some(Direction::Back));
        assert_eq!(b.unbind(Key::W), Some(Direction::Back));
        assert_eq!(b.direction(Key::W), None);
    }
}
