//! Pointer and keyboard events delivered by the host.

use kurbo::Point;
use serde::{Deserialize, Serialize};

/// Mouse button identifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum MouseButton {
    #[default]
    Left,
    Right,
    Middle,
}

/// Pointer event in host coordinates (the renderer maps them to the page).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum PointerEvent {
    Down { position: Point, button: MouseButton },
    Move { position: Point },
    Up { position: Point, button: MouseButton },
}

impl PointerEvent {
    pub fn down(x: f64, y: f64) -> Self {
        PointerEvent::Down {
            position: Point::new(x, y),
            button: MouseButton::Left,
        }
    }

    pub fn moved(x: f64, y: f64) -> Self {
        PointerEvent::Move {
            position: Point::new(x, y),
        }
    }

    pub fn up(x: f64, y: f64) -> Self {
        PointerEvent::Up {
            position: Point::new(x, y),
            button: MouseButton::Left,
        }
    }

    pub fn position(&self) -> Point {
        match self {
            PointerEvent::Down { position, .. }
            | PointerEvent::Move { position }
            | PointerEvent::Up { position, .. } => *position,
        }
    }

    /// Only the primary button draws and places.
    pub fn is_primary(&self) -> bool {
        match self {
            PointerEvent::Down { button, .. } | PointerEvent::Up { button, .. } => {
                *button == MouseButton::Left
            }
            PointerEvent::Move { .. } => true,
        }
    }
}

/// Keys the editor reacts to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Key {
    Delete,
    Backspace,
    Escape,
    Other(String),
}

impl Key {
    /// Map a DOM-style key name.
    pub fn from_name(name: &str) -> Self {
        match name {
            "Delete" => Key::Delete,
            "Backspace" => Key::Backspace,
            "Escape" => Key::Escape,
            other => Key::Other(other.to_string()),
        }
    }

    pub fn is_delete(&self) -> bool {
        matches!(self, Key::Delete | Key::Backspace)
    }
}

/// A key press and where keyboard focus was when it happened.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyEvent {
    pub key: Key,
    /// Focus was in a form field outside the page (e.g. a toolbar input).
    #[serde(default)]
    pub in_text_field: bool,
}

impl KeyEvent {
    pub fn pressed(key: Key) -> Self {
        Self {
            key,
            in_text_field: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_names() {
        assert_eq!(Key::from_name("Delete"), Key::Delete);
        assert!(Key::from_name("Backspace").is_delete());
        assert_eq!(Key::from_name("a"), Key::Other("a".to_string()));
        assert!(!Key::Escape.is_delete());
    }

    #[test]
    fn test_pointer_helpers() {
        let down = PointerEvent::down(1.0, 2.0);
        assert_eq!(down.position(), Point::new(1.0, 2.0));
        assert!(down.is_primary());
        let right = PointerEvent::Up {
            position: Point::ZERO,
            button: MouseButton::Right,
        };
        assert!(!right.is_primary());
    }
}
