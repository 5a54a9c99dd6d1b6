use std::fmt;

use serde::{Deserialize, Serialize};

/// Represents the action state of a physical key event.
///
/// Sources disagree on spelling: the raw-input listener sends
/// `"down"`/`"up"`, networked broadcasters send `"press"`/`"release"`.
/// Both normalize to this enum at the wire boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    Press,
    Release,
}

impl Action {
    /// Returns true if this is a PRESS event
    pub fn is_pressed(self) -> bool {
        matches!(self, Action::Press)
    }

    /// Returns true if this is a RELEASE event
    pub fn is_released(self) -> bool {
        matches!(self, Action::Release)
    }

    /// Parse an action string as it appears on the wire.
    ///
    /// Unsupported actions (e.g. `"repeat"`, `"move"`) return `None` so the
    /// caller can drop the record.
    pub fn from_wire(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "press" | "pressed" | "down" | "keydown" | "key_down" => Some(Action::Press),
            "release" | "released" | "up" | "keyup" | "key_up" => Some(Action::Release),
            _ => None,
        }
    }

    /// Create Action from an evdev value (0 = release, 1 = press).
    ///
    /// Auto-repeat (2) has no counterpart here and yields `None`.
    pub fn from_evdev_value(value: i32) -> Option<Self> {
        match value {
            0 => Some(Action::Release),
            1 => Some(Action::Press),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Action::Press => "press",
            Action::Release => "release",
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
