// Numcro Press State
// Up/Down tracking per physical key

use std::collections::HashMap;
use std::fmt;

use crate::input::InputEvent;
use crate::mapping::ButtonId;
use crate::resolver::Matches;

/// Identifies one physical key for press tracking.
///
/// With device filtering on, the same key name on two devices is two keys.
/// With it off, only the name counts.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PressKey {
    pub key: String,
    pub device: Option<String>,
}

impl PressKey {
    pub fn new(key: impl Into<String>, device: Option<String>) -> Self {
        Self {
            key: key.into(),
            device,
        }
    }

    /// With filtering on, the device part is the path, or `vvvv:pppp` for
    /// devices that only report vendor and product ids
    pub fn for_event(event: &InputEvent, device_filtering: bool) -> Self {
        let device = if device_filtering {
            event.device_path().map(str::to_string).or_else(|| {
                let device = event.device.as_ref()?;
                match (device.vendor_id, device.product_id) {
                    (Some(v), Some(p)) => Some(format!("{:04x}:{:04x}", v, p)),
                    _ => None,
                }
            })
        } else {
            None
        };
        Self::new(event.key.clone(), device)
    }
}

impl fmt::Display for PressKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.device {
            Some(device) => write!(f, "{}@{}", self.key, device),
            None => f.write_str(&self.key),
        }
    }
}

/// Keys currently held down, with the buttons they matched when pressed
#[derive(Debug, Default)]
pub struct PressTracker {
    down: HashMap<PressKey, Matches>,
}

impl PressTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a press. Returns false if the key was already down.
    pub fn press(&mut self, key: PressKey, matches: Matches) -> bool {
        if self.down.contains_key(&key) {
            return false;
        }
        self.down.insert(key, matches);
        true
    }

    /// Record a release. Returns the press-time matches if the key was down.
    pub fn release(&mut self, key: &PressKey) -> Option<Matches> {
        self.down.remove(key)
    }

    pub fn is_down(&self, key: &PressKey) -> bool {
        self.down.contains_key(key)
    }

    /// Buttons a held key matched when it went down
    pub fn held_matches(&self, key: &PressKey) -> Option<&Matches> {
        self.down.get(key)
    }

    /// Drop a button from every held key, e.g. after it was removed
    pub fn forget_button(&mut self, id: ButtonId) {
        for matches in self.down.values_mut() {
            matches.retain(|m| *m != id);
        }
    }

    pub fn len(&self) -> usize {
        self.down.len()
    }

    pub fn is_empty(&self) -> bool {
        self.down.is_empty()
    }

    pub fn clear(&mut self) {
        self.down.clear();
    }
}
