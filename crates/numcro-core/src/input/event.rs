// Numcro Input Layer - Canonical Input Event
// One record per hardware key occurrence, whatever the source

use std::fmt;
use std::net::SocketAddr;
use std::time::Instant;

use crate::input::DeviceIdentity;
use crate::key::normalize_key_name;
use crate::Action;

/// Where an event entered the engine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventSource {
    /// Local OS-level keyboard hook
    Local,
    /// A networked raw-input broadcaster
    Network(SocketAddr),
}

/// Canonical, immutable input event.
///
/// `device == None` is the Unknown identity: it never matches a button while
/// device filtering is enabled.
#[derive(Debug, Clone, PartialEq)]
pub struct InputEvent {
    pub key: String,
    pub action: Action,
    pub device: Option<DeviceIdentity>,
    pub timestamp: Instant,
    pub source: EventSource,
}

impl InputEvent {
    /// Create an event stamped now, normalizing the key name
    pub fn new(key: &str, action: Action, device: Option<DeviceIdentity>, source: EventSource) -> Self {
        Self::at(key, action, device, source, Instant::now())
    }

    /// Create an event with an explicit timestamp
    pub fn at(
        key: &str,
        action: Action,
        device: Option<DeviceIdentity>,
        source: EventSource,
        timestamp: Instant,
    ) -> Self {
        Self {
            key: normalize_key_name(key),
            action,
            device: device.filter(|d| !d.is_empty()),
            timestamp,
            source,
        }
    }

    /// Shorthand for a local press with no device information
    pub fn press(key: &str) -> Self {
        Self::new(key, Action::Press, None, EventSource::Local)
    }

    /// Shorthand for a local release with no device information
    pub fn release(key: &str) -> Self {
        Self::new(key, Action::Release, None, EventSource::Local)
    }

    pub fn with_device(mut self, device: DeviceIdentity) -> Self {
        self.device = Some(device).filter(|d| !d.is_empty());
        self
    }

    pub fn with_timestamp(mut self, timestamp: Instant) -> Self {
        self.timestamp = timestamp;
        self
    }

    /// Path of the source device, if known
    pub fn device_path(&self) -> Option<&str> {
        self.device
            .as_ref()
            .map(|d| d.serial_or_path.as_str())
            .filter(|p| !p.is_empty())
    }
}

impl fmt::Display for InputEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.device {
            Some(device) => write!(f, "{} {} from {}", self.key, self.action, device),
            None => write!(f, "{} {}", self.key, self.action),
        }
    }
}

/// Check if an event is a press of the configured abort key.
pub fn is_abort_key(event: &InputEvent, abort_key: &str) -> bool {
    event.action.is_pressed() && event.key == normalize_key_name(abort_key)
}
