// Numcro uinput Output Layer
// Virtual keyboard device that turns key names into kernel key events

use evdev::uinput::{VirtualDevice, VirtualDeviceBuilder};
use evdev::{AttributeSet, EventType, InputEvent};
use parking_lot::Mutex;

use super::sink::KeySink;
use super::state::PressedKeyState;
use super::OutputError;
use crate::key::code_for_name;
use crate::Action;

/// Name prefix of the virtual device; the local hook skips devices carrying it
pub const VIRTUAL_DEVICE_PREFIX: &str = "Numcro (virtual)";

struct Inner {
    device: VirtualDevice,
    pressed: PressedKeyState,
}

/// Virtual uinput keyboard used as the engine's key sink
pub struct VirtualKeyboard {
    inner: Mutex<Inner>,
}

impl VirtualKeyboard {
    /// Create a new virtual uinput keyboard
    pub fn new() -> Result<Self, OutputError> {
        let mut keys = AttributeSet::new();
        for code in 0..256u16 {
            keys.insert(evdev::Key::new(code));
        }

        let device = VirtualDeviceBuilder::new()
            .map_err(|e: std::io::Error| OutputError::DeviceCreation(e.to_string()))?
            .name(&format!("{} Keyboard", VIRTUAL_DEVICE_PREFIX))
            .with_keys(&keys)
            .map_err(|e: std::io::Error| OutputError::DeviceCreation(e.to_string()))?
            .build()
            .map_err(|e: std::io::Error| OutputError::DeviceCreation(e.to_string()))?;

        Ok(Self {
            inner: Mutex::new(Inner {
                device,
                pressed: PressedKeyState::new(),
            }),
        })
    }

    fn write_key_event(&self, key: &str, action: Action) -> Result<(), OutputError> {
        let code = code_for_name(key).ok_or_else(|| OutputError::UnknownKey(key.to_string()))?;
        let value = match action {
            Action::Press => 1,
            Action::Release => 0,
        };

        let key_event = InputEvent::new(EventType::KEY, code, value);
        // SYN event is required for the kernel to process the key event
        let syn_event = InputEvent::new(EventType::SYNCHRONIZATION, 0, 0);

        let mut inner = self.inner.lock();
        inner
            .device
            .emit(&[key_event, syn_event])
            .map_err(|e: std::io::Error| OutputError::Write(e.to_string()))?;

        match action {
            Action::Press => inner.pressed.add(key),
            Action::Release => inner.pressed.remove(key),
        }
        Ok(())
    }
}

impl KeySink for VirtualKeyboard {
    fn press(&self, key: &str) -> Result<(), OutputError> {
        self.write_key_event(key, Action::Press)
    }

    fn release(&self, key: &str) -> Result<(), OutputError> {
        self.write_key_event(key, Action::Release)
    }
}

impl Drop for VirtualKeyboard {
    fn drop(&mut self) {
        // Never leave keys stuck down in the session
        let held = self.inner.get_mut().pressed.drain();
        for key in held {
            if let Err(e) = self.write_key_event(&key, Action::Release) {
                log::warn!("Failed to release {} on shutdown: {}", key, e);
            }
        }
    }
}
