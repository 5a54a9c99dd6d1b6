// Numcro Local Hook
// Direct evdev keyboard capture feeding the event queue

use crate::input::{DeviceIdentity, EventSource, InputEvent};
use crate::key::name_for_code;
use crate::Action;

#[cfg(feature = "local-hook")]
use std::os::unix::io::AsRawFd;
#[cfg(feature = "local-hook")]
use std::thread::{self, JoinHandle};

#[cfg(feature = "local-hook")]
use evdev::{Device, EventType, Key};

#[cfg(feature = "local-hook")]
use super::{TransportError, TransportResult};
#[cfg(feature = "local-hook")]
use crate::cancel::CancelToken;
#[cfg(feature = "local-hook")]
use crate::event::EventSender;
#[cfg(feature = "local-hook")]
use crate::input::matches_hook_filter;
#[cfg(feature = "local-hook")]
use crate::output::VIRTUAL_DEVICE_PREFIX;

/// Poll timeout; bounds how long the hook thread ignores cancellation
pub const POLL_TIMEOUT_MS: i32 = 100;

/// Keyboard device information for `--list-devices`
#[derive(Debug, Clone)]
pub struct HookDeviceInfo {
    pub index: usize,
    pub name: String,
    pub path: Option<String>,
    pub identity: DeviceIdentity,
}

/// Convert a kernel key event into an input event.
///
/// Auto-repeat (value 2) and unknown values yield `None`. Codes without a
/// canonical name become `key <code>`.
pub fn key_event(code: u16, value: i32, device: &DeviceIdentity) -> Option<InputEvent> {
    let action = Action::from_evdev_value(value)?;
    let key = match name_for_code(code) {
        Some(name) => name.to_string(),
        None => format!("key {}", code),
    };
    Some(InputEvent::new(&key, action, Some(device.clone()), EventSource::Local))
}

/// Grabbed (or shared) keyboard devices polled with libc::poll
#[cfg(feature = "local-hook")]
pub struct LocalHook {
    devices: Vec<(Device, DeviceIdentity)>,
    poll_fds: Vec<libc::pollfd>,
    grabbed: bool,
}

#[cfg(feature = "local-hook")]
impl LocalHook {
    /// Open keyboards matching `filter_names` (all real keyboards if empty)
    pub fn open(filter_names: &[String], grab: bool) -> TransportResult<Self> {
        let mut devices = Self::find_keyboards(filter_names)?;

        if grab {
            // A crashed previous instance may still hold a grab
            for (device, _) in &mut devices {
                let _ = device.ungrab();
            }
            for (device, identity) in &mut devices {
                device.grab().map_err(|e| {
                    TransportError::Hook(format!("Failed to grab {}: {}", identity, e))
                })?;
            }
        }

        let poll_fds = devices
            .iter()
            .map(|(d, _)| libc::pollfd {
                fd: d.as_raw_fd(),
                events: libc::POLLIN,
                revents: 0,
            })
            .collect();

        Ok(Self {
            devices,
            poll_fds,
            grabbed: grab,
        })
    }

    /// List all available keyboard devices
    pub fn list_devices() -> TransportResult<Vec<HookDeviceInfo>> {
        let mut infos = Vec::new();
        for (path, device) in evdev::enumerate() {
            if Self::is_keyboard_device(&device) {
                let path = path.to_str().map(str::to_string);
                infos.push(HookDeviceInfo {
                    index: infos.len(),
                    name: device.name().unwrap_or("Unknown").to_string(),
                    identity: Self::identity(&device, path.as_deref().unwrap_or_default()),
                    path,
                });
            }
        }

        if infos.is_empty() {
            return Err(TransportError::Hook("No keyboard devices found".to_string()));
        }
        Ok(infos)
    }

    fn find_keyboards(filter_names: &[String]) -> TransportResult<Vec<(Device, DeviceIdentity)>> {
        let mut keyboards = Vec::new();

        for (path, device) in evdev::enumerate() {
            let device_name = device.name().unwrap_or("Unknown").to_string();
            let device_path = path.to_str().unwrap_or_default().to_string();
            let is_keyboard = Self::is_keyboard_device(&device);
            let is_virtual = device_name.starts_with(VIRTUAL_DEVICE_PREFIX);

            if matches_hook_filter(&device_name, &device_path, filter_names, is_keyboard, is_virtual) {
                log::info!("Hooking {} ({})", device_name, device_path);
                let identity = Self::identity(&device, &device_path);
                keyboards.push((device, identity));
            }
        }

        if keyboards.is_empty() {
            return Err(TransportError::Hook("No keyboard devices found".to_string()));
        }
        Ok(keyboards)
    }

    fn identity(device: &Device, device_path: &str) -> DeviceIdentity {
        let id = device.input_id();
        let serial_or_path = device
            .physical_path()
            .filter(|p| !p.is_empty())
            .unwrap_or(device_path);
        DeviceIdentity::new(serial_or_path, device.name().unwrap_or("Unknown"))
            .with_vendor_id(id.vendor())
            .with_product_id(id.product())
    }

    /// Check if a device is a keyboard
    fn is_keyboard_device(device: &Device) -> bool {
        if !device.supported_events().contains(EventType::KEY) {
            return false;
        }
        if device.name().unwrap_or("").starts_with(VIRTUAL_DEVICE_PREFIX) {
            return false;
        }
        let keys = match device.supported_keys() {
            Some(k) => k,
            None => return false,
        };

        // Keypads have digits and Enter but no letter rows
        const NUMPAD_CODES: &[u16] = &[71, 72, 73, 75, 76, 77, 79, 80, 81, 82];
        const A_Z_SPACE_CODES: &[u16] = &[57, 30, 44];

        let numpad = NUMPAD_CODES.iter().all(|code| keys.contains(Key::new(*code)));
        let letters = A_Z_SPACE_CODES.iter().all(|code| keys.contains(Key::new(*code)));
        numpad || letters
    }

    /// Wait up to `timeout_ms` and return key events from every ready device
    pub fn poll(&mut self, timeout_ms: i32) -> TransportResult<Vec<InputEvent>> {
        let mut events = Vec::new();

        let poll_result = unsafe {
            libc::poll(
                self.poll_fds.as_mut_ptr(),
                self.poll_fds.len() as libc::nfds_t,
                timeout_ms,
            )
        };

        if poll_result < 0 {
            let err = std::io::Error::last_os_error();
            if err.kind() == std::io::ErrorKind::Interrupted {
                return Ok(events);
            }
            return Err(TransportError::Io(err));
        }
        if poll_result == 0 {
            return Ok(events);
        }

        for (i, (device, identity)) in self.devices.iter_mut().enumerate() {
            if self.poll_fds[i].revents & libc::POLLIN == 0 {
                continue;
            }
            match device.fetch_events() {
                Ok(fetched) => {
                    for raw in fetched {
                        if raw.event_type() != EventType::KEY {
                            continue;
                        }
                        if let Some(event) = key_event(raw.code(), raw.value(), identity) {
                            events.push(event);
                        }
                    }
                }
                Err(e) => log::warn!("Read from {} failed: {}", identity, e),
            }
        }

        Ok(events)
    }

    pub fn device_count(&self) -> usize {
        self.devices.len()
    }

    /// Ungrab all devices (called on shutdown)
    pub fn ungrab_all(&mut self) {
        if self.grabbed {
            for (device, _) in &mut self.devices {
                let _ = device.ungrab();
            }
            self.grabbed = false;
        }
    }

    /// Move the hook onto its own thread, pushing events until cancelled
    pub fn spawn(mut self, sender: EventSender, parent: &CancelToken) -> TransportResult<HookSource> {
        let token = parent.child();
        let loop_token = token.clone();

        let handle = thread::Builder::new()
            .name("local-hook".to_string())
            .spawn(move || {
                while !loop_token.is_cancelled() {
                    let events = match self.poll(POLL_TIMEOUT_MS) {
                        Ok(events) => events,
                        Err(e) => {
                            log::error!("Local hook failed: {}", e);
                            break;
                        }
                    };
                    for event in events {
                        if sender.push_input(event).is_err() {
                            return;
                        }
                    }
                }
                log::debug!("Local hook stopped");
            })?;

        Ok(HookSource {
            token,
            handle: Some(handle),
        })
    }
}

/// Ungrab on every exit path, including panics, or the keyboard stays dead
#[cfg(feature = "local-hook")]
impl Drop for LocalHook {
    fn drop(&mut self) {
        self.ungrab_all();
    }
}

/// Handle to a running hook thread
#[cfg(feature = "local-hook")]
pub struct HookSource {
    token: CancelToken,
    handle: Option<JoinHandle<()>>,
}

#[cfg(feature = "local-hook")]
impl HookSource {
    pub fn stop(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        self.token.cancel();
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                log::error!("Local hook thread panicked");
            }
        }
    }
}

#[cfg(feature = "local-hook")]
impl Drop for HookSource {
    fn drop(&mut self) {
        self.shutdown();
    }
}
