// Numcro Input Layer
// Canonical events, device identity and device filtering

mod device;
mod event;
mod filter;

pub use device::DeviceIdentity;
pub use event::{is_abort_key, EventSource, InputEvent};
pub use filter::{device_matches, matches_hook_filter};
