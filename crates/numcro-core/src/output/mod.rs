// Numcro Output Layer
// Key sinks and pressed-key bookkeeping

mod sink;
mod state;

#[cfg(feature = "local-hook")]
mod uinput;

pub use sink::{EmittedKey, KeySink, LogSink, RecordingSink};
pub use state::PressedKeyState;

#[cfg(feature = "local-hook")]
pub use uinput::{VirtualKeyboard, VIRTUAL_DEVICE_PREFIX};

/// Error types for output operations
#[derive(Debug, thiserror::Error)]
pub enum OutputError {
    #[error("Failed to create virtual device: {0}")]
    DeviceCreation(String),

    #[error("Failed to write event: {0}")]
    Write(String),

    #[error("Unknown key name: {0}")]
    UnknownKey(String),
}
