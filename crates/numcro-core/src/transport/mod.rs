// Numcro Transport Layer
// Input sources: local hook, TCP broadcasters and UDP discovery

pub mod discovery;
pub mod hook;
pub mod network;
pub mod wire;

pub use discovery::{local_ip_for, DiscoveryResponder};
pub use hook::{key_event, HookDeviceInfo};
pub use network::NetworkSource;
pub use wire::{parse_event, DiscoveryMessage, WireError};

#[cfg(feature = "local-hook")]
pub use hook::{HookSource, LocalHook};

/// Result type for transport operations
pub type TransportResult<T> = Result<T, TransportError>;

/// Errors starting or running an input source
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Wire(#[from] WireError),

    #[error("Local hook error: {0}")]
    Hook(String),
}
