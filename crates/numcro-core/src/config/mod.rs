// Numcro Configuration Files
// Layout persistence

pub mod layout;

pub use layout::{ButtonRecord, Layout, MappedDevice};

/// Errors loading or saving a layout
#[derive(Debug, thiserror::Error)]
pub enum LayoutError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid layout JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid layout: {0}")]
    Invalid(String),
}
