//! Error types for display capture

use thiserror::Error;

/// Result type alias for capture operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while capturing or encoding a framebuffer
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// The owner loop did not service the request within the bound
    #[error("Screenshot capture timed out after {0}ms")]
    Timeout(u64),

    /// The capture cycle ran but produced no image
    #[error("Failed to capture screenshot: {0}")]
    CaptureFailed(String),

    /// The output buffer for an encoded image could not be obtained
    #[error("Failed to allocate {0} bytes for BMP")]
    AllocationFailed(usize),

    /// Another capture is already in flight
    #[error("A screenshot capture is already in progress")]
    Busy,

    /// Pixel memory does not match the geometry it claims
    #[error("Invalid framebuffer: {0}")]
    InvalidFramebuffer(String),

    /// Bytes handed to the header parser are not a 24-bit BMP
    #[error("Invalid image: {0}")]
    InvalidImage(String),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    ConfigError(String),

    /// The owner side has shut down and will never service a request
    #[error("Capture owner has stopped")]
    OwnerStopped,

    /// Generic error
    #[error("{0}")]
    Other(String),
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::ConfigError(err.to_string())
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::Other(err.to_string())
    }
}
