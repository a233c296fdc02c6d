//! Error types for the webscreen library.

use thiserror::Error;

/// The main error type for webscreen operations.
#[derive(Debug, Error)]
pub enum Error {
    /// Serial port error.
    #[error("serial port error: {0}")]
    Serial(#[from] tokio_serial::Error),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// No serial device could be enumerated or selected.
    #[error("serial device API unavailable: {reason}")]
    DeviceApiUnavailable { reason: String },

    /// Connection is not established.
    #[error("not connected")]
    NotConnected,
}

impl Error {
    /// Returns true for failures of the underlying link (open, read, write, close).
    #[must_use]
    pub const fn is_transport(&self) -> bool {
        matches!(self, Self::Serial(_) | Self::Io(_))
    }
}

/// Result type alias for webscreen operations.
pub type Result<T> = std::result::Result<T, Error>;
