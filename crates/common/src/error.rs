//! Error types for Vmfish

use thiserror::Error;

/// Result type alias using Vmfish Error
pub type Result<T> = std::result::Result<T, Error>;

/// Vmfish error types
#[derive(Error, Debug)]
pub enum Error {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// vSphere answered with a non-success status
    #[error("vSphere API error ({status}): {message}")]
    Platform { status: u16, message: String },

    #[error("vSphere authentication failed: {0}")]
    Authentication(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{surface} session does not support {operation}")]
    Unsupported {
        surface: &'static str,
        operation: &'static str,
    },
}

impl Error {
    pub(crate) fn unsupported(surface: &'static str, operation: &'static str) -> Self {
        Error::Unsupported { surface, operation }
    }
}
