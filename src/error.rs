use std::path::PathBuf;

use thiserror::Error;

/// Errors returned by Draw Things client operations.
#[derive(Error, Debug)]
pub enum GenerationError {
    /// Network-level request failure (refused, DNS, timeout) with context.
    #[error("{context}: {source}")]
    Network {
        context: String,
        source: reqwest::Error,
    },

    /// The service returned a non-success HTTP status.
    #[error("HTTP Error: {status} {reason}")]
    Http { status: u16, reason: String },

    /// The response was not JSON or was missing an expected field.
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    /// An image payload was not valid base64.
    #[error("Image {index} is not valid base64: {source}")]
    Decode {
        index: usize,
        source: base64::DecodeError,
    },

    /// Writing a decoded image (or creating its directory) failed.
    #[error("Error saving image to {}: {}", .path.display(), .source)]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },

    /// `save` was called with an empty image list.
    #[error("No images to save")]
    NoImages,

    /// A request parameter is outside its valid range.
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// A configuration value could not be parsed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// A batch was stopped through its cancellation flag.
    #[error("Batch was cancelled")]
    Cancelled,
}

impl GenerationError {
    /// True for connection-level failures where no HTTP response arrived.
    pub fn is_transport(&self) -> bool {
        matches!(self, GenerationError::Network { .. })
    }

    /// The HTTP status code, if the service answered with a failure status.
    pub fn status(&self) -> Option<u16> {
        match self {
            GenerationError::Http { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// Convenience alias.
pub type Result<T> = std::result::Result<T, GenerationError>;
