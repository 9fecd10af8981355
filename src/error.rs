//! Error types for the slideshow manager

use thiserror::Error;

/// Result type alias for slideshow manager operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while managing devices
#[derive(Debug, Error)]
pub enum Error {
    /// Caller-supplied input failed a precondition; no remote call was made
    #[error("validation error: {0}")]
    Validation(String),

    /// Login handshake against a device failed
    #[error("{message}")]
    RemoteAuth {
        status: Option<u16>,
        message: String,
    },

    /// Authenticated call against a device returned an error
    #[error("{message}")]
    RemoteApi {
        status: Option<u16>,
        message: String,
    },

    /// Device registry could not be read or written
    #[error("storage error: {0}")]
    Storage(String),

    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// Release lookup or update script failure
    #[error("update error: {0}")]
    Update(String),

    /// Operation refused because a conflicting one is in progress
    #[error("{0}")]
    Conflict(String),
}

impl Error {
    /// Login failure with an optional HTTP status
    pub fn remote_auth(status: Option<u16>, message: impl Into<String>) -> Self {
        Self::RemoteAuth {
            status,
            message: message.into(),
        }
    }

    /// Device API failure with an optional HTTP status
    pub fn remote_api(status: Option<u16>, message: impl Into<String>) -> Self {
        Self::RemoteApi {
            status,
            message: message.into(),
        }
    }

    /// HTTP status carried by a remote error, if the device answered at all
    #[must_use]
    pub const fn status(&self) -> Option<u16> {
        match self {
            Self::RemoteAuth { status, .. } | Self::RemoteApi { status, .. } => *status,
            _ => None,
        }
    }

    /// Whether the error must propagate to the process boundary
    #[must_use]
    pub const fn is_fatal(&self) -> bool {
        matches!(self, Self::Storage(_))
    }
}

/// Short operator-facing explanation for common device statuses
#[must_use]
pub const fn status_hint(status: u16) -> Option<&'static str> {
    match status {
        400 => Some("the request was rejected, check the submitted values"),
        401 => Some("the device session is invalid or expired"),
        404 => Some("the requested resource does not exist on the device"),
        415 => Some("the media type is not supported by the device"),
        429 => Some("too many requests, try again later"),
        _ => None,
    }
}
