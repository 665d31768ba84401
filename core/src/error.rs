//! Error types for the dormitory API client.
//!
//! # Design
//! `Auth` and `Permission` get dedicated variants because callers react to
//! them differently from ordinary server rejections: a 401 has already torn
//! down the session by the time the error is seen, a 403 has not. All other
//! non-2xx responses land in `Api` with the status and the server's message.
//! The `Display` output of every variant is meant to be shown to a user as-is.

use thiserror::Error;

/// Errors returned by `HttpClient` and the helpers built on it.
#[derive(Debug, Error)]
pub enum ApiError {
    /// The transport could not reach the server at all.
    #[error("network connection failed, please check your network")]
    Network { detail: String },

    /// The server returned 401. The session was cleared before this was
    /// returned.
    #[error("login expired, please log in again")]
    Auth,

    /// The server returned 403.
    #[error("permission denied")]
    Permission,

    /// The server returned a non-2xx status other than 401/403.
    #[error("{message}")]
    Api { status: u16, message: String },

    /// The response body could not be deserialized into the expected type.
    #[error("deserialization failed: {0}")]
    Deserialization(String),

    /// The request payload could not be serialized to JSON.
    #[error("serialization failed: {0}")]
    Serialization(String),

    /// Persisted session state could not be written.
    #[error("session storage failed: {0}")]
    Storage(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl ApiError {
    /// HTTP status the server answered with, if the error came from one.
    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::Auth => Some(401),
            ApiError::Permission => Some(403),
            ApiError::Api { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// Connection-level failure reported by a `Transport`.
///
/// HTTP error statuses are not transport failures; they come back as
/// ordinary responses.
#[derive(Debug, Error)]
#[error("{0}")]
pub struct TransportError(pub String);

impl From<TransportError> for ApiError {
    fn from(err: TransportError) -> Self {
        ApiError::Network { detail: err.0 }
    }
}
