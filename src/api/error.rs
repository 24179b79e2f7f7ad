//! Error types for transport and API operations.
//!
//! `TransportError` is what a single HTTP call can fail with. `ApiError` is
//! the classified form every `CrmClient` operation returns; callers never
//! see a raw transport error.

use thiserror::Error;

/// Message the backend uses when a bearer token is missing, expired or invalid.
pub const CREDENTIALS_INVALID: &str = "Could not verify credentials";

/// Message attached to connection-level failures (DNS, refused, unreachable).
pub const NOT_CONNECTED: &str = "Not connected";

/// Message the backend uses when `auth/token` rejects an email/password pair.
pub const WRONG_LOGIN: &str = "Wrong info!";

#[derive(Debug, Error)]
pub enum TransportError {
    /// The server answered with a non-2xx status.
    #[error("request failed ({status}): {message}")]
    Status { status: u16, message: String },

    /// The server could not be reached at all.
    #[error("connection failed: {0}")]
    Connect(#[source] reqwest::Error),

    #[error("HTTP error: {0}")]
    Other(#[source] reqwest::Error),
}

impl From<reqwest::Error> for TransportError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_connect() {
            TransportError::Connect(err)
        } else {
            TransportError::Other(err)
        }
    }
}

/// Classified outcome of a failed API operation.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ApiError {
    /// Backend unreachable.
    #[error("{}", NOT_CONNECTED)]
    Network,

    /// Token missing, expired or rejected.
    #[error("{}", CREDENTIALS_INVALID)]
    Credentials,

    /// Any other error message surfaced by the backend.
    #[error("server error ({status}): {message}")]
    Server { status: u16, message: String },

    /// Failure without a usable message (empty error body, unexpected
    /// response shape, non-connect transport failure). The string is
    /// diagnostic detail only.
    #[error("unrecognized response: {0}")]
    Unrecognized(String),
}

impl ApiError {
    /// Classify an HTTP error status by its extracted message.
    ///
    /// The credentials sentinel wins regardless of the status code.
    pub fn from_status(status: u16, message: impl Into<String>) -> Self {
        let message = message.into();
        if message == CREDENTIALS_INVALID {
            ApiError::Credentials
        } else if message.trim().is_empty() {
            ApiError::Unrecognized(format!("HTTP {} without an error message", status))
        } else {
            ApiError::Server { status, message }
        }
    }

    /// The human-readable message carried by this error, if any.
    pub fn message(&self) -> Option<&str> {
        match self {
            ApiError::Network => Some(NOT_CONNECTED),
            ApiError::Credentials => Some(CREDENTIALS_INVALID),
            ApiError::Server { message, .. } => Some(message),
            ApiError::Unrecognized(_) => None,
        }
    }

    /// Whether the backend rejected an email/password pair.
    pub fn is_wrong_login(&self) -> bool {
        matches!(self, ApiError::Server { message, .. } if message == WRONG_LOGIN)
    }
}

impl From<TransportError> for ApiError {
    fn from(err: TransportError) -> Self {
        match err {
            TransportError::Status { status, message } => ApiError::from_status(status, message),
            TransportError::Connect(e) => {
                log::warn!("Backend unreachable: {}", e);
                ApiError::Network
            }
            TransportError::Other(e) => ApiError::Unrecognized(e.to_string()),
        }
    }
}

/// Result type for API operations.
pub type ApiResult<T> = Result<T, ApiError>;
