//! Outcome classification for API responses.
//!
//! Every result produced by `CrmClient` maps to exactly one `Status`.
//! The UI layer switches on it to decide between showing data, a network
//! message, or the login screen.

use super::error::{ApiError, ApiResult};

/// All outcomes a request can be classified into.
///
/// Numeric codes are stable and exposed through `Status::code()`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Status {
    /// Request succeeded.
    Ok,
    /// Backend unreachable (DNS, refused connection).
    ErrorDns,
    /// Token expired or invalid; the user has to log in again.
    AccessTokenError,
    /// Backend reported some other error message.
    OtherError,
    /// Error without a recognizable message.
    ErrorNotFound,
    /// Session re-established from remembered credentials.
    /// Only produced by `CrmClient::reconnect`.
    UserReconnected,
}

impl Status {
    pub fn code(&self) -> u16 {
        match self {
            Status::Ok => 200,
            Status::ErrorDns => 0,
            Status::UserReconnected => 300,
            Status::AccessTokenError => 400,
            Status::OtherError => 450,
            Status::ErrorNotFound => 500,
        }
    }

    /// Short label for log lines.
    pub fn label(&self) -> &'static str {
        match self {
            Status::Ok => "ok",
            Status::ErrorDns => "not connected",
            Status::AccessTokenError => "invalid credentials",
            Status::OtherError => "server error",
            Status::ErrorNotFound => "unrecognized error",
            Status::UserReconnected => "reconnected",
        }
    }

    /// True when the caller can continue with an authenticated session.
    pub fn is_authenticated(&self) -> bool {
        matches!(self, Status::Ok | Status::UserReconnected)
    }
}

impl std::fmt::Display for Status {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.label(), self.code())
    }
}

impl From<&ApiError> for Status {
    fn from(err: &ApiError) -> Self {
        match err {
            ApiError::Credentials => Status::AccessTokenError,
            ApiError::Network => Status::ErrorDns,
            ApiError::Server { .. } => Status::OtherError,
            ApiError::Unrecognized(_) => Status::ErrorNotFound,
        }
    }
}

/// Classify the result of any `CrmClient` operation.
///
/// Pure: no I/O and no session side effects.
pub fn verify_request<T>(response: &ApiResult<T>) -> Status {
    match response {
        Ok(_) => Status::Ok,
        Err(err) => Status::from(err),
    }
}
