//! Gateway error types.

use thiserror::Error;

/// Errors surfaced by the API gateway client.
///
/// Every public operation returns one of these instead of panicking or
/// leaking transport errors; callers render the message directly.
#[derive(Debug, Error)]
pub enum ApiError {
    /// A required field was missing or invalid; no request was sent.
    #[error("{0}")]
    Validation(String),

    /// The operation needs a stored credential and none is present.
    #[error("Authentication required")]
    AuthRequired,

    /// The stored token expired, or the backend answered 401.
    #[error("Session expired. Please login again.")]
    SessionExpired,

    /// The backend answered 403.
    #[error("Access forbidden. Please check your permissions.")]
    Forbidden,

    /// The backend answered 404.
    #[error("Resource not found")]
    NotFound,

    /// The backend answered with a body that is not JSON.
    #[error("Server returned non-JSON response")]
    NonJsonResponse,

    /// Any other non-2xx status. The message is taken from the error body
    /// when the backend provided one.
    #[error("{message}")]
    Status { status: u16, message: String },

    /// The request never completed (connection refused, DNS, TLS).
    #[error("Request failed: {0}")]
    Transport(String),

    /// The credential store could not be written.
    #[error("Credential store error: {0}")]
    Storage(String),
}

impl From<reqwest::Error> for ApiError {
    fn from(e: reqwest::Error) -> Self {
        ApiError::Transport(e.to_string())
    }
}
