//! Error types for the Gmail client

use order_tracker_core::SourceError;
use thiserror::Error;

/// Errors that can occur when talking to Gmail or Google's token endpoint
#[derive(Debug, Error)]
pub enum GmailError {
    /// The HTTP client could not be configured
    #[error("Client setup failed: {0}")]
    Setup(String),

    /// HTTP request failed before a response arrived
    #[error("Request failed: {0}")]
    RequestFailed(String),

    /// Google refused to exchange the refresh token
    #[error("Token refresh failed (status {status}): {message}")]
    TokenRefreshFailed {
        /// HTTP status code
        status: u16,
        /// Error body from the token endpoint
        message: String,
    },

    /// Gmail rejected the access token
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Gmail returned an error status
    #[error("API error (status {status}): {message}")]
    ApiError {
        /// HTTP status code
        status: u16,
        /// Error body from the API
        message: String,
    },

    /// Response body was not the expected JSON
    #[error("Response parsing failed: {0}")]
    ResponseParseFailed(String),
}

impl From<GmailError> for SourceError {
    fn from(error: GmailError) -> Self {
        match error {
            GmailError::RequestFailed(message)
            | GmailError::ResponseParseFailed(message)
            | GmailError::Setup(message) => Self::Unavailable(message),
            GmailError::TokenRefreshFailed { status, message } if status >= 500 => {
                Self::Api { status, message }
            }
            GmailError::TokenRefreshFailed { message, .. } | GmailError::Unauthorized(message) => {
                Self::Unauthorized(message)
            }
            GmailError::ApiError { status, message } => Self::Api { status, message },
        }
    }
}
