//! Extraction client abstraction.
//!
//! An extractor turns the plain text of one email into an [`OrderRecord`].

use crate::order::{OrderRecord, RecordError};
use std::future::Future;
use std::pin::Pin;
use thiserror::Error;

/// Boxed future returned by [`OrderExtractor::extract`].
pub type ExtractFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, ExtractError>> + Send + 'a>>;

/// Errors that can occur while extracting an order record.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ExtractError {
    /// The extraction service could not be reached.
    #[error("Extraction service unavailable: {0}")]
    Unavailable(String),

    /// The extraction service is throttling requests.
    #[error("Extraction service rate limited")]
    RateLimited,

    /// Credentials were rejected.
    #[error("Extraction service rejected credentials")]
    Unauthorized,

    /// The extraction service answered with an error status.
    #[error("Extraction service error (status {status}): {message}")]
    Api {
        /// HTTP status code
        status: u16,
        /// Error message from the service
        message: String,
    },

    /// The service answered, but not with a usable order record.
    #[error("Invalid record: {0}")]
    InvalidRecord(#[from] RecordError),
}

impl ExtractError {
    /// Whether retrying the same request may succeed.
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        match self {
            Self::Unavailable(_) | Self::RateLimited => true,
            Self::Api { status, .. } => *status >= 500,
            Self::Unauthorized | Self::InvalidRecord(_) => false,
        }
    }
}

/// Turns email text into a structured order record.
///
/// Uses `Pin<Box<dyn Future>>` returns so it can be shared as `Arc<dyn OrderExtractor>`.
pub trait OrderExtractor: Send + Sync {
    /// Extract the order described by `email_text`.
    ///
    /// # Errors
    ///
    /// Returns [`ExtractError::InvalidRecord`] if the output is not a valid
    /// record, or another [`ExtractError`] if the service call failed.
    fn extract(&self, email_text: String) -> ExtractFuture<'_, OrderRecord>;
}
