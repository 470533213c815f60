//! Email source abstraction.
//!
//! An email source lists unread messages and decodes one message into the
//! plain text handed to the extraction client.

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use thiserror::Error;

/// Boxed future returned by [`EmailSource`] operations.
pub type SourceFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, SourceError>> + Send + 'a>>;

/// Opaque identifier of one message in the mailbox.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MessageId(String);

impl MessageId {
    /// Creates a new `MessageId`
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the inner string value
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Errors that can occur while reading the mailbox.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SourceError {
    /// The mailbox service could not be reached.
    #[error("Email source unavailable: {0}")]
    Unavailable(String),

    /// Credentials were rejected.
    #[error("Email source rejected credentials: {0}")]
    Unauthorized(String),

    /// The mailbox service answered with an error status.
    #[error("Email source error (status {status}): {message}")]
    Api {
        /// HTTP status code
        status: u16,
        /// Error message from the service
        message: String,
    },

    /// A message exists but carries no decodable text body.
    #[error("Message {id} could not be decoded: {reason}")]
    Undecodable {
        /// Message that failed
        id: MessageId,
        /// Why decoding failed
        reason: String,
    },
}

impl SourceError {
    /// Whether retrying the same operation may succeed.
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        match self {
            Self::Unavailable(_) => true,
            Self::Api { status, .. } => *status == 429 || *status >= 500,
            Self::Unauthorized(_) | Self::Undecodable { .. } => false,
        }
    }
}

/// A mailbox of order-confirmation emails.
///
/// Uses `Pin<Box<dyn Future>>` returns so it can be shared as `Arc<dyn EmailSource>`.
pub trait EmailSource: Send + Sync {
    /// List the identifiers of all unread messages.
    ///
    /// # Errors
    ///
    /// Returns a [`SourceError`] if the mailbox cannot be listed.
    fn list_unread_message_ids(&self) -> SourceFuture<'_, Vec<MessageId>>;

    /// Fetch one message and decode it into plain text.
    ///
    /// # Errors
    ///
    /// Returns [`SourceError::Undecodable`] if the message has no text body, or
    /// another [`SourceError`] if it cannot be fetched.
    fn decode(&self, id: MessageId) -> SourceFuture<'_, String>;
}
