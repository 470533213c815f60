//! # Gmail Email Source
//!
//! [`GmailClient`] implements the `EmailSource` trait over the Gmail REST API:
//!
//! - OAuth 2.0 refresh-token flow, access token cached until shortly before expiry
//! - `UNREAD` listing with pagination
//! - `format=full` fetch, decoded by [`PayloadDecoder`] into plain text
//!
//! ## Example
//!
//! ```no_run
//! use order_tracker_core::EmailSource;
//! use order_tracker_gmail::{GmailClient, GmailCredentials};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = GmailClient::new(GmailCredentials {
//!         client_id: std::env::var("GMAIL_CLIENT_ID")?,
//!         client_secret: std::env::var("GMAIL_CLIENT_SECRET")?,
//!         refresh_token: std::env::var("GMAIL_REFRESH_TOKEN")?,
//!     })?;
//!
//!     for id in client.list_unread_message_ids().await? {
//!         println!("{}", client.decode(id).await?);
//!     }
//!     Ok(())
//! }
//! ```

pub mod client;
pub mod decode;
pub mod error;

pub use client::{DEFAULT_API_URL, DEFAULT_TOKEN_URL, GmailClient, GmailCredentials};
pub use decode::{DecodeError, GmailMessage, LINK_PATTERN, PayloadDecoder};
pub use error::GmailError;
