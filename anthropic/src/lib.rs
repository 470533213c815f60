//! # Anthropic Claude API Client
//!
//! Minimal client for the Anthropic Messages API plus the
//! [`AnthropicOrderExtractor`], which turns order-confirmation email text
//! into an `OrderRecord`.
//!
//! ## Example
//!
//! ```no_run
//! use order_tracker_anthropic::{AnthropicClient, AnthropicOrderExtractor};
//! use order_tracker_core::OrderExtractor;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Create client from ANTHROPIC_API_KEY environment variable
//!     let client = AnthropicClient::from_env()?;
//!     let extractor = AnthropicOrderExtractor::new(client);
//!
//!     let record = extractor
//!         .extract("Order #A100 confirmed on 01/01/24".to_string())
//!         .await?;
//!
//!     println!("Extracted: {record:?}");
//!     Ok(())
//! }
//! ```

pub mod client;
pub mod error;
pub mod extraction;
pub mod messages;
pub mod types;

// Re-export main types for convenience
pub use client::AnthropicClient;
pub use error::ClaudeError;
pub use extraction::{AnthropicOrderExtractor, DEFAULT_MAX_TOKENS, EXTRACTION_PROMPT};
pub use messages::{DEFAULT_MODEL, MessagesRequest, MessagesResponse};
pub use types::{ContentBlock, Message, Role, StopReason, Usage};
