//! Gmail message payloads and their conversion to plain text.
//!
//! A `format=full` message is a tree of MIME parts whose bodies are
//! base64url-encoded. The text handed to extraction is the first
//! `text/plain` body found depth-first; if there is none, the first part's
//! body, then the top-level body.

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use regex::Regex;
use serde::Deserialize;
use thiserror::Error;

/// Links in angle brackets, then bare links up to the next whitespace.
pub const LINK_PATTERN: &str = r"<https?://[^>]+>|https?://\S+";

/// A message as returned by `users.messages.get?format=full`.
#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GmailMessage {
    /// Message id
    pub id: String,
    /// Root MIME part
    #[serde(default)]
    pub payload: Option<MessagePart>,
}

/// One node of the MIME tree.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessagePart {
    /// MIME type, e.g. `text/plain` or `multipart/alternative`
    #[serde(default)]
    pub mime_type: String,
    /// Inline body, absent for attachments and most multipart nodes
    #[serde(default)]
    pub body: Option<PartBody>,
    /// Child parts
    #[serde(default)]
    pub parts: Vec<MessagePart>,
}

/// Body of a MIME part.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct PartBody {
    /// base64url-encoded content
    #[serde(default)]
    pub data: Option<String>,
}

impl MessagePart {
    fn data(&self) -> Option<&str> {
        self.body
            .as_ref()
            .and_then(|body| body.data.as_deref())
            .filter(|data| !data.is_empty())
    }

    fn first_plain_text(&self) -> Option<&str> {
        if self.mime_type.eq_ignore_ascii_case("text/plain") {
            if let Some(data) = self.data() {
                return Some(data);
            }
        }
        self.parts.iter().find_map(Self::first_plain_text)
    }

    fn text_body(&self) -> Option<&str> {
        self.first_plain_text()
            .or_else(|| self.parts.first().and_then(Self::data))
            .or_else(|| self.data())
    }
}

/// Why a message could not be turned into text.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DecodeError {
    /// The message has no payload or no part carries a body
    #[error("message has no text body")]
    NoTextBody,

    /// A body is not valid base64url
    #[error("invalid base64url body: {0}")]
    Base64(String),

    /// The decoded body is not UTF-8
    #[error("body is not UTF-8: {0}")]
    Utf8(String),
}

/// Turns Gmail payloads into plain text, optionally without links.
#[derive(Clone, Debug)]
pub struct PayloadDecoder {
    links: Option<Regex>,
}

impl PayloadDecoder {
    /// Create a decoder.
    ///
    /// # Errors
    ///
    /// Returns the regex error if [`LINK_PATTERN`] fails to compile.
    pub fn new(strip_links: bool) -> Result<Self, regex::Error> {
        let links = if strip_links {
            Some(Regex::new(LINK_PATTERN)?)
        } else {
            None
        };
        Ok(Self { links })
    }

    /// Whether links are removed from decoded text.
    #[must_use]
    pub const fn strips_links(&self) -> bool {
        self.links.is_some()
    }

    /// Decode the text body of `message`.
    ///
    /// # Errors
    ///
    /// Returns a [`DecodeError`] if no body exists or it cannot be decoded.
    pub fn decode(&self, message: &GmailMessage) -> Result<String, DecodeError> {
        let data = message
            .payload
            .as_ref()
            .and_then(MessagePart::text_body)
            .ok_or(DecodeError::NoTextBody)?;

        let text = decode_body(data)?;
        Ok(match &self.links {
            Some(links) => links.replace_all(&text, "").trim().to_string(),
            None => text,
        })
    }
}

/// Decode one base64url body, with or without padding.
///
/// # Errors
///
/// Returns a [`DecodeError`] for invalid base64url or non-UTF-8 content.
pub fn decode_body(data: &str) -> Result<String, DecodeError> {
    let bytes = URL_SAFE_NO_PAD
        .decode(data.trim().trim_end_matches('='))
        .map_err(|e| DecodeError::Base64(e.to_string()))?;
    String::from_utf8(bytes).map_err(|e| DecodeError::Utf8(e.to_string()))
}
