//! Gmail REST client implementation

use crate::decode::{GmailMessage, PayloadDecoder};
use crate::error::GmailError;
use order_tracker_core::source::SourceFuture;
use order_tracker_core::{EmailSource, MessageId, SourceError};
use reqwest::{Client, Response, StatusCode};
use serde::Deserialize;
use std::fmt;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;

/// Production Gmail API root
pub const DEFAULT_API_URL: &str = "https://gmail.googleapis.com";

/// Google's OAuth 2.0 token endpoint
pub const DEFAULT_TOKEN_URL: &str = "https://oauth2.googleapis.com/token";

/// Access tokens are refreshed this long before they expire.
const EXPIRY_MARGIN: Duration = Duration::from_secs(60);

/// Default per-request timeout
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// OAuth client credentials plus a long-lived refresh token.
///
/// Obtaining the refresh token (the interactive consent flow) happens
/// outside the tracker.
#[derive(Clone)]
pub struct GmailCredentials {
    /// OAuth 2.0 client ID
    pub client_id: String,
    /// OAuth 2.0 client secret
    pub client_secret: String,
    /// Refresh token with the `gmail.readonly` scope
    pub refresh_token: String,
}

impl fmt::Debug for GmailCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GmailCredentials")
            .field("client_id", &self.client_id)
            .finish_non_exhaustive()
    }
}

#[derive(Debug)]
struct AccessToken {
    value: String,
    refresh_at: Instant,
}

/// Google's token endpoint response format.
#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    /// Lifetime in seconds (typically 3600)
    expires_in: Option<u64>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ListResponse {
    #[serde(default)]
    messages: Vec<MessageRef>,
    next_page_token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct MessageRef {
    id: String,
}

/// Gmail-backed [`EmailSource`].
///
/// Lists `UNREAD` messages and decodes them with a [`PayloadDecoder`].
/// Messages are never marked read.
pub struct GmailClient {
    http: Client,
    credentials: GmailCredentials,
    user_id: String,
    api_url: String,
    token_url: String,
    decoder: PayloadDecoder,
    token: Mutex<Option<AccessToken>>,
}

impl GmailClient {
    /// Create a client for the `me` mailbox that strips links.
    ///
    /// # Errors
    ///
    /// Returns [`GmailError::Setup`] if the HTTP client or link pattern
    /// cannot be built.
    pub fn new(credentials: GmailCredentials) -> Result<Self, GmailError> {
        let http = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| GmailError::Setup(e.to_string()))?;

        Ok(Self {
            http,
            credentials,
            user_id: "me".to_string(),
            api_url: DEFAULT_API_URL.to_string(),
            token_url: DEFAULT_TOKEN_URL.to_string(),
            decoder: decoder(true)?,
            token: Mutex::new(None),
        })
    }

    /// Builder: read another mailbox
    #[must_use]
    pub fn with_user_id(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = user_id.into();
        self
    }

    /// Builder: keep or strip links in decoded text
    ///
    /// # Errors
    ///
    /// Returns [`GmailError::Setup`] if the link pattern cannot be built.
    pub fn with_strip_links(mut self, strip_links: bool) -> Result<Self, GmailError> {
        self.decoder = decoder(strip_links)?;
        Ok(self)
    }

    /// Builder: point the client at other endpoints (test servers)
    #[must_use]
    pub fn with_endpoints(mut self, api_url: impl Into<String>, token_url: impl Into<String>) -> Self {
        self.api_url = api_url.into().trim_end_matches('/').to_string();
        self.token_url = token_url.into();
        self
    }

    /// Fetch every unread message id, following pagination.
    ///
    /// # Errors
    ///
    /// Returns a [`GmailError`] if authorization or any page request fails.
    pub async fn unread_message_ids(&self) -> Result<Vec<String>, GmailError> {
        let url = format!("{}/gmail/v1/users/{}/messages", self.api_url, self.user_id);
        let mut ids = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let token = self.access_token().await?;
            let mut request = self
                .http
                .get(&url)
                .bearer_auth(token)
                .query(&[("labelIds", "UNREAD")]);
            if let Some(page) = &page_token {
                request = request.query(&[("pageToken", page.as_str())]);
            }

            let response = request
                .send()
                .await
                .map_err(|e| GmailError::RequestFailed(e.to_string()))?;
            let page: ListResponse = self.parse(response).await?;

            ids.extend(page.messages.into_iter().map(|m| m.id));
            match page.next_page_token {
                Some(next) if !next.is_empty() => page_token = Some(next),
                _ => break,
            }
        }

        tracing::debug!(count = ids.len(), "Listed unread messages");
        Ok(ids)
    }

    /// Fetch one message in `full` format.
    ///
    /// # Errors
    ///
    /// Returns a [`GmailError`] if authorization or the request fails.
    pub async fn message(&self, id: &str) -> Result<GmailMessage, GmailError> {
        let token = self.access_token().await?;
        let response = self
            .http
            .get(format!(
                "{}/gmail/v1/users/{}/messages/{id}",
                self.api_url, self.user_id
            ))
            .bearer_auth(token)
            .query(&[("format", "full")])
            .send()
            .await
            .map_err(|e| GmailError::RequestFailed(e.to_string()))?;

        self.parse(response).await
    }

    async fn parse<T: serde::de::DeserializeOwned>(&self, response: Response) -> Result<T, GmailError> {
        match response.status() {
            StatusCode::OK => response
                .json::<T>()
                .await
                .map_err(|e| GmailError::ResponseParseFailed(e.to_string())),
            StatusCode::UNAUTHORIZED => {
                // Force a refresh on the next call.
                *self.token.lock().await = None;
                let body = response.text().await.unwrap_or_default();
                Err(GmailError::Unauthorized(body))
            }
            status => {
                let body = response.text().await.unwrap_or_default();
                Err(GmailError::ApiError {
                    status: status.as_u16(),
                    message: body,
                })
            }
        }
    }

    async fn access_token(&self) -> Result<String, GmailError> {
        let mut cached = self.token.lock().await;
        if let Some(token) = cached.as_ref() {
            if Instant::now() < token.refresh_at {
                return Ok(token.value.clone());
            }
        }

        let token = self.refresh().await?;
        let value = token.value.clone();
        *cached = Some(token);
        Ok(value)
    }

    async fn refresh(&self) -> Result<AccessToken, GmailError> {
        let params = [
            ("client_id", self.credentials.client_id.as_str()),
            ("client_secret", self.credentials.client_secret.as_str()),
            ("refresh_token", self.credentials.refresh_token.as_str()),
            ("grant_type", "refresh_token"),
        ];

        let response = self
            .http
            .post(&self.token_url)
            .form(&params)
            .send()
            .await
            .map_err(|e| GmailError::RequestFailed(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            tracing::error!(status = status.as_u16(), "Gmail token refresh failed");
            return Err(GmailError::TokenRefreshFailed {
                status: status.as_u16(),
                message,
            });
        }

        let token: TokenResponse = response
            .json()
            .await
            .map_err(|e| GmailError::ResponseParseFailed(e.to_string()))?;
        let lifetime = Duration::from_secs(token.expires_in.unwrap_or(3600));

        tracing::debug!(expires_in = lifetime.as_secs(), "Gmail access token refreshed");
        Ok(AccessToken {
            value: token.access_token,
            refresh_at: Instant::now() + lifetime.saturating_sub(EXPIRY_MARGIN),
        })
    }
}

fn decoder(strip_links: bool) -> Result<PayloadDecoder, GmailError> {
    PayloadDecoder::new(strip_links).map_err(|e| GmailError::Setup(e.to_string()))
}

impl fmt::Debug for GmailClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GmailClient")
            .field("user_id", &self.user_id)
            .field("api_url", &self.api_url)
            .field("strip_links", &self.decoder.strips_links())
            .finish_non_exhaustive()
    }
}

impl EmailSource for GmailClient {
    fn list_unread_message_ids(&self) -> SourceFuture<'_, Vec<MessageId>> {
        Box::pin(async move {
            let ids = self.unread_message_ids().await?;
            Ok(ids.into_iter().map(MessageId::new).collect())
        })
    }

    fn decode(&self, id: MessageId) -> SourceFuture<'_, String> {
        Box::pin(async move {
            let message = self.message(id.as_str()).await?;
            self.decoder
                .decode(&message)
                .map_err(|e| SourceError::Undecodable {
                    id,
                    reason: e.to_string(),
                })
        })
    }
}
