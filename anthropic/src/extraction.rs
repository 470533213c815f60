//! Order extraction on top of the Messages API.

use crate::client::AnthropicClient;
use crate::messages::{DEFAULT_MODEL, MessagesRequest};
use crate::types::Message;
use order_tracker_core::extract::ExtractFuture;
use order_tracker_core::{OrderExtractor, OrderRecord};

/// Default response budget for one extraction
pub const DEFAULT_MAX_TOKENS: u32 = 2048;

/// Instructions sent ahead of every email.
///
/// Field names and vocabularies must stay in sync with [`OrderRecord`]'s
/// serde representation.
pub const EXTRACTION_PROMPT: &str = r#"Extract the order described in the email below.

Collect: brand name, order number, date, order total, and for every item its name, color, size and quantity; also the order status, tracking number and carrier.

Rules:
1. Anything the email does not state is "Unknown".
2. Order status is exactly one of: confirmed, canceled, shipped, delivered.
3. Carrier is exactly one of: UPS, Fedex, Unknown.
4. Look for a tracking number. A FedEx tracking number is 12 digits. A UPS tracking number is 18 characters starting with 1Z.
5. If a tracking number is present, record it and set the carrier from its shape (12 digits: Fedex, 1Z and 18 characters: UPS).
6. If no tracking number is present, tracking number and carrier are both "Unknown", and the status must not be shipped.
7. Otherwise pick the status from the wording of the email.
8. The date is the date the email was received, formatted mm/dd/yy.

Answer with this JSON object and nothing else:
{
    "brand": brand name,
    "date": "mm/dd/yy",
    "number": order number,
    "total": order total,
    "status": order status,
    "tracking number": tracking number,
    "carrier": carrier,
    "item": [
        {
            "name": item name,
            "color": item color,
            "size": item size,
            "quantity": item quantity
        }
    ]
}
"#;

/// [`OrderExtractor`] backed by Claude.
#[derive(Clone, Debug)]
pub struct AnthropicOrderExtractor {
    client: AnthropicClient,
    model: String,
    max_tokens: u32,
}

impl AnthropicOrderExtractor {
    /// Create an extractor using the default model and token budget.
    #[must_use]
    pub fn new(client: AnthropicClient) -> Self {
        Self {
            client,
            model: DEFAULT_MODEL.to_string(),
            max_tokens: DEFAULT_MAX_TOKENS,
        }
    }

    /// Builder: Set model
    #[must_use]
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Builder: Set max tokens
    #[must_use]
    pub const fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    fn request(&self, email_text: &str) -> MessagesRequest {
        MessagesRequest::new(vec![Message::user(format!(
            "{EXTRACTION_PROMPT}\n{email_text}"
        ))])
        .with_model(self.model.clone())
        .with_max_tokens(self.max_tokens)
    }
}

impl OrderExtractor for AnthropicOrderExtractor {
    fn extract(&self, email_text: String) -> ExtractFuture<'_, OrderRecord> {
        Box::pin(async move {
            let response = self.client.messages(self.request(&email_text)).await?;
            tracing::debug!(
                message_id = %response.id,
                input_tokens = response.usage.input_tokens,
                output_tokens = response.usage.output_tokens,
                "Extraction response received"
            );

            let record = OrderRecord::from_model_output(&response.text())?;
            Ok(record)
        })
    }
}
