//! Scripted email source and extractor.
//!
//! Both mocks replay responses queued by the test, so a run can be driven
//! through every success and failure path without network access.

#![allow(clippy::unwrap_used)] // Test infrastructure uses unwrap for simplicity
#![allow(clippy::missing_panics_doc)]

use order_tracker_core::extract::ExtractFuture;
use order_tracker_core::source::SourceFuture;
use order_tracker_core::{
    EmailSource, ExtractError, MessageId, OrderExtractor, OrderRecord, SourceError,
};
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, RwLock};

/// Email source backed by an in-memory mailbox.
///
/// Messages are listed in the order they were added.
#[derive(Clone, Debug, Default)]
pub struct ScriptedEmailSource {
    order: Arc<RwLock<Vec<MessageId>>>,
    bodies: Arc<RwLock<HashMap<MessageId, Result<String, SourceError>>>>,
    listing_errors: Arc<RwLock<VecDeque<SourceError>>>,
    decode_calls: Arc<AtomicUsize>,
}

impl ScriptedEmailSource {
    /// Create an empty mailbox
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an unread message with a decodable body.
    #[must_use]
    pub fn with_message(self, id: &str, text: &str) -> Self {
        self.push(MessageId::new(id), Ok(text.to_string()));
        self
    }

    /// Add an unread message whose decoding fails with `error`.
    #[must_use]
    pub fn with_decode_error(self, id: &str, error: SourceError) -> Self {
        self.push(MessageId::new(id), Err(error));
        self
    }

    /// Make the next listing fail with `error`.
    pub fn fail_next_listing(&self, error: SourceError) {
        self.listing_errors.write().unwrap().push_back(error);
    }

    /// Number of `decode` calls so far
    #[must_use]
    pub fn decode_calls(&self) -> usize {
        self.decode_calls.load(Ordering::SeqCst)
    }

    fn push(&self, id: MessageId, body: Result<String, SourceError>) {
        self.order.write().unwrap().push(id.clone());
        self.bodies.write().unwrap().insert(id, body);
    }
}

impl EmailSource for ScriptedEmailSource {
    fn list_unread_message_ids(&self) -> SourceFuture<'_, Vec<MessageId>> {
        let result = match self.listing_errors.write().unwrap().pop_front() {
            Some(error) => Err(error),
            None => Ok(self.order.read().unwrap().clone()),
        };
        Box::pin(std::future::ready(result))
    }

    fn decode(&self, id: MessageId) -> SourceFuture<'_, String> {
        self.decode_calls.fetch_add(1, Ordering::SeqCst);
        let result = self
            .bodies
            .read()
            .unwrap()
            .get(&id)
            .cloned()
            .unwrap_or_else(|| {
                Err(SourceError::Api {
                    status: 404,
                    message: format!("message {id} not found"),
                })
            });
        Box::pin(std::future::ready(result))
    }
}

/// Extractor that replays queued results.
///
/// Results are consumed in order. When the queue is empty, records
/// registered by email text with [`with_record_for`](Self::with_record_for)
/// are returned, and any other text is parsed as if it were model output.
#[derive(Clone, Debug, Default)]
pub struct ScriptedExtractor {
    queue: Arc<RwLock<VecDeque<Result<OrderRecord, ExtractError>>>>,
    by_text: Arc<RwLock<HashMap<String, Result<OrderRecord, ExtractError>>>>,
    calls: Arc<AtomicUsize>,
}

impl ScriptedExtractor {
    /// Create an extractor with nothing scripted
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Return `record` whenever the email text equals `text`.
    #[must_use]
    pub fn with_record_for(self, text: &str, record: OrderRecord) -> Self {
        self.by_text
            .write()
            .unwrap()
            .insert(text.to_string(), Ok(record));
        self
    }

    /// Fail with `error` whenever the email text equals `text`.
    #[must_use]
    pub fn with_error_for(self, text: &str, error: ExtractError) -> Self {
        self.by_text
            .write()
            .unwrap()
            .insert(text.to_string(), Err(error));
        self
    }

    /// Queue a record for the next call.
    pub fn push_record(&self, record: OrderRecord) {
        self.queue.write().unwrap().push_back(Ok(record));
    }

    /// Queue an error for the next call.
    pub fn push_error(&self, error: ExtractError) {
        self.queue.write().unwrap().push_back(Err(error));
    }

    /// Number of `extract` calls so far
    #[must_use]
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl OrderExtractor for ScriptedExtractor {
    fn extract(&self, email_text: String) -> ExtractFuture<'_, OrderRecord> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let queued = self.queue.write().unwrap().pop_front();
        let result = queued.unwrap_or_else(|| {
            self.by_text
                .read()
                .unwrap()
                .get(&email_text)
                .cloned()
                .unwrap_or_else(|| {
                    OrderRecord::from_model_output(&email_text).map_err(ExtractError::from)
                })
        });
        Box::pin(std::future::ready(result))
    }
}
