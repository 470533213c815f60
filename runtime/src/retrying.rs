//! Retrying decorators for the tracker's collaborators.
//!
//! Each decorator wraps a collaborator and runs every call through
//! [`retry_with_predicate`], retrying only errors the collaborator classifies
//! as transient. Successful results, including [`WriteOutcome::NotApplied`],
//! are returned as-is.

use crate::retry::{RetryPolicy, retry_with_predicate};
use order_tracker_core::extract::ExtractFuture;
use order_tracker_core::source::SourceFuture;
use order_tracker_core::store::StoreFuture;
use order_tracker_core::{
    DetailsDelta, DetailsEntry, EmailSource, ExtractError, Known, MessageId, OrderExtractor,
    OrderNumber, OrderRecord, OrderStore, ShipmentDelta, ShipmentEntry, ShipmentFilter,
    SourceError, StoreError, WriteOutcome,
};
use std::sync::Arc;

/// [`OrderStore`] decorator that retries transient store errors.
#[derive(Clone)]
pub struct RetryingStore {
    inner: Arc<dyn OrderStore>,
    policy: RetryPolicy,
}

impl RetryingStore {
    /// Wrap a store with a retry policy.
    #[must_use]
    pub fn new(inner: Arc<dyn OrderStore>, policy: RetryPolicy) -> Self {
        Self { inner, policy }
    }
}

impl OrderStore for RetryingStore {
    fn find_shipment_by_number(
        &self,
        number: OrderNumber,
    ) -> StoreFuture<'_, Option<ShipmentEntry>> {
        Box::pin(async move {
            retry_with_predicate(
                &self.policy,
                "find_shipment_by_number",
                || self.inner.find_shipment_by_number(number.clone()),
                StoreError::is_transient,
            )
            .await
        })
    }

    fn insert_details(&self, entry: DetailsEntry) -> StoreFuture<'_, WriteOutcome> {
        Box::pin(async move {
            retry_with_predicate(
                &self.policy,
                "insert_details",
                || self.inner.insert_details(entry.clone()),
                StoreError::is_transient,
            )
            .await
        })
    }

    fn insert_shipment(&self, entry: ShipmentEntry) -> StoreFuture<'_, WriteOutcome> {
        Box::pin(async move {
            retry_with_predicate(
                &self.policy,
                "insert_shipment",
                || self.inner.insert_shipment(entry.clone()),
                StoreError::is_transient,
            )
            .await
        })
    }

    fn update_details(
        &self,
        number: OrderNumber,
        delta: DetailsDelta,
    ) -> StoreFuture<'_, WriteOutcome> {
        Box::pin(async move {
            retry_with_predicate(
                &self.policy,
                "update_details",
                || self.inner.update_details(number.clone(), delta.clone()),
                StoreError::is_transient,
            )
            .await
        })
    }

    fn update_shipment(
        &self,
        number: OrderNumber,
        delta: ShipmentDelta,
    ) -> StoreFuture<'_, WriteOutcome> {
        Box::pin(async move {
            retry_with_predicate(
                &self.policy,
                "update_shipment",
                || self.inner.update_shipment(number.clone(), delta.clone()),
                StoreError::is_transient,
            )
            .await
        })
    }

    fn find_shipments_by_filter(
        &self,
        filter: ShipmentFilter,
    ) -> StoreFuture<'_, Vec<ShipmentEntry>> {
        Box::pin(async move {
            retry_with_predicate(
                &self.policy,
                "find_shipments_by_filter",
                || self.inner.find_shipments_by_filter(filter.clone()),
                StoreError::is_transient,
            )
            .await
        })
    }

    fn set_transshipment(
        &self,
        number: OrderNumber,
        trans_carrier: Known,
        package_number: Known,
    ) -> StoreFuture<'_, WriteOutcome> {
        Box::pin(async move {
            retry_with_predicate(
                &self.policy,
                "set_transshipment",
                || {
                    self.inner.set_transshipment(
                        number.clone(),
                        trans_carrier.clone(),
                        package_number.clone(),
                    )
                },
                StoreError::is_transient,
            )
            .await
        })
    }
}

/// [`EmailSource`] decorator that retries transient mailbox errors.
#[derive(Clone)]
pub struct RetryingSource {
    inner: Arc<dyn EmailSource>,
    policy: RetryPolicy,
}

impl RetryingSource {
    /// Wrap a source with a retry policy.
    #[must_use]
    pub fn new(inner: Arc<dyn EmailSource>, policy: RetryPolicy) -> Self {
        Self { inner, policy }
    }
}

impl EmailSource for RetryingSource {
    fn list_unread_message_ids(&self) -> SourceFuture<'_, Vec<MessageId>> {
        Box::pin(async move {
            retry_with_predicate(
                &self.policy,
                "list_unread_message_ids",
                || self.inner.list_unread_message_ids(),
                SourceError::is_transient,
            )
            .await
        })
    }

    fn decode(&self, id: MessageId) -> SourceFuture<'_, String> {
        Box::pin(async move {
            retry_with_predicate(
                &self.policy,
                "decode",
                || self.inner.decode(id.clone()),
                SourceError::is_transient,
            )
            .await
        })
    }
}

/// [`OrderExtractor`] decorator that retries transient service errors.
///
/// Invalid records are never retried.
#[derive(Clone)]
pub struct RetryingExtractor {
    inner: Arc<dyn OrderExtractor>,
    policy: RetryPolicy,
}

impl RetryingExtractor {
    /// Wrap an extractor with a retry policy.
    #[must_use]
    pub fn new(inner: Arc<dyn OrderExtractor>, policy: RetryPolicy) -> Self {
        Self { inner, policy }
    }
}

impl OrderExtractor for RetryingExtractor {
    fn extract(&self, email_text: String) -> ExtractFuture<'_, OrderRecord> {
        Box::pin(async move {
            retry_with_predicate(
                &self.policy,
                "extract",
                || self.inner.extract(email_text.clone()),
                ExtractError::is_transient,
            )
            .await
        })
    }
}
