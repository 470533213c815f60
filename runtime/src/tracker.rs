//! Run orchestration.
//!
//! [`OrderTracker::run`] walks every unread message through
//! decode → extract → reconcile. A failure at any stage is recorded against
//! the message and processing moves on; only a failure to list the mailbox
//! aborts the run.

use crate::reconcile::{ReconcileError, Reconciler, Reconciliation};
use chrono::{DateTime, Utc};
use order_tracker_core::environment::Clock;
use order_tracker_core::{
    EmailSource, ExtractError, MessageId, OrderExtractor, OrderStore, SourceError,
};
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

/// Pipeline stage at which a message failed.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Stage {
    /// Fetching and decoding the email
    Decode,
    /// Extracting the order record
    Extract,
    /// Writing to the order store
    Reconcile,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Decode => f.write_str("decode"),
            Self::Extract => f.write_str("extract"),
            Self::Reconcile => f.write_str("reconcile"),
        }
    }
}

/// Why one message could not be processed.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StageError {
    /// Decoding failed
    #[error("decode failed: {0}")]
    Decode(SourceError),

    /// Extraction failed
    #[error("extraction failed: {0}")]
    Extract(ExtractError),

    /// Reconciliation failed
    #[error("reconciliation failed: {0}")]
    Reconcile(ReconcileError),
}

impl StageError {
    /// Stage at which the message failed.
    #[must_use]
    pub const fn stage(&self) -> Stage {
        match self {
            Self::Decode(_) => Stage::Decode,
            Self::Extract(_) => Stage::Extract,
            Self::Reconcile(_) => Stage::Reconcile,
        }
    }
}

/// A message that needs manual follow-up.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FailedMessage {
    /// Message identifier
    pub id: MessageId,
    /// What went wrong
    pub error: StageError,
}

impl fmt::Display for FailedMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({}): {}", self.id, self.error.stage(), self.error)
    }
}

/// Errors that abort a whole run.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TrackerError {
    /// Unread messages could not be listed, so there is nothing to process.
    #[error("Listing unread messages failed: {0}")]
    ListingFailed(#[from] SourceError),
}

/// Summary of one run.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RunReport {
    /// When the run started
    pub started_at: DateTime<Utc>,
    /// When the run finished
    pub finished_at: DateTime<Utc>,
    /// Messages listed as unread
    pub listed: usize,
    /// Orders created
    pub created: usize,
    /// Orders updated
    pub updated: usize,
    /// Records ignored as stale
    pub stale: usize,
    /// Messages that failed at some stage, in processing order
    pub failures: Vec<FailedMessage>,
}

impl RunReport {
    fn started(started_at: DateTime<Utc>, listed: usize) -> Self {
        Self {
            started_at,
            finished_at: started_at,
            listed,
            created: 0,
            updated: 0,
            stale: 0,
            failures: Vec::new(),
        }
    }

    /// Whether every listed message was processed.
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }

    /// Identifiers of the failed messages.
    #[must_use]
    pub fn failed_ids(&self) -> Vec<&MessageId> {
        self.failures.iter().map(|failure| &failure.id).collect()
    }

    fn record(&mut self, reconciliation: &Reconciliation) {
        match reconciliation {
            Reconciliation::Created => self.created += 1,
            Reconciliation::Updated { .. } => self.updated += 1,
            Reconciliation::Stale(_) => self.stale += 1,
        }
    }
}

/// Processes unread order emails into the order store.
///
/// All collaborators are injected; wrap them in the retrying decorators to
/// get bounded retry on every network call.
#[derive(Clone)]
pub struct OrderTracker {
    source: Arc<dyn EmailSource>,
    extractor: Arc<dyn OrderExtractor>,
    reconciler: Reconciler,
    clock: Arc<dyn Clock>,
}

impl OrderTracker {
    /// Creates a tracker from its collaborators.
    #[must_use]
    pub fn new(
        source: Arc<dyn EmailSource>,
        extractor: Arc<dyn OrderExtractor>,
        store: Arc<dyn OrderStore>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            source,
            extractor,
            reconciler: Reconciler::new(store),
            clock,
        }
    }

    /// Process every unread message once.
    ///
    /// Messages are handled sequentially; each reconciliation completes
    /// before the next message is decoded.
    ///
    /// # Errors
    ///
    /// Returns [`TrackerError::ListingFailed`] if unread messages cannot be
    /// listed. Per-message failures are reported in the [`RunReport`] instead.
    pub async fn run(&self) -> Result<RunReport, TrackerError> {
        let started_at = self.clock.now();
        tracing::info!("Run started");

        let ids = self.source.list_unread_message_ids().await?;
        let mut report = RunReport::started(started_at, ids.len());
        tracing::info!(count = ids.len(), "Unread messages listed");

        for id in ids {
            match self.process(&id).await {
                Ok(reconciliation) => report.record(&reconciliation),
                Err(error) => {
                    tracing::warn!(
                        message_id = %id,
                        stage = %error.stage(),
                        error = %error,
                        "Message failed"
                    );
                    report.failures.push(FailedMessage { id, error });
                }
            }
        }

        report.finished_at = self.clock.now();
        tracing::info!(
            created = report.created,
            updated = report.updated,
            stale = report.stale,
            failed = report.failures.len(),
            "Run completed"
        );
        if !report.is_clean() {
            let failed: Vec<String> = report.failures.iter().map(ToString::to_string).collect();
            tracing::error!(failed = ?failed, "Messages need manual follow-up");
        }

        Ok(report)
    }

    /// Run one message through decode → extract → reconcile.
    ///
    /// # Errors
    ///
    /// Returns the [`StageError`] of the first stage that failed.
    #[tracing::instrument(skip(self, id), fields(message_id = %id))]
    pub async fn process(&self, id: &MessageId) -> Result<Reconciliation, StageError> {
        tracing::info!("Processing message");

        let text = self
            .source
            .decode(id.clone())
            .await
            .map_err(StageError::Decode)?;
        let record = self
            .extractor
            .extract(text)
            .await
            .map_err(StageError::Extract)?;
        self.reconciler
            .reconcile(&record)
            .await
            .map_err(StageError::Reconcile)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use order_tracker_core::{OrderNumber, RecordError, ShipmentStatus};
    use order_tracker_testing::fixtures::{record, shipped_record};
    use order_tracker_testing::mocks::{
        InMemoryOrderStore, ScriptedEmailSource, ScriptedExtractor, test_clock,
    };

    fn tracker(
        source: ScriptedEmailSource,
        extractor: ScriptedExtractor,
        store: &Arc<InMemoryOrderStore>,
    ) -> OrderTracker {
        OrderTracker::new(
            Arc::new(source),
            Arc::new(extractor),
            store.clone(),
            Arc::new(test_clock()),
        )
    }

    #[tokio::test]
    async fn failures_do_not_stop_later_messages() {
        let source = ScriptedEmailSource::new()
            .with_message("m1", "order A100 confirmed")
            .with_decode_error(
                "m2",
                SourceError::Undecodable {
                    id: MessageId::new("m2"),
                    reason: "no text part".to_string(),
                },
            )
            .with_message("m3", "newsletter")
            .with_message("m4", "order A100 shipped");
        let extractor = ScriptedExtractor::new()
            .with_record_for(
                "order A100 confirmed",
                record("A100", ShipmentStatus::Confirmed, "01/01/24"),
            )
            .with_error_for(
                "newsletter",
                ExtractError::InvalidRecord(RecordError::MissingNumber),
            )
            .with_record_for("order A100 shipped", shipped_record("A100"));
        let store = Arc::new(InMemoryOrderStore::new());

        let report = tracker(source, extractor, &store).run().await.unwrap();

        assert_eq!(report.listed, 4);
        assert_eq!(report.created, 1);
        assert_eq!(report.updated, 1);
        assert_eq!(report.stale, 0);
        assert_eq!(
            report.failed_ids(),
            vec![&MessageId::new("m2"), &MessageId::new("m3")]
        );
        assert_eq!(report.failures[0].error.stage(), Stage::Decode);
        assert_eq!(report.failures[1].error.stage(), Stage::Extract);

        let shipment = store.shipment(&OrderNumber::new("A100")).unwrap();
        assert_eq!(shipment.status, ShipmentStatus::Shipped);
    }

    #[tokio::test]
    async fn listing_failure_aborts_the_run() {
        let source = ScriptedEmailSource::new().with_message("m1", "order");
        source.fail_next_listing(SourceError::Unavailable("connection refused".to_string()));
        let store = Arc::new(InMemoryOrderStore::new());

        let result = tracker(source.clone(), ScriptedExtractor::new(), &store)
            .run()
            .await;

        assert!(matches!(result, Err(TrackerError::ListingFailed(_))));
        assert_eq!(source.decode_calls(), 0);
    }

    #[tokio::test]
    async fn lookup_timeout_is_reported_at_reconcile_stage() {
        let source = ScriptedEmailSource::new().with_message("m1", "order A100");
        let extractor = ScriptedExtractor::new()
            .with_record_for("order A100", record("A100", ShipmentStatus::Confirmed, "01/01/24"));
        let store = Arc::new(InMemoryOrderStore::new());
        store.fail_next_lookups(1);

        let report = tracker(source, extractor, &store).run().await.unwrap();

        assert_eq!(report.failures.len(), 1);
        assert!(matches!(
            report.failures[0].error,
            StageError::Reconcile(ReconcileError::CannotDetermineNovelty { .. })
        ));
        assert_eq!(store.write_calls(), 0);
    }

    #[tokio::test]
    async fn report_uses_injected_clock() {
        let store = Arc::new(InMemoryOrderStore::new());
        let report = tracker(ScriptedEmailSource::new(), ScriptedExtractor::new(), &store)
            .run()
            .await
            .unwrap();

        assert_eq!(report.started_at, test_clock().now());
        assert_eq!(report.finished_at, test_clock().now());
        assert!(report.is_clean());
        assert_eq!(report.listed, 0);
    }
}
