//! Order state reconciliation.
//!
//! [`Reconciler::reconcile`] decides whether an extracted record creates a new
//! order or updates an existing one, rejects stale records, and writes the
//! minimal partial update to both collections.
//!
//! The decision logic is split into pure functions ([`check_sequence`],
//! [`details_delta`], [`shipment_delta`]) so it can be tested without a store.
//!
//! # Concurrency
//!
//! Reconciliation is read-then-write with no compare-and-swap. Two runs
//! processing the same order concurrently can race between the lookup and the
//! write; the sequencing check is a best-effort guard, not a lock.

use chrono::NaiveDate;
use order_tracker_core::{
    DetailsDelta, DetailsEntry, OrderNumber, OrderRecord, OrderStore, RecordError, ShipmentDelta,
    ShipmentEntry, ShipmentStatus, StoreError, TrackingAssignment, WriteOutcome,
};
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

/// Which of the two collections a write targeted.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Collection {
    /// order-details
    Details,
    /// order-shipment
    Shipment,
}

impl fmt::Display for Collection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Details => f.write_str("order-details"),
            Self::Shipment => f.write_str("order-shipment"),
        }
    }
}

/// One failed write of a create or update pair.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WriteFailure {
    /// Collection the write targeted
    pub collection: Collection,
    /// Store error, or `None` if the store reported the write as not applied
    pub error: Option<StoreError>,
}

impl fmt::Display for WriteFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.error {
            Some(error) => write!(f, "{}: {error}", self.collection),
            None => write!(f, "{}: not applied", self.collection),
        }
    }
}

fn describe(failures: &[WriteFailure]) -> String {
    failures
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// Errors that can occur while reconciling one record.
///
/// None of these are corrected automatically. Partial writes are left in
/// place for an operator to inspect.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ReconcileError {
    /// The record cannot be reconciled (missing or unusable order number).
    #[error("Invalid record: {0}")]
    InvalidRecord(#[from] RecordError),

    /// The shipment lookup failed, so new-vs-existing is undecidable.
    #[error("Cannot determine whether order {number} is new: {source}")]
    CannotDetermineNovelty {
        /// Order being reconciled
        number: OrderNumber,
        /// Lookup failure
        source: StoreError,
    },

    /// At least one of the two inserts failed.
    #[error("Creating order {number} failed: {}", describe(.failures))]
    OrderCreationFailed {
        /// Order being created
        number: OrderNumber,
        /// Failed inserts (one or both)
        failures: Vec<WriteFailure>,
    },

    /// At least one of the two partial updates failed.
    #[error("Updating order {number} failed: {}", describe(.failures))]
    OrderUpdateFailed {
        /// Order being updated
        number: OrderNumber,
        /// Failed updates (one or both)
        failures: Vec<WriteFailure>,
    },
}

/// Why a record was ignored as stale.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StaleReason {
    /// The record date is before the stored last-update date.
    DateRegressed {
        /// Stored last-update date
        stored: NaiveDate,
        /// Record date
        incoming: NaiveDate,
    },
    /// The record status ranks below the stored status.
    StatusRegressed {
        /// Stored status
        stored: ShipmentStatus,
        /// Record status
        incoming: ShipmentStatus,
    },
}

impl fmt::Display for StaleReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DateRegressed { stored, incoming } => {
                write!(f, "date {incoming} is before last update {stored}")
            }
            Self::StatusRegressed { stored, incoming } => {
                write!(f, "status {incoming} ranks below stored status {stored}")
            }
        }
    }
}

/// Successful result of reconciling one record.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Reconciliation {
    /// Unseen order; both entries were inserted.
    Created,
    /// Existing order; partial updates were applied.
    Updated {
        /// Whether the details status was written
        details_changed: bool,
        /// Delta written to the shipment entry
        shipment: ShipmentDelta,
    },
    /// Existing order; the record is older than what is stored. Nothing was written.
    Stale(StaleReason),
}

/// Reject records that would move an order backwards.
///
/// Date and status are checked independently, each with strict less-than:
/// an equal date with a lower status is stale, and so is an earlier date
/// with a higher status.
///
/// # Errors
///
/// Returns the [`StaleReason`] for the first check that fails (date first).
pub fn check_sequence(stored: &ShipmentEntry, record: &OrderRecord) -> Result<(), StaleReason> {
    if record.date < stored.last_update {
        return Err(StaleReason::DateRegressed {
            stored: stored.last_update,
            incoming: record.date,
        });
    }
    if record.status.rank() < stored.status.rank() {
        return Err(StaleReason::StatusRegressed {
            stored: stored.status,
            incoming: record.status,
        });
    }
    Ok(())
}

/// Details delta: the status, only if it changed.
#[must_use]
pub fn details_delta(stored: &ShipmentEntry, record: &OrderRecord) -> DetailsDelta {
    DetailsDelta {
        status: (stored.status != record.status).then_some(record.status),
    }
}

/// Shipment delta for a record that passed [`check_sequence`].
///
/// The last-update date is always written. Tracking number and carrier are
/// written together, and only while the stored tracking number is unknown.
#[must_use]
pub fn shipment_delta(stored: &ShipmentEntry, record: &OrderRecord) -> ShipmentDelta {
    let tracking = (stored.tracking_number.is_unknown() && !record.tracking_number.is_unknown())
        .then(|| TrackingAssignment {
            tracking_number: record.tracking_number.clone(),
            carrier: record.carrier,
        });

    ShipmentDelta {
        last_update: record.date,
        status: (stored.status != record.status).then_some(record.status),
        tracking,
    }
}

/// Applies extracted order records to an [`OrderStore`].
#[derive(Clone)]
pub struct Reconciler {
    store: Arc<dyn OrderStore>,
}

impl Reconciler {
    /// Creates a reconciler over `store`.
    ///
    /// Wrap the store in a `RetryingStore` to get bounded retry on every call.
    #[must_use]
    pub fn new(store: Arc<dyn OrderStore>) -> Self {
        Self { store }
    }

    /// Reconcile one record into the store.
    ///
    /// # Errors
    ///
    /// - `InvalidRecord`: the order number is unusable
    /// - `CannotDetermineNovelty`: the shipment lookup failed; nothing was written
    /// - `OrderCreationFailed`: one or both inserts failed
    /// - `OrderUpdateFailed`: one or both partial updates failed or matched nothing
    #[tracing::instrument(skip(self, record), fields(number = %record.number))]
    pub async fn reconcile(&self, record: &OrderRecord) -> Result<Reconciliation, ReconcileError> {
        record.validate()?;

        let existing = self
            .store
            .find_shipment_by_number(record.number.clone())
            .await
            .map_err(|source| ReconcileError::CannotDetermineNovelty {
                number: record.number.clone(),
                source,
            })?;

        match existing {
            None => self.create(record).await,
            Some(stored) => self.update(&stored, record).await,
        }
    }

    async fn create(&self, record: &OrderRecord) -> Result<Reconciliation, ReconcileError> {
        let details = self
            .store
            .insert_details(DetailsEntry::from_record(record))
            .await;
        let shipment = self
            .store
            .insert_shipment(ShipmentEntry::from_record(record))
            .await;

        let failures = collect_failures(details, shipment);
        if !failures.is_empty() {
            return Err(ReconcileError::OrderCreationFailed {
                number: record.number.clone(),
                failures,
            });
        }

        tracing::info!(status = %record.status, "Order created");
        Ok(Reconciliation::Created)
    }

    async fn update(
        &self,
        stored: &ShipmentEntry,
        record: &OrderRecord,
    ) -> Result<Reconciliation, ReconcileError> {
        if let Err(reason) = check_sequence(stored, record) {
            tracing::info!(%reason, "Stale record ignored");
            return Ok(Reconciliation::Stale(reason));
        }

        let details = details_delta(stored, record);
        let shipment = shipment_delta(stored, record);
        let details_changed = !details.is_empty();

        let details_result = if details_changed {
            self.store
                .update_details(record.number.clone(), details)
                .await
        } else {
            Ok(WriteOutcome::Applied)
        };
        let shipment_result = self
            .store
            .update_shipment(record.number.clone(), shipment.clone())
            .await;

        let failures = collect_failures(details_result, shipment_result);
        if !failures.is_empty() {
            return Err(ReconcileError::OrderUpdateFailed {
                number: record.number.clone(),
                failures,
            });
        }

        tracing::info!(
            status = %record.status,
            details_changed,
            tracking_set = shipment.tracking.is_some(),
            "Order updated"
        );
        Ok(Reconciliation::Updated {
            details_changed,
            shipment,
        })
    }
}

fn collect_failures(
    details: Result<WriteOutcome, StoreError>,
    shipment: Result<WriteOutcome, StoreError>,
) -> Vec<WriteFailure> {
    [(Collection::Details, details), (Collection::Shipment, shipment)]
        .into_iter()
        .filter_map(|(collection, result)| match result {
            Ok(WriteOutcome::Applied) => None,
            Ok(WriteOutcome::NotApplied) => Some(WriteFailure {
                collection,
                error: None,
            }),
            Err(error) => Some(WriteFailure {
                collection,
                error: Some(error),
            }),
        })
        .collect()
}
