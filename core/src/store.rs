//! Order store trait and related types.
//!
//! The order store holds two collections keyed by [`OrderNumber`]:
//! order-details and order-shipment. There are no cross-collection
//! transactions; the reconciler writes details first, then shipment.
//!
//! # Implementations
//!
//! - `PostgresOrderStore` (in `order-tracker-postgres`): Production implementation
//! - `InMemoryOrderStore` (in `order-tracker-testing`): Fast, deterministic testing

use crate::filter::ShipmentFilter;
use crate::order::{DetailsDelta, DetailsEntry, Known, OrderNumber, ShipmentDelta, ShipmentEntry};
use std::future::Future;
use std::pin::Pin;
use thiserror::Error;

/// Boxed future returned by [`OrderStore`] operations.
pub type StoreFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, StoreError>> + Send + 'a>>;

/// Errors that can occur during order store operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// The operation did not complete within the configured time bound.
    #[error("Store operation timed out: {0}")]
    Timeout(String),

    /// The store could not be reached (connection refused, pool exhausted, ...).
    #[error("Store unavailable: {0}")]
    Unavailable(String),

    /// The store rejected the query.
    #[error("Database error: {0}")]
    Database(String),

    /// A stored value could not be converted to or from the domain model.
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl StoreError {
    /// Whether retrying the same operation may succeed.
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        matches!(self, Self::Timeout(_) | Self::Unavailable(_))
    }
}

/// Whether a write changed the store.
///
/// Stores report this explicitly so callers never have to infer
/// success from the absence of an error.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WriteOutcome {
    /// The write was applied.
    Applied,
    /// The store accepted the request but changed nothing: an insert hit an
    /// existing key, or an update matched no entry.
    NotApplied,
}

impl WriteOutcome {
    /// Whether the write was applied.
    #[must_use]
    pub const fn is_applied(self) -> bool {
        matches!(self, Self::Applied)
    }
}

/// Persistence for order-details and order-shipment entries.
///
/// # Dyn Compatibility
///
/// This trait uses explicit `Pin<Box<dyn Future>>` returns instead of `async fn`
/// so it can be shared as `Arc<dyn OrderStore>` and wrapped by decorators.
pub trait OrderStore: Send + Sync {
    /// Look up the shipment entry for an order number.
    ///
    /// Returns `Ok(None)` when no entry exists. The lookup is bounded in time:
    /// an expired bound is reported as [`StoreError::Timeout`], never as "absent".
    ///
    /// # Errors
    ///
    /// - `Timeout`: The lookup did not complete in time
    /// - `Unavailable`/`Database`: The store could not answer
    fn find_shipment_by_number(
        &self,
        number: OrderNumber,
    ) -> StoreFuture<'_, Option<ShipmentEntry>>;

    /// Insert a new details entry.
    ///
    /// Returns [`WriteOutcome::NotApplied`] if an entry with the same number exists.
    ///
    /// # Errors
    ///
    /// Returns a [`StoreError`] if the store could not be written.
    fn insert_details(&self, entry: DetailsEntry) -> StoreFuture<'_, WriteOutcome>;

    /// Insert a new shipment entry.
    ///
    /// Returns [`WriteOutcome::NotApplied`] if an entry with the same number exists.
    ///
    /// # Errors
    ///
    /// Returns a [`StoreError`] if the store could not be written.
    fn insert_shipment(&self, entry: ShipmentEntry) -> StoreFuture<'_, WriteOutcome>;

    /// Apply a partial update to a details entry.
    ///
    /// Only the fields present in the delta are written. Returns
    /// [`WriteOutcome::NotApplied`] if no entry matches.
    ///
    /// # Errors
    ///
    /// Returns a [`StoreError`] if the store could not be written.
    fn update_details(
        &self,
        number: OrderNumber,
        delta: DetailsDelta,
    ) -> StoreFuture<'_, WriteOutcome>;

    /// Apply a partial update to a shipment entry.
    ///
    /// Only the fields present in the delta are written. Returns
    /// [`WriteOutcome::NotApplied`] if no entry matches.
    ///
    /// # Errors
    ///
    /// Returns a [`StoreError`] if the store could not be written.
    fn update_shipment(
        &self,
        number: OrderNumber,
        delta: ShipmentDelta,
    ) -> StoreFuture<'_, WriteOutcome>;

    /// Return all shipment entries matching a filter, ordered by number.
    ///
    /// # Errors
    ///
    /// Returns a [`StoreError`] if the store could not be queried.
    fn find_shipments_by_filter(
        &self,
        filter: ShipmentFilter,
    ) -> StoreFuture<'_, Vec<ShipmentEntry>>;

    /// Overwrite the transshipment leg of one shipment entry.
    ///
    /// Returns [`WriteOutcome::NotApplied`] if no entry matches.
    ///
    /// # Errors
    ///
    /// Returns a [`StoreError`] if the store could not be written.
    fn set_transshipment(
        &self,
        number: OrderNumber,
        trans_carrier: Known,
        package_number: Known,
    ) -> StoreFuture<'_, WriteOutcome>;
}
