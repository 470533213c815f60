//! In-memory order store with failure injection.
//!
//! [`InMemoryOrderStore`] keeps both collections in `BTreeMap`s (so filter
//! results come back ordered by number) and lets tests script transient
//! failures for lookups and writes.

#![allow(clippy::unwrap_used)] // Test infrastructure uses unwrap for simplicity
#![allow(clippy::missing_panics_doc)] // Lock poisoning only happens after a test already panicked

use order_tracker_core::store::StoreFuture;
use order_tracker_core::{
    DetailsDelta, DetailsEntry, Known, OrderNumber, OrderStore, ShipmentDelta, ShipmentEntry,
    ShipmentFilter, StoreError, WriteOutcome,
};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, RwLock};

/// In-memory order store for fast, deterministic testing.
///
/// Clones share the same underlying collections.
///
/// # Example
///
/// ```
/// use order_tracker_testing::mocks::InMemoryOrderStore;
/// use order_tracker_testing::fixtures::shipped_record;
/// use order_tracker_core::{DetailsEntry, OrderStore, WriteOutcome};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let store = InMemoryOrderStore::new();
/// let entry = DetailsEntry::from_record(&shipped_record("A100"));
///
/// assert_eq!(store.insert_details(entry.clone()).await?, WriteOutcome::Applied);
/// assert_eq!(store.insert_details(entry).await?, WriteOutcome::NotApplied);
/// # Ok(())
/// # }
/// ```
#[derive(Clone, Debug, Default)]
pub struct InMemoryOrderStore {
    details: Arc<RwLock<BTreeMap<OrderNumber, DetailsEntry>>>,
    shipments: Arc<RwLock<BTreeMap<OrderNumber, ShipmentEntry>>>,
    failing_lookups: Arc<AtomicUsize>,
    failing_writes: Arc<AtomicUsize>,
    lookup_calls: Arc<AtomicUsize>,
    write_calls: Arc<AtomicUsize>,
}

impl InMemoryOrderStore {
    /// Create a new empty in-memory store
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next `n` lookups fail with [`StoreError::Timeout`].
    pub fn fail_next_lookups(&self, n: usize) {
        self.failing_lookups.store(n, Ordering::SeqCst);
    }

    /// Make the next `n` writes fail with [`StoreError::Unavailable`].
    pub fn fail_next_writes(&self, n: usize) {
        self.failing_writes.store(n, Ordering::SeqCst);
    }

    /// Number of `find_shipment_by_number` calls so far.
    #[must_use]
    pub fn lookup_calls(&self) -> usize {
        self.lookup_calls.load(Ordering::SeqCst)
    }

    /// Number of insert/update/transshipment calls so far (including failed ones).
    #[must_use]
    pub fn write_calls(&self) -> usize {
        self.write_calls.load(Ordering::SeqCst)
    }

    /// Insert a details entry directly, bypassing failure injection.
    pub fn seed_details(&self, entry: DetailsEntry) {
        self.details
            .write()
            .unwrap()
            .insert(entry.number.clone(), entry);
    }

    /// Insert a shipment entry directly, bypassing failure injection.
    pub fn seed_shipment(&self, entry: ShipmentEntry) {
        self.shipments
            .write()
            .unwrap()
            .insert(entry.number.clone(), entry);
    }

    /// Current details entry for `number`.
    #[must_use]
    pub fn details(&self, number: &OrderNumber) -> Option<DetailsEntry> {
        self.details.read().unwrap().get(number).cloned()
    }

    /// Current shipment entry for `number`.
    #[must_use]
    pub fn shipment(&self, number: &OrderNumber) -> Option<ShipmentEntry> {
        self.shipments.read().unwrap().get(number).cloned()
    }

    /// Number of details entries
    #[must_use]
    pub fn details_count(&self) -> usize {
        self.details.read().unwrap().len()
    }

    /// Number of shipment entries
    #[must_use]
    pub fn shipment_count(&self) -> usize {
        self.shipments.read().unwrap().len()
    }

    /// Clear both collections and all counters (for test isolation)
    pub fn clear(&self) {
        self.details.write().unwrap().clear();
        self.shipments.write().unwrap().clear();
        for counter in [
            &self.failing_lookups,
            &self.failing_writes,
            &self.lookup_calls,
            &self.write_calls,
        ] {
            counter.store(0, Ordering::SeqCst);
        }
    }

    fn take_failure(counter: &AtomicUsize) -> bool {
        counter
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }

    fn begin_write(&self) -> Result<(), StoreError> {
        self.write_calls.fetch_add(1, Ordering::SeqCst);
        if Self::take_failure(&self.failing_writes) {
            return Err(StoreError::Unavailable("injected write failure".to_string()));
        }
        Ok(())
    }

    fn insert<V>(map: &RwLock<BTreeMap<OrderNumber, V>>, number: OrderNumber, value: V) -> WriteOutcome {
        let mut map = map.write().unwrap();
        if map.contains_key(&number) {
            return WriteOutcome::NotApplied;
        }
        map.insert(number, value);
        WriteOutcome::Applied
    }

    fn modify<V>(
        map: &RwLock<BTreeMap<OrderNumber, V>>,
        number: &OrderNumber,
        apply: impl FnOnce(&mut V),
    ) -> WriteOutcome {
        match map.write().unwrap().get_mut(number) {
            Some(value) => {
                apply(value);
                WriteOutcome::Applied
            }
            None => WriteOutcome::NotApplied,
        }
    }
}

impl OrderStore for InMemoryOrderStore {
    fn find_shipment_by_number(
        &self,
        number: OrderNumber,
    ) -> StoreFuture<'_, Option<ShipmentEntry>> {
        self.lookup_calls.fetch_add(1, Ordering::SeqCst);
        let result = if Self::take_failure(&self.failing_lookups) {
            Err(StoreError::Timeout("injected lookup timeout".to_string()))
        } else {
            Ok(self.shipment(&number))
        };
        Box::pin(std::future::ready(result))
    }

    fn insert_details(&self, entry: DetailsEntry) -> StoreFuture<'_, WriteOutcome> {
        let result = self
            .begin_write()
            .map(|()| Self::insert(&self.details, entry.number.clone(), entry));
        Box::pin(std::future::ready(result))
    }

    fn insert_shipment(&self, entry: ShipmentEntry) -> StoreFuture<'_, WriteOutcome> {
        let result = self
            .begin_write()
            .map(|()| Self::insert(&self.shipments, entry.number.clone(), entry));
        Box::pin(std::future::ready(result))
    }

    fn update_details(
        &self,
        number: OrderNumber,
        delta: DetailsDelta,
    ) -> StoreFuture<'_, WriteOutcome> {
        let result = self
            .begin_write()
            .map(|()| Self::modify(&self.details, &number, |entry| delta.apply_to(entry)));
        Box::pin(std::future::ready(result))
    }

    fn update_shipment(
        &self,
        number: OrderNumber,
        delta: ShipmentDelta,
    ) -> StoreFuture<'_, WriteOutcome> {
        let result = self
            .begin_write()
            .map(|()| Self::modify(&self.shipments, &number, |entry| delta.apply_to(entry)));
        Box::pin(std::future::ready(result))
    }

    fn find_shipments_by_filter(
        &self,
        filter: ShipmentFilter,
    ) -> StoreFuture<'_, Vec<ShipmentEntry>> {
        let matches = self
            .shipments
            .read()
            .unwrap()
            .values()
            .filter(|entry| filter.matches(entry))
            .cloned()
            .collect();
        Box::pin(std::future::ready(Ok(matches)))
    }

    fn set_transshipment(
        &self,
        number: OrderNumber,
        trans_carrier: Known,
        package_number: Known,
    ) -> StoreFuture<'_, WriteOutcome> {
        let result = self.begin_write().map(|()| {
            Self::modify(&self.shipments, &number, |entry| {
                entry.set_transshipment(trans_carrier, package_number);
            })
        });
        Box::pin(std::future::ready(result))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::{record, shipped_record};
    use order_tracker_core::ShipmentStatus;

    #[tokio::test]
    async fn updates_report_not_applied_for_missing_entries() {
        let store = InMemoryOrderStore::new();

        let outcome = store
            .update_details(
                OrderNumber::new("missing"),
                DetailsDelta {
                    status: Some(ShipmentStatus::Shipped),
                },
            )
            .await
            .unwrap();

        assert_eq!(outcome, WriteOutcome::NotApplied);
    }

    #[tokio::test]
    async fn filter_results_are_ordered_by_number() {
        let store = InMemoryOrderStore::new();
        for number in ["B2", "A1", "C3"] {
            store.seed_shipment(ShipmentEntry::from_record(&shipped_record(number)));
        }
        store.seed_shipment(ShipmentEntry::from_record(&record(
            "A0",
            ShipmentStatus::Confirmed,
            "01/01/24",
        )));

        let found = store
            .find_shipments_by_filter(ShipmentFilter::awaiting_transshipment())
            .await
            .unwrap();

        let numbers: Vec<_> = found.iter().map(|e| e.number.as_str()).collect();
        assert_eq!(numbers, vec!["A1", "B2", "C3"]);
    }

    #[tokio::test]
    async fn injected_failures_are_consumed() {
        let store = InMemoryOrderStore::new();
        store.fail_next_writes(1);
        let entry = DetailsEntry::from_record(&shipped_record("A1"));

        assert!(store.insert_details(entry.clone()).await.is_err());
        assert_eq!(
            store.insert_details(entry).await.unwrap(),
            WriteOutcome::Applied
        );
        assert_eq!(store.write_calls(), 2);

        store.clear();
        assert_eq!(store.details_count(), 0);
        assert_eq!(store.write_calls(), 0);
    }
}
