//! # Order Tracker Testing
//!
//! Testing utilities for the order tracker.
//!
//! This crate provides:
//! - In-memory implementations of the collaborator traits, with failure injection
//! - Record and entry fixtures
//! - proptest strategies for domain types
//!
//! ## Example
//!
//! ```ignore
//! use order_tracker_testing::fixtures::record;
//! use order_tracker_testing::mocks::InMemoryOrderStore;
//! use order_tracker_runtime::Reconciler;
//!
//! #[tokio::test]
//! async fn creates_unseen_order() {
//!     let store = Arc::new(InMemoryOrderStore::new());
//!     let reconciler = Reconciler::new(store.clone());
//!
//!     reconciler.reconcile(&record("A100", ShipmentStatus::Confirmed, "01/01/24")).await?;
//!
//!     assert_eq!(store.shipment_count(), 1);
//! }
//! ```

mod collaborator_mocks;
mod store_mocks;

use chrono::{DateTime, Utc};
use order_tracker_core::environment::Clock;

/// Mock implementations for testing.
pub mod mocks {
    use super::{Clock, DateTime, Utc};

    pub use crate::collaborator_mocks::{ScriptedEmailSource, ScriptedExtractor};
    pub use crate::store_mocks::InMemoryOrderStore;

    /// Fixed clock for deterministic tests
    ///
    /// Always returns the same time, making tests reproducible.
    ///
    /// # Example
    ///
    /// ```
    /// use order_tracker_testing::mocks::FixedClock;
    /// use order_tracker_core::environment::Clock;
    /// use chrono::Utc;
    ///
    /// let clock = FixedClock::new(Utc::now());
    /// assert_eq!(clock.now(), clock.now());
    /// ```
    #[derive(Debug, Clone)]
    pub struct FixedClock {
        time: DateTime<Utc>,
    }

    impl FixedClock {
        /// Create a new fixed clock with the given time
        #[must_use]
        pub const fn new(time: DateTime<Utc>) -> Self {
            Self { time }
        }
    }

    impl Clock for FixedClock {
        fn now(&self) -> DateTime<Utc> {
            self.time
        }
    }

    /// Create a default fixed clock for tests (2025-01-01 00:00:00 UTC)
    ///
    /// # Panics
    ///
    /// Never in practice: the timestamp is a literal.
    #[must_use]
    #[allow(clippy::expect_used)]
    pub fn test_clock() -> FixedClock {
        FixedClock::new(
            DateTime::parse_from_rfc3339("2025-01-01T00:00:00Z")
                .expect("hardcoded timestamp should always parse")
                .with_timezone(&Utc),
        )
    }
}

/// Record and entry builders.
pub mod fixtures {
    #![allow(clippy::expect_used)]
    #![allow(clippy::missing_panics_doc)]

    use chrono::NaiveDate;
    use order_tracker_core::order::parse_order_date;
    use order_tracker_core::{Carrier, Known, OrderItem, OrderNumber, OrderRecord, ShipmentStatus};

    /// UPS tracking number used across scenarios.
    pub const UPS_TRACKING: &str = "1Z9999999999999999";

    /// FedEx tracking number used across scenarios.
    pub const FEDEX_TRACKING: &str = "123456789012";

    /// Parse an `mm/dd/yy` literal.
    #[must_use]
    pub fn date(mdy: &str) -> NaiveDate {
        parse_order_date(mdy).expect("fixture dates are valid")
    }

    /// A record without tracking information.
    #[must_use]
    pub fn record(number: &str, status: ShipmentStatus, mdy: &str) -> OrderRecord {
        OrderRecord {
            brand: "Patagonia".to_string(),
            number: OrderNumber::new(number),
            date: date(mdy),
            total: "$89.00".to_string(),
            status,
            tracking_number: Known::Unknown,
            carrier: Carrier::Unknown,
            items: vec![OrderItem::new("Better Sweater", "Navy", "L", "1")],
        }
    }

    /// A record carrying a tracking number.
    #[must_use]
    pub fn tracked_record(
        number: &str,
        status: ShipmentStatus,
        mdy: &str,
        tracking: &str,
        carrier: Carrier,
    ) -> OrderRecord {
        OrderRecord {
            tracking_number: Known::new(tracking),
            carrier,
            ..record(number, status, mdy)
        }
    }

    /// A shipped UPS record dated 01/03/24.
    #[must_use]
    pub fn shipped_record(number: &str) -> OrderRecord {
        tracked_record(
            number,
            ShipmentStatus::Shipped,
            "01/03/24",
            UPS_TRACKING,
            Carrier::Ups,
        )
    }
}

/// Property-based testing utilities using proptest.
pub mod properties {
    use chrono::{Days, NaiveDate};
    use order_tracker_core::{
        Carrier, Known, OrderItem, OrderNumber, OrderRecord, ShipmentEntry, ShipmentStatus,
    };
    use proptest::prelude::*;

    /// Any shipment status.
    pub fn status() -> impl Strategy<Value = ShipmentStatus> {
        prop::sample::select(ShipmentStatus::ALL.to_vec())
    }

    /// A date within 2024.
    pub fn order_date() -> impl Strategy<Value = NaiveDate> {
        (0u64..366).prop_map(|offset| {
            NaiveDate::from_ymd_opt(2024, 1, 1)
                .and_then(|start| start.checked_add_days(Days::new(offset)))
                .unwrap_or_default()
        })
    }

    /// Tracking number and its carrier, or unknown for both.
    pub fn tracking() -> impl Strategy<Value = (Known, Carrier)> {
        prop_oneof![
            Just((Known::Unknown, Carrier::Unknown)),
            "[0-9]{12}".prop_map(|n| (Known::new(n), Carrier::Fedex)),
            "[0-9A-Z]{16}".prop_map(|n| (Known::new(format!("1Z{n}")), Carrier::Ups)),
        ]
    }

    /// A record for `number` with arbitrary date, status and tracking.
    pub fn record_for(number: &'static str) -> impl Strategy<Value = OrderRecord> {
        (order_date(), status(), tracking(), "[A-Za-z ]{1,12}").prop_map(
            move |(date, status, (tracking_number, carrier), brand)| OrderRecord {
                brand,
                number: OrderNumber::new(number),
                date,
                total: "$10.00".to_string(),
                status,
                tracking_number,
                carrier,
                items: vec![OrderItem::new("Tee", "White", "M", "1")],
            },
        )
    }

    /// A stored shipment entry for `number`.
    pub fn shipment_entry(number: &'static str) -> impl Strategy<Value = ShipmentEntry> {
        record_for(number).prop_map(|record| ShipmentEntry::from_record(&record))
    }
}

// Re-export commonly used items
pub use mocks::{FixedClock, InMemoryOrderStore, test_clock};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixed_clock() {
        let clock = test_clock();
        assert_eq!(clock.now(), clock.now());
    }
}
