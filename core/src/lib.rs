//! # Order Tracker Core
//!
//! Domain types and collaborator traits for the order tracker.
//!
//! The tracker reads order-confirmation emails, extracts a structured
//! [`OrderRecord`](order::OrderRecord) from each one, and reconciles it into
//! two persisted collections (order-details and order-shipment) so that
//! state only ever moves forward.
//!
//! ## Collaborators
//!
//! Every side effect sits behind a dyn-compatible trait:
//!
//! - [`EmailSource`](source::EmailSource): lists and decodes unread messages
//! - [`OrderExtractor`](extract::OrderExtractor): email text to order record
//! - [`OrderStore`](store::OrderStore): the two collections
//! - [`Clock`](environment::Clock): wall time for run reports
//!
//! Production implementations live in the `order-tracker-gmail`,
//! `order-tracker-anthropic` and `order-tracker-postgres` crates; in-memory
//! ones live in `order-tracker-testing`.

pub mod extract;
pub mod filter;
pub mod order;
pub mod source;
pub mod store;

pub use extract::{ExtractError, OrderExtractor};
pub use filter::{ShipmentField, ShipmentFilter};
pub use order::{
    Carrier, DetailsDelta, DetailsEntry, Known, OrderItem, OrderNumber, OrderRecord, RecordError,
    ShipmentDelta, ShipmentEntry, ShipmentStatus, TrackingAssignment,
};
pub use source::{EmailSource, MessageId, SourceError};
pub use store::{OrderStore, StoreError, WriteOutcome};

/// Environment module - injected dependencies that are not collaborators
pub mod environment {
    use chrono::{DateTime, Utc};

    /// Clock trait - abstracts time operations for testability
    ///
    /// # Examples
    ///
    /// ```
    /// use order_tracker_core::environment::{Clock, SystemClock};
    ///
    /// let clock = SystemClock;
    /// let started = clock.now();
    /// assert!(clock.now() >= started);
    /// ```
    pub trait Clock: Send + Sync {
        /// Get the current time
        fn now(&self) -> DateTime<Utc>;
    }

    /// Production clock backed by the system time.
    #[derive(Clone, Copy, Debug, Default)]
    pub struct SystemClock;

    impl Clock for SystemClock {
        fn now(&self) -> DateTime<Utc> {
            Utc::now()
        }
    }
}
