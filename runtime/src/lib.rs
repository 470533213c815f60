//! # Order Tracker Runtime
//!
//! The reconciliation engine and run orchestrator.
//!
//! ## Core Components
//!
//! - **[`Reconciler`]**: decides create-vs-update for one record, rejects stale
//!   records and writes minimal partial updates to both collections
//! - **[`OrderTracker`]**: iterates unread emails through decode → extract →
//!   reconcile and collects per-message failures into a [`RunReport`]
//! - **Retry**: one [`RetryPolicy`] applied uniformly through the
//!   [`RetryingStore`], [`RetryingSource`] and [`RetryingExtractor`] decorators
//!
//! ## Example
//!
//! ```ignore
//! use order_tracker_runtime::{OrderTracker, RetryPolicy, RetryingStore};
//!
//! let policy = RetryPolicy::default();
//! let store = Arc::new(RetryingStore::new(postgres_store, policy.clone()));
//! let tracker = OrderTracker::new(source, extractor, store, Arc::new(SystemClock));
//!
//! let report = tracker.run().await?;
//! println!("{} created, {} failed", report.created, report.failures.len());
//! ```

/// Reconciliation of extracted records into the order store
pub mod reconcile;

/// Bounded retry with optional backoff
pub mod retry;

/// Retrying decorators for the collaborator traits
pub mod retrying;

/// Run orchestration over unread emails
pub mod tracker;

pub use reconcile::{
    Collection, ReconcileError, Reconciler, Reconciliation, StaleReason, WriteFailure,
};
pub use retry::{RetryPolicy, retry_with_backoff, retry_with_predicate};
pub use retrying::{RetryingExtractor, RetryingSource, RetryingStore};
pub use tracker::{FailedMessage, OrderTracker, RunReport, Stage, StageError, TrackerError};
