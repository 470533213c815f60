//! `PostgreSQL` order store for the order tracker.
//!
//! This crate provides [`PostgresOrderStore`], the production implementation
//! of the `OrderStore` trait from `order-tracker-core`. It uses sqlx and
//! supports:
//!
//! - Insert-if-absent for both collections (`ON CONFLICT DO NOTHING`)
//! - Partial updates that write only the fields in a delta
//! - Shipment filters compiled to parameterised SQL
//! - Per-query time bounds
//! - Embedded schema migrations
//!
//! # Example
//!
//! ```ignore
//! use order_tracker_postgres::PostgresOrderStore;
//!
//! async fn example() -> Result<(), Box<dyn std::error::Error>> {
//!     let store = PostgresOrderStore::connect("postgres://localhost/order_tracker", 5, Duration::from_secs(30)).await?;
//!     store.migrate().await?;
//!     Ok(())
//! }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod filter;
mod store;

pub use store::{DEFAULT_QUERY_TIMEOUT, PostgresOrderStore};
