//! # Order Tracker
//!
//! Reads unread order-confirmation emails from Gmail, extracts each order
//! with Claude, and reconciles it into the `PostgreSQL` order store.
//!
//! The binary (`order-tracker`) is a thin shell over this library:
//!
//! - [`config`]: environment-variable configuration
//! - [`logging`]: console and optional daily-file tracing output
//! - [`cli`]: subcommands
//! - [`app`]: collaborator wiring and command implementations

pub mod app;
pub mod cli;
pub mod config;
pub mod logging;
