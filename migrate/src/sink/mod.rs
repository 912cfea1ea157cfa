//! Sinks that receive the transformed rows.
//!
//! The Postgres sink is used in production, the memory sink backs tests and the dry run wrapper
//! counts rows without writing them.

mod base;
pub mod dry_run;
pub mod memory;
pub mod postgres;
pub mod upsert;

pub use base::{SinkConnection, SinkConnector};
