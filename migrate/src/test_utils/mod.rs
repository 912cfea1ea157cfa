//! Builders shared by unit and integration tests.
//!
//! Available in this crate's tests and, through the `test-utils` feature, in the integration tests.

pub mod database;
pub mod pipeline;
pub mod record;
pub mod schema;
