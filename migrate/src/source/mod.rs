//! Cursor paginated document sources.

mod base;
pub mod memory;
pub mod postgres;

pub use base::DocumentSource;
