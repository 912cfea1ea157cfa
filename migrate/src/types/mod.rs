//! Common types used throughout the migration pipeline.
//!
//! Source documents enter as [`SourceRecord`]s made of dynamically typed [`SourceValue`]s, travel
//! to workers grouped in [`WorkItem`]s and leave as typed [`SinkRow`]s.

mod outcome;
mod sink_row;
mod source_value;
mod work;

pub use outcome::*;
pub use sink_row::*;
pub use source_value::*;
pub use work::*;
