//! Resume checkpoints.
//!
//! The checkpoint is the key of the last record known to be applied with every record before it.
//! A new run starts its cursor there.

mod base;
pub mod file;
pub mod memory;
mod tracker;

pub use base::CheckpointStore;
pub use tracker::CheckpointTracker;
