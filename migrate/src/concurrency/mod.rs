//! Concurrency primitives shared by the producer, the workers and the aggregator.
//!
//! Producer and workers only meet at the bounded work channel. The only other shared state is the
//! shutdown signal defined here.

pub mod shutdown;
