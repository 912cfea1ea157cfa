//! Progress reporting.
//!
//! The producer and the workers report cumulative counts as [`ProgressEvent`]s on an unbounded
//! channel. The [`ProgressAggregator`] is the only owner of the combined totals: it renders the
//! progress line and advances the resume checkpoint. Events are advisory, losing one only makes the
//! display lag.

mod aggregator;
mod event;
mod render;
mod state;

pub use aggregator::{AggregatorReport, ProgressAggregator, ProgressAggregatorHandle};
pub use event::{ProgressEvent, ProgressTx, create_progress_channel};
pub use render::{MemoryRenderer, ProgressRenderer, TerminalRenderer, format_progress_line};
pub use state::{ProgressSnapshot, ProgressState};
