use std::fmt;
use std::time::Duration;

/// Counts for one work item, reported exactly once whether the batch succeeded or not.
///
/// `attempted` is the size of the item. Every record ends up in `applied` or `skipped`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchOutcome {
    pub attempted: u64,
    pub applied: u64,
    pub skipped: u64,
}

impl BatchOutcome {
    pub fn all_skipped(attempted: u64) -> Self {
        Self {
            attempted,
            applied: 0,
            skipped: attempted,
        }
    }
}

/// Final accounting of a migration run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MigrationSummary {
    /// Records fetched from the source.
    pub produced: u64,
    pub applied: u64,
    pub skipped: u64,
    /// Batches rolled back because the sink rejected them.
    pub failed_batches: u64,
    /// Whether the run stopped on an interrupt instead of draining the source.
    pub interrupted: bool,
    pub elapsed: Duration,
}

impl MigrationSummary {
    /// Records that reached a worker and were accounted for.
    pub fn processed(&self) -> u64 {
        self.applied + self.skipped
    }
}

impl fmt::Display for MigrationSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "produced={} applied={} skipped={} failed_batches={} elapsed={:.1}s",
            self.produced,
            self.applied,
            self.skipped,
            self.failed_batches,
            self.elapsed.as_secs_f64()
        )?;

        if self.interrupted {
            write!(f, " (interrupted)")?;
        }

        Ok(())
    }
}
