use std::collections::BTreeMap;
use std::time::{Duration, Instant};

/// Totals derived from the latest cumulative counts of every reporter.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProgressSnapshot {
    /// Records fetched from the source.
    pub produced: u64,
    /// Rows the sink confirmed.
    pub applied: u64,
    /// Records without an identifier plus rows of rejected batches.
    pub skipped: u64,
    /// `(applied, skipped)` per worker id.
    pub workers: BTreeMap<usize, (u64, u64)>,
    pub elapsed: Duration,
}

impl ProgressSnapshot {
    /// Applied rows per second since the start.
    pub fn rate(&self) -> f64 {
        let seconds = self.elapsed.as_secs_f64();
        if seconds > 0.0 {
            self.applied as f64 / seconds
        } else {
            0.0
        }
    }
}

/// Running aggregate owned by the aggregator.
///
/// Reports are cumulative, so each one replaces the previous value instead of being added.
#[derive(Debug)]
pub struct ProgressState {
    started_at: Instant,
    produced: u64,
    workers: BTreeMap<usize, (u64, u64)>,
}

impl ProgressState {
    /// Creates an empty aggregate.
    ///
    /// Elapsed time and the row rate are measured from `started_at`, which the pipeline takes before
    /// any task is spawned.
    pub fn new(started_at: Instant) -> Self {
        Self {
            started_at,
            produced: 0,
            workers: BTreeMap::new(),
        }
    }

    /// Replaces the number of records fetched from the source.
    pub fn set_produced(&mut self, total: u64) {
        self.produced = total;
    }

    /// Replaces the cumulative counts of `worker_id`.
    ///
    /// A worker id seen for the first time is added. Counts are never added to the previous report,
    /// so a report that arrives twice does not inflate the totals.
    pub fn set_worker(&mut self, worker_id: usize, applied: u64, skipped: u64) {
        self.workers.insert(worker_id, (applied, skipped));
    }

    /// Sums the latest report of every worker into a [`ProgressSnapshot`].
    pub fn snapshot(&self) -> ProgressSnapshot {
        let (applied, skipped) = self
            .workers
            .values()
            .fold((0, 0), |(applied, skipped), (a, s)| (applied + a, skipped + s));

        ProgressSnapshot {
            produced: self.produced,
            applied,
            skipped,
            workers: self.workers.clone(),
            elapsed: self.started_at.elapsed(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cumulative_reports_replace_previous_values() {
        let mut state = ProgressState::new(Instant::now());

        state.set_produced(1000);
        state.set_produced(2000);
        state.set_worker(0, 100, 5);
        state.set_worker(1, 50, 0);
        state.set_worker(0, 400, 7);

        let snapshot = state.snapshot();
        assert_eq!(snapshot.produced, 2000);
        assert_eq!(snapshot.applied, 450);
        assert_eq!(snapshot.skipped, 7);
        assert_eq!(snapshot.workers.get(&0), Some(&(400, 7)));
    }

    #[test]
    fn rate_is_zero_before_time_passes() {
        let snapshot = ProgressSnapshot {
            applied: 10,
            ..ProgressSnapshot::default()
        };

        assert_eq!(snapshot.rate(), 0.0);
    }
}
