use std::time::{Duration, Instant};

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::checkpoint::{CheckpointStore, CheckpointTracker};
use crate::error::{ErrorKind, MigrateResult};
use crate::progress::{ProgressEvent, ProgressRenderer, ProgressSnapshot, ProgressState};
use crate::types::WorkMessage;
use crate::workers::base::join_error;
use crate::workers::producer::ProducerState;

/// Final view of the aggregator once it stopped.
#[derive(Debug, Clone)]
pub struct AggregatorReport {
    /// Totals at the time the aggregator stopped.
    pub snapshot: ProgressSnapshot,
    /// Last key persisted as the resume checkpoint during this run.
    pub watermark: Option<String>,
    /// Whether a failed item stopped the watermark from moving.
    pub frozen: bool,
}

/// Folds progress events into totals, renders them and moves the resume checkpoint.
///
/// It stops when every event sender is gone, or when a poll interval passes without events after
/// the producer finished and the work channel drained.
pub struct ProgressAggregator<K> {
    events_rx: mpsc::UnboundedReceiver<ProgressEvent>,
    // A sender is held only to inspect the queue length. It never sends.
    work_tx: async_channel::Sender<WorkMessage>,
    producer_state: ProducerState,
    renderer: Box<dyn ProgressRenderer>,
    checkpoint: K,
    poll: Duration,
    started_at: Instant,
}

impl<K> ProgressAggregator<K>
where
    K: CheckpointStore,
{
    /// Creates an aggregator over `events_rx`.
    ///
    /// `work_tx` is only inspected to know whether queued work remains and `producer_state` to know
    /// whether more work can arrive. Every `poll` without events the current totals are rendered
    /// again, so the rate keeps updating while workers are busy with large batches.
    pub fn new(
        events_rx: mpsc::UnboundedReceiver<ProgressEvent>,
        work_tx: async_channel::Sender<WorkMessage>,
        producer_state: ProducerState,
        renderer: Box<dyn ProgressRenderer>,
        checkpoint: K,
        poll: Duration,
        started_at: Instant,
    ) -> Self {
        Self {
            events_rx,
            work_tx,
            producer_state,
            renderer,
            checkpoint,
            poll,
            started_at,
        }
    }

    /// Spawns the aggregator onto the runtime.
    pub fn start(self) -> ProgressAggregatorHandle {
        let handle = tokio::spawn(self.run());

        ProgressAggregatorHandle { handle }
    }

    async fn run(mut self) -> AggregatorReport {
        let mut state = ProgressState::new(self.started_at);
        let mut tracker = CheckpointTracker::new();

        loop {
            match tokio::time::timeout(self.poll, self.events_rx.recv()).await {
                Ok(Some(event)) => {
                    self.apply(event, &mut state, &mut tracker).await;
                }
                Ok(None) => {
                    debug!("all progress senders are gone");
                    break;
                }
                Err(_) => {
                    if self.producer_state.is_finished() && self.work_tx.is_empty() {
                        debug!("producer finished and work channel drained");
                        break;
                    }
                    // Keeps the rate and elapsed time moving while nothing completes.
                    self.renderer.render(&state.snapshot());
                }
            }
        }

        let snapshot = state.snapshot();
        self.renderer.finish(&snapshot);

        AggregatorReport {
            snapshot,
            watermark: tracker.watermark().map(str::to_string),
            frozen: tracker.is_frozen(),
        }
    }

    async fn apply(
        &mut self,
        event: ProgressEvent,
        state: &mut ProgressState,
        tracker: &mut CheckpointTracker,
    ) {
        match event {
            ProgressEvent::Produced { total } => {
                state.set_produced(total);
                self.renderer.render(&state.snapshot());
            }
            ProgressEvent::Progress {
                worker_id,
                applied,
                skipped,
            } => {
                state.set_worker(worker_id, applied, skipped);
                self.renderer.render(&state.snapshot());
            }
            ProgressEvent::ItemQueued { last_key } => {
                tracker.item_queued(last_key);
            }
            ProgressEvent::ItemFinished { last_key, failed } => {
                let was_frozen = tracker.is_frozen();
                let advanced = tracker.item_finished(last_key, failed).map(str::to_string);

                match advanced {
                    Some(watermark) => {
                        if let Err(err) = self.checkpoint.store(&watermark).await {
                            warn!(error = %err, %watermark, "failed to store checkpoint");
                        }
                    }
                    None if !was_frozen && tracker.is_frozen() => {
                        info!(
                            watermark = ?tracker.watermark(),
                            "a batch failed, checkpoint will not advance further in this run"
                        );
                    }
                    None => {}
                }
            }
        }
    }
}

/// Handle to the spawned aggregator task.
#[derive(Debug)]
pub struct ProgressAggregatorHandle {
    handle: JoinHandle<AggregatorReport>,
}

impl ProgressAggregatorHandle {
    /// Waits for the aggregator to stop and returns its final report.
    ///
    /// # Errors
    ///
    /// Returns [`ErrorKind::AggregatorPanic`] when the task panicked or was cancelled.
    pub async fn wait(self) -> MigrateResult<AggregatorReport> {
        self.handle
            .await
            .map_err(|err| join_error(ErrorKind::AggregatorPanic, "progress aggregator", err))
    }
}

#[cfg(test)]
mod tests {
    use tokio::sync::watch;

    use super::*;
    use crate::checkpoint::memory::MemoryCheckpointStore;
    use crate::progress::{MemoryRenderer, create_progress_channel};
    use crate::workers::producer::ProducerStats;

    fn finished_producer() -> (watch::Sender<ProducerStats>, ProducerState) {
        let (tx, rx) = watch::channel(ProducerStats {
            finished: true,
            ..ProducerStats::default()
        });
        (tx, ProducerState::new(rx))
    }

    #[tokio::test]
    async fn folds_events_and_advances_checkpoint_in_order() {
        let (progress_tx, events_rx) = create_progress_channel();
        let (work_tx, _work_rx) = async_channel::bounded(4);
        let (_producer_tx, producer_state) = finished_producer();
        let renderer = MemoryRenderer::new();
        let checkpoint = MemoryCheckpointStore::new();

        let aggregator = ProgressAggregator::new(
            events_rx,
            work_tx,
            producer_state,
            Box::new(renderer.clone()),
            checkpoint.clone(),
            Duration::from_millis(10),
            Instant::now(),
        )
        .start();

        progress_tx.emit(ProgressEvent::Produced { total: 4 });
        progress_tx.emit(ProgressEvent::ItemQueued { last_key: "b".into() });
        progress_tx.emit(ProgressEvent::ItemQueued { last_key: "d".into() });
        progress_tx.emit(ProgressEvent::ItemFinished {
            last_key: "d".into(),
            failed: false,
        });
        progress_tx.emit(ProgressEvent::Progress {
            worker_id: 1,
            applied: 2,
            skipped: 0,
        });
        progress_tx.emit(ProgressEvent::ItemFinished {
            last_key: "b".into(),
            failed: false,
        });
        progress_tx.emit(ProgressEvent::Progress {
            worker_id: 0,
            applied: 1,
            skipped: 1,
        });
        drop(progress_tx);

        let report = aggregator.wait().await.unwrap();

        assert_eq!(report.snapshot.produced, 4);
        assert_eq!(report.snapshot.applied, 3);
        assert_eq!(report.snapshot.skipped, 1);
        assert_eq!(report.watermark.as_deref(), Some("d"));
        assert!(!report.frozen);
        assert_eq!(checkpoint.history().await, vec!["d".to_string()]);
        assert!(!renderer.lines().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn stops_on_timeout_once_producer_is_done_and_queue_is_empty() {
        let (progress_tx, events_rx) = create_progress_channel();
        let (work_tx, _work_rx) = async_channel::bounded(4);
        let (_producer_tx, producer_state) = finished_producer();

        let aggregator = ProgressAggregator::new(
            events_rx,
            work_tx,
            producer_state,
            Box::new(MemoryRenderer::new()),
            MemoryCheckpointStore::new(),
            Duration::from_millis(100),
            Instant::now(),
        )
        .start();

        // The sender stays alive, only the timeout path can end the loop.
        let report = aggregator.wait().await.unwrap();
        assert_eq!(report.snapshot.produced, 0);
        drop(progress_tx);
    }

    #[tokio::test(start_paused = true)]
    async fn keeps_running_while_items_are_queued() {
        let (progress_tx, events_rx) = create_progress_channel();
        let (work_tx, work_rx) = async_channel::bounded(4);
        let (_producer_tx, producer_state) = finished_producer();
        work_tx.send(WorkMessage::Sentinel).await.unwrap();

        let aggregator = ProgressAggregator::new(
            events_rx,
            work_tx,
            producer_state,
            Box::new(MemoryRenderer::new()),
            MemoryCheckpointStore::new(),
            Duration::from_millis(100),
            Instant::now(),
        )
        .start();

        tokio::time::sleep(Duration::from_millis(500)).await;
        assert!(!aggregator.handle.is_finished());

        work_rx.recv().await.unwrap();
        aggregator.wait().await.unwrap();
        drop(progress_tx);
    }
}
