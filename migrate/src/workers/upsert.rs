use std::sync::Arc;

use migrate_config::shared::PipelineConfig;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{Instrument, debug, info, info_span, warn};

use crate::concurrency::shutdown::ShutdownRx;
use crate::error::{ErrorKind, MigrateResult};
use crate::progress::{ProgressEvent, ProgressTx};
use crate::schema::TableSchema;
use crate::sink::SinkConnection;
use crate::sink::upsert::fold_duplicate_ids;
use crate::transform::transform;
use crate::types::{BatchOutcome, WorkItem, WorkMessage};
use crate::workers::base::{Worker, WorkerHandle, join_error};

/// Cumulative counters of one upsert worker.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UpsertWorkerStats {
    pub batches: u64,
    pub failed_batches: u64,
    pub applied: u64,
    pub skipped: u64,
}

impl UpsertWorkerStats {
    fn record(&mut self, outcome: BatchOutcome, failed: bool) {
        self.batches += 1;
        self.applied += outcome.applied;
        self.skipped += outcome.skipped;
        if failed {
            self.failed_batches += 1;
        }
    }
}

/// Read side of the counters one upsert worker publishes after every batch.
#[derive(Debug, Clone)]
pub struct UpsertWorkerState {
    worker_id: usize,
    rx: watch::Receiver<UpsertWorkerStats>,
}

impl UpsertWorkerState {
    /// Id of the worker, also used as the `worker_id` field of its logs.
    pub fn worker_id(&self) -> usize {
        self.worker_id
    }

    /// Latest counters published by the worker.
    pub fn stats(&self) -> UpsertWorkerStats {
        *self.rx.borrow()
    }
}

/// Handle to a spawned upsert worker.
#[derive(Debug)]
pub struct UpsertWorkerHandle {
    state: UpsertWorkerState,
    handle: Option<JoinHandle<()>>,
}

impl WorkerHandle for UpsertWorkerHandle {
    type State = UpsertWorkerState;

    fn state(&self) -> UpsertWorkerState {
        self.state.clone()
    }

    async fn wait(mut self) -> MigrateResult<()> {
        let Some(handle) = self.handle.take() else {
            return Ok(());
        };

        let task = format!("upsert worker {}", self.state.worker_id);
        handle
            .await
            .map_err(|err| join_error(ErrorKind::WorkerPanic, &task, err))
    }
}

/// Consumes work items, transforms their records and upserts them through its own connection.
///
/// A rejected batch is rolled back by the connection, counted as skipped and logged. The worker
/// keeps going with the next item. It exits on a sentinel, on a closed channel or on shutdown.
#[derive(Debug)]
pub struct UpsertWorker<C> {
    worker_id: usize,
    connection: C,
    schema: Arc<TableSchema>,
    config: Arc<PipelineConfig>,
    work_rx: async_channel::Receiver<WorkMessage>,
    progress_tx: ProgressTx,
    shutdown_rx: ShutdownRx,
}

impl<C> UpsertWorker<C> {
    /// Creates a worker that upserts through `connection`, which it owns for the whole run.
    pub fn new(
        worker_id: usize,
        connection: C,
        schema: Arc<TableSchema>,
        config: Arc<PipelineConfig>,
        work_rx: async_channel::Receiver<WorkMessage>,
        progress_tx: ProgressTx,
        shutdown_rx: ShutdownRx,
    ) -> Self {
        Self {
            worker_id,
            connection,
            schema,
            config,
            work_rx,
            progress_tx,
            shutdown_rx,
        }
    }
}

impl<C> Worker for UpsertWorker<C>
where
    C: SinkConnection,
{
    type Handle = UpsertWorkerHandle;

    async fn start(self) -> MigrateResult<UpsertWorkerHandle> {
        let worker_id = self.worker_id;
        debug!(worker_id, "starting upsert worker");

        let (state_tx, state_rx) = watch::channel(UpsertWorkerStats::default());
        let span = info_span!("upsert_worker", worker_id);
        let handle = tokio::spawn(self.run(state_tx).instrument(span));

        Ok(UpsertWorkerHandle {
            state: UpsertWorkerState {
                worker_id,
                rx: state_rx,
            },
            handle: Some(handle),
        })
    }
}

impl<C> UpsertWorker<C>
where
    C: SinkConnection,
{
    async fn run(mut self, state_tx: watch::Sender<UpsertWorkerStats>) {
        let batch_delay = self.config.batch_delay();
        let mut stats = UpsertWorkerStats::default();

        loop {
            let message = tokio::select! {
                biased;

                _ = self.shutdown_rx.wait() => {
                    info!("shutdown requested, upsert worker stopped");
                    break;
                }
                message = self.work_rx.recv() => message,
            };

            let item = match message {
                Ok(WorkMessage::Item(item)) => item,
                Ok(WorkMessage::Sentinel) => {
                    debug!("received sentinel");
                    break;
                }
                Err(_) => {
                    debug!("work channel closed");
                    break;
                }
            };

            let last_key = item.last_key().map(str::to_string);
            let (outcome, failed) = self.process_item(item).await;

            stats.record(outcome, failed);
            state_tx.send_replace(stats);

            self.progress_tx.emit(ProgressEvent::Progress {
                worker_id: self.worker_id,
                applied: stats.applied,
                skipped: stats.skipped,
            });
            if let Some(last_key) = last_key {
                self.progress_tx
                    .emit(ProgressEvent::ItemFinished { last_key, failed });
            }

            if !batch_delay.is_zero() {
                tokio::select! {
                    biased;

                    _ = self.shutdown_rx.wait() => {
                        info!("shutdown requested, upsert worker stopped");
                        break;
                    }
                    _ = tokio::time::sleep(batch_delay) => {}
                }
            }
        }

        info!(
            batches = stats.batches,
            applied = stats.applied,
            skipped = stats.skipped,
            failed_batches = stats.failed_batches,
            "upsert worker finished"
        );
    }

    /// Transforms and upserts one item. Returns the outcome and whether the sink rejected it.
    async fn process_item(&mut self, item: WorkItem) -> (BatchOutcome, bool) {
        let attempted = item.len() as u64;

        let mut rows = Vec::with_capacity(item.len());
        for record in &item.records {
            match transform(&self.schema, record) {
                Some(row) => rows.push(row),
                None => debug!(key = %record.key, "record has no identifier, skipping"),
            }
        }

        if rows.is_empty() {
            return (BatchOutcome::all_skipped(attempted), false);
        }

        let valid = rows.len() as u64;
        let (rows, folded) = fold_duplicate_ids(rows);
        if folded > 0 {
            debug!(folded, "merged records sharing an identifier");
        }

        match self.connection.upsert_batch(&self.schema, &rows).await {
            Ok(affected) => {
                let applied = (affected + folded).min(valid);
                let outcome = BatchOutcome {
                    attempted,
                    applied,
                    skipped: attempted - applied,
                };

                (outcome, false)
            }
            Err(err) => {
                warn!(
                    error = %err,
                    rows = valid,
                    first_key = ?item.records.first().map(|record| record.key.as_str()),
                    last_key = ?item.last_key(),
                    "batch rejected by the sink, rolled back"
                );

                (BatchOutcome::all_skipped(attempted), true)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::concurrency::shutdown::create_shutdown_channel;
    use crate::progress::create_progress_channel;
    use crate::sink::SinkConnector;
    use crate::sink::memory::MemorySinkConnector;
    use crate::test_utils::record::{company_record, record_without_id};
    use crate::test_utils::schema::company_schema;
    use crate::types::SinkValue;

    async fn start_worker(
        sink: &MemorySinkConnector,
        work_rx: async_channel::Receiver<WorkMessage>,
        progress_tx: ProgressTx,
        shutdown_rx: ShutdownRx,
    ) -> UpsertWorkerHandle {
        let connection = sink.connect().await.unwrap();

        UpsertWorker::new(
            0,
            connection,
            Arc::new(company_schema()),
            Arc::new(PipelineConfig::default()),
            work_rx,
            progress_tx,
            shutdown_rx,
        )
        .start()
        .await
        .unwrap()
    }

    #[tokio::test]
    async fn counts_applied_and_skipped_records() {
        let sink = MemorySinkConnector::new();
        let (work_tx, work_rx) = async_channel::bounded(10);
        let (progress_tx, mut events_rx) = create_progress_channel();
        let (_shutdown_tx, shutdown_rx) = create_shutdown_channel();

        let handle = start_worker(&sink, work_rx, progress_tx, shutdown_rx).await;
        let state = handle.state();

        work_tx
            .send(WorkMessage::Item(WorkItem::new(vec![
                company_record("a", "C1", "Acme"),
                record_without_id("b"),
                company_record("c", "C2", "Globex"),
            ])))
            .await
            .unwrap();
        work_tx.send(WorkMessage::Sentinel).await.unwrap();
        handle.wait().await.unwrap();

        let stats = state.stats();
        assert_eq!(stats.batches, 1);
        assert_eq!(stats.applied, 2);
        assert_eq!(stats.skipped, 1);
        assert_eq!(stats.failed_batches, 0);
        assert_eq!(sink.rows().await.len(), 2);

        let mut events = Vec::new();
        while let Ok(event) = events_rx.try_recv() {
            events.push(event);
        }
        assert_eq!(
            events,
            vec![
                ProgressEvent::Progress {
                    worker_id: 0,
                    applied: 2,
                    skipped: 1
                },
                ProgressEvent::ItemFinished {
                    last_key: "c".to_string(),
                    failed: false
                },
            ]
        );
    }

    #[tokio::test]
    async fn rejected_batch_is_skipped_and_worker_continues() {
        let sink = MemorySinkConnector::new();
        sink.reject_id("C2").await;
        let (work_tx, work_rx) = async_channel::bounded(10);
        let (progress_tx, _events_rx) = create_progress_channel();
        let (_shutdown_tx, shutdown_rx) = create_shutdown_channel();

        let handle = start_worker(&sink, work_rx, progress_tx, shutdown_rx).await;
        let state = handle.state();

        work_tx
            .send(WorkMessage::Item(WorkItem::new(vec![
                company_record("a", "C1", "Acme"),
                company_record("b", "C2", "Globex"),
            ])))
            .await
            .unwrap();
        work_tx
            .send(WorkMessage::Item(WorkItem::new(vec![company_record(
                "c", "C3", "Initech",
            )])))
            .await
            .unwrap();
        work_tx.send(WorkMessage::Sentinel).await.unwrap();
        handle.wait().await.unwrap();

        let stats = state.stats();
        assert_eq!(stats.batches, 2);
        assert_eq!(stats.failed_batches, 1);
        assert_eq!(stats.applied, 1);
        assert_eq!(stats.skipped, 2);
        assert!(sink.row("C1").await.is_none());
        assert!(sink.row("C3").await.is_some());
    }

    #[tokio::test]
    async fn duplicate_identifiers_in_one_item_are_folded() {
        let sink = MemorySinkConnector::new();
        let (work_tx, work_rx) = async_channel::bounded(10);
        let (progress_tx, _events_rx) = create_progress_channel();
        let (_shutdown_tx, shutdown_rx) = create_shutdown_channel();

        let handle = start_worker(&sink, work_rx, progress_tx, shutdown_rx).await;
        let state = handle.state();

        work_tx
            .send(WorkMessage::Item(WorkItem::new(vec![
                company_record("a", "C1", "Old name"),
                company_record("b", "C1", "New name"),
            ])))
            .await
            .unwrap();
        work_tx.send(WorkMessage::Sentinel).await.unwrap();
        handle.wait().await.unwrap();

        assert_eq!(state.stats().applied, 2);
        let row = sink.row("C1").await.unwrap();
        assert_eq!(row.value("name"), &SinkValue::Text("New name".to_string()));
    }

    #[tokio::test(start_paused = true)]
    async fn shutdown_stops_an_idle_worker() {
        let sink = MemorySinkConnector::new();
        let (_work_tx, work_rx) = async_channel::bounded::<WorkMessage>(10);
        let (progress_tx, _events_rx) = create_progress_channel();
        let (shutdown_tx, shutdown_rx) = create_shutdown_channel();

        let handle = start_worker(&sink, work_rx, progress_tx, shutdown_rx).await;

        tokio::time::sleep(Duration::from_millis(10)).await;
        shutdown_tx.shutdown();

        tokio::time::timeout(Duration::from_secs(1), handle.wait())
            .await
            .unwrap()
            .unwrap();
    }
}
