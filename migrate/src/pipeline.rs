//! The migration pipeline.
//!
//! One producer pages through the source and fills a bounded work channel, `worker_count` upsert
//! workers drain it through their own sink connections and a progress aggregator folds their
//! reports into totals and the resume checkpoint.

use std::sync::Arc;
use std::time::Instant;

use migrate_config::shared::PipelineConfig;
use tracing::{error, info, warn};

use crate::bail;
use crate::checkpoint::CheckpointStore;
use crate::concurrency::shutdown::{ShutdownTx, create_shutdown_channel};
use crate::error::{ErrorKind, MigrateResult};
use crate::progress::{
    ProgressAggregator, ProgressAggregatorHandle, ProgressRenderer, TerminalRenderer,
    create_progress_channel,
};
use crate::schema::TableSchema;
use crate::sink::SinkConnector;
use crate::source::DocumentSource;
use crate::types::MigrationSummary;
use crate::workers::base::{Worker, WorkerHandle};
use crate::workers::producer::{Producer, ProducerHandle};
use crate::workers::upsert::{UpsertWorker, UpsertWorkerHandle};

#[derive(Debug)]
enum PipelineState {
    NotStarted,
    Started {
        producer: ProducerHandle,
        workers: Vec<UpsertWorkerHandle>,
        aggregator: ProgressAggregatorHandle,
        started_at: Instant,
    },
}

/// A single migration run from a document source into a sink table.
///
/// `Src` pages through the documents, `C` opens one sink connection per worker and `K` persists
/// the resume key. A pipeline runs once: [`Pipeline::start`] spawns every task and
/// [`Pipeline::wait`] collects the outcome.
pub struct Pipeline<Src, C, K> {
    config: Arc<PipelineConfig>,
    schema: Arc<TableSchema>,
    source: Src,
    connector: C,
    checkpoint: K,
    renderer: Option<Box<dyn ProgressRenderer>>,
    state: PipelineState,
    shutdown_tx: ShutdownTx,
}

impl<Src, C, K> Pipeline<Src, C, K>
where
    Src: DocumentSource + Clone,
    C: SinkConnector,
    K: CheckpointStore + Clone,
{
    /// Creates a pipeline that has not started yet.
    pub fn new(
        config: PipelineConfig,
        schema: TableSchema,
        source: Src,
        connector: C,
        checkpoint: K,
    ) -> Self {
        // Receivers are created from the sender when workers start.
        let (shutdown_tx, _) = create_shutdown_channel();

        Self {
            config: Arc::new(config),
            schema: Arc::new(schema),
            source,
            connector,
            checkpoint,
            renderer: None,
            state: PipelineState::NotStarted,
            shutdown_tx,
        }
    }

    /// Replaces the default terminal renderer.
    pub fn with_renderer(mut self, renderer: impl ProgressRenderer) -> Self {
        self.renderer = Some(Box::new(renderer));
        self
    }

    /// Returns a sender that interrupts the run.
    ///
    /// The signal may be sent before [`Pipeline::start`], the tasks then stop as soon as they start.
    pub fn shutdown_tx(&self) -> ShutdownTx {
        self.shutdown_tx.clone()
    }

    /// Loads the checkpoint, opens one sink connection per worker and spawns every task.
    ///
    /// Connections are opened before anything runs, so an unreachable sink fails the start.
    pub async fn start(&mut self) -> MigrateResult<()> {
        if let PipelineState::Started { .. } = self.state {
            bail!(ErrorKind::InvalidState, "Pipeline was already started");
        }

        let start_after = self.checkpoint.load().await?;
        info!(
            source = Src::name(),
            sink = C::name(),
            table = %self.schema.table,
            workers = self.config.worker_count,
            resume_after = ?start_after,
            "starting migration pipeline"
        );

        let mut connections = Vec::with_capacity(self.config.worker_count);
        for _ in 0..self.config.worker_count {
            connections.push(self.connector.connect().await?);
        }

        let started_at = Instant::now();
        let (work_tx, work_rx) = async_channel::bounded(self.config.queue_max_size);
        let (progress_tx, events_rx) = create_progress_channel();

        let mut workers = Vec::with_capacity(connections.len());
        for (worker_id, connection) in connections.into_iter().enumerate() {
            let worker = UpsertWorker::new(
                worker_id,
                connection,
                self.schema.clone(),
                self.config.clone(),
                work_rx.clone(),
                progress_tx.clone(),
                self.shutdown_tx.subscribe(),
            )
            .start()
            .await?;
            workers.push(worker);
        }
        drop(work_rx);

        let producer = Producer::new(
            self.source.clone(),
            self.config.clone(),
            start_after,
            work_tx.clone(),
            progress_tx,
            self.shutdown_tx.subscribe(),
        )
        .start()
        .await?;

        let renderer = self
            .renderer
            .take()
            .unwrap_or_else(|| Box::new(TerminalRenderer));
        let aggregator = ProgressAggregator::new(
            events_rx,
            work_tx,
            producer.state(),
            renderer,
            self.checkpoint.clone(),
            self.config.progress_poll(),
            started_at,
        )
        .start();

        self.state = PipelineState::Started {
            producer,
            workers,
            aggregator,
            started_at,
        };

        Ok(())
    }

    /// Waits for every task and returns the final counts.
    ///
    /// The checkpoint is cleared only when the source was drained without a rejected batch. A
    /// fatal error is returned after the workers drained what was already queued.
    pub async fn wait(self) -> MigrateResult<MigrationSummary> {
        let PipelineState::Started {
            producer,
            workers,
            aggregator,
            started_at,
        } = self.state
        else {
            info!("pipeline was not started, nothing to wait for");

            return Ok(MigrationSummary::default());
        };

        let mut errors = vec![];

        let producer_state = producer.state();
        if let Err(err) = producer.wait().await {
            error!(error = %err, "producer failed, draining queued work");
            errors.push(err);
        }

        let mut worker_states = Vec::with_capacity(workers.len());
        for worker in workers {
            worker_states.push(worker.state());
            if let Err(err) = worker.wait().await {
                error!(error = %err, "upsert worker failed");
                errors.push(err);
            }
        }

        match aggregator.wait().await {
            Ok(report) => {
                info!(watermark = ?report.watermark, frozen = report.frozen, "progress aggregator finished");
            }
            Err(err) => errors.push(err),
        }

        let producer_stats = producer_state.stats();
        let mut summary = MigrationSummary {
            produced: producer_stats.produced,
            interrupted: producer_stats.interrupted || self.shutdown_tx.subscribe().is_shutdown(),
            elapsed: started_at.elapsed(),
            ..MigrationSummary::default()
        };
        for state in &worker_states {
            let stats = state.stats();
            summary.applied += stats.applied;
            summary.skipped += stats.skipped;
            summary.failed_batches += stats.failed_batches;
        }

        if !errors.is_empty() {
            warn!(%summary, "migration failed, checkpoint kept for the next run");

            return Err(errors.into());
        }

        if summary.interrupted {
            info!(%summary, "migration interrupted, checkpoint kept for the next run");
        } else if summary.failed_batches > 0 {
            warn!(
                %summary,
                "migration finished with rejected batches, checkpoint kept for the next run"
            );
        } else {
            self.checkpoint.clear().await?;
            info!(%summary, "migration completed");
        }

        Ok(summary)
    }

    /// Asks every task to stop after its current step. Queued work is left unprocessed.
    pub fn shutdown(&self) {
        info!("shutting down the migration pipeline");
        self.shutdown_tx.shutdown();
    }

    /// Interrupts the run and waits for the tasks to stop.
    ///
    /// The summary has `interrupted` set and the checkpoint is kept.
    pub async fn shutdown_and_wait(self) -> MigrateResult<MigrationSummary> {
        self.shutdown();
        self.wait().await
    }
}
