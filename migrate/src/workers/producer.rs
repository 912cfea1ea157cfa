use std::mem;
use std::sync::Arc;

use migrate_config::shared::PipelineConfig;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{Instrument, debug, error, info, info_span};

use crate::concurrency::shutdown::ShutdownRx;
use crate::error::{ErrorKind, MigrateResult};
use crate::migrate_error;
use crate::progress::{ProgressEvent, ProgressTx};
use crate::retry::RetryPolicy;
use crate::source::DocumentSource;
use crate::types::{SourceRecord, WorkItem, WorkMessage};
use crate::workers::base::{Worker, WorkerHandle, join_error};

/// Counters published by the producer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProducerStats {
    /// Records fetched from the source.
    pub produced: u64,
    /// Set once the producer stopped, for any reason.
    pub finished: bool,
    /// Set when the producer stopped on shutdown.
    pub interrupted: bool,
}

/// Observable state of the producer.
#[derive(Debug, Clone)]
pub struct ProducerState {
    rx: watch::Receiver<ProducerStats>,
}

impl ProducerState {
    /// Wraps the receiving side of the producer's stats channel.
    pub fn new(rx: watch::Receiver<ProducerStats>) -> Self {
        Self { rx }
    }

    /// Latest stats published by the producer.
    pub fn stats(&self) -> ProducerStats {
        *self.rx.borrow()
    }

    /// Records fetched so far.
    pub fn produced(&self) -> u64 {
        self.rx.borrow().produced
    }

    /// Whether the producer stopped. A producer that panicked counts as stopped.
    pub fn is_finished(&self) -> bool {
        self.rx.borrow().finished || self.rx.has_changed().is_err()
    }
}

/// Handle to the spawned producer task.
#[derive(Debug)]
pub struct ProducerHandle {
    state: ProducerState,
    handle: Option<JoinHandle<MigrateResult<()>>>,
}

impl WorkerHandle for ProducerHandle {
    type State = ProducerState;

    fn state(&self) -> ProducerState {
        self.state.clone()
    }

    async fn wait(mut self) -> MigrateResult<()> {
        let Some(handle) = self.handle.take() else {
            return Ok(());
        };

        handle
            .await
            .map_err(|err| join_error(ErrorKind::ProducerPanic, "producer", err))?
    }
}

/// How a push onto the work channel ended.
enum Push {
    Sent,
    Shutdown,
}

/// Pages through the source and turns the records into work items.
///
/// The cursor is the key of the last record of the previous page. A page shorter than the page
/// size ends the source: the remaining records are pushed as a final smaller item, followed by one
/// sentinel per worker. Sentinels are also pushed after a fatal source error so the workers drain
/// what was already queued and exit. On shutdown the producer stops without sentinels, the
/// workers observe the same signal.
#[derive(Debug)]
pub struct Producer<Src> {
    source: Src,
    config: Arc<PipelineConfig>,
    start_after: Option<String>,
    work_tx: async_channel::Sender<WorkMessage>,
    progress_tx: ProgressTx,
    shutdown_rx: ShutdownRx,
}

impl<Src> Producer<Src> {
    /// Creates a producer that resumes after `start_after`, or starts from the first key when `None`.
    pub fn new(
        source: Src,
        config: Arc<PipelineConfig>,
        start_after: Option<String>,
        work_tx: async_channel::Sender<WorkMessage>,
        progress_tx: ProgressTx,
        shutdown_rx: ShutdownRx,
    ) -> Self {
        Self {
            source,
            config,
            start_after,
            work_tx,
            progress_tx,
            shutdown_rx,
        }
    }
}

impl<Src> Worker for Producer<Src>
where
    Src: DocumentSource,
{
    type Handle = ProducerHandle;

    async fn start(self) -> MigrateResult<ProducerHandle> {
        info!(source = Src::name(), start_after = ?self.start_after, "starting producer");

        let (state_tx, state_rx) = watch::channel(ProducerStats::default());
        let span = info_span!("producer", source = Src::name());

        let producer = async move {
            let result = self.run(&state_tx).await;

            state_tx.send_modify(|stats| {
                stats.finished = true;
                stats.interrupted = matches!(result, Ok(Push::Shutdown));
            });

            result.map(|_| ())
        }
        .instrument(span);

        let handle = tokio::spawn(producer);

        Ok(ProducerHandle {
            state: ProducerState::new(state_rx),
            handle: Some(handle),
        })
    }
}

impl<Src> Producer<Src>
where
    Src: DocumentSource,
{
    /// Returns [`Push::Shutdown`] when interrupted and [`Push::Sent`] once every sentinel is queued.
    async fn run(mut self, state_tx: &watch::Sender<ProducerStats>) -> MigrateResult<Push> {
        let result = self.produce(state_tx).await;

        match result {
            Ok(Push::Shutdown) => {
                info!("shutdown requested, producer stopped");
                return Ok(Push::Shutdown);
            }
            Ok(Push::Sent) => {
                info!(produced = state_tx.borrow().produced, "source exhausted");
            }
            Err(ref err) => {
                error!(error = %err, "producer stopped on a fatal source error");
            }
        }

        // A source error wins over whatever happens while pushing the sentinels.
        let sentinels = self.push_sentinels().await;
        match result {
            Err(err) => Err(err),
            Ok(_) => sentinels,
        }
    }

    async fn produce(&mut self, state_tx: &watch::Sender<ProducerStats>) -> MigrateResult<Push> {
        let retry = RetryPolicy::new(self.config.retry.clone());
        let page_size = self.config.page_size;
        let item_size = self.config.item_size;
        let fetch_delay = self.config.fetch_delay();

        let mut cursor = self.start_after.clone();
        let mut buffer: Vec<SourceRecord> = Vec::with_capacity(item_size);
        let mut produced = 0u64;

        loop {
            let source = &self.source;
            let after = cursor.as_deref();
            let fetch = retry.run(move || source.fetch_page(after, page_size));

            let page = tokio::select! {
                biased;

                _ = self.shutdown_rx.wait() => return Ok(Push::Shutdown),
                page = fetch => page?,
            };

            let exhausted = page.len() < page_size;
            if let Some(last) = page.last() {
                cursor = Some(last.key.clone());
            }

            produced += page.len() as u64;
            state_tx.send_modify(|stats| stats.produced = produced);
            self.progress_tx
                .emit(ProgressEvent::Produced { total: produced });
            debug!(records = page.len(), cursor = ?cursor, "fetched page");

            buffer.extend(page);
            while buffer.len() >= item_size {
                let rest = buffer.split_off(item_size);
                let item = WorkItem::new(mem::replace(&mut buffer, rest));
                if let Push::Shutdown = self.push_item(item).await? {
                    return Ok(Push::Shutdown);
                }
            }

            if exhausted {
                if !buffer.is_empty() {
                    let item = WorkItem::new(mem::take(&mut buffer));
                    if let Push::Shutdown = self.push_item(item).await? {
                        return Ok(Push::Shutdown);
                    }
                }

                return Ok(Push::Sent);
            }

            if !fetch_delay.is_zero() {
                tokio::select! {
                    biased;

                    _ = self.shutdown_rx.wait() => return Ok(Push::Shutdown),
                    _ = tokio::time::sleep(fetch_delay) => {}
                }
            }
        }
    }

    async fn push_item(&mut self, item: WorkItem) -> MigrateResult<Push> {
        if let Some(last_key) = item.last_key() {
            self.progress_tx.emit(ProgressEvent::ItemQueued {
                last_key: last_key.to_string(),
            });
        }

        self.push(WorkMessage::Item(item)).await
    }

    async fn push_sentinels(&mut self) -> MigrateResult<Push> {
        // A worker that died holds no receiver and would never take its sentinel.
        let live_workers = self.work_tx.receiver_count().min(self.config.worker_count);
        for _ in 0..live_workers {
            if let Push::Shutdown = self.push(WorkMessage::Sentinel).await? {
                return Ok(Push::Shutdown);
            }
        }
        debug!(workers = live_workers, "pushed sentinels");

        Ok(Push::Sent)
    }

    /// Pushes a message, blocking while the channel is full.
    async fn push(&mut self, message: WorkMessage) -> MigrateResult<Push> {
        tokio::select! {
            biased;

            _ = self.shutdown_rx.wait() => Ok(Push::Shutdown),
            sent = self.work_tx.send(message) => match sent {
                Ok(()) => Ok(Push::Sent),
                Err(_) => Err(migrate_error!(
                    ErrorKind::InvalidState,
                    "Work channel closed",
                    "every worker stopped before the producer finished"
                )),
            },
        }
    }
}
