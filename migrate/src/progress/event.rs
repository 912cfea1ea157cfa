use tokio::sync::mpsc;
use tracing::trace;

/// Count and checkpoint events consumed by the aggregator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProgressEvent {
    /// Total records fetched so far.
    Produced { total: u64 },
    /// Cumulative counts of one worker.
    Progress {
        worker_id: usize,
        applied: u64,
        skipped: u64,
    },
    /// A work item is about to be pushed. Sent before the push so it always precedes the
    /// matching [`ProgressEvent::ItemFinished`].
    ItemQueued { last_key: String },
    /// A worker reported the outcome of an item.
    ItemFinished { last_key: String, failed: bool },
}

/// Sending side of the progress channel.
#[derive(Debug, Clone)]
pub struct ProgressTx(mpsc::UnboundedSender<ProgressEvent>);

impl ProgressTx {
    /// Sends an event. A closed channel only means nobody renders progress anymore.
    pub fn emit(&self, event: ProgressEvent) {
        if let Err(err) = self.0.send(event) {
            trace!(event = ?err.0, "progress channel closed, dropping event");
        }
    }
}

/// Creates the progress channel.
///
/// The channel is unbounded: reporting progress must never slow down the producer or a worker,
/// and the aggregator drains events as fast as they arrive.
pub fn create_progress_channel() -> (ProgressTx, mpsc::UnboundedReceiver<ProgressEvent>) {
    let (tx, rx) = mpsc::unbounded_channel();
    (ProgressTx(tx), rx)
}
