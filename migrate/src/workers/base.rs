//! Lifecycle shared by the producer and the upsert workers.
//!
//! Every task acquires what it needs before [`Worker::start`] spawns it, so a started task can
//! only end by finishing its work, by an error it returns or by a panic. The handle exposes the
//! counters the task publishes and reports the last two through [`WorkerHandle::wait`].

use std::future::Future;

use tokio::task::JoinError;

use crate::error::{ErrorKind, MigrateError, MigrateResult};
use crate::migrate_error;

/// A pipeline task that runs on the runtime once started.
pub trait Worker {
    type Handle: WorkerHandle;

    /// Spawns the task and returns its handle without waiting for any work.
    fn start(self) -> impl Future<Output = MigrateResult<Self::Handle>> + Send;
}

/// Handle to a spawned pipeline task.
pub trait WorkerHandle {
    /// Counters published by the task. They stay readable after the task ended, which is how
    /// the pipeline builds its summary.
    type State: Clone;

    fn state(&self) -> Self::State;

    /// Waits for the task to end, mapping a panic or a cancellation to an error.
    fn wait(self) -> impl Future<Output = MigrateResult<()>> + Send;
}

/// Converts the join failure of the task named `task` into an error of `kind`.
pub(crate) fn join_error(kind: ErrorKind, task: &str, err: JoinError) -> MigrateError {
    let description = if err.is_cancelled() {
        "Pipeline task was cancelled"
    } else {
        "Pipeline task panicked"
    };

    migrate_error!(kind, description, detail = format!("{task}: {err}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn panic_is_reported_with_the_task_name() {
        let handle = tokio::spawn(async { panic!("boom") });
        let err = handle.await.unwrap_err();

        let err = join_error(ErrorKind::WorkerPanic, "upsert worker 3", err);

        assert_eq!(err.kind(), ErrorKind::WorkerPanic);
        assert!(err.to_string().contains("Pipeline task panicked"));
        assert!(err.detail().unwrap().starts_with("upsert worker 3: "));
    }

    #[tokio::test]
    async fn cancellation_is_told_apart_from_a_panic() {
        let handle = tokio::spawn(std::future::pending::<()>());
        handle.abort();
        let err = handle.await.unwrap_err();

        let err = join_error(ErrorKind::ProducerPanic, "producer", err);

        assert_eq!(err.kind(), ErrorKind::ProducerPanic);
        assert!(err.to_string().contains("Pipeline task was cancelled"));
    }
}
