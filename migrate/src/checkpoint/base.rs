use std::future::Future;

use crate::error::MigrateResult;

/// Persistence of the resume key.
pub trait CheckpointStore: Send + Sync + 'static {
    /// Returns the stored key, `None` when the previous run completed or there was none.
    fn load(&self) -> impl Future<Output = MigrateResult<Option<String>>> + Send;

    /// Replaces the stored key. Called every time the watermark moves.
    fn store(&self, key: &str) -> impl Future<Output = MigrateResult<()>> + Send;

    /// Removes the stored key. Clearing an absent checkpoint succeeds.
    fn clear(&self) -> impl Future<Output = MigrateResult<()>> + Send;
}
