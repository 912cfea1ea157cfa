use std::sync::Arc;

use tokio::sync::Mutex;

use crate::checkpoint::CheckpointStore;
use crate::error::MigrateResult;

#[derive(Debug, Default)]
struct Inner {
    key: Option<String>,
    history: Vec<String>,
}

/// Keeps the checkpoint in memory, used for tests and when checkpointing is disabled.
#[derive(Debug, Clone, Default)]
pub struct MemoryCheckpointStore {
    inner: Arc<Mutex<Inner>>,
}

impl MemoryCheckpointStore {
    /// Creates an empty store, a run using it starts from the beginning of the source.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store holding `key`, as if an earlier run had been interrupted after it.
    pub fn with_key(key: impl Into<String>) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Inner {
                key: Some(key.into()),
                history: Vec::new(),
            })),
        }
    }

    /// The key a new run would resume after.
    pub async fn current(&self) -> Option<String> {
        self.inner.lock().await.key.clone()
    }

    /// Every key stored so far, in order.
    pub async fn history(&self) -> Vec<String> {
        self.inner.lock().await.history.clone()
    }
}

impl CheckpointStore for MemoryCheckpointStore {
    async fn load(&self) -> MigrateResult<Option<String>> {
        Ok(self.inner.lock().await.key.clone())
    }

    async fn store(&self, key: &str) -> MigrateResult<()> {
        let mut inner = self.inner.lock().await;
        inner.key = Some(key.to_string());
        inner.history.push(key.to_string());

        Ok(())
    }

    async fn clear(&self) -> MigrateResult<()> {
        self.inner.lock().await.key = None;

        Ok(())
    }
}
