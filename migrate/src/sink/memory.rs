use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::debug;

use crate::bail;
use crate::error::{ErrorKind, MigrateResult};
use crate::schema::{MergePolicy, TableSchema};
use crate::sink::{SinkConnection, SinkConnector};
use crate::types::{SinkRow, SinkValue};

#[derive(Debug, Default)]
struct Inner {
    rows: BTreeMap<String, BTreeMap<String, SinkValue>>,
    rejected_ids: HashSet<String>,
    connections: usize,
    committed_batches: u64,
    rolled_back_batches: u64,
}

/// In-memory sink with the same merge semantics as the Postgres upsert.
///
/// All connections share one table. Identifiers registered with [`MemorySinkConnector::reject_id`]
/// make any batch containing them fail with [`ErrorKind::SinkConstraintViolation`], leaving the
/// table untouched like a rolled back transaction.
#[derive(Debug, Clone, Default)]
pub struct MemorySinkConnector {
    inner: Arc<Mutex<Inner>>,
}

impl MemorySinkConnector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every batch containing `id` fail.
    pub async fn reject_id(&self, id: impl Into<String>) {
        let mut inner = self.inner.lock().await;
        inner.rejected_ids.insert(id.into());
    }

    /// Returns the stored row with the given identifier.
    pub async fn row(&self, id: &str) -> Option<SinkRow> {
        let inner = self.inner.lock().await;
        inner.rows.get(id).map(|values| SinkRow {
            id: id.to_string(),
            values: values.clone(),
        })
    }

    /// Returns all stored rows ordered by identifier.
    pub async fn rows(&self) -> Vec<SinkRow> {
        let inner = self.inner.lock().await;
        inner
            .rows
            .iter()
            .map(|(id, values)| SinkRow {
                id: id.clone(),
                values: values.clone(),
            })
            .collect()
    }

    pub async fn connection_count(&self) -> usize {
        self.inner.lock().await.connections
    }

    pub async fn committed_batches(&self) -> u64 {
        self.inner.lock().await.committed_batches
    }

    pub async fn rolled_back_batches(&self) -> u64 {
        self.inner.lock().await.rolled_back_batches
    }
}

impl SinkConnector for MemorySinkConnector {
    type Connection = MemorySinkConnection;

    fn name() -> &'static str {
        "memory"
    }

    async fn connect(&self) -> MigrateResult<Self::Connection> {
        let mut inner = self.inner.lock().await;
        inner.connections += 1;

        Ok(MemorySinkConnection {
            inner: self.inner.clone(),
        })
    }
}

#[derive(Debug)]
pub struct MemorySinkConnection {
    inner: Arc<Mutex<Inner>>,
}

impl SinkConnection for MemorySinkConnection {
    async fn upsert_batch(&mut self, schema: &TableSchema, rows: &[SinkRow]) -> MigrateResult<u64> {
        let mut inner = self.inner.lock().await;

        if let Some(row) = rows.iter().find(|row| inner.rejected_ids.contains(&row.id)) {
            inner.rolled_back_batches += 1;
            bail!(
                ErrorKind::SinkConstraintViolation,
                "Sink constraint violation",
                format!("row {} was rejected", row.id)
            );
        }

        for row in rows {
            let stored = inner.rows.entry(row.id.clone()).or_default();
            for column in &schema.columns {
                let incoming = row.value(&column.name);
                let existing = stored.get(&column.name).unwrap_or(&SinkValue::Null);

                let merged = match column.merge {
                    MergePolicy::OverwriteNonNull if !incoming.is_null() => incoming.clone(),
                    MergePolicy::OverwriteNonNull => existing.clone(),
                    MergePolicy::FillMissing if !existing.is_null() => existing.clone(),
                    MergePolicy::FillMissing => incoming.clone(),
                };
                stored.insert(column.name.clone(), merged);
            }
        }

        inner.committed_batches += 1;
        debug!(rows = rows.len(), "committed batch to memory sink");

        Ok(rows.len() as u64)
    }
}
