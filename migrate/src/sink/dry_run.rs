use tracing::debug;

use crate::error::MigrateResult;
use crate::schema::TableSchema;
use crate::sink::{SinkConnection, SinkConnector};
use crate::types::SinkRow;

/// Sink used for dry runs: discards every batch and counts all rows as applied.
///
/// It stands in for the real connector, so a dry run needs no sink database.
#[derive(Debug, Clone, Default)]
pub struct DryRunSinkConnector;

impl DryRunSinkConnector {
    pub fn new() -> Self {
        Self
    }
}

impl SinkConnector for DryRunSinkConnector {
    type Connection = DryRunSinkConnection;

    fn name() -> &'static str {
        "dry_run"
    }

    async fn connect(&self) -> MigrateResult<Self::Connection> {
        Ok(DryRunSinkConnection)
    }
}

#[derive(Debug)]
pub struct DryRunSinkConnection;

impl SinkConnection for DryRunSinkConnection {
    async fn upsert_batch(&mut self, schema: &TableSchema, rows: &[SinkRow]) -> MigrateResult<u64> {
        debug!(
            table = %schema.table,
            rows = rows.len(),
            first_id = rows.first().map(|row| row.id.as_str()),
            "dry run, skipping upsert"
        );

        Ok(rows.len() as u64)
    }
}
