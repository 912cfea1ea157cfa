use std::future::Future;

use crate::error::MigrateResult;
use crate::schema::TableSchema;
use crate::types::SinkRow;

/// Factory for sink connections.
///
/// Every worker calls [`SinkConnector::connect`] once and keeps the connection for its whole
/// lifetime, so connections are never shared between workers.
pub trait SinkConnector: Clone + Send + Sync + 'static {
    type Connection: SinkConnection;

    /// Returns the name of the sink.
    fn name() -> &'static str;

    fn connect(&self) -> impl Future<Output = MigrateResult<Self::Connection>> + Send;
}

/// A connection owned by a single worker.
pub trait SinkConnection: Send + 'static {
    /// Upserts `rows` inside one transaction and returns the number of rows affected.
    ///
    /// The rows must have distinct identifiers. On error nothing of the batch is kept and the error
    /// is returned as is, without retrying.
    fn upsert_batch(
        &mut self,
        schema: &TableSchema,
        rows: &[SinkRow],
    ) -> impl Future<Output = MigrateResult<u64>> + Send;
}
