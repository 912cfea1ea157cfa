use migrate::checkpoint::CheckpointStore;
use migrate::checkpoint::file::FileCheckpointStore;
use migrate::checkpoint::memory::MemoryCheckpointStore;
use migrate::pipeline::Pipeline;
use migrate::schema::TableSchema;
use migrate::sink::SinkConnector;
use migrate::sink::dry_run::DryRunSinkConnector;
use migrate::sink::postgres::PgSinkConnector;
use migrate::source::DocumentSource;
use migrate::source::postgres::PostgresDocumentSource;
use migrate::types::MigrationSummary;
use migrate_config::shared::{
    CheckpointConfig, MigratorConfig, PgConnectionConfig, PipelineConfig, TableConfig,
};
use tracing::{debug, info, warn};

/// Builds the source, sink and checkpoint store from `config` and runs the migration to the end.
pub async fn start_migration(
    config: MigratorConfig,
    fresh: bool,
) -> anyhow::Result<MigrationSummary> {
    log_config(&config);

    let schema = TableSchema::from(&config.schema);
    let source = PostgresDocumentSource::connect(&config.source).await?;

    if config.checkpoint.enabled {
        let checkpoint = FileCheckpointStore::new(config.checkpoint.path.clone());
        if fresh {
            checkpoint.clear().await?;
            info!(path = %checkpoint.path().display(), "cleared checkpoint, starting from scratch");
        }

        start_with_sink(config, schema, source, checkpoint).await
    } else {
        info!("checkpointing disabled, an interrupted run restarts from scratch");

        start_with_sink(config, schema, source, MemoryCheckpointStore::new()).await
    }
}

async fn start_with_sink<K>(
    config: MigratorConfig,
    schema: TableSchema,
    source: PostgresDocumentSource,
    checkpoint: K,
) -> anyhow::Result<MigrationSummary>
where
    K: CheckpointStore + Clone,
{
    if config.pipeline.dry_run {
        info!("dry run, no rows will be written");

        let pipeline = Pipeline::new(
            config.pipeline,
            schema,
            source,
            DryRunSinkConnector::new(),
            checkpoint,
        );
        return start_pipeline(pipeline).await;
    }

    let connect_timeout = config.sink.connect_timeout();
    let connector = PgSinkConnector::new(config.sink.connection, connect_timeout);
    let pipeline = Pipeline::new(config.pipeline, schema, source, connector, checkpoint);

    start_pipeline(pipeline).await
}

/// Runs a pipeline to completion, turning SIGINT and SIGTERM into a graceful shutdown.
#[tracing::instrument(skip(pipeline))]
async fn start_pipeline<Src, C, K>(
    mut pipeline: Pipeline<Src, C, K>,
) -> anyhow::Result<MigrationSummary>
where
    Src: DocumentSource + Clone,
    C: SinkConnector,
    K: CheckpointStore + Clone,
{
    // Listening starts before the sink connections are opened, so an early ctrl+c is still a
    // graceful interrupt.
    let shutdown_tx = pipeline.shutdown_tx();
    let shutdown_handle = tokio::spawn(async move {
        wait_for_signal().await;
        shutdown_tx.shutdown();
        info!("shutdown signal sent to the pipeline");
    });

    let result = match pipeline.start().await {
        Ok(()) => pipeline.wait().await,
        Err(err) => Err(err),
    };

    // The signal task is still waiting when the run ends on its own.
    shutdown_handle.abort();
    let _ = shutdown_handle.await;

    Ok(result?)
}

#[cfg(unix)]
async fn wait_for_signal() {
    use tokio::signal::unix::{SignalKind, signal};

    let mut sigterm = match signal(SignalKind::terminate()) {
        Ok(sigterm) => sigterm,
        Err(err) => {
            warn!(error = %err, "failed to register the sigterm handler, only ctrl+c stops the run");
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("sigint (ctrl+c) received, shutting down");
            }
            return;
        }
    };

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            info!("sigint (ctrl+c) received, shutting down");
        }
        _ = sigterm.recv() => {
            info!("sigterm received, shutting down");
        }
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() {
    if tokio::signal::ctrl_c().await.is_ok() {
        info!("ctrl+c received, shutting down");
    }
}

fn log_config(config: &MigratorConfig) {
    log_pg_connection_config("source", &config.source.connection);
    debug!(
        table = config.source.table,
        key_column = config.source.key_column,
        data_column = config.source.data_column,
        query_timeout_ms = config.source.query_timeout_ms,
        "source config"
    );
    log_pg_connection_config("sink", &config.sink.connection);
    log_pipeline_config(&config.pipeline);
    log_table_config(&config.schema);
    log_checkpoint_config(&config.checkpoint);
}

fn log_pg_connection_config(role: &str, config: &PgConnectionConfig) {
    debug!(
        role,
        host = config.host,
        port = config.port,
        dbname = config.name,
        username = config.username,
        tls_enabled = config.tls.enabled,
        "postgres connection config",
    );
}

fn log_pipeline_config(config: &PipelineConfig) {
    debug!(
        page_size = config.page_size,
        item_size = config.item_size,
        worker_count = config.worker_count,
        queue_max_size = config.queue_max_size,
        fetch_delay_ms = config.fetch_delay_ms,
        batch_delay_ms = config.batch_delay_ms,
        dry_run = config.dry_run,
        max_attempts = config.retry.max_attempts,
        "pipeline config"
    );
}

fn log_table_config(config: &TableConfig) {
    debug!(
        table = config.table,
        id_column = config.id_column,
        id_aliases = ?config.id_aliases,
        columns = config.columns.len(),
        "target table config"
    );
}

fn log_checkpoint_config(config: &CheckpointConfig) {
    debug!(
        enabled = config.enabled,
        path = %config.path.display(),
        "checkpoint config"
    );
}
