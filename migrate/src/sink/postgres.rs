use std::io::BufReader;
use std::time::Duration;

use migrate_config::shared::{IntoConnectOptions, PgConnectionConfig};
use rustls::ClientConfig;
use tokio_postgres::tls::MakeTlsConnect;
use tokio_postgres::types::ToSql;
use tokio_postgres::{Client, Config, Connection, NoTls, Socket, Transaction};
use tokio_postgres_rustls::MakeRustlsConnect;
use tracing::{Instrument, debug, error, info, warn};

use crate::error::{ErrorKind, MigrateResult};
use crate::migrate_error;
use crate::schema::{ColumnKind, TableSchema};
use crate::sink::upsert::{build_upsert_sql, max_rows_per_statement, row_values};
use crate::sink::{SinkConnection, SinkConnector};
use crate::types::{SinkRow, SinkValue};

type BoxedParam = Box<dyn ToSql + Sync + Send>;

/// Spawns the task driving a tokio-postgres connection.
///
/// The task ends on its own once the [`Client`] is dropped.
fn spawn_postgres_connection<T>(connection: Connection<Socket, T::Stream>)
where
    T: MakeTlsConnect<Socket>,
    T::Stream: Send + 'static,
{
    let span = tracing::Span::current();
    let task = async move {
        match connection.await {
            Err(err) => error!(error = %err, "sink connection terminated with an error"),
            Ok(()) => debug!("sink connection terminated"),
        }
    }
    .instrument(span);

    tokio::spawn(task);
}

/// Opens tokio-postgres connections to the sink database.
#[derive(Debug, Clone)]
pub struct PgSinkConnector {
    config: PgConnectionConfig,
    connect_timeout: Duration,
}

impl PgSinkConnector {
    pub fn new(config: PgConnectionConfig, connect_timeout: Duration) -> Self {
        Self {
            config,
            connect_timeout,
        }
    }

    async fn connect_client(&self) -> MigrateResult<Client> {
        let connect = async {
            if self.config.tls.enabled {
                self.connect_tls().await
            } else {
                self.connect_no_tls().await
            }
        };

        tokio::time::timeout(self.connect_timeout, connect)
            .await
            .map_err(|_| {
                migrate_error!(
                    ErrorKind::SinkConnectionFailed,
                    "Timed out connecting to the sink",
                    format!(
                        "{}:{} did not accept a connection within {:?}",
                        self.config.host, self.config.port, self.connect_timeout
                    )
                )
            })?
    }

    async fn connect_no_tls(&self) -> MigrateResult<Client> {
        let config: Config = self.config.with_db();
        let (client, connection) = config.connect(NoTls).await?;
        spawn_postgres_connection::<NoTls>(connection);

        debug!("connected to sink without tls");

        Ok(client)
    }

    async fn connect_tls(&self) -> MigrateResult<Client> {
        let config: Config = self.config.with_db();

        let mut root_store = rustls::RootCertStore::empty();
        let mut root_certs_reader = BufReader::new(self.config.tls.trusted_root_certs.as_bytes());
        for cert in rustls_pemfile::certs(&mut root_certs_reader) {
            root_store.add(cert?)?;
        }

        let tls_config = ClientConfig::builder()
            .with_root_certificates(root_store)
            .with_no_client_auth();

        let (client, connection) = config.connect(MakeRustlsConnect::new(tls_config)).await?;
        spawn_postgres_connection::<MakeRustlsConnect>(connection);

        debug!("connected to sink with tls");

        Ok(client)
    }
}

impl SinkConnector for PgSinkConnector {
    type Connection = PgSinkConnection;

    fn name() -> &'static str {
        "postgres"
    }

    async fn connect(&self) -> MigrateResult<Self::Connection> {
        let client = self.connect_client().await?;

        Ok(PgSinkConnection {
            connector: self.clone(),
            client,
        })
    }
}

/// A sink connection owned by one worker.
///
/// If the server closes the connection, the next batch reconnects first.
pub struct PgSinkConnection {
    connector: PgSinkConnector,
    client: Client,
}

impl PgSinkConnection {
    async fn ensure_connected(&mut self) -> MigrateResult<()> {
        if self.client.is_closed() {
            info!("sink connection was closed, reconnecting");
            self.client = self.connector.connect_client().await?;
        }

        Ok(())
    }
}

impl SinkConnection for PgSinkConnection {
    async fn upsert_batch(&mut self, schema: &TableSchema, rows: &[SinkRow]) -> MigrateResult<u64> {
        if rows.is_empty() {
            return Ok(0);
        }

        self.ensure_connected().await?;

        let transaction = self.client.transaction().await?;
        match execute_upserts(&transaction, schema, rows).await {
            Ok(applied) => {
                transaction.commit().await?;
                Ok(applied)
            }
            Err(err) => {
                if let Err(rollback_err) = transaction.rollback().await {
                    warn!(error = %rollback_err, "failed to roll back sink transaction");
                }
                Err(err)
            }
        }
    }
}

/// Runs the upsert in as many statements as the bind parameter limit requires.
async fn execute_upserts(
    transaction: &Transaction<'_>,
    schema: &TableSchema,
    rows: &[SinkRow],
) -> MigrateResult<u64> {
    let mut applied = 0;

    for chunk in rows.chunks(max_rows_per_statement(schema)) {
        let sql = build_upsert_sql(schema, chunk.len());
        let params = bind_params(schema, chunk);
        let param_refs: Vec<&(dyn ToSql + Sync)> = params
            .iter()
            .map(|param| param.as_ref() as &(dyn ToSql + Sync))
            .collect();

        applied += transaction.execute(sql.as_str(), &param_refs).await?;
    }

    Ok(applied)
}

fn bind_params(schema: &TableSchema, rows: &[SinkRow]) -> Vec<BoxedParam> {
    let mut params: Vec<BoxedParam> = Vec::with_capacity(rows.len() * (schema.columns.len() + 1));

    for row in rows {
        params.push(Box::new(row.id.clone()));
        for (column, value) in schema.columns.iter().zip(row_values(schema, row)) {
            params.push(bind_param(column.kind, value));
        }
    }

    params
}

/// Converts a value into a parameter of the column's type, nulls included.
fn bind_param(kind: ColumnKind, value: &SinkValue) -> BoxedParam {
    match kind {
        ColumnKind::Integer { .. } => Box::new(match value {
            SinkValue::Integer(value) => Some(*value),
            _ => None,
        }),
        ColumnKind::Text => Box::new(match value {
            SinkValue::Text(value) => Some(value.clone()),
            _ => None,
        }),
        ColumnKind::TextArray { .. } => Box::new(match value {
            SinkValue::TextArray(values) => Some(values.clone()),
            _ => None,
        }),
        ColumnKind::AnyPresent => Box::new(match value {
            SinkValue::Boolean(value) => Some(*value),
            _ => None,
        }),
    }
}
