use std::time::Duration;

use migrate_config::shared::{IntoConnectOptions, SourceConfig};
use pg_escape::quote_identifier;
use sqlx::postgres::{PgConnectOptions, PgPoolOptions};
use sqlx::{PgPool, Row};
use tracing::debug;

use crate::error::{ErrorKind, MigrateResult};
use crate::migrate_error;
use crate::source::DocumentSource;
use crate::types::SourceRecord;

/// Reads JSON documents stored in a Postgres table, one document per row.
///
/// Keys are compared as text with the `C` collation so the cursor order matches byte order.
#[derive(Debug, Clone)]
pub struct PostgresDocumentSource {
    pool: PgPool,
    query: String,
    query_timeout: Duration,
}

impl PostgresDocumentSource {
    /// Connects a single connection pool to the source database.
    pub async fn connect(config: &SourceConfig) -> MigrateResult<Self> {
        let options: PgConnectOptions = config.connection.with_db();
        let pool = PgPoolOptions::new()
            .max_connections(1)
            .acquire_timeout(config.query_timeout())
            .connect_with(options)
            .await?;

        Ok(Self::new(pool, config))
    }

    pub fn new(pool: PgPool, config: &SourceConfig) -> Self {
        Self {
            pool,
            query: build_page_query(config),
            query_timeout: config.query_timeout(),
        }
    }
}

fn build_page_query(config: &SourceConfig) -> String {
    let table = match &config.schema {
        Some(schema) => format!(
            "{}.{}",
            quote_identifier(schema),
            quote_identifier(&config.table)
        ),
        None => quote_identifier(&config.table).to_string(),
    };
    let key = quote_identifier(&config.key_column);
    let data = quote_identifier(&config.data_column);

    format!(
        r#"select {key}::text as key, {data}::jsonb as data
        from {table}
        where $1::text is null or {key}::text collate "C" > $1::text
        order by {key}::text collate "C"
        limit $2"#
    )
}

impl DocumentSource for PostgresDocumentSource {
    fn name() -> &'static str {
        "postgres"
    }

    async fn fetch_page(&self, after: Option<&str>, limit: usize) -> MigrateResult<Vec<SourceRecord>> {
        let query = sqlx::query(&self.query)
            .bind(after)
            .bind(limit as i64)
            .fetch_all(&self.pool);

        let rows = tokio::time::timeout(self.query_timeout, query)
            .await
            .map_err(|_| {
                migrate_error!(
                    ErrorKind::SourceTimeout,
                    "Source query timed out",
                    format!("no page after {after:?} within {:?}", self.query_timeout)
                )
            })??;

        debug!(rows = rows.len(), after, "fetched source page");

        rows.into_iter()
            .map(|row| {
                let key: String = row.try_get("key")?;
                let data: Option<serde_json::Value> = row.try_get("data")?;

                Ok(SourceRecord::from_json(
                    key,
                    data.unwrap_or(serde_json::Value::Null),
                ))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(json: &str) -> SourceConfig {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn page_query_uses_keyset_pagination() {
        let query = build_page_query(&config(
            r#"{
                "connection": {"host": "localhost", "port": 5432, "name": "export", "username": "reader"},
                "table": "companies_new"
            }"#,
        ));

        assert!(query.starts_with("select id::text as key, "));
        assert!(query.contains("::jsonb as data"));
        assert!(query.contains("from companies_new"));
        assert!(query.contains(r#"id::text collate "C" > $1::text"#));
        assert!(query.contains(r#"order by id::text collate "C""#));
        assert!(query.ends_with("limit $2"));
    }

    #[test]
    fn page_query_quotes_mixed_case_names() {
        let query = build_page_query(&config(
            r#"{
                "connection": {"host": "localhost", "port": 5432, "name": "export", "username": "reader"},
                "schema": "firestore",
                "table": "Companies",
                "key_column": "docId",
                "data_column": "payload"
            }"#,
        ));

        assert!(query.contains(r#"from firestore."Companies""#));
        assert!(query.contains(r#"select "docId"::text as key, payload::jsonb as data"#));
    }
}
