use std::time::Duration;

use serde::Deserialize;

use crate::shared::{PgConnectionConfig, ValidationError, invalid_field};

/// Postgres table holding the source documents, one JSON document per row.
#[derive(Clone, Debug, Deserialize)]
pub struct SourceConfig {
    pub connection: PgConnectionConfig,
    #[serde(default)]
    pub schema: Option<String>,
    pub table: String,
    /// Unique, sortable column used as the pagination cursor.
    #[serde(default = "default_key_column")]
    pub key_column: String,
    /// `json` or `jsonb` column holding the document.
    #[serde(default = "default_data_column")]
    pub data_column: String,
    /// Page queries running longer than this fail with a retryable timeout.
    #[serde(default = "default_query_timeout_ms")]
    pub query_timeout_ms: u64,
}

fn default_key_column() -> String {
    "id".to_string()
}

fn default_data_column() -> String {
    "data".to_string()
}

fn default_query_timeout_ms() -> u64 {
    30_000
}

impl SourceConfig {
    pub fn query_timeout(&self) -> Duration {
        Duration::from_millis(self.query_timeout_ms)
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        self.connection.validate()?;

        for (field, value) in [
            ("source.table", &self.table),
            ("source.key_column", &self.key_column),
            ("source.data_column", &self.data_column),
        ] {
            if value.trim().is_empty() {
                return Err(ValidationError::EmptyIdentifier(field.to_string()));
            }
        }

        if self.query_timeout_ms == 0 {
            return Err(invalid_field(
                "source.query_timeout_ms",
                "must be greater than 0",
            ));
        }

        Ok(())
    }
}
