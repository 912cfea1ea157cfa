use std::time::Duration;

use serde::Deserialize;

use crate::shared::{PgConnectionConfig, ValidationError};

/// Postgres database receiving the upserted rows.
#[derive(Clone, Debug, Deserialize)]
pub struct SinkConfig {
    pub connection: PgConnectionConfig,
    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,
}

fn default_connect_timeout_ms() -> u64 {
    10_000
}

impl SinkConfig {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        self.connection.validate()
    }
}
