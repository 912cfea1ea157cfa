use std::path::PathBuf;

use serde::Deserialize;

use crate::load::Config;
use crate::shared::{
    CheckpointConfig, PipelineConfig, SinkConfig, SourceConfig, TableConfig, ValidationError,
};

/// Top level configuration of the `migrator` binary.
///
/// This intentionally does not implement `Serialize` since it holds connection passwords.
#[derive(Clone, Debug, Deserialize)]
pub struct MigratorConfig {
    pub source: SourceConfig,
    pub sink: SinkConfig,
    #[serde(default)]
    pub pipeline: PipelineConfig,
    pub schema: TableConfig,
    #[serde(default)]
    pub checkpoint: CheckpointConfig,
    /// Directory for the daily rolling log file. Logs only go to stdout when absent.
    #[serde(default)]
    pub log_dir: Option<PathBuf>,
}

impl MigratorConfig {
    pub fn validate(&self) -> Result<(), ValidationError> {
        self.source.validate()?;
        self.sink.validate()?;
        self.pipeline.validate()?;
        self.schema.validate()
    }
}

impl Config for MigratorConfig {
    const LIST_PARSE_KEYS: &'static [&'static str] = &["schema.id_aliases"];
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL: &str = r#"{
        "source": {
            "connection": {"host": "localhost", "port": 5432, "name": "firestore_export", "username": "reader", "password": "pw"},
            "table": "companies_new"
        },
        "sink": {
            "connection": {"host": "localhost", "port": 5433, "name": "companies_db", "username": "writer"}
        },
        "schema": {
            "table": "companies",
            "columns": [{"name": "name", "kind": "text", "aliases": ["name"]}]
        }
    }"#;

    #[test]
    fn minimal_configuration_is_valid() {
        let config: MigratorConfig = serde_json::from_str(MINIMAL).unwrap();

        assert!(config.validate().is_ok());
        assert_eq!(config.source.key_column, "id");
        assert_eq!(config.source.data_column, "data");
        assert!(config.checkpoint.enabled);
        assert_eq!(config.checkpoint.path, PathBuf::from("migrate_resume.txt"));
        assert!(config.log_dir.is_none());
    }

    #[test]
    fn nested_errors_surface_through_validate() {
        let mut config: MigratorConfig = serde_json::from_str(MINIMAL).unwrap();
        config.pipeline.queue_max_size = 0;

        assert!(matches!(
            config.validate(),
            Err(ValidationError::InvalidFieldValue { field, .. }) if field == "pipeline.queue_max_size"
        ));
    }
}
