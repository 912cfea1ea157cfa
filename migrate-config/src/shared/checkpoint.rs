use std::path::PathBuf;

use serde::Deserialize;

/// Where the resume point of an interrupted run is kept.
#[derive(Clone, Debug, Deserialize)]
pub struct CheckpointConfig {
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    #[serde(default = "default_path")]
    pub path: PathBuf,
}

fn default_enabled() -> bool {
    true
}

fn default_path() -> PathBuf {
    PathBuf::from("migrate_resume.txt")
}

impl Default for CheckpointConfig {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            path: default_path(),
        }
    }
}
