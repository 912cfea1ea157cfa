use std::time::Duration;

use serde::Deserialize;

use crate::shared::{RetryConfig, ValidationError, invalid_field};

/// Sizing and pacing of the producer/worker pipeline.
#[derive(Clone, Debug, Deserialize)]
pub struct PipelineConfig {
    /// Records requested per source query.
    #[serde(default = "default_page_size")]
    pub page_size: usize,
    /// Records per work item handed to a worker, and so per sink transaction.
    #[serde(default = "default_item_size")]
    pub item_size: usize,
    #[serde(default = "default_worker_count")]
    pub worker_count: usize,
    /// Capacity of the work channel. A full channel blocks the producer.
    #[serde(default = "default_queue_max_size")]
    pub queue_max_size: usize,
    /// Pause after every fetched page.
    #[serde(default)]
    pub fetch_delay_ms: u64,
    /// Pause after every batch a worker finishes.
    #[serde(default)]
    pub batch_delay_ms: u64,
    /// How long the progress aggregator waits for an event before checking for termination.
    #[serde(default = "default_progress_poll_ms")]
    pub progress_poll_ms: u64,
    /// Transform and count rows without writing them.
    #[serde(default)]
    pub dry_run: bool,
    #[serde(default)]
    pub retry: RetryConfig,
}

impl PipelineConfig {
    pub const DEFAULT_PAGE_SIZE: usize = 1000;

    pub const DEFAULT_ITEM_SIZE: usize = 500;

    pub const DEFAULT_WORKER_COUNT: usize = 5;

    pub const DEFAULT_QUEUE_MAX_SIZE: usize = 20;

    pub const DEFAULT_PROGRESS_POLL_MS: u64 = 1000;

    pub fn fetch_delay(&self) -> Duration {
        Duration::from_millis(self.fetch_delay_ms)
    }

    pub fn batch_delay(&self) -> Duration {
        Duration::from_millis(self.batch_delay_ms)
    }

    pub fn progress_poll(&self) -> Duration {
        Duration::from_millis(self.progress_poll_ms)
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        let positive = [
            ("pipeline.page_size", self.page_size),
            ("pipeline.item_size", self.item_size),
            ("pipeline.worker_count", self.worker_count),
            ("pipeline.queue_max_size", self.queue_max_size),
        ];

        for (field, value) in positive {
            if value == 0 {
                return Err(invalid_field(field, "must be greater than 0"));
            }
        }

        if self.progress_poll_ms == 0 {
            return Err(invalid_field(
                "pipeline.progress_poll_ms",
                "must be greater than 0",
            ));
        }

        self.retry.validate()
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            page_size: default_page_size(),
            item_size: default_item_size(),
            worker_count: default_worker_count(),
            queue_max_size: default_queue_max_size(),
            fetch_delay_ms: 0,
            batch_delay_ms: 0,
            progress_poll_ms: default_progress_poll_ms(),
            dry_run: false,
            retry: RetryConfig::default(),
        }
    }
}

fn default_page_size() -> usize {
    PipelineConfig::DEFAULT_PAGE_SIZE
}

fn default_item_size() -> usize {
    PipelineConfig::DEFAULT_ITEM_SIZE
}

fn default_worker_count() -> usize {
    PipelineConfig::DEFAULT_WORKER_COUNT
}

fn default_queue_max_size() -> usize {
    PipelineConfig::DEFAULT_QUEUE_MAX_SIZE
}

fn default_progress_poll_ms() -> u64 {
    PipelineConfig::DEFAULT_PROGRESS_POLL_MS
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_workers_is_rejected() {
        let config = PipelineConfig {
            worker_count: 0,
            ..PipelineConfig::default()
        };

        assert_eq!(
            config.validate(),
            Err(ValidationError::InvalidFieldValue {
                field: "pipeline.worker_count".to_string(),
                constraint: "must be greater than 0".to_string(),
            })
        );
    }

    #[test]
    fn empty_section_uses_defaults() {
        let config: PipelineConfig = serde_json::from_str("{}").unwrap();

        assert_eq!(config.page_size, 1000);
        assert_eq!(config.item_size, 500);
        assert_eq!(config.worker_count, 5);
        assert_eq!(config.queue_max_size, 20);
        assert!(!config.dry_run);
        assert!(config.validate().is_ok());
    }
}
