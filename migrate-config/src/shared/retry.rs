use std::time::Duration;

use serde::Deserialize;

use crate::shared::{ValidationError, invalid_field};

/// Backoff settings for retrying transient source failures.
///
/// Applied at the fetch boundary of the producer. Delays grow as
/// `initial_delay * backoff_multiplier^(attempt - 1)`, capped at `max_delay`, with up to `jitter`
/// of the delay added at random.
#[derive(Clone, Debug, Deserialize)]
pub struct RetryConfig {
    /// Total attempts including the first one.
    ///
    /// Default: 5
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Default: 1000ms
    #[serde(default = "default_initial_delay_ms")]
    pub initial_delay_ms: u64,

    /// Default: 60000ms
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,

    /// Must be >= 1.0.
    ///
    /// Default: 2.0
    #[serde(default = "default_backoff_multiplier")]
    pub backoff_multiplier: f64,

    /// Fraction of the computed delay added as random jitter, in `[0.0, 1.0]`.
    ///
    /// Default: 0.3
    #[serde(default = "default_jitter")]
    pub jitter: f64,
}

fn default_max_attempts() -> u32 {
    5
}

fn default_initial_delay_ms() -> u64 {
    1000
}

fn default_max_delay_ms() -> u64 {
    60000
}

fn default_backoff_multiplier() -> f64 {
    2.0
}

fn default_jitter() -> f64 {
    0.3
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            initial_delay_ms: default_initial_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
            backoff_multiplier: default_backoff_multiplier(),
            jitter: default_jitter(),
        }
    }
}

impl RetryConfig {
    pub fn initial_delay(&self) -> Duration {
        Duration::from_millis(self.initial_delay_ms)
    }

    pub fn max_delay(&self) -> Duration {
        Duration::from_millis(self.max_delay_ms)
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.max_attempts == 0 {
            return Err(invalid_field(
                "pipeline.retry.max_attempts",
                "must be greater than 0",
            ));
        }

        if self.backoff_multiplier.is_nan() || self.backoff_multiplier < 1.0 {
            return Err(invalid_field(
                "pipeline.retry.backoff_multiplier",
                "must be at least 1.0",
            ));
        }

        if !(0.0..=1.0).contains(&self.jitter) {
            return Err(invalid_field(
                "pipeline.retry.jitter",
                "must be between 0.0 and 1.0",
            ));
        }

        if self.initial_delay_ms > self.max_delay_ms {
            return Err(invalid_field(
                "pipeline.retry.initial_delay_ms",
                "must not exceed max_delay_ms",
            ));
        }

        Ok(())
    }
}
