//! Retry with exponential backoff for transient source failures.
//!
//! The producer wraps every page fetch in [`RetryPolicy::run`]. Only errors whose kind is
//! retryable are retried, everything else is returned on the first occurrence.

use std::future::Future;
use std::time::Duration;

use migrate_config::shared::RetryConfig;
use rand::Rng;
use tracing::{error, info, warn};

use crate::error::{ErrorKind, MigrateError, MigrateResult};
use crate::migrate_error;

#[derive(Debug, Clone)]
pub struct RetryPolicy {
    config: RetryConfig,
}

impl RetryPolicy {
    /// Creates a policy from validated retry settings.
    pub fn new(config: RetryConfig) -> Self {
        Self { config }
    }

    /// Whether a failure on attempt `attempt` (1-indexed) should be followed by another attempt.
    pub fn should_retry(&self, error: &MigrateError, attempt: u32) -> bool {
        error.kind().is_retryable() && attempt < self.config.max_attempts
    }

    /// Delay to wait after the failed attempt `attempt` (1-indexed).
    ///
    /// `initial_delay * multiplier^(attempt - 1)`, capped at `max_delay`, plus a random share of up
    /// to `jitter` of that delay.
    pub fn backoff(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(i32::MAX as u32) as i32;
        let multiplier = self.config.backoff_multiplier.powi(exponent);
        let base_delay_ms = self.config.initial_delay_ms as f64 * multiplier;

        let capped_delay_ms = base_delay_ms.min(self.config.max_delay_ms as f64);

        let jitter_factor = rand::thread_rng().r#gen::<f64>() * self.config.jitter;
        let jittered_delay_ms = capped_delay_ms * (1.0 + jitter_factor);

        Duration::from_millis(jittered_delay_ms as u64)
    }

    /// Runs `operation` until it succeeds, fails with a non-retryable error or runs out of attempts.
    ///
    /// Exhausting the attempts yields [`ErrorKind::SourceRetriesExhausted`] with the last error as
    /// its source.
    pub async fn run<T, F, Fut>(&self, mut operation: F) -> MigrateResult<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = MigrateResult<T>>,
    {
        let mut attempt = 1;

        loop {
            match operation().await {
                Ok(value) => {
                    if attempt > 1 {
                        info!(attempt, "source recovered after retrying");
                    }
                    return Ok(value);
                }
                Err(err) => {
                    if !err.kind().is_retryable() {
                        error!(error = %err, "non-retryable source error");
                        return Err(err);
                    }

                    if !self.should_retry(&err, attempt) {
                        error!(attempts = attempt, "source retries exhausted");
                        return Err(migrate_error!(
                            ErrorKind::SourceRetriesExhausted,
                            "Source retries exhausted",
                            format!("gave up after {attempt} attempts, last error: {:?}", err.kind()),
                            source: err
                        ));
                    }

                    let delay = self.backoff(attempt);
                    warn!(
                        error = %err,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        "source fetch failed, retrying after backoff"
                    );

                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
            }
        }
    }
}
