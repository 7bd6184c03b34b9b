//! Retry strategy: exponential backoff with jitter for transient ledger failures

use crate::config::RetryConfig;
use crate::{Error, Result};
use std::time::Duration;
use tracing::{info, warn};

/// Backoff policy shared by ledger reads and sequence re-fetches
#[derive(Debug, Clone)]
pub struct RetryStrategy {
    config: RetryConfig,
}

impl RetryStrategy {
    /// Strategy with explicit backoff settings
    pub fn new(config: RetryConfig) -> Self {
        Self { config }
    }

    /// Strategy with default backoff settings
    pub fn with_defaults() -> Self {
        Self::new(RetryConfig::default())
    }

    /// Attempts after the first
    pub fn max_retries(&self) -> u32 {
        self.config.max_retries
    }

    /// Calculate delay for nth retry with exponential backoff + jitter
    pub fn calculate_delay(&self, attempt: u32) -> Duration {
        let base_delay = self.config.initial_delay_ms as f64
            * self.config.backoff_multiplier.powi(attempt as i32);

        let capped_delay = base_delay.min(self.config.max_delay_ms as f64);

        // Spread concurrent signers apart
        let jitter_range = capped_delay * self.config.jitter_factor;
        let jitter = (rand::random::<f64>() - 0.5) * jitter_range * 2.0;
        let final_delay = (capped_delay + jitter).max(0.0);

        Duration::from_millis(final_delay as u64)
    }

    /// Run a read-only ledger call, retrying transient failures.
    ///
    /// Never wrap a submission in this: a dropped connection after the
    /// ledger accepted the operation would broadcast it twice.
    pub async fn execute_with_retry<F, Fut, T>(&self, operation: F, operation_name: &str) -> Result<T>
    where
        F: Fn() -> Fut,
        Fut: std::future::Future<Output = Result<T>>,
    {
        let mut last_error = None;

        for attempt in 0..=self.config.max_retries {
            if attempt > 0 {
                let delay = self.calculate_delay(attempt - 1);
                warn!(
                    attempt,
                    max_retries = self.config.max_retries,
                    "Retrying {} after {:?}",
                    operation_name,
                    delay
                );
                tokio::time::sleep(delay).await;
            }

            match operation().await {
                Ok(result) => {
                    if attempt > 0 {
                        info!(attempt, "{} succeeded on retry", operation_name);
                    }
                    return Ok(result);
                }
                Err(e) => {
                    if !Self::is_retryable_error(&e) {
                        return Err(e);
                    }

                    warn!(
                        attempt = attempt + 1,
                        "{} failed: {}",
                        operation_name,
                        e
                    );
                    last_error = Some(e);
                }
            }
        }

        Err(last_error.unwrap_or_else(|| {
            Error::LedgerUnavailable(format!("{}: retries exhausted", operation_name))
        }))
    }

    /// Determine if a read failure is worth repeating
    pub fn is_retryable_error(error: &Error) -> bool {
        matches!(error, Error::LedgerUnavailable(_))
    }
}
