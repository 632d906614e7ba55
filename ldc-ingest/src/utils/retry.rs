//! Retry with bounded exponential backoff
//!
//! Network calls to the search index and media hosts fail transiently (connect resets,
//! timeouts, 429/5xx). Those are retried; everything else fails on the first attempt so a
//! permanently unavailable stream is not hammered.
//!
//! **Backoff Strategy:**
//! - Initial delay: `initial_backoff`
//! - Multiplier: 2.0 (exponential), capped at `max_backoff`
//! - Gives up after `max_attempts` total attempts

use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

/// Errors that can tell whether retrying might help
pub trait Transient {
    fn is_transient(&self) -> bool;
}

/// Retry budget
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Total attempts including the first (at least 1)
    pub max_attempts: u32,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_backoff: Duration::from_millis(500),
            max_backoff: Duration::from_secs(8),
        }
    }
}

impl RetryPolicy {
    /// Single attempt, no retries
    pub fn none() -> Self {
        Self {
            max_attempts: 1,
            initial_backoff: Duration::ZERO,
            max_backoff: Duration::ZERO,
        }
    }

    /// Delay before attempt `attempt + 1` (attempt is 1-based)
    fn backoff_after(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
        self.initial_backoff
            .saturating_mul(factor)
            .min(self.max_backoff)
    }
}

/// Run `operation` until it succeeds, fails permanently, or the budget is spent
///
/// # Arguments
/// * `operation_name` - Name for logging (e.g., "search", "download")
/// * `policy` - Attempt budget and backoff bounds
/// * `operation` - Async closure performing one attempt
pub async fn retry_transient<F, Fut, T, E>(
    operation_name: &str,
    policy: &RetryPolicy,
    mut operation: F,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Transient + Display,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 0;

    loop {
        attempt += 1;

        match operation().await {
            Ok(result) => {
                if attempt > 1 {
                    tracing::debug!(
                        operation = operation_name,
                        attempt,
                        "Operation succeeded after retry"
                    );
                }
                return Ok(result);
            }
            Err(err) if err.is_transient() && attempt < max_attempts => {
                let delay = policy.backoff_after(attempt);
                tracing::warn!(
                    operation = operation_name,
                    attempt,
                    max_attempts,
                    delay_ms = delay.as_millis() as u64,
                    error = %err,
                    "Transient failure, retrying"
                );
                tokio::time::sleep(delay).await;
            }
            Err(err) => {
                if err.is_transient() {
                    tracing::warn!(
                        operation = operation_name,
                        attempt,
                        error = %err,
                        "Giving up after transient failures"
                    );
                }
                return Err(err);
            }
        }
    }
}
