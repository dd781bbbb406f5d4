//! In-stage retry with exponential backoff and jitter
//!
//! Only [`InvoicerError::Transient`] is retried. Once the budget in
//! [`RetryConfig`] is spent the error escalates to
//! [`JobError::RetriesExhausted`]; every other error passes through untouched
//! on its first occurrence.

use crate::config::RetryConfig;
use crate::domain::{InvoicerError, JobError, Result};
use crate::log_retry_attempt;
use rand::Rng;
use std::future::Future;
use std::time::Duration;

/// Runs `operation` until it succeeds, fails permanently, or runs out of retries
///
/// `what` names the operation in log output.
pub async fn retry_transient<F, Fut, T>(config: &RetryConfig, what: &str, mut operation: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let max_delay = Duration::from_millis(config.max_delay_ms);
    let mut delay = Duration::from_millis(config.initial_delay_ms);
    let mut attempt = 0;

    loop {
        match operation().await {
            Ok(value) => {
                if attempt > 0 {
                    tracing::info!(operation = what, attempts = attempt + 1, "Operation succeeded after retry");
                }
                return Ok(value);
            }
            Err(InvoicerError::Transient(reason)) if attempt < config.max_retries => {
                attempt += 1;
                log_retry_attempt!(attempt, config.max_retries, format!("{what}: {reason}"));

                tokio::time::sleep(add_jitter(delay).min(max_delay)).await;

                delay = Duration::from_secs_f64(delay.as_secs_f64() * config.backoff_multiplier)
                    .min(max_delay);
            }
            Err(InvoicerError::Transient(reason)) => {
                tracing::error!(
                    operation = what,
                    attempts = attempt + 1,
                    error = %reason,
                    "Operation failed after all retry attempts exhausted"
                );
                return Err(JobError::RetriesExhausted {
                    attempts: attempt + 1,
                    last_error: reason,
                }
                .into());
            }
            Err(e) => return Err(e),
        }
    }
}

/// Spreads the delay over `[delay, 2 * delay]`
fn add_jitter(delay: Duration) -> Duration {
    let jitter_factor: f64 = rand::thread_rng().gen_range(0.0..=1.0);
    Duration::from_secs_f64(delay.as_secs_f64() * (1.0 + jitter_factor))
}
