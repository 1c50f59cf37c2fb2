//! Retry logic.
//!
//! # Responsibilities
//! - Classify errors as transient or permanent
//! - Execute retries with exponential backoff + jitter
//! - Abort the backoff wait when the caller cancels
//!
//! # Design Decisions
//! - Classification is a case-insensitive substring match on the error text,
//!   so operators can extend it from configuration
//! - Permanent errors return on first occurrence without touching the budget
//! - No sleep after the final attempt

use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

use thiserror::Error;
use tokio_util::sync::CancellationToken;

use crate::resilience::backoff::calculate_backoff;

/// Retry behaviour for one class of outbound call.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryConfig {
    pub max_attempts: u32,
    pub initial_delay: Duration,
    pub max_delay: Duration,
    pub backoff_factor: f64,
    /// Substrings that mark an error as transient.
    pub retryable_errors: Vec<String>,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            initial_delay: Duration::from_millis(250),
            max_delay: Duration::from_secs(5),
            backoff_factor: 1.5,
            retryable_errors: default_retryable_errors(),
        }
    }
}

/// Error text fragments treated as transient by default.
pub fn default_retryable_errors() -> Vec<String> {
    [
        "timeout",
        "connection refused",
        "temporary failure",
        "429",
        "500",
        "502",
        "503",
        "504",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

/// Error returned by [`with_retry`].
#[derive(Debug, Error)]
pub enum RetryError<E> {
    /// Permanent error, returned on first occurrence.
    #[error(transparent)]
    Aborted(E),

    /// Every attempt failed with a transient error.
    #[error("operation failed after {attempts} attempts: {last}")]
    Exhausted { attempts: u32, last: E },

    /// The caller cancelled while waiting between attempts.
    #[error("context canceled")]
    Cancelled,
}

/// Whether `err` matches any of the configured transient patterns.
pub fn is_retryable<E: Display + ?Sized>(err: &E, retryable_errors: &[String]) -> bool {
    let text = err.to_string().to_lowercase();
    retryable_errors
        .iter()
        .any(|pattern| text.contains(&pattern.to_lowercase()))
}

/// Run `f` up to `config.max_attempts` times with exponential backoff.
pub async fn with_retry<T, E, F, Fut>(
    cancel: &CancellationToken,
    config: &RetryConfig,
    operation: &str,
    mut f: F,
) -> Result<T, RetryError<E>>
where
    E: Display,
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    let max_attempts = config.max_attempts.max(1);
    let mut attempt = 1;

    loop {
        let err = match f().await {
            Ok(value) => {
                if attempt > 1 {
                    tracing::info!(
                        operation = operation,
                        attempt = attempt,
                        "operation succeeded after retry"
                    );
                }
                return Ok(value);
            }
            Err(err) => err,
        };

        if !is_retryable(&err, &config.retryable_errors) {
            tracing::debug!(
                operation = operation,
                attempt = attempt,
                error = %err,
                "non-retryable error, aborting"
            );
            return Err(RetryError::Aborted(err));
        }

        if attempt >= max_attempts {
            return Err(RetryError::Exhausted {
                attempts: max_attempts,
                last: err,
            });
        }

        let delay = calculate_backoff(
            attempt,
            config.initial_delay,
            config.max_delay,
            config.backoff_factor,
        );
        tracing::warn!(
            operation = operation,
            attempt = attempt,
            max_attempts = max_attempts,
            retry_delay_ms = delay.as_millis() as u64,
            error = %err,
            "retrying operation after error"
        );

        tokio::select! {
            _ = cancel.cancelled() => return Err(RetryError::Cancelled),
            _ = tokio::time::sleep(delay) => {}
        }
        attempt += 1;
    }
}
