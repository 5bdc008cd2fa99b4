/// Retry policy with exponential backoff and jitter
use crate::metrics::record_retry;
use rand::Rng;
use std::future::Future;
use std::time::Duration;
use tracing::warn;

#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Maximum number of retry attempts after the first call
    pub max_retries: u32,
    /// Initial backoff duration
    pub initial_backoff: Duration,
    /// Maximum backoff duration
    pub max_backoff: Duration,
    /// Backoff multiplier for exponential backoff
    pub backoff_multiplier: f64,
    /// Add random jitter to backoff (±30%)
    pub jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_backoff: Duration::from_millis(100),
            max_backoff: Duration::from_secs(10),
            backoff_multiplier: 2.0,
            jitter: true,
        }
    }
}

impl RetryConfig {
    /// Backoff before the `retry`-th retry (1-based): exponential, capped at
    /// `max_backoff`, with ±30% jitter when enabled.
    pub fn delay_before_retry(&self, retry: u32) -> Duration {
        let exponent = retry.saturating_sub(1).min(i32::MAX as u32) as i32;
        let base = self.initial_backoff.as_nanos() as f64 * self.backoff_multiplier.powi(exponent);
        let capped = base.min(self.max_backoff.as_nanos() as f64);
        let factor = if self.jitter {
            1.0 + rand::thread_rng().gen_range(-0.3..0.3)
        } else {
            1.0
        };
        Duration::from_nanos((capped * factor).max(0.0).round() as u64)
    }

    /// Config that calls the operation exactly once.
    pub fn no_retry() -> Self {
        Self {
            max_retries: 0,
            ..Default::default()
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum RetryError<E> {
    #[error("Max retries ({retries}) exceeded: {last_error}")]
    MaxRetriesExceeded { retries: u32, last_error: E },
    #[error("Operation failed: {0}")]
    OperationFailed(E),
}

impl<E> RetryError<E> {
    /// The error returned by the final attempt.
    pub fn into_inner(self) -> E {
        match self {
            RetryError::MaxRetriesExceeded { last_error, .. } => last_error,
            RetryError::OperationFailed(e) => e,
        }
    }
}

/// Execute a future with retry logic, retrying every error.
pub async fn with_retry<F, Fut, T, E>(config: RetryConfig, f: F) -> Result<T, RetryError<E>>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: std::fmt::Display,
{
    with_retry_if(config, |_| true, f).await
}

/// Execute a future with retry logic, retrying only errors accepted by `should_retry`.
///
/// A rejected error is returned immediately as [`RetryError::OperationFailed`].
pub async fn with_retry_if<F, Fut, T, E, P>(
    config: RetryConfig,
    should_retry: P,
    mut f: F,
) -> Result<T, RetryError<E>>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: std::fmt::Display,
    P: Fn(&E) -> bool,
{
    let mut calls = 0;

    loop {
        calls += 1;
        let e = match f().await {
            Ok(result) => {
                record_retry("success", calls);
                return Ok(result);
            }
            Err(e) => e,
        };

        if !should_retry(&e) {
            record_retry("rejected", calls);
            return Err(RetryError::OperationFailed(e));
        }

        let retries_used = calls - 1;
        if retries_used >= config.max_retries {
            warn!(error = %e, calls, "Giving up after {} retries", config.max_retries);
            record_retry("exhausted", calls);
            return Err(RetryError::MaxRetriesExceeded {
                retries: config.max_retries,
                last_error: e,
            });
        }

        let delay = config.delay_before_retry(retries_used + 1);
        warn!(
            error = %e,
            retry = retries_used + 1,
            max_retries = config.max_retries,
            delay_ms = delay.as_millis() as u64,
            "Retrying after failure"
        );
        tokio::time::sleep(delay).await;
    }
}
