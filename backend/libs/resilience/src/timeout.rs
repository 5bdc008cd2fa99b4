/// Hard time limit on a single future
use crate::metrics::record_timeout;
use std::future::Future;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("Operation timed out after {after:?}")]
pub struct TimeoutError {
    pub after: Duration,
}

/// Run `future` to completion or give up after `duration`.
///
/// The inner output is returned untouched, so a fallible future yields
/// `Result<Result<T, E>, TimeoutError>` and the caller decides how to fold it.
pub async fn with_timeout<F, T>(duration: Duration, future: F) -> Result<T, TimeoutError>
where
    F: Future<Output = T>,
{
    match tokio::time::timeout(duration, future).await {
        Ok(value) => {
            record_timeout("completed");
            Ok(value)
        }
        Err(_) => {
            record_timeout("elapsed");
            Err(TimeoutError { after: duration })
        }
    }
}
