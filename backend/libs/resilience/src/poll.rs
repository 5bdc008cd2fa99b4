/// Readiness polling for startup dependencies
use crate::metrics::set_readiness_wait;
use crate::retry::RetryConfig;
use std::future::Future;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// How long to keep probing a dependency that is not ready yet.
#[derive(Debug, Clone, PartialEq)]
pub enum PollPolicy {
    /// Probe forever with a fixed delay between attempts.
    Unbounded { interval: Duration },
    /// Probe at most `max_attempts` times with exponential backoff.
    Bounded {
        max_attempts: u32,
        initial_backoff: Duration,
        max_backoff: Duration,
        multiplier: f64,
    },
}

impl Default for PollPolicy {
    fn default() -> Self {
        PollPolicy::Unbounded {
            interval: Duration::from_secs(5),
        }
    }
}

impl PollPolicy {
    /// Delay to wait after the given (1-based) failed attempt, or `None` once the
    /// policy is exhausted.
    pub fn delay_after(&self, attempt: u32) -> Option<Duration> {
        match self {
            PollPolicy::Unbounded { interval } => Some(*interval),
            PollPolicy::Bounded {
                max_attempts,
                initial_backoff,
                max_backoff,
                multiplier,
            } => {
                if attempt >= *max_attempts {
                    return None;
                }
                let backoff = RetryConfig {
                    max_retries: *max_attempts,
                    initial_backoff: *initial_backoff,
                    max_backoff: *max_backoff,
                    backoff_multiplier: *multiplier,
                    jitter: false,
                };
                Some(backoff.delay_before_retry(attempt))
            }
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum PollError {
    #[error("{component} not ready after {attempts} attempts (last error: {last_error:?})")]
    Exhausted {
        component: String,
        attempts: u32,
        last_error: Option<String>,
    },
}

/// Probe until the dependency reports ready.
///
/// The probe returns `Ok(true)` when ready and `Ok(false)` when not ready yet.
/// Probe errors count as "not ready" and never abort an unbounded policy.
/// Once `warn_after` has elapsed every further failed attempt is logged at warn
/// level. Returns the number of attempts it took.
pub async fn poll_until_ready<F, Fut, E>(
    component: &str,
    policy: &PollPolicy,
    warn_after: Duration,
    mut probe: F,
) -> Result<u32, PollError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<bool, E>>,
    E: std::fmt::Display,
{
    let started = Instant::now();
    let mut attempt = 0;
    let mut last_error = None;

    loop {
        attempt += 1;
        match probe().await {
            Ok(true) => {
                set_readiness_wait(component, 0);
                info!(component, attempts = attempt, "Dependency ready");
                return Ok(attempt);
            }
            Ok(false) => {
                debug!(component, attempt, "Dependency not ready yet");
            }
            Err(e) => {
                debug!(component, attempt, error = %e, "Readiness probe failed");
                last_error = Some(e.to_string());
            }
        }

        set_readiness_wait(component, attempt);

        let Some(delay) = policy.delay_after(attempt) else {
            return Err(PollError::Exhausted {
                component: component.to_string(),
                attempts: attempt,
                last_error,
            });
        };

        let waited = started.elapsed();
        if waited >= warn_after {
            warn!(
                component,
                attempt,
                waited_secs = waited.as_secs(),
                last_error = last_error.as_deref().unwrap_or("none"),
                "Dependency still not ready"
            );
        }

        tokio::time::sleep(delay).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    fn bounded(max_attempts: u32) -> PollPolicy {
        PollPolicy::Bounded {
            max_attempts,
            initial_backoff: Duration::from_millis(5),
            max_backoff: Duration::from_millis(20),
            multiplier: 2.0,
        }
    }

    #[test]
    fn test_bounded_delays_grow_and_stop() {
        let policy = bounded(4);
        assert_eq!(policy.delay_after(1), Some(Duration::from_millis(5)));
        assert_eq!(policy.delay_after(2), Some(Duration::from_millis(10)));
        assert_eq!(policy.delay_after(3), Some(Duration::from_millis(20)));
        assert_eq!(policy.delay_after(4), None);
    }

    #[test]
    fn test_unbounded_never_exhausts() {
        let policy = PollPolicy::Unbounded {
            interval: Duration::from_millis(7),
        };
        assert_eq!(policy.delay_after(10_000), Some(Duration::from_millis(7)));
    }

    #[tokio::test]
    async fn test_ready_after_a_few_attempts() {
        let calls = Arc::new(AtomicU32::new(0));
        let calls_clone = calls.clone();

        let attempts = poll_until_ready("test", &bounded(10), Duration::ZERO, move || {
            let n = calls_clone.fetch_add(1, Ordering::SeqCst);
            async move {
                if n == 0 {
                    Err("connection refused")
                } else {
                    Ok(n >= 2)
                }
            }
        })
        .await
        .unwrap();

        assert_eq!(attempts, 3);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_bounded_policy_gives_up() {
        let result = poll_until_ready("test", &bounded(3), Duration::ZERO, || async {
            Err::<bool, _>("still down")
        })
        .await;

        match result {
            Err(PollError::Exhausted {
                attempts,
                last_error,
                ..
            }) => {
                assert_eq!(attempts, 3);
                assert_eq!(last_error.as_deref(), Some("still down"));
            }
            Ok(n) => panic!("expected exhaustion, got ready after {}", n),
        }
    }
}
