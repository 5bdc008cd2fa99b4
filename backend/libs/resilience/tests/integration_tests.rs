/// Integration tests for resilience library
use resilience::{
    poll_until_ready, with_retry_if, with_timeout, PollPolicy, RetryConfig, RetryError,
    TimeoutError,
};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

fn fast_retry(max_retries: u32) -> RetryConfig {
    RetryConfig {
        max_retries,
        initial_backoff: Duration::from_millis(5),
        max_backoff: Duration::from_millis(20),
        backoff_multiplier: 2.0,
        jitter: false,
    }
}

#[tokio::test]
async fn test_timeout_bounds_the_whole_retry_loop() {
    let counter = Arc::new(AtomicU32::new(0));
    let counter_clone = counter.clone();

    let result = with_timeout(
        Duration::from_millis(50),
        with_retry_if(fast_retry(100), |_: &String| true, move || {
            counter_clone.fetch_add(1, Ordering::SeqCst);
            async { Err::<(), _>("unreachable".to_string()) }
        }),
    )
    .await;

    assert_eq!(result.unwrap_err().after, Duration::from_millis(50));
    assert!(counter.load(Ordering::SeqCst) >= 1);
}

#[derive(Debug, thiserror::Error)]
enum CallError {
    #[error(transparent)]
    Timeout(#[from] TimeoutError),
    #[error("status {0}")]
    Status(u16),
}

impl CallError {
    fn is_timeout(&self) -> bool {
        matches!(self, CallError::Timeout(_))
    }
}

#[tokio::test]
async fn test_each_attempt_gets_its_own_timeout() {
    let counter = Arc::new(AtomicU32::new(0));
    let counter_clone = counter.clone();

    let result = with_retry_if(fast_retry(3), CallError::is_timeout, move || {
        let n = counter_clone.fetch_add(1, Ordering::SeqCst);
        async move {
            with_timeout(Duration::from_millis(20), async move {
                if n == 0 {
                    tokio::time::sleep(Duration::from_millis(200)).await;
                }
                Ok::<_, CallError>(n)
            })
            .await?
        }
    })
    .await;

    assert_eq!(result.unwrap(), 1);
    assert_eq!(counter.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_non_timeout_failure_is_not_retried() {
    let counter = Arc::new(AtomicU32::new(0));
    let counter_clone = counter.clone();

    let result = with_retry_if(fast_retry(3), CallError::is_timeout, move || {
        counter_clone.fetch_add(1, Ordering::SeqCst);
        async {
            with_timeout(Duration::from_secs(1), async { Err::<u32, _>(CallError::Status(400)) })
                .await?
        }
    })
    .await;

    assert!(matches!(
        result,
        Err(RetryError::OperationFailed(CallError::Status(400)))
    ));
    assert_eq!(counter.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_unbounded_poll_outlasts_transient_errors() {
    let counter = Arc::new(AtomicU32::new(0));
    let counter_clone = counter.clone();
    let policy = PollPolicy::Unbounded {
        interval: Duration::from_millis(2),
    };

    let attempts = poll_until_ready("integration", &policy, Duration::ZERO, move || {
        let n = counter_clone.fetch_add(1, Ordering::SeqCst);
        async move {
            if n < 5 {
                Err("index unavailable")
            } else {
                Ok(true)
            }
        }
    })
    .await
    .unwrap();

    assert_eq!(attempts, 6);
}
