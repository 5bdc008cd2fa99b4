/// Resilience helpers shared by the propagation consumers and the reorder path
///
/// - **Retry**: exponential backoff with jitter, optionally gated by a predicate
/// - **Timeout**: hard time limits on external calls
/// - **Poll**: readiness polling with an unbounded or bounded-attempts policy
///
/// # Example: waiting for a dependency to become ready
///
/// ```rust,no_run
/// use resilience::{poll_until_ready, PollPolicy};
/// use std::time::Duration;
///
/// #[tokio::main]
/// async fn main() {
///     let policy = PollPolicy::Unbounded { interval: Duration::from_secs(5) };
///
///     let attempts = poll_until_ready("search-index", &policy, Duration::from_secs(60), || async {
///         // Probe the dependency here
///         Ok::<_, String>(true)
///     })
///     .await;
/// }
/// ```

mod metrics;
pub mod poll;
pub mod retry;
pub mod timeout;

pub use poll::{poll_until_ready, PollError, PollPolicy};
pub use retry::{with_retry, with_retry_if, RetryConfig, RetryError};
pub use timeout::{with_timeout, TimeoutError};
