//! Prometheus metrics for retries, timeouts and readiness polling
//!
//! Without the `metrics` feature every recorder is a no-op.

#[cfg(feature = "metrics")]
mod registry {
    use once_cell::sync::Lazy;
    use prometheus::{
        register_histogram_vec, register_int_counter_vec, register_int_gauge_vec, HistogramVec,
        IntCounterVec, IntGaugeVec,
    };

    pub(super) static TIMEOUTS: Lazy<IntCounterVec> = Lazy::new(|| {
        register_int_counter_vec!(
            "resilience_timeout_operations_total",
            "Timeout-guarded operations by result",
            &["result"]
        )
        .expect("Failed to register timeout operations metric")
    });

    pub(super) static RETRY_ATTEMPTS: Lazy<HistogramVec> = Lazy::new(|| {
        register_histogram_vec!(
            "resilience_retry_attempts",
            "Calls made per retried operation, by final result",
            &["result"],
            vec![1.0, 2.0, 3.0, 4.0, 6.0, 10.0]
        )
        .expect("Failed to register retry attempts metric")
    });

    pub(super) static READINESS_WAIT: Lazy<IntGaugeVec> = Lazy::new(|| {
        register_int_gauge_vec!(
            "readiness_wait_attempts",
            "Failed readiness probes since startup, zero once the dependency is ready",
            &["component"]
        )
        .expect("Failed to register readiness wait metric")
    });
}

#[cfg(feature = "metrics")]
pub(crate) fn record_timeout(result: &str) {
    registry::TIMEOUTS.with_label_values(&[result]).inc();
}

#[cfg(feature = "metrics")]
pub(crate) fn record_retry(result: &str, calls: u32) {
    registry::RETRY_ATTEMPTS
        .with_label_values(&[result])
        .observe(f64::from(calls));
}

#[cfg(feature = "metrics")]
pub(crate) fn set_readiness_wait(component: &str, failed_probes: u32) {
    registry::READINESS_WAIT
        .with_label_values(&[component])
        .set(i64::from(failed_probes));
}

#[cfg(not(feature = "metrics"))]
pub(crate) fn record_timeout(_result: &str) {}

#[cfg(not(feature = "metrics"))]
pub(crate) fn record_retry(_result: &str, _calls: u32) {}

#[cfg(not(feature = "metrics"))]
pub(crate) fn set_readiness_wait(_component: &str, _failed_probes: u32) {}
