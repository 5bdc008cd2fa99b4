use once_cell::sync::Lazy;
use prometheus::{register_histogram, register_int_counter_vec, Histogram, IntCounterVec};

static REORDER_REQUESTS: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "reorder_requests_total",
        "Reorder requests by outcome",
        &["outcome"]
    )
    .expect("Failed to register reorder requests metric")
});

static REORDER_LATENCY: Lazy<Histogram> = Lazy::new(|| {
    register_histogram!(
        "reorder_latency_seconds",
        "End-to-end reorder latency",
        vec![0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5]
    )
    .expect("Failed to register reorder latency metric")
});

pub(crate) fn record_request(outcome: &str, elapsed_secs: f64) {
    REORDER_REQUESTS.with_label_values(&[outcome]).inc();
    REORDER_LATENCY.observe(elapsed_secs);
}
