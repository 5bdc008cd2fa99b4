use once_cell::sync::Lazy;
use prometheus::{register_int_counter_vec, IntCounterVec};

static QUEUE_MESSAGES: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "queue_messages_total",
        "Messages handled by queue consumers by outcome",
        &["queue", "outcome"]
    )
    .expect("Failed to register queue messages metric")
});

pub(crate) fn record_outcome(queue: &str, outcome: &str) {
    QUEUE_MESSAGES.with_label_values(&[queue, outcome]).inc();
}
