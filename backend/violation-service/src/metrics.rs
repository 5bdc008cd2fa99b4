use once_cell::sync::Lazy;
use prometheus::{register_int_counter, register_int_counter_vec, IntCounter, IntCounterVec};

static SWEEP_RUNS: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "violation_sweep_runs_total",
        "Reconciliation sweep passes by outcome",
        &["outcome"]
    )
    .expect("Failed to register sweep runs metric")
});

static SWEEP_REPAIRS: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!(
        "violation_sweep_repairs_total",
        "Entities deactivated by the reconciliation sweep"
    )
    .expect("Failed to register sweep repairs metric")
});

pub(crate) fn record_sweep(outcome: &str, repaired: usize) {
    SWEEP_RUNS.with_label_values(&[outcome]).inc();
    SWEEP_REPAIRS.inc_by(repaired as u64);
}
