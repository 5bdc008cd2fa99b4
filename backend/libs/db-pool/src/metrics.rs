use once_cell::sync::Lazy;
use prometheus::{register_int_gauge_vec, IntGaugeVec};
use sqlx::PgPool;

static POOL_SIZE: Lazy<IntGaugeVec> = Lazy::new(|| {
    register_int_gauge_vec!("db_pool_size", "Open pool connections", &["service"])
        .expect("Failed to register pool size metric")
});

static POOL_IDLE: Lazy<IntGaugeVec> = Lazy::new(|| {
    register_int_gauge_vec!("db_pool_idle", "Idle pool connections", &["service"])
        .expect("Failed to register pool idle metric")
});

static POOL_MAX: Lazy<IntGaugeVec> = Lazy::new(|| {
    register_int_gauge_vec!("db_pool_max", "Configured pool ceiling", &["service"])
        .expect("Failed to register pool max metric")
});

/// Snapshot the pool into the gauges; called on a fixed interval.
pub(crate) fn observe_pool(pool: &PgPool, service: &str) {
    POOL_SIZE
        .with_label_values(&[service])
        .set(i64::from(pool.size()));
    POOL_IDLE
        .with_label_values(&[service])
        .set(pool.num_idle() as i64);
    POOL_MAX
        .with_label_values(&[service])
        .set(i64::from(pool.options().get_max_connections()));
}
