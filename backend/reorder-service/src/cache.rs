//! Prediction cache
//!
//! Model-ranked orderings are cached per query for a short TTL. Cache
//! failures are logged and treated as misses.

use crate::models::ReorderRequest;
use async_trait::async_trait;
use redis::AsyncCommands;
use redis_utils::SharedConnectionManager;
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::warn;

pub const PREDICTION_TTL: Duration = Duration::from_secs(600);

/// Stable key for a query: md5 over the model, the query and the candidate
/// ids in request order. Rankings depend on input order, so the same set
/// in another order gets its own entry.
pub fn prediction_key(model_name: &str, request: &ReorderRequest) -> String {
    let raw = format!(
        "{}_{}_{}_{}_{}",
        model_name,
        request.query_phrases.join("."),
        optional_id(request.query_category_id),
        optional_id(request.query_subcategory_id),
        request.candidate_ids.join(".")
    );
    format!("{:x}", md5::compute(raw.as_bytes()))
}

fn optional_id(id: Option<i32>) -> String {
    id.map(|v| v.to_string()).unwrap_or_else(|| "None".to_string())
}

#[async_trait]
pub trait PredictionCache: Send + Sync {
    async fn get(&self, key: &str) -> Option<Vec<String>>;
    async fn set(&self, key: &str, ordered_ids: &[String], ttl: Duration);
}

pub struct RedisPredictionCache {
    redis: SharedConnectionManager,
    timeout: Duration,
}

impl RedisPredictionCache {
    pub fn new(redis: SharedConnectionManager) -> Self {
        Self {
            redis,
            timeout: Duration::from_millis(200),
        }
    }
}

#[async_trait]
impl PredictionCache for RedisPredictionCache {
    async fn get(&self, key: &str) -> Option<Vec<String>> {
        let mut conn = self.redis.lock().await.clone();
        match tokio::time::timeout(self.timeout, conn.get::<_, Option<String>>(key)).await {
            Ok(Ok(value)) => value.map(|v| v.split(',').map(String::from).collect()),
            Ok(Err(e)) => {
                warn!(error = %e, "Prediction cache read failed");
                None
            }
            Err(_) => {
                warn!(timeout_ms = self.timeout.as_millis() as u64, "Prediction cache read timed out");
                None
            }
        }
    }

    async fn set(&self, key: &str, ordered_ids: &[String], ttl: Duration) {
        let mut conn = self.redis.lock().await.clone();
        let write = conn.set_ex::<_, _, ()>(key, ordered_ids.join(","), ttl.as_secs().max(1));
        match tokio::time::timeout(self.timeout, write).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => warn!(error = %e, "Prediction cache write failed"),
            Err(_) => warn!("Prediction cache write timed out"),
        }
    }
}

#[derive(Debug, Default)]
pub struct InMemoryPredictionCache {
    entries: RwLock<HashMap<String, Vec<String>>>,
}

impl InMemoryPredictionCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }
}

#[async_trait]
impl PredictionCache for InMemoryPredictionCache {
    async fn get(&self, key: &str) -> Option<Vec<String>> {
        self.entries.read().await.get(key).cloned()
    }

    async fn set(&self, key: &str, ordered_ids: &[String], _ttl: Duration) {
        self.entries
            .write()
            .await
            .insert(key.to_string(), ordered_ids.to_vec());
    }
}
