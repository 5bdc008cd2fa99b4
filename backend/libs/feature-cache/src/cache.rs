use crate::error::{CacheError, Result};
use crate::models::FeatureVector;
use async_trait::async_trait;
use redis::AsyncCommands;
use redis_utils::SharedConnectionManager;
use std::collections::HashMap;
use std::future::Future;
use std::time::Duration;
use tracing::{debug, warn};

/// Keys per MGET round trip
pub const MGET_BATCH_SIZE: usize = 100;

const DEFAULT_TIMEOUT: Duration = Duration::from_millis(500);

/// Cache key for one entity's features under a feature version.
pub fn feature_key(version: &str, entity_id: &str) -> String {
    format!("entity_feature:{}:{}", version, entity_id)
}

#[async_trait]
pub trait FeatureCache: Send + Sync {
    /// Partial lookup: only ids with a decodable cached entry are returned.
    async fn get_features(&self, ids: &[String]) -> Result<HashMap<String, FeatureVector>>;

    async fn set_features(&self, id: &str, features: &FeatureVector, ttl: Duration) -> Result<()>;
}

/// Redis implementation storing JSON-encoded vectors under [`feature_key`].
pub struct RedisFeatureCache {
    redis: SharedConnectionManager,
    version: String,
    timeout: Duration,
}

impl RedisFeatureCache {
    pub fn new(redis: SharedConnectionManager, version: impl Into<String>) -> Self {
        Self {
            redis,
            version: version.into(),
            timeout: DEFAULT_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    async fn bounded<T, F>(&self, op: F) -> Result<T>
    where
        F: Future<Output = redis::RedisResult<T>>,
    {
        tokio::time::timeout(self.timeout, op)
            .await
            .map_err(|_| CacheError::Timeout(self.timeout))?
            .map_err(CacheError::from)
    }
}

#[async_trait]
impl FeatureCache for RedisFeatureCache {
    async fn get_features(&self, ids: &[String]) -> Result<HashMap<String, FeatureVector>> {
        let mut found = HashMap::with_capacity(ids.len());
        if ids.is_empty() {
            return Ok(found);
        }

        let mut conn = self.redis.lock().await.clone();

        for batch in ids.chunks(MGET_BATCH_SIZE) {
            let keys: Vec<String> = batch
                .iter()
                .map(|id| feature_key(&self.version, id))
                .collect();

            let values: Vec<Option<String>> = self
                .bounded(redis::cmd("MGET").arg(&keys).query_async(&mut conn))
                .await?;

            for (id, value) in batch.iter().zip(values) {
                let Some(raw) = value else {
                    continue;
                };
                match serde_json::from_str::<FeatureVector>(&raw) {
                    Ok(features) => {
                        found.insert(id.clone(), features);
                    }
                    Err(e) => {
                        warn!(entity_id = %id, error = %e, "Dropping undecodable cached feature");
                    }
                }
            }
        }

        debug!(requested = ids.len(), found = found.len(), "Feature cache lookup");
        Ok(found)
    }

    async fn set_features(&self, id: &str, features: &FeatureVector, ttl: Duration) -> Result<()> {
        let serialized = serde_json::to_string(features)?;
        let key = feature_key(&self.version, id);
        let mut conn = self.redis.lock().await.clone();

        self.bounded(conn.set_ex::<_, _, ()>(&key, serialized, ttl.as_secs().max(1)))
            .await?;

        debug!(entity_id = %id, ttl_secs = ttl.as_secs(), "Cached feature vector");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_feature_key_is_versioned() {
        assert_eq!(feature_key("v3", "abc"), "entity_feature:v3:abc");
        assert_ne!(feature_key("v3", "abc"), feature_key("v4", "abc"));
    }
}
