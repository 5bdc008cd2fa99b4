use crate::cache::FeatureCache;
use crate::error::Result;
use crate::models::FeatureVector;
use async_trait::async_trait;
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::RwLock;

/// In-process feature cache. TTLs are recorded but never enforced.
#[derive(Debug, Default)]
pub struct InMemoryFeatureCache {
    entries: RwLock<HashMap<String, (FeatureVector, Duration)>>,
}

impl InMemoryFeatureCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn ttl_of(&self, id: &str) -> Option<Duration> {
        self.entries.read().await.get(id).map(|(_, ttl)| *ttl)
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }
}

#[async_trait]
impl FeatureCache for InMemoryFeatureCache {
    async fn get_features(&self, ids: &[String]) -> Result<HashMap<String, FeatureVector>> {
        let entries = self.entries.read().await;
        Ok(ids
            .iter()
            .filter_map(|id| entries.get(id).map(|(f, _)| (id.clone(), f.clone())))
            .collect())
    }

    async fn set_features(&self, id: &str, features: &FeatureVector, ttl: Duration) -> Result<()> {
        self.entries
            .write()
            .await
            .insert(id.to_string(), (features.clone(), ttl));
        Ok(())
    }
}
