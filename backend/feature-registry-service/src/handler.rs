use crate::error::FeatureError;
use crate::extractor::FeatureExtractor;
use crate::store::FeatureRowStore;
use async_trait::async_trait;
use catalog_store::{CatalogStore, EntityMessage};
use feature_cache::FeatureCache;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};
use work_queue::{Disposition, MessageHandler, QueueMessage};

/// Computes, persists and caches feature vectors for queued entities.
///
/// The database row is written first and is authoritative: on redelivery the
/// stored row is what gets cached, never the freshly computed one. A cache
/// write failure fails the message so the entry is retried.
pub struct FeatureRegistrationHandler {
    catalog: Arc<dyn CatalogStore>,
    rows: Arc<dyn FeatureRowStore>,
    cache: Arc<dyn FeatureCache>,
    extractor: FeatureExtractor,
    feature_version: String,
    cache_ttl: Duration,
}

impl FeatureRegistrationHandler {
    pub fn new(
        catalog: Arc<dyn CatalogStore>,
        rows: Arc<dyn FeatureRowStore>,
        cache: Arc<dyn FeatureCache>,
        extractor: FeatureExtractor,
        feature_version: impl Into<String>,
        cache_ttl: Duration,
    ) -> Self {
        Self {
            catalog,
            rows,
            cache,
            extractor,
            feature_version: feature_version.into(),
            cache_ttl,
        }
    }

    pub async fn register(&self, id: &str) -> Result<Disposition, FeatureError> {
        let Some(record) = self.catalog.find_active_entity(id).await? else {
            return Ok(Disposition::Skipped(format!(
                "entity {} is missing or deactivated",
                id
            )));
        };

        let computed = self.extractor.extract(&record);
        let stored = self
            .rows
            .insert_if_absent(&record.id, &self.feature_version, &computed)
            .await?;

        self.cache
            .set_features(&record.id, &stored.features, self.cache_ttl)
            .await?;

        info!(
            entity_id = %record.id,
            version = %self.feature_version,
            inserted = stored.inserted,
            "Feature vector registered"
        );
        Ok(Disposition::Processed)
    }
}

#[async_trait]
impl MessageHandler for FeatureRegistrationHandler {
    type Error = FeatureError;

    async fn handle(&self, message: &QueueMessage) -> Result<Disposition, FeatureError> {
        let entity: EntityMessage = match message.decode() {
            Ok(entity) => entity,
            Err(e) => return Ok(Disposition::Rejected(format!("undecodable payload: {}", e))),
        };

        debug!(entity_id = %entity.id, delivery_count = message.delivery_count, "Extracting features");
        self.register(&entity.id).await
    }
}
