use crate::document::SearchDocument;
use crate::error::SyncError;
use crate::search::SearchIndex;
use async_trait::async_trait;
use catalog_store::{CatalogStore, EntityMessage};
use std::sync::Arc;
use tracing::{debug, info};
use work_queue::{Disposition, MessageHandler, QueueMessage};

/// Projects entity records into the search index.
pub struct IndexSyncHandler {
    store: Arc<dyn CatalogStore>,
    index: Arc<dyn SearchIndex>,
    index_name: String,
}

impl IndexSyncHandler {
    pub fn new(
        store: Arc<dyn CatalogStore>,
        index: Arc<dyn SearchIndex>,
        index_name: impl Into<String>,
    ) -> Self {
        Self {
            store,
            index,
            index_name: index_name.into(),
        }
    }

    /// Fetch, project and upsert one entity.
    pub async fn sync_entity(&self, id: &str) -> Result<Disposition, SyncError> {
        let Some(record) = self.store.find_active_entity(id).await? else {
            return Ok(Disposition::Skipped(format!(
                "entity {} is missing or deactivated",
                id
            )));
        };

        let likes = self
            .store
            .like_counts(std::slice::from_ref(&record.id))
            .await?
            .get(&record.id)
            .copied()
            .unwrap_or(0);

        let body = serde_json::to_value(SearchDocument::from_record(&record, likes))?;
        self.index
            .upsert_document(&self.index_name, &record.id, &body)
            .await?;

        info!(entity_id = %record.id, index = %self.index_name, "Entity indexed");
        Ok(Disposition::Processed)
    }
}

#[async_trait]
impl MessageHandler for IndexSyncHandler {
    type Error = SyncError;

    async fn handle(&self, message: &QueueMessage) -> Result<Disposition, SyncError> {
        let entity: EntityMessage = match message.decode() {
            Ok(entity) => entity,
            Err(e) => return Ok(Disposition::Rejected(format!("undecodable payload: {}", e))),
        };

        debug!(
            entity_id = %entity.id,
            delivery_count = message.delivery_count,
            "Syncing entity to search index"
        );
        self.sync_entity(&entity.id).await
    }
}
