use crate::classifier::Classifier;
use crate::error::ViolationError;
use crate::models::{ViolationMessage, JUDGE_MODEL};
use async_trait::async_trait;
use catalog_store::{CatalogStore, EntityMessage};
use std::sync::Arc;
use tracing::{debug, info};
use work_queue::{enqueue_json, Disposition, MessageHandler, MessageQueue, QueueMessage};

/// Classifies queued entities and forwards likely violations to the
/// registration queue.
pub struct DetectionHandler {
    catalog: Arc<dyn CatalogStore>,
    classifier: Arc<dyn Classifier>,
    queue: Arc<dyn MessageQueue>,
    registration_queue: String,
    violation_type_id: String,
    threshold: f64,
}

impl DetectionHandler {
    pub fn new(
        catalog: Arc<dyn CatalogStore>,
        classifier: Arc<dyn Classifier>,
        queue: Arc<dyn MessageQueue>,
        registration_queue: impl Into<String>,
        violation_type_id: impl Into<String>,
        threshold: f64,
    ) -> Self {
        Self {
            catalog,
            classifier,
            queue,
            registration_queue: registration_queue.into(),
            violation_type_id: violation_type_id.into(),
            threshold,
        }
    }

    pub async fn detect(&self, id: &str) -> Result<Disposition, ViolationError> {
        let Some(entity) = self.catalog.find_active_entity(id).await? else {
            return Ok(Disposition::Skipped(format!(
                "entity {} is missing or deactivated",
                id
            )));
        };

        let probability = self.classifier.violation_probability(&entity).await?;
        if probability <= self.threshold {
            debug!(entity_id = %id, probability, threshold = self.threshold, "No violation");
            return Ok(Disposition::Processed);
        }

        let message = ViolationMessage {
            entity_id: entity.id.clone(),
            violation_type_id: self.violation_type_id.clone(),
            probability,
            judge: JUDGE_MODEL.to_string(),
            is_effective: true,
        };
        enqueue_json(self.queue.as_ref(), &self.registration_queue, &message).await?;

        info!(
            entity_id = %id,
            probability,
            violation_type = %self.violation_type_id,
            "Violation detected"
        );
        Ok(Disposition::Processed)
    }
}

#[async_trait]
impl MessageHandler for DetectionHandler {
    type Error = ViolationError;

    async fn handle(&self, message: &QueueMessage) -> Result<Disposition, ViolationError> {
        let entity: EntityMessage = match message.decode() {
            Ok(entity) => entity,
            Err(e) => return Ok(Disposition::Rejected(format!("undecodable payload: {}", e))),
        };

        self.detect(&entity.id).await
    }
}
