use crate::error::ViolationError;
use crate::models::{ViolationMessage, ViolationRecord};
use crate::store::ViolationStore;
use async_trait::async_trait;
use catalog_store::CatalogStore;
use std::sync::Arc;
use tracing::{debug, info, warn};
use work_queue::{Disposition, MessageHandler, QueueMessage};

/// Two-phase violation write.
///
/// Phase 1 records the violation; phase 2 deactivates the entity when the
/// violation is effective and above the threshold. The phases are separate
/// statements: a crash between them leaves an effective violation on an
/// active entity, which redelivery or the reconciliation sweep repairs.
pub struct RegistrationHandler {
    violations: Arc<dyn ViolationStore>,
    catalog: Arc<dyn CatalogStore>,
    threshold: f64,
}

impl RegistrationHandler {
    pub fn new(
        violations: Arc<dyn ViolationStore>,
        catalog: Arc<dyn CatalogStore>,
        threshold: f64,
    ) -> Self {
        Self {
            violations,
            catalog,
            threshold,
        }
    }

    pub async fn register(&self, message: &ViolationMessage) -> Result<Disposition, ViolationError> {
        if self.catalog.find_entity(&message.entity_id).await?.is_none() {
            return Ok(Disposition::Skipped(format!(
                "entity {} does not exist",
                message.entity_id
            )));
        }

        let record = ViolationRecord::from_message(message);
        let inserted = self.violations.insert_violation(&record).await?;
        if !inserted {
            debug!(violation_id = %record.id, "Violation already recorded");
        }

        if !(record.is_effective && record.probability > self.threshold) {
            info!(
                entity_id = %record.entity_id,
                violation_id = %record.id,
                judge = %record.judge,
                "Violation recorded without deactivation"
            );
            return Ok(Disposition::Processed);
        }

        let changed = self.catalog.deactivate_entity(&record.entity_id).await?;
        info!(
            entity_id = %record.entity_id,
            violation_id = %record.id,
            probability = record.probability,
            newly_deactivated = changed,
            "Violation registered"
        );
        Ok(Disposition::Processed)
    }
}

#[async_trait]
impl MessageHandler for RegistrationHandler {
    type Error = ViolationError;

    async fn handle(&self, message: &QueueMessage) -> Result<Disposition, ViolationError> {
        let violation: ViolationMessage = match message.decode() {
            Ok(violation) => violation,
            Err(e) => return Ok(Disposition::Rejected(format!("undecodable payload: {}", e))),
        };

        if !(0.0..=1.0).contains(&violation.probability) {
            warn!(entity_id = %violation.entity_id, probability = violation.probability, "Probability out of range");
            return Ok(Disposition::Rejected(format!(
                "probability {} out of range",
                violation.probability
            )));
        }

        self.register(&violation).await
    }
}
