use crate::error::ViolationError;
use crate::metrics::record_sweep;
use crate::store::ViolationStore;
use catalog_store::CatalogStore;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{error, info, warn};

/// Deactivates active entities that already carry an effective violation.
///
/// Phase 1 of registration always precedes phase 2, so the only reachable
/// inconsistency is a recorded violation on a still-active entity.
pub struct ReconciliationSweep {
    violations: Arc<dyn ViolationStore>,
    catalog: Arc<dyn CatalogStore>,
    threshold: f64,
    batch_size: i64,
}

impl ReconciliationSweep {
    pub fn new(
        violations: Arc<dyn ViolationStore>,
        catalog: Arc<dyn CatalogStore>,
        threshold: f64,
        batch_size: i64,
    ) -> Self {
        Self {
            violations,
            catalog,
            threshold,
            batch_size,
        }
    }

    /// One bounded pass. Returns the number of entities deactivated.
    pub async fn sweep_once(&self) -> Result<usize, ViolationError> {
        let stale = self
            .violations
            .active_entities_with_effective_violations(self.threshold, self.batch_size)
            .await?;

        let mut repaired = 0;
        for entity_id in &stale {
            if self.catalog.deactivate_entity(entity_id).await? {
                warn!(entity_id = %entity_id, "Sweep deactivated entity with effective violation");
                repaired += 1;
            }
        }
        Ok(repaired)
    }

    pub async fn run(&self, interval: Duration, mut shutdown: watch::Receiver<bool>) {
        info!(interval_secs = interval.as_secs(), "Reconciliation sweep started");

        while !*shutdown.borrow_and_update() {
            match self.sweep_once().await {
                Ok(repaired) => record_sweep("ok", repaired),
                Err(e) => {
                    error!(error = %e, "Reconciliation sweep failed");
                    record_sweep("error", 0);
                }
            }

            tokio::select! {
                _ = tokio::time::sleep(interval) => {}
                _ = shutdown.changed() => {}
            }
        }

        info!("Reconciliation sweep stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ViolationMessage, ViolationRecord};
    use crate::store::InMemoryViolationStore;
    use crate::test_support::entity;
    use catalog_store::InMemoryCatalogStore;

    fn record(entity_id: &str, probability: f64, is_effective: bool) -> ViolationRecord {
        ViolationRecord::from_message(&ViolationMessage {
            entity_id: entity_id.to_string(),
            violation_type_id: "no_animal_violation".to_string(),
            probability,
            judge: "model".to_string(),
            is_effective,
        })
    }

    async fn setup() -> (Arc<InMemoryCatalogStore>, Arc<InMemoryViolationStore>, ReconciliationSweep) {
        let catalog = Arc::new(InMemoryCatalogStore::new());
        for id in ["half", "low", "ineffective", "clean"] {
            catalog.insert_entity(entity(id)).await;
        }
        let violations = Arc::new(InMemoryViolationStore::new(catalog.clone()));
        // Phase 1 landed, phase 2 did not.
        violations.insert_violation(&record("half", 0.9, true)).await.unwrap();
        violations.insert_violation(&record("low", 0.2, true)).await.unwrap();
        violations
            .insert_violation(&record("ineffective", 0.9, false))
            .await
            .unwrap();

        let sweep = ReconciliationSweep::new(violations.clone(), catalog.clone(), 0.5, 100);
        (catalog, violations, sweep)
    }

    #[tokio::test]
    async fn test_sweep_repairs_half_written_violation() {
        let (catalog, _, sweep) = setup().await;

        assert_eq!(sweep.sweep_once().await.unwrap(), 1);
        assert_eq!(catalog.is_deactivated("half").await, Some(true));
        assert_eq!(catalog.is_deactivated("low").await, Some(false));
        assert_eq!(catalog.is_deactivated("ineffective").await, Some(false));
        assert_eq!(catalog.is_deactivated("clean").await, Some(false));

        assert_eq!(sweep.sweep_once().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_sweep_respects_batch_size() {
        let (catalog, violations, _) = setup().await;
        catalog.insert_entity(entity("half2")).await;
        violations.insert_violation(&record("half2", 0.8, true)).await.unwrap();

        let sweep = ReconciliationSweep::new(violations, catalog.clone(), 0.5, 1);
        assert_eq!(sweep.sweep_once().await.unwrap(), 1);
        assert_eq!(sweep.sweep_once().await.unwrap(), 1);
        assert_eq!(sweep.sweep_once().await.unwrap(), 0);
        assert_eq!(catalog.is_deactivated("half2").await, Some(true));
    }

    #[tokio::test]
    async fn test_run_stops_on_shutdown() {
        let (catalog, _, sweep) = setup().await;
        let (tx, rx) = watch::channel(false);
        let sweep = Arc::new(sweep);
        let runner = {
            let sweep = sweep.clone();
            tokio::spawn(async move { sweep.run(Duration::from_secs(3600), rx).await })
        };

        for _ in 0..50 {
            if catalog.is_deactivated("half").await == Some(true) {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        tx.send(true).unwrap();
        tokio::time::timeout(Duration::from_secs(2), runner)
            .await
            .expect("sweep should stop")
            .unwrap();
        assert_eq!(catalog.is_deactivated("half").await, Some(true));
    }
}
