use crate::models::ViolationRecord;
use async_trait::async_trait;
use catalog_store::{InMemoryCatalogStore, Result, StoreError};
use sqlx::PgPool;
use std::collections::BTreeMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::debug;
use uuid::Uuid;

const DEFAULT_QUERY_TIMEOUT: Duration = Duration::from_secs(5);

#[async_trait]
pub trait ViolationStore: Send + Sync {
    async fn find_violation_type_id(&self, name: &str) -> Result<Option<String>>;

    /// Insert unless a record with the same id exists. Returns `true` when a
    /// row was written.
    async fn insert_violation(&self, record: &ViolationRecord) -> Result<bool>;

    /// Active entities carrying an effective violation whose probability
    /// exceeds `threshold`.
    async fn active_entities_with_effective_violations(
        &self,
        threshold: f64,
        limit: i64,
    ) -> Result<Vec<String>>;
}

pub struct PgViolationStore {
    pool: Arc<PgPool>,
    query_timeout: Duration,
}

impl PgViolationStore {
    pub fn new(pool: Arc<PgPool>) -> Self {
        Self {
            pool,
            query_timeout: DEFAULT_QUERY_TIMEOUT,
        }
    }

    pub fn with_query_timeout(mut self, query_timeout: Duration) -> Self {
        self.query_timeout = query_timeout;
        self
    }

    async fn bounded<T, F>(&self, query: F) -> Result<T>
    where
        F: Future<Output = std::result::Result<T, sqlx::Error>>,
    {
        tokio::time::timeout(self.query_timeout, query)
            .await
            .map_err(|_| StoreError::Timeout(self.query_timeout))?
            .map_err(StoreError::from)
    }
}

#[async_trait]
impl ViolationStore for PgViolationStore {
    async fn find_violation_type_id(&self, name: &str) -> Result<Option<String>> {
        self.bounded(
            sqlx::query_scalar("SELECT id FROM violation_types WHERE name = $1")
                .bind(name)
                .fetch_optional(&*self.pool),
        )
        .await
    }

    async fn insert_violation(&self, record: &ViolationRecord) -> Result<bool> {
        let result = self
            .bounded(
                sqlx::query(
                    r#"
                    INSERT INTO violations
                        (id, entity_id, violation_type_id, probability, judge, is_effective, created_at, updated_at)
                    VALUES ($1, $2, $3, $4, $5, $6, $7, $7)
                    ON CONFLICT (id) DO NOTHING
                    "#,
                )
                .bind(record.id)
                .bind(&record.entity_id)
                .bind(&record.violation_type_id)
                .bind(record.probability)
                .bind(&record.judge)
                .bind(record.is_effective)
                .bind(record.created_at)
                .execute(&*self.pool),
            )
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn active_entities_with_effective_violations(
        &self,
        threshold: f64,
        limit: i64,
    ) -> Result<Vec<String>> {
        let ids: Vec<String> = self
            .bounded(
                sqlx::query_scalar(
                    r#"
                    SELECT DISTINCT v.entity_id
                    FROM violations v
                    JOIN entities e ON e.id = v.entity_id
                    WHERE v.is_effective
                      AND v.probability > $1
                      AND e.deactivated = FALSE
                    ORDER BY v.entity_id
                    LIMIT $2
                    "#,
                )
                .bind(threshold)
                .bind(limit)
                .fetch_all(&*self.pool),
            )
            .await?;

        debug!(found = ids.len(), "Scanned for half-applied violations");
        Ok(ids)
    }
}

/// In-process store; the sweep query joins against the given catalog.
pub struct InMemoryViolationStore {
    catalog: Arc<InMemoryCatalogStore>,
    types: RwLock<BTreeMap<String, String>>,
    violations: RwLock<BTreeMap<Uuid, ViolationRecord>>,
}

impl InMemoryViolationStore {
    pub fn new(catalog: Arc<InMemoryCatalogStore>) -> Self {
        Self {
            catalog,
            types: RwLock::new(BTreeMap::new()),
            violations: RwLock::new(BTreeMap::new()),
        }
    }

    pub async fn insert_type(&self, id: &str, name: &str) {
        self.types
            .write()
            .await
            .insert(name.to_string(), id.to_string());
    }

    pub async fn violations_for(&self, entity_id: &str) -> Vec<ViolationRecord> {
        self.violations
            .read()
            .await
            .values()
            .filter(|v| v.entity_id == entity_id)
            .cloned()
            .collect()
    }
}

#[async_trait]
impl ViolationStore for InMemoryViolationStore {
    async fn find_violation_type_id(&self, name: &str) -> Result<Option<String>> {
        Ok(self.types.read().await.get(name).cloned())
    }

    async fn insert_violation(&self, record: &ViolationRecord) -> Result<bool> {
        let mut violations = self.violations.write().await;
        if violations.contains_key(&record.id) {
            return Ok(false);
        }
        violations.insert(record.id, record.clone());
        Ok(true)
    }

    async fn active_entities_with_effective_violations(
        &self,
        threshold: f64,
        limit: i64,
    ) -> Result<Vec<String>> {
        let candidates: Vec<String> = {
            let violations = self.violations.read().await;
            let mut ids: Vec<String> = violations
                .values()
                .filter(|v| v.is_effective && v.probability > threshold)
                .map(|v| v.entity_id.clone())
                .collect();
            ids.sort();
            ids.dedup();
            ids
        };

        let mut active = Vec::new();
        for id in candidates {
            if active.len() as i64 >= limit {
                break;
            }
            if self.catalog.is_deactivated(&id).await == Some(false) {
                active.push(id);
            }
        }
        Ok(active)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ViolationMessage;

    fn message(entity_id: &str, probability: f64, judge: &str, is_effective: bool) -> ViolationMessage {
        ViolationMessage {
            entity_id: entity_id.to_string(),
            violation_type_id: "no_animal_violation".to_string(),
            probability,
            judge: judge.to_string(),
            is_effective,
        }
    }

    #[tokio::test]
    async fn test_insert_is_idempotent() {
        let store = InMemoryViolationStore::new(Arc::new(InMemoryCatalogStore::new()));
        let record = ViolationRecord::from_message(&message("e1", 0.9, "model", true));

        assert!(store.insert_violation(&record).await.unwrap());
        assert!(!store.insert_violation(&record).await.unwrap());
        assert_eq!(store.violations_for("e1").await.len(), 1);
    }

    #[tokio::test]
    async fn test_type_lookup_by_name() {
        let store = InMemoryViolationStore::new(Arc::new(InMemoryCatalogStore::new()));
        store.insert_type("nav", "no_animal_violation").await;

        assert_eq!(
            store.find_violation_type_id("no_animal_violation").await.unwrap(),
            Some("nav".to_string())
        );
        assert!(store.find_violation_type_id("spam").await.unwrap().is_none());
    }
}
