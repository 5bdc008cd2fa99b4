use async_trait::async_trait;
use catalog_store::{Result, StoreError};
use feature_cache::FeatureVector;
use sqlx::PgPool;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::debug;

/// Result of an insert-if-absent: the row as stored, which may predate this call.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredFeature {
    pub features: FeatureVector,
    pub inserted: bool,
}

/// Authoritative feature rows, keyed by entity id and feature version.
#[async_trait]
pub trait FeatureRowStore: Send + Sync {
    async fn insert_if_absent(
        &self,
        entity_id: &str,
        version: &str,
        features: &FeatureVector,
    ) -> Result<StoredFeature>;
}

pub struct PgFeatureRowStore {
    pool: Arc<PgPool>,
    query_timeout: Duration,
}

impl PgFeatureRowStore {
    pub fn new(pool: Arc<PgPool>) -> Self {
        Self {
            pool,
            query_timeout: Duration::from_secs(5),
        }
    }
}

#[derive(sqlx::FromRow)]
struct FeatureRow {
    category_vector: Vec<f32>,
    subcategory_vector: Vec<f32>,
    name_vector: Vec<f32>,
    description_vector: Vec<f32>,
}

impl From<FeatureRow> for FeatureVector {
    fn from(row: FeatureRow) -> Self {
        FeatureVector {
            category_vector: row.category_vector,
            subcategory_vector: row.subcategory_vector,
            name_vector: row.name_vector,
            description_vector: row.description_vector,
        }
    }
}

#[async_trait]
impl FeatureRowStore for PgFeatureRowStore {
    async fn insert_if_absent(
        &self,
        entity_id: &str,
        version: &str,
        features: &FeatureVector,
    ) -> Result<StoredFeature> {
        let work = async {
            let inserted = sqlx::query_as::<_, FeatureRow>(
                r#"
                INSERT INTO entity_features
                    (entity_id, feature_version, category_vector, subcategory_vector,
                     name_vector, description_vector)
                VALUES ($1, $2, $3, $4, $5, $6)
                ON CONFLICT (entity_id, feature_version) DO NOTHING
                RETURNING category_vector, subcategory_vector, name_vector, description_vector
                "#,
            )
            .bind(entity_id)
            .bind(version)
            .bind(&features.category_vector)
            .bind(&features.subcategory_vector)
            .bind(&features.name_vector)
            .bind(&features.description_vector)
            .fetch_optional(&*self.pool)
            .await?;

            if let Some(row) = inserted {
                return Ok(StoredFeature {
                    features: row.into(),
                    inserted: true,
                });
            }

            let existing = sqlx::query_as::<_, FeatureRow>(
                r#"
                SELECT category_vector, subcategory_vector, name_vector, description_vector
                FROM entity_features
                WHERE entity_id = $1 AND feature_version = $2
                "#,
            )
            .bind(entity_id)
            .bind(version)
            .fetch_one(&*self.pool)
            .await?;

            debug!(entity_id, version, "Feature row already stored");
            Ok::<_, sqlx::Error>(StoredFeature {
                features: existing.into(),
                inserted: false,
            })
        };

        tokio::time::timeout(self.query_timeout, work)
            .await
            .map_err(|_| StoreError::Timeout(self.query_timeout))?
            .map_err(StoreError::from)
    }
}

/// In-process feature rows for consumer tests.
#[derive(Debug, Default)]
pub struct InMemoryFeatureRowStore {
    rows: RwLock<HashMap<(String, String), FeatureVector>>,
}

impl InMemoryFeatureRowStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn row_count(&self) -> usize {
        self.rows.read().await.len()
    }

    pub async fn get(&self, entity_id: &str, version: &str) -> Option<FeatureVector> {
        self.rows
            .read()
            .await
            .get(&(entity_id.to_string(), version.to_string()))
            .cloned()
    }
}

#[async_trait]
impl FeatureRowStore for InMemoryFeatureRowStore {
    async fn insert_if_absent(
        &self,
        entity_id: &str,
        version: &str,
        features: &FeatureVector,
    ) -> Result<StoredFeature> {
        let mut rows = self.rows.write().await;
        let key = (entity_id.to_string(), version.to_string());
        if let Some(existing) = rows.get(&key) {
            return Ok(StoredFeature {
                features: existing.clone(),
                inserted: false,
            });
        }
        rows.insert(key, features.clone());
        Ok(StoredFeature {
            features: features.clone(),
            inserted: true,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vector(value: f32) -> FeatureVector {
        FeatureVector {
            category_vector: vec![value],
            subcategory_vector: vec![],
            name_vector: vec![value, value],
            description_vector: vec![],
        }
    }

    #[tokio::test]
    async fn test_first_write_wins() {
        let store = InMemoryFeatureRowStore::new();

        let first = store.insert_if_absent("e1", "v1", &vector(1.0)).await.unwrap();
        let second = store.insert_if_absent("e1", "v1", &vector(2.0)).await.unwrap();

        assert!(first.inserted);
        assert!(!second.inserted);
        assert_eq!(second.features, vector(1.0));
        assert_eq!(store.row_count().await, 1);
    }

    #[tokio::test]
    async fn test_versions_are_independent() {
        let store = InMemoryFeatureRowStore::new();
        store.insert_if_absent("e1", "v1", &vector(1.0)).await.unwrap();
        let v2 = store.insert_if_absent("e1", "v2", &vector(2.0)).await.unwrap();

        assert!(v2.inserted);
        assert_eq!(store.row_count().await, 2);
    }
}
