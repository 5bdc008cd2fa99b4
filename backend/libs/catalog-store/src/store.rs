use crate::error::{Result, StoreError};
use crate::models::EntityRecord;
use async_trait::async_trait;
use sqlx::PgPool;
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

/// Candidate ids per grouped like-count query.
pub const LIKE_PAGE_SIZE: usize = 200;

const DEFAULT_QUERY_TIMEOUT: Duration = Duration::from_secs(5);

#[async_trait]
pub trait CatalogStore: Send + Sync {
    /// Point lookup, including deactivated entities.
    async fn find_entity(&self, id: &str) -> Result<Option<EntityRecord>>;

    /// Like counts for every requested id; ids without likes map to 0.
    async fn like_counts(&self, ids: &[String]) -> Result<HashMap<String, i64>>;

    /// Set the deactivated flag. Returns `false` when the entity was already
    /// deactivated or does not exist.
    async fn deactivate_entity(&self, id: &str) -> Result<bool>;

    /// Active entity lookup; deactivated entities read as absent.
    async fn find_active_entity(&self, id: &str) -> Result<Option<EntityRecord>> {
        Ok(self.find_entity(id).await?.filter(EntityRecord::is_active))
    }
}

/// PostgreSQL implementation of [`CatalogStore`]
pub struct PgCatalogStore {
    pool: Arc<PgPool>,
    query_timeout: Duration,
}

impl PgCatalogStore {
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
impl CatalogStore for PgCatalogStore {
    async fn find_entity(&self, id: &str) -> Result<Option<EntityRecord>> {
        self.bounded(
            sqlx::query_as::<_, EntityRecord>(
                r#"
                SELECT e.id,
                       e.category_id,
                       c.name_en AS category_name_en,
                       c.name_ja AS category_name_ja,
                       e.subcategory_id,
                       s.name_en AS subcategory_name_en,
                       s.name_ja AS subcategory_name_ja,
                       e.user_id,
                       u.handle_name AS user_handle_name,
                       e.name,
                       e.description,
                       e.photo_url,
                       e.deactivated,
                       e.created_at,
                       e.updated_at
                FROM entities e
                JOIN entity_categories c ON c.id = e.category_id
                JOIN entity_subcategories s ON s.id = e.subcategory_id
                JOIN users u ON u.id = e.user_id
                WHERE e.id = $1
                "#,
            )
            .bind(id)
            .fetch_optional(&*self.pool),
        )
        .await
    }

    async fn like_counts(&self, ids: &[String]) -> Result<HashMap<String, i64>> {
        let mut counts: HashMap<String, i64> = ids.iter().map(|id| (id.clone(), 0)).collect();

        for page in ids.chunks(LIKE_PAGE_SIZE) {
            let rows: Vec<(String, i64)> = self
                .bounded(
                    sqlx::query_as(
                        r#"
                        SELECT entity_id, COUNT(*) AS likes
                        FROM likes
                        WHERE entity_id = ANY($1)
                        GROUP BY entity_id
                        "#,
                    )
                    .bind(page)
                    .fetch_all(&*self.pool),
                )
                .await?;

            debug!(page_size = page.len(), rows = rows.len(), "Fetched like counts page");
            counts.extend(rows);
        }

        Ok(counts)
    }

    async fn deactivate_entity(&self, id: &str) -> Result<bool> {
        let result = self
            .bounded(
                sqlx::query(
                    r#"
                    UPDATE entities
                    SET deactivated = TRUE, updated_at = NOW()
                    WHERE id = $1 AND deactivated = FALSE
                    "#,
                )
                .bind(id)
                .execute(&*self.pool),
            )
            .await?;

        let changed = result.rows_affected() > 0;
        if changed {
            info!(entity_id = %id, "Entity deactivated");
        }
        Ok(changed)
    }
}
