use crate::error::Result;
use crate::models::EntityRecord;
use crate::store::CatalogStore;
use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use tokio::sync::RwLock;

/// In-process catalog used by consumer and reorder tests.
#[derive(Debug, Default)]
pub struct InMemoryCatalogStore {
    entities: RwLock<HashMap<String, EntityRecord>>,
    likes: RwLock<HashMap<String, i64>>,
}

impl InMemoryCatalogStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert_entity(&self, record: EntityRecord) {
        self.entities.write().await.insert(record.id.clone(), record);
    }

    pub async fn set_likes(&self, id: &str, count: i64) {
        self.likes.write().await.insert(id.to_string(), count);
    }

    pub async fn is_deactivated(&self, id: &str) -> Option<bool> {
        self.entities.read().await.get(id).map(|e| e.deactivated)
    }
}

#[async_trait]
impl CatalogStore for InMemoryCatalogStore {
    async fn find_entity(&self, id: &str) -> Result<Option<EntityRecord>> {
        Ok(self.entities.read().await.get(id).cloned())
    }

    async fn like_counts(&self, ids: &[String]) -> Result<HashMap<String, i64>> {
        let likes = self.likes.read().await;
        Ok(ids
            .iter()
            .map(|id| (id.clone(), likes.get(id).copied().unwrap_or(0)))
            .collect())
    }

    async fn deactivate_entity(&self, id: &str) -> Result<bool> {
        let mut entities = self.entities.write().await;
        match entities.get_mut(id) {
            Some(entity) if !entity.deactivated => {
                entity.deactivated = true;
                entity.updated_at = Utc::now();
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn record(id: &str, deactivated: bool) -> EntityRecord {
        let at = Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap();
        EntityRecord {
            id: id.to_string(),
            category_id: 1,
            category_name_en: "cat".into(),
            category_name_ja: "ねこ".into(),
            subcategory_id: 11,
            subcategory_name_en: "american shorthair".into(),
            subcategory_name_ja: "アメリカンショートヘア".into(),
            user_id: "u1".into(),
            user_handle_name: "tama_owner".into(),
            name: "Tama".into(),
            description: "sleeping in the sun".into(),
            photo_url: "https://cdn.example.com/tama.jpg".into(),
            deactivated,
            created_at: at,
            updated_at: at,
        }
    }

    #[tokio::test]
    async fn test_like_counts_default_to_zero() {
        let store = InMemoryCatalogStore::new();
        store.set_likes("a", 5).await;

        let counts = store
            .like_counts(&["a".to_string(), "b".to_string()])
            .await
            .unwrap();
        assert_eq!(counts.get("a"), Some(&5));
        assert_eq!(counts.get("b"), Some(&0));
    }

    #[tokio::test]
    async fn test_find_active_hides_deactivated() {
        let store = InMemoryCatalogStore::new();
        store.insert_entity(record("live", false)).await;
        store.insert_entity(record("gone", true)).await;

        assert!(store.find_active_entity("live").await.unwrap().is_some());
        assert!(store.find_active_entity("gone").await.unwrap().is_none());
        assert!(store.find_entity("gone").await.unwrap().is_some());
        assert!(store.find_active_entity("missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_deactivate_reports_change_once() {
        let store = InMemoryCatalogStore::new();
        store.insert_entity(record("a", false)).await;

        assert!(store.deactivate_entity("a").await.unwrap());
        assert!(!store.deactivate_entity("a").await.unwrap());
        assert!(!store.deactivate_entity("missing").await.unwrap());
        assert_eq!(store.is_deactivated("a").await, Some(true));
    }
}
