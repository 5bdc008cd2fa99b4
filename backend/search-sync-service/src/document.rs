use catalog_store::EntityRecord;
use chrono::{DateTime, Utc};
use serde::Serialize;

/// Search-side projection of an entity. Serialized as the document body.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchDocument {
    pub id: String,
    pub name: String,
    pub description: String,
    pub category_id: i32,
    pub category_name_en: String,
    pub category_name_ja: String,
    pub subcategory_id: i32,
    pub subcategory_name_en: String,
    pub subcategory_name_ja: String,
    pub photo_url: String,
    pub user_handle_name: String,
    pub like: i64,
    pub created_at: DateTime<Utc>,
}

impl SearchDocument {
    pub fn from_record(record: &EntityRecord, likes: i64) -> Self {
        Self {
            id: record.id.clone(),
            name: record.name.clone(),
            description: record.description.clone(),
            category_id: record.category_id,
            category_name_en: record.category_name_en.clone(),
            category_name_ja: record.category_name_ja.clone(),
            subcategory_id: record.subcategory_id,
            subcategory_name_en: record.subcategory_name_en.clone(),
            subcategory_name_ja: record.subcategory_name_ja.clone(),
            photo_url: record.photo_url.clone(),
            user_handle_name: record.user_handle_name.clone(),
            like: likes,
            created_at: record.created_at,
        }
    }
}
