use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Canonical entity row joined with its category, subcategory and owner.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct EntityRecord {
    pub id: String,
    pub category_id: i32,
    pub category_name_en: String,
    pub category_name_ja: String,
    pub subcategory_id: i32,
    pub subcategory_name_en: String,
    pub subcategory_name_ja: String,
    pub user_id: String,
    pub user_handle_name: String,
    pub name: String,
    pub description: String,
    pub photo_url: String,
    pub deactivated: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl EntityRecord {
    pub fn is_active(&self) -> bool {
        !self.deactivated
    }
}

/// Queue payload announcing that an entity was registered or changed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityMessage {
    pub id: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entity_message_wire_format() {
        let message: EntityMessage = serde_json::from_str(r#"{"id":"f3a1"}"#).unwrap();
        assert_eq!(message.id, "f3a1");
        assert_eq!(serde_json::to_string(&message).unwrap(), r#"{"id":"f3a1"}"#);
    }

    #[test]
    fn test_entity_message_ignores_extra_fields() {
        let message: EntityMessage =
            serde_json::from_str(r#"{"id":"f3a1","source":"registry"}"#).unwrap();
        assert_eq!(message.id, "f3a1");
    }
}
