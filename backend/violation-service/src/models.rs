use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Namespace for deterministic violation ids.
const VIOLATION_NAMESPACE: Uuid = Uuid::from_u128(0x5f0c_7a4e_2b1d_4c8e_9a3f_6d2e_1b7c_0a94);

pub const JUDGE_MODEL: &str = "model";

/// Registration stage payload, produced by detection or by a moderator tool.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ViolationMessage {
    pub entity_id: String,
    pub violation_type_id: String,
    pub probability: f64,
    pub judge: String,
    pub is_effective: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ViolationRecord {
    pub id: Uuid,
    pub entity_id: String,
    pub violation_type_id: String,
    pub probability: f64,
    pub judge: String,
    pub is_effective: bool,
    pub created_at: DateTime<Utc>,
}

impl ViolationRecord {
    pub fn from_message(message: &ViolationMessage) -> Self {
        Self {
            id: violation_id(&message.entity_id, &message.violation_type_id, &message.judge),
            entity_id: message.entity_id.clone(),
            violation_type_id: message.violation_type_id.clone(),
            probability: message.probability,
            judge: message.judge.clone(),
            is_effective: message.is_effective,
            created_at: Utc::now(),
        }
    }
}

/// One id per (entity, type, judge), so redelivered registrations collapse.
pub fn violation_id(entity_id: &str, violation_type_id: &str, judge: &str) -> Uuid {
    let name = format!("{}:{}:{}", entity_id, violation_type_id, judge);
    Uuid::new_v5(&VIOLATION_NAMESPACE, name.as_bytes())
}
