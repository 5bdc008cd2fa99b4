use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

/// A message handed to a consumer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueMessage {
    pub queue_name: String,
    /// Backend-specific id used to acknowledge this delivery
    pub delivery_tag: String,
    pub payload: String,
    /// 1 on first delivery, incremented on every redelivery
    pub delivery_count: u64,
}

impl QueueMessage {
    pub fn decode<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_str(&self.payload)
    }
}

/// Record written to a dead-letter list for manual inspection or replay.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeadLetter {
    pub queue: String,
    pub message_id: String,
    pub payload: String,
    pub reason: String,
    pub delivery_count: u64,
    pub failed_at: DateTime<Utc>,
}

impl DeadLetter {
    pub fn from_message(message: &QueueMessage, reason: &str) -> Self {
        Self {
            queue: message.queue_name.clone(),
            message_id: message.delivery_tag.clone(),
            payload: message.payload.clone(),
            reason: reason.to_string(),
            delivery_count: message.delivery_count,
            failed_at: Utc::now(),
        }
    }
}
