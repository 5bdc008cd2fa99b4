//! Redis Streams backed queue
//!
//! Each queue is a stream (`queue:{name}`) consumed through one consumer group.
//! `XREADGROUP COUNT 1` gives prefetch = 1, `XACK` acknowledges, and entries left
//! pending longer than `claim_idle` are reclaimed with `XCLAIM`, which bumps
//! their delivery counter. Entries that cannot be turned into a message are
//! dead-lettered and acknowledged on sight.

use crate::error::{QueueError, Result};
use crate::message::{DeadLetter, QueueMessage};
use crate::MessageQueue;
use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis_utils::SharedConnectionManager;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

const PAYLOAD_FIELD: &str = "payload";

/// Configuration for the Redis Streams queue
#[derive(Debug, Clone)]
pub struct StreamQueueConfig {
    /// Consumer group shared by all competing workers of one service
    pub group_name: String,
    /// Unique name of this worker inside the group
    pub consumer_name: String,
    /// How long `fetch` blocks waiting for a new entry
    pub block: Duration,
    /// Pending entries idle for longer than this are reclaimed
    pub claim_idle: Duration,
    /// Approximate stream length cap applied on enqueue
    pub max_len: Option<usize>,
}

impl StreamQueueConfig {
    pub fn new(group_name: impl Into<String>) -> Self {
        Self {
            group_name: group_name.into(),
            consumer_name: format!("worker-{}", uuid::Uuid::new_v4()),
            block: Duration::from_secs(2),
            claim_idle: Duration::from_secs(30),
            max_len: Some(100_000),
        }
    }
}

/// Stream key naming convention
pub(crate) fn stream_key(queue: &str) -> String {
    format!("queue:{}", queue)
}

pub(crate) fn dead_letter_key(queue: &str) -> String {
    format!("{}:dead", stream_key(queue))
}

type StreamEntry = (String, HashMap<String, String>);

pub struct RedisStreamQueue {
    manager: SharedConnectionManager,
    config: StreamQueueConfig,
    groups_ready: Mutex<HashSet<String>>,
}

impl RedisStreamQueue {
    pub fn new(manager: SharedConnectionManager, config: StreamQueueConfig) -> Self {
        Self {
            manager,
            config,
            groups_ready: Mutex::new(HashSet::new()),
        }
    }

    async fn connection(&self) -> ConnectionManager {
        self.manager.lock().await.clone()
    }

    /// Create the consumer group once per stream (idempotent).
    async fn ensure_group(&self, conn: &mut ConnectionManager, queue: &str) -> Result<()> {
        let mut ready = self.groups_ready.lock().await;
        if ready.contains(queue) {
            return Ok(());
        }

        let created: redis::RedisResult<()> = redis::cmd("XGROUP")
            .arg("CREATE")
            .arg(stream_key(queue))
            .arg(&self.config.group_name)
            .arg("0") // Entries enqueued before the group existed still get consumed
            .arg("MKSTREAM")
            .query_async(conn)
            .await;

        match created {
            Ok(()) => info!(queue, group = %self.config.group_name, "Consumer group created"),
            Err(e) if e.code() == Some("BUSYGROUP") => {
                debug!(queue, group = %self.config.group_name, "Consumer group already exists")
            }
            Err(e) => return Err(e.into()),
        }

        ready.insert(queue.to_string());
        Ok(())
    }

    /// Claim the oldest entry that has sat unacknowledged for longer than `claim_idle`.
    async fn reclaim_idle(
        &self,
        conn: &mut ConnectionManager,
        queue: &str,
    ) -> Result<Option<QueueMessage>> {
        let key = stream_key(queue);
        let idle_ms = self.config.claim_idle.as_millis() as u64;

        // (id, owner, idle_ms, deliveries)
        let pending: Vec<(String, String, u64, u64)> = redis::cmd("XPENDING")
            .arg(&key)
            .arg(&self.config.group_name)
            .arg("IDLE")
            .arg(idle_ms)
            .arg("-")
            .arg("+")
            .arg(1)
            .query_async(conn)
            .await?;

        let Some((entry_id, previous_owner, _, deliveries)) = pending.into_iter().next() else {
            return Ok(None);
        };

        let claimed: Vec<StreamEntry> = redis::cmd("XCLAIM")
            .arg(&key)
            .arg(&self.config.group_name)
            .arg(&self.config.consumer_name)
            .arg(idle_ms)
            .arg(&entry_id)
            .query_async(conn)
            .await?;

        let Some(entry) = claimed.into_iter().next() else {
            // Another worker won the claim, or the entry was trimmed away
            return Ok(None);
        };

        debug!(
            queue,
            entry_id = %entry_id,
            previous_owner = %previous_owner,
            deliveries = deliveries + 1,
            "Reclaimed idle pending entry"
        );
        self.deliver_or_bury(queue, entry, deliveries + 1).await
    }

    async fn read_new(
        &self,
        conn: &mut ConnectionManager,
        queue: &str,
    ) -> Result<Option<QueueMessage>> {
        let reply: Option<Vec<(String, Vec<StreamEntry>)>> = redis::cmd("XREADGROUP")
            .arg("GROUP")
            .arg(&self.config.group_name)
            .arg(&self.config.consumer_name)
            .arg("COUNT")
            .arg(1)
            .arg("BLOCK")
            .arg(self.config.block.as_millis() as u64)
            .arg("STREAMS")
            .arg(stream_key(queue))
            .arg(">")
            .query_async(conn)
            .await?;

        let entry = reply
            .into_iter()
            .flatten()
            .flat_map(|(_, entries)| entries)
            .next();

        match entry {
            Some(entry) => self.deliver_or_bury(queue, entry, 1).await,
            None => Ok(None),
        }
    }

    /// Hand a decodable entry to the caller; dead-letter and ack anything else
    /// so it leaves the pending list instead of being reclaimed forever.
    async fn deliver_or_bury(
        &self,
        queue: &str,
        entry: StreamEntry,
        delivery_count: u64,
    ) -> Result<Option<QueueMessage>> {
        match to_message(queue, entry, delivery_count) {
            Ok(message) => Ok(Some(message)),
            Err(malformed) => {
                let reason = malformed.error.to_string();
                warn!(
                    queue,
                    entry_id = %malformed.stand_in.delivery_tag,
                    reason = %reason,
                    "Dead-lettering undecodable stream entry"
                );
                self.dead_letter(&malformed.stand_in, &reason).await?;
                Ok(None)
            }
        }
    }
}

/// An entry that cannot become a `QueueMessage`. `stand_in` carries the raw
/// fields as its payload so the dead letter keeps what was there.
#[derive(Debug)]
struct Malformed {
    stand_in: QueueMessage,
    error: QueueError,
}

fn to_message(
    queue: &str,
    entry: StreamEntry,
    delivery_count: u64,
) -> std::result::Result<QueueMessage, Malformed> {
    let (entry_id, mut fields) = entry;

    match fields.remove(PAYLOAD_FIELD) {
        Some(payload) => Ok(QueueMessage {
            queue_name: queue.to_string(),
            delivery_tag: entry_id,
            payload,
            delivery_count,
        }),
        None => {
            let raw: BTreeMap<String, String> = fields.into_iter().collect();
            Err(Malformed {
                stand_in: QueueMessage {
                    queue_name: queue.to_string(),
                    delivery_tag: entry_id.clone(),
                    payload: serde_json::to_string(&raw).unwrap_or_default(),
                    delivery_count,
                },
                error: QueueError::MalformedEntry {
                    entry_id,
                    reason: format!("missing `{}` field", PAYLOAD_FIELD),
                },
            })
        }
    }
}

#[async_trait]
impl MessageQueue for RedisStreamQueue {
    async fn enqueue(&self, queue: &str, payload: &str) -> Result<String> {
        let mut conn = self.connection().await;
        let mut cmd = redis::cmd("XADD");
        cmd.arg(stream_key(queue));
        if let Some(max_len) = self.config.max_len {
            cmd.arg("MAXLEN").arg("~").arg(max_len);
        }
        let entry_id: String = cmd
            .arg("*")
            .arg(PAYLOAD_FIELD)
            .arg(payload)
            .arg("enqueued_at")
            .arg(chrono::Utc::now().timestamp_millis())
            .query_async(&mut conn)
            .await?;

        debug!(queue, entry_id = %entry_id, "Enqueued message");
        Ok(entry_id)
    }

    async fn fetch(&self, queue: &str) -> Result<Option<QueueMessage>> {
        let mut conn = self.connection().await;
        self.ensure_group(&mut conn, queue).await?;

        if let Some(message) = self.reclaim_idle(&mut conn, queue).await? {
            return Ok(Some(message));
        }
        self.read_new(&mut conn, queue).await
    }

    async fn ack(&self, message: &QueueMessage) -> Result<()> {
        let mut conn = self.connection().await;
        let _: i64 = redis::cmd("XACK")
            .arg(stream_key(&message.queue_name))
            .arg(&self.config.group_name)
            .arg(&message.delivery_tag)
            .query_async(&mut conn)
            .await?;
        Ok(())
    }

    async fn dead_letter(&self, message: &QueueMessage, reason: &str) -> Result<()> {
        let record = DeadLetter::from_message(message, reason);
        let body = serde_json::to_string(&record)?;

        let mut conn = self.connection().await;
        let _: String = redis::cmd("XADD")
            .arg(dead_letter_key(&message.queue_name))
            .arg("*")
            .arg(PAYLOAD_FIELD)
            .arg(&body)
            .arg("reason")
            .arg(reason)
            .query_async(&mut conn)
            .await?;

        self.ack(message).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_naming() {
        assert_eq!(stream_key("entity_index"), "queue:entity_index");
        assert_eq!(dead_letter_key("entity_index"), "queue:entity_index:dead");
    }

    #[test]
    fn test_to_message_requires_payload_field() {
        let mut fields = HashMap::new();
        fields.insert("enqueued_at".to_string(), "1700000000000".to_string());

        let malformed = to_message("q", ("1-0".to_string(), fields), 4).unwrap_err();
        assert!(matches!(malformed.error, QueueError::MalformedEntry { ref entry_id, .. } if entry_id == "1-0"));
        assert_eq!(malformed.stand_in.delivery_tag, "1-0");
        assert_eq!(malformed.stand_in.delivery_count, 4);
        assert_eq!(malformed.stand_in.payload, r#"{"enqueued_at":"1700000000000"}"#);

        let record = DeadLetter::from_message(&malformed.stand_in, &malformed.error.to_string());
        assert_eq!(record.queue, "q");
        assert!(record.reason.contains("missing `payload` field"));
    }

    #[test]
    fn test_to_message_maps_fields() {
        let mut fields = HashMap::new();
        fields.insert(PAYLOAD_FIELD.to_string(), r#"{"id":"x"}"#.to_string());

        let message = to_message("q", ("5-2".to_string(), fields), 3).unwrap();
        assert_eq!(message.delivery_tag, "5-2");
        assert_eq!(message.payload, r#"{"id":"x"}"#);
        assert_eq!(message.delivery_count, 3);
    }

    #[test]
    fn test_consumer_names_are_unique() {
        let a = StreamQueueConfig::new("search-sync");
        let b = StreamQueueConfig::new("search-sync");
        assert_ne!(a.consumer_name, b.consumer_name);
        assert_eq!(a.group_name, "search-sync");
    }
}
