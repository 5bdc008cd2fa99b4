use crate::error::Result;
use crate::message::{DeadLetter, QueueMessage};
use crate::MessageQueue;
use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use tokio::sync::Mutex;

#[derive(Debug)]
struct Entry {
    id: String,
    payload: String,
    deliveries: u64,
}

#[derive(Debug, Default)]
struct QueueState {
    next_id: u64,
    entries: VecDeque<Entry>,
    dead: Vec<DeadLetter>,
}

/// Process-local queue.
///
/// An unacknowledged message stays at the head of its queue, so the next
/// `fetch` redelivers it with an incremented delivery count. Used by local
/// runs and by the consumer tests.
#[derive(Debug, Default)]
pub struct InMemoryQueue {
    queues: Mutex<HashMap<String, QueueState>>,
}

impl InMemoryQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Payloads not yet acknowledged, oldest first.
    pub async fn pending(&self, queue: &str) -> Vec<String> {
        let queues = self.queues.lock().await;
        queues
            .get(queue)
            .map(|state| state.entries.iter().map(|e| e.payload.clone()).collect())
            .unwrap_or_default()
    }

    pub async fn dead_letters(&self, queue: &str) -> Vec<DeadLetter> {
        let queues = self.queues.lock().await;
        queues
            .get(queue)
            .map(|state| state.dead.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl MessageQueue for InMemoryQueue {
    async fn enqueue(&self, queue: &str, payload: &str) -> Result<String> {
        let mut queues = self.queues.lock().await;
        let state = queues.entry(queue.to_string()).or_default();
        state.next_id += 1;
        let id = format!("{}-0", state.next_id);
        state.entries.push_back(Entry {
            id: id.clone(),
            payload: payload.to_string(),
            deliveries: 0,
        });
        Ok(id)
    }

    async fn fetch(&self, queue: &str) -> Result<Option<QueueMessage>> {
        let mut queues = self.queues.lock().await;
        let Some(entry) = queues
            .get_mut(queue)
            .and_then(|state| state.entries.front_mut())
        else {
            return Ok(None);
        };

        entry.deliveries += 1;
        Ok(Some(QueueMessage {
            queue_name: queue.to_string(),
            delivery_tag: entry.id.clone(),
            payload: entry.payload.clone(),
            delivery_count: entry.deliveries,
        }))
    }

    async fn ack(&self, message: &QueueMessage) -> Result<()> {
        let mut queues = self.queues.lock().await;
        if let Some(state) = queues.get_mut(&message.queue_name) {
            state.entries.retain(|e| e.id != message.delivery_tag);
        }
        Ok(())
    }

    async fn dead_letter(&self, message: &QueueMessage, reason: &str) -> Result<()> {
        let mut queues = self.queues.lock().await;
        let state = queues.entry(message.queue_name.clone()).or_default();
        state.dead.push(DeadLetter::from_message(message, reason));
        state.entries.retain(|e| e.id != message.delivery_tag);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_unacked_message_is_redelivered() {
        let queue = InMemoryQueue::new();
        queue.enqueue("q", r#"{"id":"a"}"#).await.unwrap();
        queue.enqueue("q", r#"{"id":"b"}"#).await.unwrap();

        let first = queue.fetch("q").await.unwrap().unwrap();
        assert_eq!(first.delivery_count, 1);

        let again = queue.fetch("q").await.unwrap().unwrap();
        assert_eq!(again.delivery_tag, first.delivery_tag);
        assert_eq!(again.delivery_count, 2);

        queue.ack(&again).await.unwrap();
        let next = queue.fetch("q").await.unwrap().unwrap();
        assert_eq!(next.payload, r#"{"id":"b"}"#);
        assert_eq!(next.delivery_count, 1);
    }

    #[tokio::test]
    async fn test_queues_are_independent() {
        let queue = InMemoryQueue::new();
        queue.enqueue("index", "1").await.unwrap();

        assert!(queue.fetch("feature").await.unwrap().is_none());
        assert_eq!(queue.pending("index").await, vec!["1".to_string()]);
    }

    #[tokio::test]
    async fn test_dead_letter_removes_from_pending() {
        let queue = InMemoryQueue::new();
        queue.enqueue("q", "garbage").await.unwrap();
        let message = queue.fetch("q").await.unwrap().unwrap();

        queue.dead_letter(&message, "undecodable").await.unwrap();

        assert!(queue.pending("q").await.is_empty());
        let dead = queue.dead_letters("q").await;
        assert_eq!(dead.len(), 1);
        assert_eq!(dead[0].payload, "garbage");
        assert_eq!(dead[0].reason, "undecodable");
    }
}
