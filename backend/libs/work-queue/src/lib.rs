//! Durable work queues with at-least-once delivery
//!
//! Messages are acknowledged only after the consumer's side effect succeeded.
//! Unacknowledged messages are redelivered, possibly to another worker in the
//! same consumer group. Every worker processes one message at a time.
//!
//! - [`RedisStreamQueue`]: Redis Streams consumer groups (production)
//! - [`InMemoryQueue`]: process-local queue with the same redelivery semantics
//! - [`QueueConsumer`]: the fetch / handle / ack loop with dead-lettering

mod consumer;
mod error;
mod memory;
mod message;
mod metrics;
mod redis_streams;

pub use consumer::{ConsumerConfig, Disposition, MessageHandler, PollOutcome, QueueConsumer};
pub use error::{QueueError, Result};
pub use memory::InMemoryQueue;
pub use message::{DeadLetter, QueueMessage};
pub use redis_streams::{RedisStreamQueue, StreamQueueConfig};

use async_trait::async_trait;
use serde::Serialize;

/// Enqueue/dequeue primitives against a durable queue.
#[async_trait]
pub trait MessageQueue: Send + Sync {
    /// Append a payload and return its delivery tag.
    async fn enqueue(&self, queue: &str, payload: &str) -> Result<String>;

    /// Hand out at most one message (prefetch = 1). `None` when nothing is available.
    async fn fetch(&self, queue: &str) -> Result<Option<QueueMessage>>;

    /// Acknowledge a fully processed message so it is never redelivered.
    async fn ack(&self, message: &QueueMessage) -> Result<()>;

    /// Park a message on the queue's dead-letter list and acknowledge the original.
    async fn dead_letter(&self, message: &QueueMessage, reason: &str) -> Result<()>;
}

/// Serialize `value` as JSON and enqueue it.
pub async fn enqueue_json<Q, T>(queue: &Q, name: &str, value: &T) -> Result<String>
where
    Q: MessageQueue + ?Sized,
    T: Serialize + Sync,
{
    let payload = serde_json::to_string(value)?;
    queue.enqueue(name, &payload).await
}
