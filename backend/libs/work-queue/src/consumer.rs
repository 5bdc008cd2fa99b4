use crate::error::Result;
use crate::message::QueueMessage;
use crate::metrics::record_outcome;
use crate::MessageQueue;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

/// What the handler did with a message. Every variant is final: the message
/// is acknowledged (or dead-lettered) and never redelivered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Disposition {
    /// The side effect was durably applied.
    Processed,
    /// Nothing to do, e.g. the entity is gone or deactivated.
    Skipped(String),
    /// The message can never succeed, e.g. the payload does not decode.
    Rejected(String),
}

/// Processes one message. Returning `Err` leaves the message unacknowledged
/// so it gets redelivered.
#[async_trait]
pub trait MessageHandler: Send + Sync {
    type Error: std::error::Error + Send + Sync + 'static;

    async fn handle(&self, message: &QueueMessage) -> std::result::Result<Disposition, Self::Error>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollOutcome {
    Empty,
    Acked(Disposition),
    /// Handler failed; the message stays pending for redelivery.
    Failed,
    DeadLettered,
}

#[derive(Debug, Clone)]
pub struct ConsumerConfig {
    pub queue_name: String,
    /// Deliveries allowed before a message is moved to the dead-letter list
    pub max_deliveries: u64,
    /// Pause after a handler or transport failure
    pub error_backoff: Duration,
    /// Pause after an empty fetch
    pub idle_backoff: Duration,
}

impl ConsumerConfig {
    pub fn new(queue_name: impl Into<String>) -> Self {
        Self {
            queue_name: queue_name.into(),
            max_deliveries: 5,
            error_backoff: Duration::from_secs(1),
            idle_backoff: Duration::from_millis(200),
        }
    }
}

/// Single-flight consumer: fetch one message, handle it, ack, repeat.
pub struct QueueConsumer<H> {
    queue: Arc<dyn MessageQueue>,
    handler: H,
    config: ConsumerConfig,
}

impl<H: MessageHandler> QueueConsumer<H> {
    pub fn new(queue: Arc<dyn MessageQueue>, handler: H, config: ConsumerConfig) -> Self {
        Self {
            queue,
            handler,
            config,
        }
    }

    pub fn handler(&self) -> &H {
        &self.handler
    }

    /// Fetch and fully process at most one message.
    pub async fn poll_once(&self) -> Result<PollOutcome> {
        let queue_name = self.config.queue_name.as_str();

        let Some(message) = self.queue.fetch(queue_name).await? else {
            return Ok(PollOutcome::Empty);
        };

        if message.delivery_count > self.config.max_deliveries {
            let reason = format!(
                "exceeded {} deliveries without success",
                self.config.max_deliveries
            );
            warn!(
                queue = queue_name,
                message_id = %message.delivery_tag,
                delivery_count = message.delivery_count,
                "Moving message to dead-letter queue"
            );
            self.queue.dead_letter(&message, &reason).await?;
            record_outcome(queue_name, "dead_lettered");
            return Ok(PollOutcome::DeadLettered);
        }

        match self.handler.handle(&message).await {
            Ok(Disposition::Rejected(reason)) => {
                warn!(
                    queue = queue_name,
                    message_id = %message.delivery_tag,
                    reason = %reason,
                    "Rejecting message to dead-letter queue"
                );
                self.queue.dead_letter(&message, &reason).await?;
                record_outcome(queue_name, "dead_lettered");
                Ok(PollOutcome::DeadLettered)
            }
            Ok(disposition) => {
                self.queue.ack(&message).await?;
                let outcome = match &disposition {
                    Disposition::Skipped(reason) => {
                        debug!(
                            queue = queue_name,
                            message_id = %message.delivery_tag,
                            reason = %reason,
                            "Message skipped"
                        );
                        "skipped"
                    }
                    _ => "processed",
                };
                record_outcome(queue_name, outcome);
                Ok(PollOutcome::Acked(disposition))
            }
            Err(e) => {
                error!(
                    queue = queue_name,
                    message_id = %message.delivery_tag,
                    delivery_count = message.delivery_count,
                    error = %e,
                    "Failed to process message, leaving it for redelivery"
                );
                record_outcome(queue_name, "failed");
                Ok(PollOutcome::Failed)
            }
        }
    }

    /// Consume until `shutdown` flips to `true`.
    ///
    /// Shutdown is only observed between messages; an in-flight message is
    /// always finished (acked or left pending) first.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        info!(queue = %self.config.queue_name, "Waiting for messages");

        while !*shutdown.borrow_and_update() {
            let pause = match self.poll_once().await {
                Ok(PollOutcome::Empty) => Some(self.config.idle_backoff),
                Ok(PollOutcome::Failed) => Some(self.config.error_backoff),
                Ok(_) => None,
                Err(e) => {
                    error!(queue = %self.config.queue_name, error = %e, "Queue transport error");
                    Some(self.config.error_backoff)
                }
            };

            if let Some(pause) = pause {
                tokio::select! {
                    _ = tokio::time::sleep(pause) => {}
                    _ = shutdown.changed() => {}
                }
            }
        }

        info!(queue = %self.config.queue_name, "Consumer stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::InMemoryQueue;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[derive(Debug, thiserror::Error)]
    #[error("store unavailable")]
    struct Unavailable;

    /// Fails the first `failures` calls, then answers by payload.
    struct ScriptedHandler {
        failures: u32,
        calls: AtomicU32,
    }

    impl ScriptedHandler {
        fn new(failures: u32) -> Self {
            Self {
                failures,
                calls: AtomicU32::new(0),
            }
        }
    }

    #[async_trait]
    impl MessageHandler for ScriptedHandler {
        type Error = Unavailable;

        async fn handle(
            &self,
            message: &QueueMessage,
        ) -> std::result::Result<Disposition, Unavailable> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            if call < self.failures {
                return Err(Unavailable);
            }
            Ok(match message.payload.as_str() {
                "skip" => Disposition::Skipped("gone".into()),
                "poison" => Disposition::Rejected("undecodable".into()),
                _ => Disposition::Processed,
            })
        }
    }

    fn consumer(queue: Arc<InMemoryQueue>, handler: ScriptedHandler) -> QueueConsumer<ScriptedHandler> {
        let mut config = ConsumerConfig::new("q");
        config.max_deliveries = 3;
        QueueConsumer::new(queue, handler, config)
    }

    #[tokio::test]
    async fn test_empty_queue() {
        let queue = Arc::new(InMemoryQueue::new());
        let consumer = consumer(queue, ScriptedHandler::new(0));
        assert_eq!(consumer.poll_once().await.unwrap(), PollOutcome::Empty);
    }

    #[tokio::test]
    async fn test_ack_only_after_success() {
        let queue = Arc::new(InMemoryQueue::new());
        queue.enqueue("q", "work").await.unwrap();
        let consumer = consumer(queue.clone(), ScriptedHandler::new(1));

        assert_eq!(consumer.poll_once().await.unwrap(), PollOutcome::Failed);
        assert_eq!(queue.pending("q").await.len(), 1);

        assert_eq!(
            consumer.poll_once().await.unwrap(),
            PollOutcome::Acked(Disposition::Processed)
        );
        assert!(queue.pending("q").await.is_empty());
    }

    #[tokio::test]
    async fn test_skip_is_acked() {
        let queue = Arc::new(InMemoryQueue::new());
        queue.enqueue("q", "skip").await.unwrap();
        let consumer = consumer(queue.clone(), ScriptedHandler::new(0));

        assert!(matches!(
            consumer.poll_once().await.unwrap(),
            PollOutcome::Acked(Disposition::Skipped(_))
        ));
        assert!(queue.pending("q").await.is_empty());
        assert!(queue.dead_letters("q").await.is_empty());
    }

    #[tokio::test]
    async fn test_rejected_goes_straight_to_dead_letter() {
        let queue = Arc::new(InMemoryQueue::new());
        queue.enqueue("q", "poison").await.unwrap();
        let consumer = consumer(queue.clone(), ScriptedHandler::new(0));

        assert_eq!(consumer.poll_once().await.unwrap(), PollOutcome::DeadLettered);
        assert_eq!(queue.dead_letters("q").await[0].reason, "undecodable");
    }

    #[tokio::test]
    async fn test_dead_letter_after_max_deliveries() {
        let queue = Arc::new(InMemoryQueue::new());
        queue.enqueue("q", "work").await.unwrap();
        let consumer = consumer(queue.clone(), ScriptedHandler::new(u32::MAX));

        for _ in 0..3 {
            assert_eq!(consumer.poll_once().await.unwrap(), PollOutcome::Failed);
        }
        assert_eq!(consumer.poll_once().await.unwrap(), PollOutcome::DeadLettered);
        assert_eq!(consumer.handler().calls.load(Ordering::SeqCst), 3);

        let dead = queue.dead_letters("q").await;
        assert_eq!(dead.len(), 1);
        assert_eq!(dead[0].delivery_count, 4);
        assert!(queue.pending("q").await.is_empty());
    }

    #[tokio::test]
    async fn test_run_stops_on_shutdown() {
        let queue = Arc::new(InMemoryQueue::new());
        queue.enqueue("q", "a").await.unwrap();
        queue.enqueue("q", "b").await.unwrap();
        let consumer = Arc::new(consumer(queue.clone(), ScriptedHandler::new(0)));

        let (tx, rx) = watch::channel(false);
        let runner = {
            let consumer = consumer.clone();
            tokio::spawn(async move { consumer.run(rx).await })
        };

        for _ in 0..50 {
            if queue.pending("q").await.is_empty() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        tx.send(true).unwrap();
        tokio::time::timeout(Duration::from_secs(2), runner)
            .await
            .expect("consumer should stop")
            .unwrap();

        assert!(queue.pending("q").await.is_empty());
        assert_eq!(consumer.handler().calls.load(Ordering::SeqCst), 2);
    }
}
