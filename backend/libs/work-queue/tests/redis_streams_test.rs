//! Redis Streams queue tests against a live server.
//!
//! Run with `REDIS_URL=redis://127.0.0.1/ cargo test -p work-queue -- --ignored`

use redis_utils::RedisPool;
use serial_test::serial;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use work_queue::{DeadLetter, MessageQueue, RedisStreamQueue, StreamQueueConfig};

async fn queue_with(consumer: &str, claim_idle: Duration) -> RedisStreamQueue {
    let url = std::env::var("REDIS_URL").unwrap_or_else(|_| "redis://127.0.0.1/".into());
    let pool = RedisPool::connect(&url).await.expect("redis available");
    let mut config = StreamQueueConfig::new("work-queue-test");
    config.consumer_name = consumer.to_string();
    config.block = Duration::from_millis(100);
    config.claim_idle = claim_idle;
    RedisStreamQueue::new(pool.manager(), config)
}

fn unique_queue() -> String {
    format!("test-{}", uuid::Uuid::new_v4())
}

#[tokio::test]
#[serial]
#[ignore = "Requires Redis at REDIS_URL"]
async fn test_fetch_ack_round() {
    let queue = queue_with("worker-a", Duration::from_secs(30)).await;
    let name = unique_queue();

    queue.enqueue(&name, r#"{"id":"e1"}"#).await.unwrap();
    let message = queue.fetch(&name).await.unwrap().expect("message");
    assert_eq!(message.payload, r#"{"id":"e1"}"#);
    assert_eq!(message.delivery_count, 1);

    queue.ack(&message).await.unwrap();
    assert!(queue.fetch(&name).await.unwrap().is_none());
}

#[tokio::test]
#[serial]
#[ignore = "Requires Redis at REDIS_URL"]
async fn test_unacked_entry_is_reclaimed_by_competing_worker() {
    let first = queue_with("worker-a", Duration::from_millis(50)).await;
    let second = Arc::new(queue_with("worker-b", Duration::from_millis(50)).await);
    let name = unique_queue();

    first.enqueue(&name, r#"{"id":"e2"}"#).await.unwrap();
    let lost = first.fetch(&name).await.unwrap().expect("message");

    tokio::time::sleep(Duration::from_millis(120)).await;
    let redelivered = second.fetch(&name).await.unwrap().expect("reclaimed");
    assert_eq!(redelivered.delivery_tag, lost.delivery_tag);
    assert_eq!(redelivered.delivery_count, 2);
    second.ack(&redelivered).await.unwrap();
}

#[tokio::test]
#[serial]
#[ignore = "Requires Redis at REDIS_URL"]
async fn test_entry_without_payload_is_dead_lettered_and_acked() {
    let url = std::env::var("REDIS_URL").unwrap_or_else(|_| "redis://127.0.0.1/".into());
    let pool = RedisPool::connect(&url).await.expect("redis available");
    let queue = queue_with("worker-a", Duration::from_millis(50)).await;
    let name = unique_queue();
    let stream = format!("queue:{}", name);

    // Create the group first so the foreign entry is delivered to it
    assert!(queue.fetch(&name).await.unwrap().is_none());

    let mut conn = pool.manager().lock().await.clone();
    let entry_id: String = redis::cmd("XADD")
        .arg(&stream)
        .arg("*")
        .arg("foo")
        .arg("bar")
        .query_async(&mut conn)
        .await
        .unwrap();

    assert!(queue.fetch(&name).await.unwrap().is_none());

    let dead: Vec<(String, HashMap<String, String>)> = redis::cmd("XRANGE")
        .arg(format!("{}:dead", stream))
        .arg("-")
        .arg("+")
        .query_async(&mut conn)
        .await
        .unwrap();
    assert_eq!(dead.len(), 1);
    let record: DeadLetter = serde_json::from_str(&dead[0].1["payload"]).unwrap();
    assert_eq!(record.message_id, entry_id);
    assert_eq!(record.payload, r#"{"foo":"bar"}"#);
    assert!(record.reason.contains("payload"));

    // Nothing left pending, so nothing comes back after claim_idle either
    tokio::time::sleep(Duration::from_millis(120)).await;
    assert!(queue.fetch(&name).await.unwrap().is_none());
    let pending: (u64, Option<String>, Option<String>, Option<Vec<(String, String)>>) =
        redis::cmd("XPENDING")
            .arg(&stream)
            .arg("work-queue-test")
            .query_async(&mut conn)
            .await
            .unwrap();
    assert_eq!(pending.0, 0);
}
