//! Detection and registration wired together over an in-memory queue, with
//! the classifier served by a mock model server.

use catalog_store::{EntityRecord, InMemoryCatalogStore};
use chrono::Utc;
use resilience::RetryConfig;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use violation_service::{
    DetectionHandler, HttpClassifier, InMemoryViolationStore, RegistrationHandler,
};
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};
use work_queue::{ConsumerConfig, InMemoryQueue, MessageQueue, PollOutcome, QueueConsumer};

const DETECTION: &str = "entity_violation";
const REGISTRATION: &str = "violation_registration";

fn entity(id: &str) -> EntityRecord {
    let now = Utc::now();
    EntityRecord {
        id: id.to_string(),
        category_id: 1,
        category_name_en: "cat".into(),
        category_name_ja: "ねこ".into(),
        subcategory_id: 2,
        subcategory_name_en: "mix".into(),
        subcategory_name_ja: "ミックス".into(),
        user_id: "u1".into(),
        user_handle_name: "owner".into(),
        name: id.to_string(),
        description: String::new(),
        photo_url: format!("https://cdn.example.com/{}.jpg", id),
        deactivated: false,
        created_at: now,
        updated_at: now,
    }
}

async fn mock_scores(server: &MockServer, entity_id: &str, p_violation: f64) {
    Mock::given(method("POST"))
        .and(path("/v1/models/no_animal_violation:predict"))
        .and(body_partial_json(json!({"inputs": {"entity_id": entity_id}})))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"outputs": [1.0 - p_violation, p_violation]})),
        )
        .mount(server)
        .await;
}

struct Pipeline {
    queue: Arc<InMemoryQueue>,
    catalog: Arc<InMemoryCatalogStore>,
    violations: Arc<InMemoryViolationStore>,
    detection: QueueConsumer<DetectionHandler>,
    registration: QueueConsumer<RegistrationHandler>,
}

async fn pipeline(server: &MockServer) -> Pipeline {
    let catalog = Arc::new(InMemoryCatalogStore::new());
    let violations = Arc::new(InMemoryViolationStore::new(catalog.clone()));
    let queue = Arc::new(InMemoryQueue::new());

    let classifier = HttpClassifier::new(
        format!("{}/v1/models/no_animal_violation:predict", server.uri()),
        Duration::from_secs(2),
    )
    .unwrap()
    .with_retry(RetryConfig::no_retry());

    let detection = QueueConsumer::new(
        queue.clone(),
        DetectionHandler::new(
            catalog.clone(),
            Arc::new(classifier),
            queue.clone(),
            REGISTRATION,
            "no_animal_violation",
            0.5,
        ),
        ConsumerConfig::new(DETECTION),
    );
    let registration = QueueConsumer::new(
        queue.clone(),
        RegistrationHandler::new(violations.clone(), catalog.clone(), 0.5),
        ConsumerConfig::new(REGISTRATION),
    );

    Pipeline {
        queue,
        catalog,
        violations,
        detection,
        registration,
    }
}

#[tokio::test]
async fn test_effective_violation_leaves_record_and_deactivated_entity() {
    let server = MockServer::start().await;
    mock_scores(&server, "dogless", 0.97).await;
    let p = pipeline(&server).await;
    p.catalog.insert_entity(entity("dogless")).await;

    p.queue.enqueue(DETECTION, r#"{"id":"dogless"}"#).await.unwrap();
    assert!(matches!(p.detection.poll_once().await.unwrap(), PollOutcome::Acked(_)));
    assert!(matches!(p.registration.poll_once().await.unwrap(), PollOutcome::Acked(_)));

    let recorded = p.violations.violations_for("dogless").await;
    assert_eq!(recorded.len(), 1);
    assert_eq!(recorded[0].judge, "model");
    assert!(recorded[0].is_effective);
    assert_eq!(p.catalog.is_deactivated("dogless").await, Some(true));

    assert!(p.queue.pending(DETECTION).await.is_empty());
    assert!(p.queue.pending(REGISTRATION).await.is_empty());
}

#[tokio::test]
async fn test_compliant_entity_stays_active() {
    let server = MockServer::start().await;
    mock_scores(&server, "kitty", 0.04).await;
    let p = pipeline(&server).await;
    p.catalog.insert_entity(entity("kitty")).await;

    p.queue.enqueue(DETECTION, r#"{"id":"kitty"}"#).await.unwrap();
    p.detection.poll_once().await.unwrap();

    assert_eq!(p.registration.poll_once().await.unwrap(), PollOutcome::Empty);
    assert!(p.violations.violations_for("kitty").await.is_empty());
    assert_eq!(p.catalog.is_deactivated("kitty").await, Some(false));
}

#[tokio::test]
async fn test_classifier_outage_keeps_detection_pending() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;
    let p = pipeline(&server).await;
    p.catalog.insert_entity(entity("rex")).await;

    p.queue.enqueue(DETECTION, r#"{"id":"rex"}"#).await.unwrap();
    assert_eq!(p.detection.poll_once().await.unwrap(), PollOutcome::Failed);
    assert_eq!(p.queue.pending(DETECTION).await.len(), 1);
    assert_eq!(p.catalog.is_deactivated("rex").await, Some(false));
}
