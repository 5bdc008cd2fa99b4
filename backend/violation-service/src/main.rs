use actix_web::{web, App, HttpServer};
use anyhow::{anyhow, Context, Result};
use catalog_store::PgCatalogStore;
use db_pool::{create_pool, DbConfig};
use redis_utils::RedisPool;
use resilience::RetryConfig;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use violation_service::config::Config;
use violation_service::http::WorkerStatus;
use violation_service::{
    DetectionHandler, HttpClassifier, PgViolationStore, ReconciliationSweep, RegistrationHandler,
    ViolationStore,
};
use work_queue::{ConsumerConfig, MessageQueue, QueueConsumer, RedisStreamQueue, StreamQueueConfig};

async fn stream_queue(config: &Config, role: &str) -> Result<Arc<RedisStreamQueue>> {
    let redis = RedisPool::connect(&config.redis_url)
        .await
        .with_context(|| format!("Failed to connect {} queue Redis", role))?;
    let mut stream_cfg = StreamQueueConfig::new(config.consumer_group.clone());
    stream_cfg.claim_idle = Duration::from_secs(config.claim_idle_secs);
    Ok(Arc::new(RedisStreamQueue::new(redis.manager(), stream_cfg)))
}

#[actix_web::main]
async fn main() -> Result<()> {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "info,violation_service=debug".into());
    if std::env::var("LOG_FORMAT").map(|v| v == "json").unwrap_or(false) {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }

    info!("Starting violation-service");

    let config = Config::from_env().context("Failed to load configuration")?;
    config
        .validate()
        .context("Configuration validation failed")?;

    let db_cfg = DbConfig::for_service("violation-service", &config.database_url);
    db_cfg.log_config();
    let pg_pool = Arc::new(
        create_pool(db_cfg)
            .await
            .context("Failed to create PostgreSQL pool")?,
    );
    catalog_store::run_migrations(&pg_pool)
        .await
        .context("Failed to run catalog migrations")?;

    let catalog = Arc::new(PgCatalogStore::new(pg_pool.clone()));
    let violations = Arc::new(PgViolationStore::new(pg_pool));

    let violation_type_id = violations
        .find_violation_type_id(&config.violation_type)
        .await
        .context("Failed to look up violation type")?
        .ok_or_else(|| anyhow!("Unknown violation type: {}", config.violation_type))?;
    info!(name = %config.violation_type, id = %violation_type_id, "Violation type resolved");

    let classifier = HttpClassifier::new(config.classifier_url.clone(), config.classifier_timeout())
        .context("Failed to build classifier client")?
        .with_retry(RetryConfig {
            max_retries: config.classifier_max_retries,
            ..Default::default()
        });

    // Each blocking consumer gets its own connection; detection also
    // publishes to the registration stream through its queue.
    let detection_queue = stream_queue(&config, "detection").await?;
    let registration_queue = stream_queue(&config, "registration").await?;

    let detection = DetectionHandler::new(
        catalog.clone(),
        Arc::new(classifier),
        detection_queue.clone() as Arc<dyn MessageQueue>,
        config.registration_queue.clone(),
        violation_type_id,
        config.threshold,
    );
    let mut detection_cfg = ConsumerConfig::new(config.detection_queue.clone());
    detection_cfg.max_deliveries = config.max_deliveries;
    let detection_consumer = QueueConsumer::new(detection_queue, detection, detection_cfg);

    let registration =
        RegistrationHandler::new(violations.clone(), catalog.clone(), config.threshold);
    let mut registration_cfg = ConsumerConfig::new(config.registration_queue.clone());
    registration_cfg.max_deliveries = config.max_deliveries;
    let registration_consumer =
        QueueConsumer::new(registration_queue, registration, registration_cfg);

    let sweep = ReconciliationSweep::new(
        violations,
        catalog,
        config.threshold,
        config.sweep_batch_size,
    );

    let status = Arc::new(WorkerStatus::default());
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let mut handles = Vec::with_capacity(3);
    {
        let status = status.clone();
        let shutdown = shutdown_rx.clone();
        handles.push(tokio::spawn(async move {
            status.set_detection(true);
            detection_consumer.run(shutdown).await;
            status.set_detection(false);
        }));
    }
    {
        let status = status.clone();
        let shutdown = shutdown_rx.clone();
        handles.push(tokio::spawn(async move {
            status.set_registration(true);
            registration_consumer.run(shutdown).await;
            status.set_registration(false);
        }));
    }
    {
        let interval = config.sweep_interval();
        handles.push(tokio::spawn(async move {
            sweep.run(interval, shutdown_rx).await;
        }));
    }

    info!("Starting HTTP server on {}:{}", config.http_host, config.http_port);
    let status_data = web::Data::new(status);
    let server_result = HttpServer::new(move || {
        App::new()
            .app_data(status_data.clone())
            .configure(violation_service::http::configure)
    })
    .bind((config.http_host.as_str(), config.http_port))
    .context("Failed to bind HTTP server")?
    .run()
    .await;

    info!("HTTP server stopped, draining workers");
    let _ = shutdown_tx.send(true);
    for handle in handles {
        if let Err(e) = handle.await {
            error!(error = %e, "Violation worker panicked");
        }
    }

    server_result.context("HTTP server error")
}
