use actix_web::{web, App, HttpServer};
use anyhow::{Context, Result};
use catalog_store::PgCatalogStore;
use db_pool::{create_pool, DbConfig};
use feature_cache::RedisFeatureCache;
use feature_registry_service::config::Config;
use feature_registry_service::http::ConsumerStatus;
use feature_registry_service::vectorizer::{CategoricalVectorizer, HashedTextVectorizer};
use feature_registry_service::{FeatureExtractor, FeatureRegistrationHandler, PgFeatureRowStore};
use redis_utils::RedisPool;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use work_queue::{ConsumerConfig, QueueConsumer, RedisStreamQueue, StreamQueueConfig};

#[actix_web::main]
async fn main() -> Result<()> {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "info,feature_registry_service=debug".into());
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

    info!("Starting feature-registry-service");

    let config = Config::from_env().context("Failed to load configuration")?;
    config
        .validate()
        .context("Configuration validation failed")?;

    let db_cfg = DbConfig::for_service("feature-registry-service", &config.database_url);
    db_cfg.log_config();
    let pg_pool = Arc::new(
        create_pool(db_cfg)
            .await
            .context("Failed to create PostgreSQL pool")?,
    );
    catalog_store::run_migrations(&pg_pool)
        .await
        .context("Failed to run catalog migrations")?;

    let cache_redis = RedisPool::connect(&config.redis_url)
        .await
        .context("Failed to connect cache Redis")?;
    // Blocking stream reads get a dedicated connection.
    let queue_redis = RedisPool::connect(&config.redis_url)
        .await
        .context("Failed to connect queue Redis")?;

    let extractor = FeatureExtractor::new(
        CategoricalVectorizer::new(config.category_cardinality),
        CategoricalVectorizer::new(config.subcategory_cardinality),
        HashedTextVectorizer::new(config.name_dimensions).with_stop_words(config.stop_word_list()),
        HashedTextVectorizer::new(config.description_dimensions)
            .with_stop_words(config.stop_word_list()),
    );
    info!(dimensions = extractor.dimensions(), "Feature extractor configured");

    let handler = FeatureRegistrationHandler::new(
        Arc::new(PgCatalogStore::new(pg_pool.clone())),
        Arc::new(PgFeatureRowStore::new(pg_pool)),
        Arc::new(RedisFeatureCache::new(
            cache_redis.manager(),
            config.feature_version.clone(),
        )),
        extractor,
        config.feature_version.clone(),
        config.feature_cache_ttl(),
    );

    let mut stream_cfg = StreamQueueConfig::new(config.consumer_group.clone());
    stream_cfg.claim_idle = Duration::from_secs(config.claim_idle_secs);
    let queue = Arc::new(RedisStreamQueue::new(queue_redis.manager(), stream_cfg));

    let mut consumer_cfg = ConsumerConfig::new(config.queue_name.clone());
    consumer_cfg.max_deliveries = config.max_deliveries;
    let consumer = QueueConsumer::new(queue, handler, consumer_cfg);

    let status = Arc::new(ConsumerStatus::default());
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let consumer_status = status.clone();
    let consumer_handle = tokio::spawn(async move {
        consumer_status.set_running(true);
        consumer.run(shutdown_rx).await;
        consumer_status.set_running(false);
    });

    info!("Starting HTTP server on {}:{}", config.http_host, config.http_port);
    let status_data = web::Data::new(status);
    let server_result = HttpServer::new(move || {
        App::new()
            .app_data(status_data.clone())
            .configure(feature_registry_service::http::configure)
    })
    .bind((config.http_host.as_str(), config.http_port))
    .context("Failed to bind HTTP server")?
    .run()
    .await;

    info!("HTTP server stopped, draining consumer");
    let _ = shutdown_tx.send(true);
    if let Err(e) = consumer_handle.await {
        error!(error = %e, "Feature consumer panicked");
    }

    server_result.context("HTTP server error")
}
