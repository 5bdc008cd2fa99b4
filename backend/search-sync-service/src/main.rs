use actix_web::{web, App, HttpServer};
use anyhow::{Context, Result};
use catalog_store::PgCatalogStore;
use db_pool::{create_pool, DbConfig};
use redis_utils::RedisPool;
use search_sync_service::config::Config;
use search_sync_service::search::{entity_index_mapping, ElasticsearchIndex, SearchIndex};
use search_sync_service::{IndexSyncHandler, IndexSyncWorker, SyncStatus};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use work_queue::{ConsumerConfig, QueueConsumer, RedisStreamQueue, StreamQueueConfig};

#[actix_web::main]
async fn main() -> Result<()> {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "info,search_sync_service=debug".into());
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

    info!("Starting search-sync-service");

    let config = Config::from_env().context("Failed to load configuration")?;
    config
        .validate()
        .context("Configuration validation failed")?;

    let db_cfg = DbConfig::for_service("search-sync-service", &config.database_url);
    db_cfg.log_config();
    let pg_pool = create_pool(db_cfg)
        .await
        .context("Failed to create PostgreSQL pool")?;
    catalog_store::run_migrations(&pg_pool)
        .await
        .context("Failed to run catalog migrations")?;

    // Blocking stream reads get a dedicated connection.
    let queue_redis = RedisPool::connect(&config.redis_url)
        .await
        .context("Failed to connect queue Redis")?;

    let index: Arc<dyn SearchIndex> = Arc::new(
        ElasticsearchIndex::new(&config.elasticsearch_url, config.elasticsearch_timeout())
            .context("Failed to create Elasticsearch client")?,
    );
    let store = Arc::new(PgCatalogStore::new(Arc::new(pg_pool)));

    let mut stream_cfg = StreamQueueConfig::new(config.consumer_group.clone());
    stream_cfg.claim_idle = Duration::from_secs(config.claim_idle_secs);
    let queue = Arc::new(RedisStreamQueue::new(queue_redis.manager(), stream_cfg));

    let mut consumer_cfg = ConsumerConfig::new(config.queue_name.clone());
    consumer_cfg.max_deliveries = config.max_deliveries;

    let status = Arc::new(SyncStatus::new());
    let worker = IndexSyncWorker {
        index: index.clone(),
        index_name: config.index_name.clone(),
        mapping: entity_index_mapping(&config.ja_analyzer),
        policy: config.poll_policy(),
        warn_after: Duration::from_secs(config.readiness_warn_after_secs),
        consumer: QueueConsumer::new(
            queue,
            IndexSyncHandler::new(store, index, config.index_name.clone()),
            consumer_cfg,
        ),
        status: status.clone(),
    };

    info!("Starting HTTP server on {}:{}", config.http_host, config.http_port);
    let status_data = web::Data::new(status);
    let server = HttpServer::new(move || {
        App::new()
            .app_data(status_data.clone())
            .configure(search_sync_service::http::configure)
    })
    .bind((config.http_host.as_str(), config.http_port))
    .context("Failed to bind HTTP server")?
    .run();

    // A bounded readiness policy that gives up takes the whole process down.
    let server_handle = server.handle();
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let worker_handle = tokio::spawn(async move {
        let result = worker.run(shutdown_rx).await;
        if let Err(e) = &result {
            error!(error = %e, "Index sync worker stopped");
            server_handle.stop(true).await;
        }
        result
    });

    let server_result = server.await;

    info!("HTTP server stopped, draining consumer");
    let _ = shutdown_tx.send(true);
    worker_handle
        .await
        .context("Index sync worker panicked")?
        .context("Search index never became ready")?;

    server_result.context("HTTP server error")
}
