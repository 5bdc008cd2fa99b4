use actix_web::{web, App, HttpServer};
use anyhow::{Context, Result};
use catalog_store::PgCatalogStore;
use db_pool::{create_pool, DbConfig};
use feature_cache::RedisFeatureCache;
use redis_utils::RedisPool;
use reorder_service::cache::RedisPredictionCache;
use reorder_service::config::Config;
use reorder_service::predictor::{HttpPredictor, OnnxPredictor, Predictor};
use reorder_service::preprocess::Preprocessor;
use reorder_service::{RankingModel, ReorderService};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[actix_web::main]
async fn main() -> Result<()> {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "info,actix_web=info,reorder_service=debug".into());
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

    info!("Starting reorder-service");

    let config = Config::from_env().context("Failed to load configuration")?;
    config
        .validate()
        .context("Configuration validation failed")?;

    let db_cfg = DbConfig::for_service("reorder-service", &config.database_url);
    db_cfg.log_config();
    let pg_pool = create_pool(db_cfg)
        .await
        .context("Failed to create PostgreSQL pool")?;

    let redis = RedisPool::connect(&config.redis_url)
        .await
        .context("Failed to connect Redis")?;

    let model = load_model(&config)?;
    match &model {
        Some(m) => info!(model_name = %m.name, "Ranking model enabled"),
        None => warn!("Ranking model disabled, responses keep the input order"),
    }

    let features = RedisFeatureCache::new(redis.manager(), config.feature_version.clone())
        .with_timeout(Duration::from_millis(config.feature_cache_timeout_ms));
    let mut service = ReorderService::new(
        Arc::new(PgCatalogStore::new(Arc::new(pg_pool))),
        Arc::new(features),
        model,
    )
    .with_store_timeout(Duration::from_millis(config.store_timeout_ms))
    .with_predict_timeout(config.predictor_timeout());
    if config.prediction_cache_enabled {
        service = service.with_prediction_cache(Arc::new(RedisPredictionCache::new(redis.manager())));
    }

    let service = web::Data::new(Arc::new(service));

    info!("Starting HTTP server on {}:{}", config.http_host, config.http_port);
    HttpServer::new(move || {
        App::new()
            .app_data(service.clone())
            .configure(reorder_service::handlers::configure)
    })
    .bind((config.http_host.as_str(), config.http_port))
    .context("Failed to bind HTTP server")?
    .run()
    .await
    .context("HTTP server error")
}

fn load_model(config: &Config) -> Result<Option<RankingModel>> {
    if config.predictor == "none" || config.preprocessor_path.is_empty() {
        return Ok(None);
    }

    let preprocessor = Preprocessor::load(&config.preprocessor_path)
        .with_context(|| format!("Failed to load preprocessor {}", config.preprocessor_path))?;

    let predictor: Arc<dyn Predictor> = match config.predictor.as_str() {
        "onnx" => Arc::new(
            OnnxPredictor::load(
                &config.onnx_model_path,
                config.onnx_input_width,
                config.onnx_batch_size,
            )
            .context("Failed to load ONNX model")?
            .with_timeout(config.predictor_timeout()),
        ),
        _ => Arc::new(
            HttpPredictor::new(config.predictor_url.clone(), config.predictor_timeout())
                .context("Failed to build predictor client")?,
        ),
    };

    Ok(Some(RankingModel {
        name: config.model_name.clone(),
        preprocessor: Arc::new(preprocessor),
        predictor,
    }))
}
