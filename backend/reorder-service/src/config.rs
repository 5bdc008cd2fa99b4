use anyhow::{anyhow, Result};
use serde::Deserialize;
use std::time::Duration;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub http_host: String,
    pub http_port: u16,

    pub database_url: String,
    pub redis_url: String,

    /// Model identity, also part of the prediction cache key
    pub model_name: String,
    /// "http", "onnx" or "none"
    pub predictor: String,
    pub predictor_url: String,
    pub predictor_timeout_ms: u64,
    pub onnx_model_path: String,
    pub onnx_batch_size: usize,
    /// Columns per row the ONNX graph was exported with
    pub onnx_input_width: usize,
    /// JSON encoder artifact; ranking is disabled when empty
    pub preprocessor_path: String,

    pub feature_version: String,
    pub feature_cache_timeout_ms: u64,
    pub store_timeout_ms: u64,
    pub prediction_cache_enabled: bool,
}

impl Config {
    pub fn from_env() -> Result<Self, config::ConfigError> {
        dotenvy::dotenv().ok();

        let config = config::Config::builder()
            .set_default("http_host", "0.0.0.0")?
            .set_default("http_port", 8000)?
            .set_default("database_url", "")?
            .set_default("redis_url", "redis://127.0.0.1:6379")?
            .set_default("model_name", "learn_to_rank_lightgbm_ranker_0.0.0")?
            .set_default("predictor", "http")?
            .set_default(
                "predictor_url",
                "http://localhost:8501/v1/models/learn_to_rank:predict",
            )?
            .set_default("predictor_timeout_ms", 500)?
            .set_default("onnx_model_path", "")?
            .set_default("onnx_batch_size", 32)?
            .set_default("onnx_input_width", 0)?
            .set_default("preprocessor_path", "")?
            .set_default("feature_version", "0")?
            .set_default("feature_cache_timeout_ms", 200)?
            .set_default("store_timeout_ms", 2000)?
            .set_default("prediction_cache_enabled", true)?
            .add_source(config::Environment::default().separator("__"))
            .build()?;

        config.try_deserialize()
    }

    pub fn validate(&self) -> Result<()> {
        if self.http_port == 0 {
            return Err(anyhow!("HTTP port must be greater than 0"));
        }

        if self.redis_url.is_empty() {
            return Err(anyhow!("Redis URL is required"));
        }

        if self.model_name.is_empty() {
            return Err(anyhow!("Model name is required"));
        }

        match self.predictor.as_str() {
            "none" => {}
            "http" if self.predictor_url.is_empty() => {
                return Err(anyhow!("PREDICTOR_URL is required for the http predictor"));
            }
            "onnx" if self.onnx_model_path.is_empty() => {
                return Err(anyhow!("ONNX_MODEL_PATH is required for the onnx predictor"));
            }
            "onnx" if self.onnx_batch_size == 0 || self.onnx_input_width == 0 => {
                return Err(anyhow!("ONNX batch size and input width must be greater than 0"));
            }
            "http" | "onnx" => {}
            other => return Err(anyhow!("Unknown predictor '{}'", other)),
        }

        if self.predictor_timeout_ms == 0 {
            return Err(anyhow!("Predictor timeout must be greater than 0"));
        }

        Ok(())
    }

    pub fn predictor_timeout(&self) -> Duration {
        Duration::from_millis(self.predictor_timeout_ms)
    }
}
