use anyhow::{anyhow, Result};
use serde::Deserialize;
use std::time::Duration;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub http_host: String,
    pub http_port: u16,

    pub database_url: String,
    pub redis_url: String,

    // Queue
    pub queue_name: String,
    pub consumer_group: String,
    pub max_deliveries: u64,
    pub claim_idle_secs: u64,

    // Features
    pub feature_version: String,
    pub feature_cache_ttl_secs: u64,
    pub category_cardinality: usize,
    pub subcategory_cardinality: usize,
    pub name_dimensions: usize,
    pub description_dimensions: usize,
    /// Comma-separated
    pub stop_words: String,
}

impl Config {
    pub fn from_env() -> Result<Self, config::ConfigError> {
        dotenvy::dotenv().ok();

        let config = config::Config::builder()
            .set_default("http_host", "0.0.0.0")?
            .set_default("http_port", 8091)?
            .set_default("database_url", "")?
            .set_default("redis_url", "redis://127.0.0.1:6379")?
            .set_default("queue_name", "entity_feature")?
            .set_default("consumer_group", "feature-registry")?
            .set_default("max_deliveries", 5)?
            .set_default("claim_idle_secs", 30)?
            .set_default("feature_version", "0")?
            .set_default("feature_cache_ttl_secs", 60 * 60 * 24 * 7)? // 7 days
            .set_default("category_cardinality", 2)?
            .set_default("subcategory_cardinality", 32)?
            .set_default("name_dimensions", 64)?
            .set_default("description_dimensions", 256)?
            .set_default("stop_words", "")?
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

        if self.feature_version.is_empty() {
            return Err(anyhow!("Feature version is required"));
        }

        if self.feature_cache_ttl_secs == 0 {
            return Err(anyhow!("Feature cache TTL must be greater than 0"));
        }

        if self.category_cardinality == 0 || self.subcategory_cardinality == 0 {
            return Err(anyhow!("Category cardinalities must be greater than 0"));
        }

        if self.name_dimensions == 0 || self.description_dimensions == 0 {
            return Err(anyhow!("Text vector dimensions must be greater than 0"));
        }

        if self.max_deliveries == 0 {
            return Err(anyhow!("max_deliveries must be at least 1"));
        }

        Ok(())
    }

    pub fn feature_cache_ttl(&self) -> Duration {
        Duration::from_secs(self.feature_cache_ttl_secs)
    }

    pub fn stop_word_list(&self) -> Vec<String> {
        self.stop_words
            .split(',')
            .map(str::trim)
            .filter(|w| !w.is_empty())
            .map(String::from)
            .collect()
    }
}
