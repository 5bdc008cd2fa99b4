use anyhow::{anyhow, Result};
use resilience::PollPolicy;
use serde::Deserialize;
use std::time::Duration;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    // HTTP server (health, readiness, metrics)
    pub http_host: String,
    pub http_port: u16,

    pub database_url: String,
    pub redis_url: String,

    // Elasticsearch
    pub elasticsearch_url: String,
    pub elasticsearch_timeout_ms: u64,
    pub index_name: String,
    pub ja_analyzer: String,

    // Queue
    pub queue_name: String,
    pub consumer_group: String,
    pub max_deliveries: u64,
    pub claim_idle_secs: u64,

    // Index readiness; 0 attempts polls forever
    pub readiness_interval_secs: u64,
    pub readiness_max_attempts: u32,
    pub readiness_warn_after_secs: u64,
}

impl Config {
    pub fn from_env() -> Result<Self, config::ConfigError> {
        dotenvy::dotenv().ok();

        let config = config::Config::builder()
            .set_default("http_host", "0.0.0.0")?
            .set_default("http_port", 8090)?
            .set_default("database_url", "")?
            .set_default("redis_url", "redis://127.0.0.1:6379")?
            .set_default("elasticsearch_url", "http://localhost:9200")?
            .set_default("elasticsearch_timeout_ms", 5000)?
            .set_default("index_name", "entity")?
            .set_default("ja_analyzer", "standard")?
            .set_default("queue_name", "entity_index")?
            .set_default("consumer_group", "search-sync")?
            .set_default("max_deliveries", 5)?
            .set_default("claim_idle_secs", 30)?
            .set_default("readiness_interval_secs", 5)?
            .set_default("readiness_max_attempts", 0)?
            .set_default("readiness_warn_after_secs", 60)?
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

        if self.elasticsearch_url.is_empty() {
            return Err(anyhow!("Elasticsearch URL is required"));
        }

        if self.index_name.is_empty() || self.queue_name.is_empty() {
            return Err(anyhow!("Index name and queue name are required"));
        }

        if self.max_deliveries == 0 {
            return Err(anyhow!("max_deliveries must be at least 1"));
        }

        if self.readiness_interval_secs == 0 {
            return Err(anyhow!("Readiness interval must be greater than 0"));
        }

        Ok(())
    }

    pub fn poll_policy(&self) -> PollPolicy {
        let interval = Duration::from_secs(self.readiness_interval_secs);
        if self.readiness_max_attempts == 0 {
            PollPolicy::Unbounded { interval }
        } else {
            PollPolicy::Bounded {
                max_attempts: self.readiness_max_attempts,
                initial_backoff: interval,
                max_backoff: interval * 12,
                multiplier: 2.0,
            }
        }
    }

    pub fn elasticsearch_timeout(&self) -> Duration {
        Duration::from_millis(self.elasticsearch_timeout_ms)
    }
}
