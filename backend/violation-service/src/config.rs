use anyhow::{anyhow, Result};
use serde::Deserialize;
use std::time::Duration;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub http_host: String,
    pub http_port: u16,

    pub database_url: String,
    pub redis_url: String,

    // Queues
    pub detection_queue: String,
    pub registration_queue: String,
    pub consumer_group: String,
    pub max_deliveries: u64,
    pub claim_idle_secs: u64,

    // Classifier
    pub classifier_url: String,
    pub classifier_timeout_secs: u64,
    pub classifier_max_retries: u32,

    // Violations
    pub violation_type: String,
    pub threshold: f64,
    pub sweep_interval_secs: u64,
    pub sweep_batch_size: i64,
}

impl Config {
    pub fn from_env() -> Result<Self, config::ConfigError> {
        dotenvy::dotenv().ok();

        let config = config::Config::builder()
            .set_default("http_host", "0.0.0.0")?
            .set_default("http_port", 8093)?
            .set_default("database_url", "")?
            .set_default("redis_url", "redis://127.0.0.1:6379")?
            .set_default("detection_queue", "entity_violation")?
            .set_default("registration_queue", "violation_registration")?
            .set_default("consumer_group", "violation")?
            .set_default("max_deliveries", 5)?
            .set_default("claim_idle_secs", 30)?
            .set_default(
                "classifier_url",
                "http://localhost:8501/v1/models/no_animal_violation:predict",
            )?
            .set_default("classifier_timeout_secs", 10)?
            .set_default("classifier_max_retries", 3)?
            .set_default("violation_type", "no_animal_violation")?
            .set_default("threshold", 0.5)?
            .set_default("sweep_interval_secs", 300)?
            .set_default("sweep_batch_size", 500)?
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

        if self.classifier_url.is_empty() {
            return Err(anyhow!("Classifier URL is required"));
        }

        if self.detection_queue == self.registration_queue {
            return Err(anyhow!("Detection and registration queues must differ"));
        }

        if !(0.0..1.0).contains(&self.threshold) {
            return Err(anyhow!("Threshold must be in [0, 1)"));
        }

        if self.classifier_timeout_secs == 0 {
            return Err(anyhow!("Classifier timeout must be greater than 0"));
        }

        if self.sweep_interval_secs == 0 || self.sweep_batch_size <= 0 {
            return Err(anyhow!("Sweep interval and batch size must be greater than 0"));
        }

        if self.max_deliveries == 0 {
            return Err(anyhow!("max_deliveries must be at least 1"));
        }

        Ok(())
    }

    pub fn classifier_timeout(&self) -> Duration {
        Duration::from_secs(self.classifier_timeout_secs)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }
}
