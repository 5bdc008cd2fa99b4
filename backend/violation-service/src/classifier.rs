//! Image classifier client
//!
//! The model server answers `{"outputs": [p_ok, p_violation]}` for one
//! entity photo.

use async_trait::async_trait;
use catalog_store::EntityRecord;
use resilience::{with_retry_if, with_timeout, RetryConfig};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum ClassifierError {
    #[error("classifier transport error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("classifier returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("classifier call exceeded {0:?}")]
    Timeout(Duration),

    #[error("malformed classifier output: {0}")]
    MalformedOutput(String),
}

impl ClassifierError {
    /// Transport failures, 5xx and 429 are worth another attempt.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Http(e) => e.is_connect() || e.is_timeout() || e.is_request(),
            Self::Status { status, .. } => *status >= 500 || *status == 429,
            Self::Timeout(_) => true,
            Self::MalformedOutput(_) => false,
        }
    }
}

#[async_trait]
pub trait Classifier: Send + Sync {
    /// Probability in `[0, 1]` that the entity violates the policy.
    async fn violation_probability(&self, entity: &EntityRecord) -> Result<f64, ClassifierError>;
}

#[derive(Serialize)]
struct ClassifyRequest<'a> {
    inputs: ClassifyInputs<'a>,
}

#[derive(Serialize)]
struct ClassifyInputs<'a> {
    photo_url: &'a str,
    entity_id: &'a str,
}

#[derive(Deserialize)]
struct ClassifyResponse {
    outputs: Vec<f64>,
}

pub struct HttpClassifier {
    client: reqwest::Client,
    url: String,
    timeout: Duration,
    retry: RetryConfig,
}

impl HttpClassifier {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self, ClassifierError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            url: url.into(),
            timeout,
            retry: RetryConfig {
                max_retries: 3,
                ..Default::default()
            },
        })
    }

    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    async fn call(&self, entity: &EntityRecord) -> Result<f64, ClassifierError> {
        let request = ClassifyRequest {
            inputs: ClassifyInputs {
                photo_url: &entity.photo_url,
                entity_id: &entity.id,
            },
        };

        let response = self.client.post(&self.url).json(&request).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(ClassifierError::Status {
                status: status.as_u16(),
                body: response.text().await.unwrap_or_default(),
            });
        }

        let body: ClassifyResponse = response.json().await?;
        violation_output(&body.outputs)
    }
}

/// Second output is the violation class.
fn violation_output(outputs: &[f64]) -> Result<f64, ClassifierError> {
    match outputs {
        [_, p, ..] if (0.0..=1.0).contains(p) => Ok(*p),
        [_, p, ..] => Err(ClassifierError::MalformedOutput(format!(
            "probability {} out of range",
            p
        ))),
        _ => Err(ClassifierError::MalformedOutput(format!(
            "expected 2 outputs, got {}",
            outputs.len()
        ))),
    }
}

#[async_trait]
impl Classifier for HttpClassifier {
    async fn violation_probability(&self, entity: &EntityRecord) -> Result<f64, ClassifierError> {
        // Each attempt is already capped by the client timeout; the outer
        // bound covers the backoff sleeps as well.
        let total = self.timeout * self.retry.max_retries.saturating_add(1);
        let attempt = with_retry_if(self.retry.clone(), ClassifierError::is_transient, || {
            self.call(entity)
        });
        let probability = with_timeout(total, attempt)
            .await
            .map_err(|_| ClassifierError::Timeout(total))?
            .map_err(|e| e.into_inner())?;

        debug!(entity_id = %entity.id, probability, "Entity classified");
        Ok(probability)
    }
}
