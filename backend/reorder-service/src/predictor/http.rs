use super::{check_output_len, Predictor, PredictorError, Result};
use async_trait::async_trait;
use ndarray::Array2;
use resilience::{with_retry_if, with_timeout, RetryConfig};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

#[derive(Serialize)]
struct PredictRequest<'a> {
    inputs: &'a [Vec<f32>],
}

#[derive(Deserialize)]
struct PredictResponse {
    outputs: Vec<f32>,
}

/// Remote model server speaking `{"inputs": [[f32]]}` / `{"outputs": [f32]}`.
///
/// `timeout` bounds the whole call including retries.
pub struct HttpPredictor {
    client: reqwest::Client,
    url: String,
    timeout: Duration,
    retry: RetryConfig,
}

impl HttpPredictor {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            url: url.into(),
            timeout,
            retry: RetryConfig {
                max_retries: 1,
                initial_backoff: Duration::from_millis(20),
                max_backoff: Duration::from_millis(100),
                ..Default::default()
            },
        })
    }

    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    async fn call(&self, inputs: &[Vec<f32>]) -> Result<Vec<f32>> {
        let response = self
            .client
            .post(&self.url)
            .json(&PredictRequest { inputs })
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(PredictorError::Status {
                status: status.as_u16(),
                body: response.text().await.unwrap_or_default(),
            });
        }

        let body: PredictResponse = response.json().await?;
        Ok(body.outputs)
    }
}

#[async_trait]
impl Predictor for HttpPredictor {
    async fn predict(&self, rows: &Array2<f32>) -> Result<Vec<f32>> {
        let inputs: Vec<Vec<f32>> = rows.outer_iter().map(|row| row.to_vec()).collect();

        let attempt = with_retry_if(self.retry.clone(), PredictorError::is_transient, || {
            self.call(&inputs)
        });
        let scores = with_timeout(self.timeout, attempt)
            .await
            .map_err(|_| PredictorError::Timeout(self.timeout))?
            .map_err(|e| e.into_inner())?;

        debug!(rows = inputs.len(), url = %self.url, "Remote prediction completed");
        check_output_len(scores, inputs.len())
    }
}
