//! Ranking predictors
//!
//! A predictor scores every row of the input matrix. Callers treat any error
//! as a reason to fall back to the input order.

mod http;
mod onnx;

pub use http::HttpPredictor;
pub use onnx::OnnxPredictor;

use async_trait::async_trait;
use ndarray::Array2;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PredictorError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("predictor returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("prediction timed out after {0:?}")]
    Timeout(Duration),

    #[error("expected {expected} scores, got {got}")]
    OutputLength { expected: usize, got: usize },

    #[error("model error: {0}")]
    Model(String),
}

impl PredictorError {
    /// Errors worth another attempt within the request budget.
    pub fn is_transient(&self) -> bool {
        match self {
            PredictorError::Http(e) => e.is_timeout() || e.is_connect() || e.is_request(),
            PredictorError::Status { status, .. } => *status >= 500 || *status == 429,
            _ => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, PredictorError>;

#[async_trait]
pub trait Predictor: Send + Sync {
    /// One score per row, in row order.
    async fn predict(&self, rows: &Array2<f32>) -> Result<Vec<f32>>;
}

pub(crate) fn check_output_len(scores: Vec<f32>, expected: usize) -> Result<Vec<f32>> {
    if scores.len() != expected {
        return Err(PredictorError::OutputLength {
            expected,
            got: scores.len(),
        });
    }
    Ok(scores)
}
