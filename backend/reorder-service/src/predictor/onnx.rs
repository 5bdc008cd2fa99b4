use super::{check_output_len, Predictor, PredictorError, Result};
use async_trait::async_trait;
use ndarray::Array2;
use resilience::with_timeout;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tract_onnx::prelude::*;
use tracing::info;

type TractModel = SimplePlan<TypedFact, Box<dyn TypedOp>, Graph<TypedFact, Box<dyn TypedOp>>>;

pub const DEFAULT_BATCH_SIZE: usize = 32;
pub const DEFAULT_TIMEOUT: Duration = Duration::from_millis(500);

/// In-process ONNX ranker with a fixed `[batch_size, width]` input.
///
/// Inputs are split into batches; the last batch is zero-padded and the
/// padded scores are dropped. Inference that outlives `timeout` is reported
/// as `PredictorError::Timeout`; the blocking task runs to completion
/// in the background.
pub struct OnnxPredictor {
    model: Arc<TractModel>,
    width: usize,
    batch_size: usize,
    timeout: Duration,
}

impl OnnxPredictor {
    pub fn load(path: impl AsRef<Path>, width: usize, batch_size: usize) -> Result<Self> {
        let path = path.as_ref();
        let batch_size = batch_size.max(1);
        let model = tract_onnx::onnx()
            .model_for_path(path)
            .and_then(|m| m.with_input_fact(0, f32::fact([batch_size, width]).into()))
            .and_then(|m| m.into_optimized())
            .and_then(|m| m.into_runnable())
            .map_err(|e| PredictorError::Model(format!("{}: {}", path.display(), e)))?;

        info!(path = %path.display(), width, batch_size, "ONNX ranking model loaded");
        Ok(Self {
            model: Arc::new(model),
            width,
            batch_size,
            timeout: DEFAULT_TIMEOUT,
        })
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// Split rows into zero-padded `batch_size x width` blocks, paired with the
/// number of real rows in each block.
pub(crate) fn padded_batches(
    rows: &Array2<f32>,
    batch_size: usize,
    width: usize,
) -> Vec<(Vec<f32>, usize)> {
    let mut batches = Vec::new();
    let n_rows = rows.nrows();
    let mut start = 0;

    while start < n_rows {
        let real = (n_rows - start).min(batch_size);
        let mut block = vec![0.0f32; batch_size * width];
        for i in 0..real {
            for (j, value) in rows.row(start + i).iter().take(width).enumerate() {
                block[i * width + j] = *value;
            }
        }
        batches.push((block, real));
        start += real;
    }

    batches
}

fn run_batches(
    model: &TractModel,
    batches: Vec<(Vec<f32>, usize)>,
    batch_size: usize,
    width: usize,
) -> Result<Vec<f32>> {
    let mut scores = Vec::new();
    for (block, real) in batches {
        let input = tract_ndarray::Array2::from_shape_vec((batch_size, width), block)
            .map_err(|e| PredictorError::Model(e.to_string()))?;
        let output = model
            .run(tvec![input.into_tensor().into()])
            .map_err(|e| PredictorError::Model(format!("inference failed: {}", e)))?;
        let view = output[0]
            .to_array_view::<f32>()
            .map_err(|e| PredictorError::Model(format!("output extraction failed: {}", e)))?;
        scores.extend(view.iter().copied().take(real));
    }
    Ok(scores)
}

#[async_trait]
impl Predictor for OnnxPredictor {
    async fn predict(&self, rows: &Array2<f32>) -> Result<Vec<f32>> {
        if rows.ncols() != self.width {
            return Err(PredictorError::Model(format!(
                "model expects {} columns, got {}",
                self.width,
                rows.ncols()
            )));
        }

        let expected = rows.nrows();
        let batches = padded_batches(rows, self.batch_size, self.width);
        let model = self.model.clone();
        let (batch_size, width) = (self.batch_size, self.width);

        let inference = tokio::task::spawn_blocking(move || run_batches(&model, batches, batch_size, width));
        let scores = with_timeout(self.timeout, inference)
            .await
            .map_err(|_| PredictorError::Timeout(self.timeout))?
            .map_err(|e| PredictorError::Model(format!("inference task failed: {}", e)))??;

        check_output_len(scores, expected)
    }
}
