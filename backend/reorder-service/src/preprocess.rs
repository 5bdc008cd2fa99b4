//! Ranking input preprocessing
//!
//! Row layout: `[scaled likes | query phrase multi-hot | query category
//! one-hot | query subcategory one-hot | entity feature vectors]`.

use crate::models::ReorderRequest;
use feature_cache::FeatureVector;
use ndarray::Array2;
use serde::Deserialize;
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PreprocessError {
    #[error("failed to read preprocessor artifact: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid preprocessor artifact: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("like scaler has zero scale")]
    ZeroScale,
    #[error("row {row} has {got} columns, expected {expected}")]
    RaggedRows {
        row: usize,
        expected: usize,
        got: usize,
    },
    #[error("{likes} like counts for {features} feature rows")]
    LengthMismatch { likes: usize, features: usize },
    #[error("matrix shape error: {0}")]
    Shape(#[from] ndarray::ShapeError),
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct LikeScaler {
    pub mean: f64,
    pub scale: f64,
}

/// Fitted encoders exported by the training pipeline as JSON.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Preprocessor {
    pub like_scaler: LikeScaler,
    pub phrase_vocabulary: Vec<String>,
    pub category_ids: Vec<i32>,
    pub subcategory_ids: Vec<i32>,
}

impl Preprocessor {
    pub fn from_json(raw: &str) -> Result<Self, PreprocessError> {
        let preprocessor: Preprocessor = serde_json::from_str(raw)?;
        if preprocessor.like_scaler.scale == 0.0 {
            return Err(PreprocessError::ZeroScale);
        }
        Ok(preprocessor)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, PreprocessError> {
        Self::from_json(&std::fs::read_to_string(path)?)
    }

    pub fn scale_likes(&self, likes: i64) -> f32 {
        ((likes as f64 - self.like_scaler.mean) / self.like_scaler.scale) as f32
    }

    /// Request-level columns shared by every row.
    pub fn query_features(&self, request: &ReorderRequest) -> Vec<f32> {
        let mut columns = Vec::with_capacity(
            self.phrase_vocabulary.len() + self.category_ids.len() + self.subcategory_ids.len(),
        );

        columns.extend(self.phrase_vocabulary.iter().map(|word| {
            if request.query_phrases.iter().any(|p| p == word) {
                1.0
            } else {
                0.0
            }
        }));
        columns.extend(one_hot(&self.category_ids, request.query_category_id));
        columns.extend(one_hot(&self.subcategory_ids, request.query_subcategory_id));
        columns
    }

    /// Build the model input, one row per feature vector.
    pub fn build_matrix(
        &self,
        request: &ReorderRequest,
        likes: &[i64],
        features: &[&FeatureVector],
    ) -> Result<Array2<f32>, PreprocessError> {
        if likes.len() != features.len() {
            return Err(PreprocessError::LengthMismatch {
                likes: likes.len(),
                features: features.len(),
            });
        }

        let query = self.query_features(request);
        let mut width = None;
        let mut data = Vec::new();

        for (row, (&like, vector)) in likes.iter().zip(features).enumerate() {
            let start = data.len();
            data.push(self.scale_likes(like));
            data.extend_from_slice(&query);
            vector.extend_row(&mut data);

            let got = data.len() - start;
            let expected = *width.get_or_insert(got);
            if got != expected {
                return Err(PreprocessError::RaggedRows { row, expected, got });
            }
        }

        Ok(Array2::from_shape_vec(
            (features.len(), width.unwrap_or(0)),
            data,
        )?)
    }
}

fn one_hot(ids: &[i32], value: Option<i32>) -> impl Iterator<Item = f32> + '_ {
    ids.iter()
        .map(move |id| if Some(*id) == value { 1.0 } else { 0.0 })
}
