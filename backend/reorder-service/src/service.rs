//! Reorder usecase
//!
//! Combines live like counts with cached entity features and a ranking
//! model. Every failure degrades to the input order; `reorder` never errors.

use crate::cache::{prediction_key, PredictionCache, PREDICTION_TTL};
use crate::metrics::record_request;
use crate::models::{ReorderRequest, ReorderResponse};
use crate::predictor::Predictor;
use crate::preprocess::Preprocessor;
use catalog_store::CatalogStore;
use resilience::with_timeout;
use feature_cache::{FeatureCache, FeatureVector};
use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Loaded model components. Ranking is only attempted when both are present.
#[derive(Clone)]
pub struct RankingModel {
    pub name: String,
    pub preprocessor: Arc<Preprocessor>,
    pub predictor: Arc<dyn Predictor>,
}

pub struct ReorderService {
    catalog: Arc<dyn CatalogStore>,
    features: Arc<dyn FeatureCache>,
    model: Option<RankingModel>,
    prediction_cache: Option<Arc<dyn PredictionCache>>,
    store_timeout: Duration,
    predict_timeout: Duration,
}

impl ReorderService {
    pub fn new(
        catalog: Arc<dyn CatalogStore>,
        features: Arc<dyn FeatureCache>,
        model: Option<RankingModel>,
    ) -> Self {
        Self {
            catalog,
            features,
            model,
            prediction_cache: None,
            store_timeout: Duration::from_secs(2),
            predict_timeout: Duration::from_secs(1),
        }
    }

    pub fn with_prediction_cache(mut self, cache: Arc<dyn PredictionCache>) -> Self {
        self.prediction_cache = Some(cache);
        self
    }

    pub fn with_store_timeout(mut self, timeout: Duration) -> Self {
        self.store_timeout = timeout;
        self
    }

    /// Upper bound on a single `predict` call, whatever the backend.
    pub fn with_predict_timeout(mut self, timeout: Duration) -> Self {
        self.predict_timeout = timeout;
        self
    }

    pub fn model_name(&self) -> Option<&str> {
        self.model.as_ref().map(|m| m.name.as_str())
    }

    pub async fn reorder(&self, request: &ReorderRequest) -> ReorderResponse {
        let started = Instant::now();
        let (response, outcome) = self.rank(request).await;
        record_request(outcome, started.elapsed().as_secs_f64());

        debug!(
            candidates = request.candidate_ids.len(),
            outcome,
            model = response.model_name.as_deref().unwrap_or("none"),
            "Reorder completed"
        );
        response
    }

    async fn rank(&self, request: &ReorderRequest) -> (ReorderResponse, &'static str) {
        let candidates = &request.candidate_ids;
        let fallback = |reason: &'static str| (ReorderResponse::fallback(candidates), reason);

        if candidates.is_empty() {
            return fallback("empty");
        }
        let Some(model) = &self.model else {
            return fallback("no_model");
        };

        let cache_key = prediction_key(&model.name, request);
        if let Some(cache) = &self.prediction_cache {
            if let Some(cached) = cache.get(&cache_key).await {
                if is_permutation(&cached, candidates) {
                    return (
                        ReorderResponse {
                            ordered_ids: cached,
                            model_name: Some(model.name.clone()),
                        },
                        "cache_hit",
                    );
                }
                warn!(key = %cache_key, "Ignoring cached prediction that does not match the candidates");
            }
        }

        let likes = match tokio::time::timeout(self.store_timeout, self.catalog.like_counts(candidates)).await {
            Ok(Ok(likes)) => likes,
            Ok(Err(e)) => {
                warn!(error = %e, "Like count query failed, falling back");
                return fallback("store_error");
            }
            Err(_) => {
                warn!("Like count query timed out, falling back");
                return fallback("store_error");
            }
        };

        let features = match self.features.get_features(candidates).await {
            Ok(features) => features,
            Err(e) => {
                warn!(error = %e, "Feature cache lookup failed, falling back");
                return fallback("cache_error");
            }
        };
        if features.is_empty() {
            info!(candidates = candidates.len(), "No cached features, falling back");
            return fallback("no_features");
        }

        let (scored, missing) = split_by_features(candidates, &features);
        let like_column: Vec<i64> = scored
            .iter()
            .map(|(id, _)| likes.get(*id).copied().unwrap_or(0))
            .collect();
        let vectors: Vec<&FeatureVector> = scored.iter().map(|(_, f)| *f).collect();

        let matrix = match model.preprocessor.build_matrix(request, &like_column, &vectors) {
            Ok(matrix) => matrix,
            Err(e) => {
                warn!(error = %e, "Preprocessing failed, falling back");
                return fallback("preprocess_error");
            }
        };

        let prediction = with_timeout(self.predict_timeout, model.predictor.predict(&matrix));
        let scores = match prediction.await {
            Ok(Ok(scores)) => scores,
            Ok(Err(e)) => {
                warn!(error = %e, model = %model.name, "Prediction failed, falling back");
                return fallback("predictor_error");
            }
            Err(e) => {
                warn!(error = %e, model = %model.name, "Prediction timed out, falling back");
                return fallback("predictor_error");
            }
        };

        if scores.len() != scored.len() {
            warn!(expected = scored.len(), got = scores.len(), "Score count mismatch, falling back");
            return fallback("predictor_error");
        }

        let scored_ids: Vec<&String> = scored.iter().map(|(id, _)| *id).collect();
        let mut ordered_ids = order_by_score(&scored_ids, &scores);
        ordered_ids.extend(missing.into_iter().cloned());

        if let Some(cache) = &self.prediction_cache {
            cache.set(&cache_key, &ordered_ids, PREDICTION_TTL).await;
        }

        (
            ReorderResponse {
                ordered_ids,
                model_name: Some(model.name.clone()),
            },
            "ranked",
        )
    }
}

type Scored<'a> = Vec<(&'a String, &'a FeatureVector)>;

/// Partition candidates, in input order, into those with and without features.
fn split_by_features<'a>(
    candidates: &'a [String],
    features: &'a HashMap<String, FeatureVector>,
) -> (Scored<'a>, Vec<&'a String>) {
    let mut scored = Vec::new();
    let mut missing = Vec::new();
    for id in candidates {
        match features.get(id) {
            Some(vector) => scored.push((id, vector)),
            None => missing.push(id),
        }
    }
    (scored, missing)
}

/// Stable descending sort. NaN ranks with negative infinity, after every
/// real score; equal scores keep input order.
pub(crate) fn order_by_score(ids: &[&String], scores: &[f32]) -> Vec<String> {
    let key = |i: usize| {
        let score = scores[i];
        if score.is_nan() {
            f32::NEG_INFINITY
        } else {
            score
        }
    };

    let mut positions: Vec<usize> = (0..ids.len()).collect();
    positions.sort_by(|&a, &b| key(b).partial_cmp(&key(a)).unwrap_or(Ordering::Equal));
    positions.into_iter().map(|i| ids[i].clone()).collect()
}

/// Same multiset of ids.
pub(crate) fn is_permutation(ordered: &[String], candidates: &[String]) -> bool {
    if ordered.len() != candidates.len() {
        return false;
    }
    let mut counts: HashMap<&str, i64> = HashMap::new();
    for id in candidates {
        *counts.entry(id.as_str()).or_default() += 1;
    }
    for id in ordered {
        *counts.entry(id.as_str()).or_default() -= 1;
    }
    counts.values().all(|c| *c == 0)
}
