use catalog_store::StoreError;
use feature_cache::CacheError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum FeatureError {
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    #[error("feature cache error: {0}")]
    Cache(#[from] CacheError),
}
