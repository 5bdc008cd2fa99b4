use crate::search::SearchIndexError;
use catalog_store::StoreError;
use thiserror::Error;

/// Failures that leave an index-sync message unacknowledged.
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    #[error("search index error: {0}")]
    Search(#[from] SearchIndexError),

    #[error("failed to serialize document: {0}")]
    Serialize(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, SyncError>;
