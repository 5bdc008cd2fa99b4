//! Search index client
//!
//! Both write operations are idempotent: creating an index that already
//! exists and re-indexing an unchanged document succeed.

mod elasticsearch;
mod mapping;
mod memory;

pub use self::elasticsearch::{ElasticsearchIndex, SearchIndexError};
pub use mapping::entity_index_mapping;
pub use memory::InMemorySearchIndex;

use async_trait::async_trait;
use serde_json::Value;

pub type Result<T> = std::result::Result<T, SearchIndexError>;

#[async_trait]
pub trait SearchIndex: Send + Sync {
    async fn index_exists(&self, index: &str) -> Result<bool>;

    /// Create the index; an index created concurrently by someone else counts as success.
    async fn create_index(&self, index: &str, mapping: &Value) -> Result<()>;

    /// Create or fully replace the document stored under `id`.
    async fn upsert_document(&self, index: &str, id: &str, body: &Value) -> Result<()>;
}
