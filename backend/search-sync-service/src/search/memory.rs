use super::{Result, SearchIndex};
use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use tokio::sync::RwLock;

/// In-process index with Elasticsearch's idempotence rules.
#[derive(Debug, Default)]
pub struct InMemorySearchIndex {
    indices: RwLock<HashMap<String, HashMap<String, Value>>>,
    writes: AtomicU32,
}

impl InMemorySearchIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn document(&self, index: &str, id: &str) -> Option<Value> {
        self.indices
            .read()
            .await
            .get(index)
            .and_then(|docs| docs.get(id).cloned())
    }

    pub async fn document_count(&self, index: &str) -> usize {
        self.indices
            .read()
            .await
            .get(index)
            .map(HashMap::len)
            .unwrap_or(0)
    }

    /// Number of upsert calls received, including repeated ones.
    pub fn write_count(&self) -> u32 {
        self.writes.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SearchIndex for InMemorySearchIndex {
    async fn index_exists(&self, index: &str) -> Result<bool> {
        Ok(self.indices.read().await.contains_key(index))
    }

    async fn create_index(&self, index: &str, _mapping: &Value) -> Result<()> {
        self.indices
            .write()
            .await
            .entry(index.to_string())
            .or_default();
        Ok(())
    }

    async fn upsert_document(&self, index: &str, id: &str, body: &Value) -> Result<()> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        self.indices
            .write()
            .await
            .entry(index.to_string())
            .or_default()
            .insert(id.to_string(), body.clone());
        Ok(())
    }
}
