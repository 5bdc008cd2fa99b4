use super::{Result, SearchIndex};
use async_trait::async_trait;
use elasticsearch::{
    http::transport::{BuildError, SingleNodeConnectionPool, TransportBuilder},
    http::StatusCode,
    indices::{IndicesCreateParts, IndicesExistsParts},
    Elasticsearch, IndexParts,
};
use serde_json::Value;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info};
use url::Url;

const ALREADY_EXISTS: &str = "resource_already_exists_exception";

#[derive(Debug, Error)]
pub enum SearchIndexError {
    #[error("invalid Elasticsearch URL: {0}")]
    InvalidUrl(#[from] url::ParseError),
    #[error("failed to build transport: {0}")]
    TransportBuild(#[from] BuildError),
    #[error("transport error: {0}")]
    Transport(#[from] elasticsearch::Error),
    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),
    #[error("{operation} on index {index} returned {status}: {body}")]
    Status {
        operation: &'static str,
        index: String,
        status: u16,
        body: String,
    },
}

#[derive(Clone)]
pub struct ElasticsearchIndex {
    client: Elasticsearch,
}

impl ElasticsearchIndex {
    pub fn new(url: &str, request_timeout: Duration) -> Result<Self> {
        let parsed = Url::parse(url)?;
        let pool = SingleNodeConnectionPool::new(parsed);
        let transport = TransportBuilder::new(pool).timeout(request_timeout).build()?;

        Ok(Self {
            client: Elasticsearch::new(transport),
        })
    }
}

/// True when an error body reports that the index is already there.
pub(crate) fn is_already_exists(body: &Value) -> bool {
    body.pointer("/error/type")
        .and_then(Value::as_str)
        .map(|t| t == ALREADY_EXISTS)
        .unwrap_or(false)
}

#[async_trait]
impl SearchIndex for ElasticsearchIndex {
    async fn index_exists(&self, index: &str) -> Result<bool> {
        let response = self
            .client
            .indices()
            .exists(IndicesExistsParts::Index(&[index]))
            .send()
            .await?;

        match response.status_code() {
            StatusCode::NOT_FOUND => Ok(false),
            status if status.is_success() => Ok(true),
            status => Err(SearchIndexError::Status {
                operation: "exists",
                index: index.to_string(),
                status: status.as_u16(),
                body: response.text().await.unwrap_or_default(),
            }),
        }
    }

    async fn create_index(&self, index: &str, mapping: &Value) -> Result<()> {
        let response = self
            .client
            .indices()
            .create(IndicesCreateParts::Index(index))
            .body(mapping.clone())
            .send()
            .await?;

        let status = response.status_code();
        if status.is_success() {
            info!(index, "Search index created");
            return Ok(());
        }

        let body: Value = response.json().await.unwrap_or(Value::Null);
        if status == StatusCode::BAD_REQUEST && is_already_exists(&body) {
            debug!(index, "Search index already created by another worker");
            return Ok(());
        }

        Err(SearchIndexError::Status {
            operation: "create",
            index: index.to_string(),
            status: status.as_u16(),
            body: body.to_string(),
        })
    }

    async fn upsert_document(&self, index: &str, id: &str, body: &Value) -> Result<()> {
        let response = self
            .client
            .index(IndexParts::IndexId(index, id))
            .body(body.clone())
            .send()
            .await?;

        let status = response.status_code();
        if !status.is_success() {
            return Err(SearchIndexError::Status {
                operation: "index",
                index: index.to_string(),
                status: status.as_u16(),
                body: response.text().await.unwrap_or_default(),
            });
        }

        debug!(index, document_id = %id, status = status.as_u16(), "Document upserted");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_already_exists_detection() {
        let body = json!({
            "error": {
                "type": "resource_already_exists_exception",
                "reason": "index [entity/abc] already exists"
            },
            "status": 400
        });
        assert!(is_already_exists(&body));
        assert!(!is_already_exists(&json!({"error": {"type": "mapper_parsing_exception"}})));
        assert!(!is_already_exists(&Value::Null));
    }

    #[test]
    fn test_invalid_url_is_rejected() {
        let result = ElasticsearchIndex::new("not a url", Duration::from_secs(1));
        assert!(matches!(result, Err(SearchIndexError::InvalidUrl(_))));
    }
}
