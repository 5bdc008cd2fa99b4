//! Index readiness protocol
//!
//! The consumer starts in [`SyncState::AwaitingIndexReady`] and only moves to
//! [`SyncState::Consuming`] once the target index exists.

use crate::search::{SearchIndex, SearchIndexError};
use resilience::{poll_until_ready, PollError, PollPolicy};
use serde_json::Value;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tracing::info;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncState {
    AwaitingIndexReady,
    Consuming,
}

impl SyncState {
    pub fn as_str(&self) -> &'static str {
        match self {
            SyncState::AwaitingIndexReady => "awaiting_index_ready",
            SyncState::Consuming => "consuming",
        }
    }
}

/// Shared view of the consumer state, read by the readiness endpoint.
#[derive(Debug, Default)]
pub struct SyncStatus {
    consuming: AtomicBool,
}

impl SyncStatus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> SyncState {
        if self.consuming.load(Ordering::Acquire) {
            SyncState::Consuming
        } else {
            SyncState::AwaitingIndexReady
        }
    }

    pub(crate) fn mark_consuming(&self) {
        self.consuming.store(true, Ordering::Release);
    }
}

/// One readiness probe: the index is ready if it exists or was just created.
pub async fn ensure_index(
    index: &dyn SearchIndex,
    name: &str,
    mapping: &Value,
) -> Result<bool, SearchIndexError> {
    if index.index_exists(name).await? {
        return Ok(true);
    }

    info!(index = name, "Search index missing, creating it");
    index.create_index(name, mapping).await?;
    index.index_exists(name).await
}

/// Probe under `policy` until the index is ready.
pub async fn await_index_ready(
    index: &dyn SearchIndex,
    name: &str,
    mapping: &Value,
    policy: &PollPolicy,
    warn_after: Duration,
) -> Result<u32, PollError> {
    let component = format!("search_index:{}", name);
    poll_until_ready(&component, policy, warn_after, || {
        ensure_index(index, name, mapping)
    })
    .await
}
