//! Index synchronization consumer
//!
//! Drains the entity index queue and keeps the search index consistent with
//! the catalog. Consumption only starts once the index exists.

pub mod config;
pub mod consumer;
pub mod document;
pub mod error;
pub mod http;
pub mod readiness;
pub mod search;
pub mod worker;

pub use consumer::IndexSyncHandler;
pub use document::SearchDocument;
pub use error::SyncError;
pub use readiness::{SyncState, SyncStatus};
pub use worker::IndexSyncWorker;
