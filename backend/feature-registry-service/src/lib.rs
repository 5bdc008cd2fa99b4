//! Feature extraction consumer
//!
//! Turns queued entity ids into feature vectors: computed once, stored in
//! PostgreSQL as the immutable source of truth, then copied into the cache
//! the reorder service reads.

pub mod config;
pub mod error;
pub mod extractor;
pub mod handler;
pub mod http;
pub mod store;
pub mod vectorizer;

pub use error::FeatureError;
pub use extractor::FeatureExtractor;
pub use handler::FeatureRegistrationHandler;
pub use store::{FeatureRowStore, InMemoryFeatureRowStore, PgFeatureRowStore, StoredFeature};
