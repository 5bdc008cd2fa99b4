//! Feature vector cache shared by the feature registry (writer) and the
//! reorder service (reader).
//!
//! Reads are partial: ids without a cached entry are simply absent from the
//! returned map. A miss is normal and never an error.

mod cache;
mod error;
mod memory;
mod models;

pub use cache::{feature_key, FeatureCache, RedisFeatureCache, MGET_BATCH_SIZE};
pub use error::{CacheError, Result};
pub use memory::InMemoryFeatureCache;
pub use models::FeatureVector;
