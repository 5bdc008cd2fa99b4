//! Reorder service
//!
//! Re-ranks search candidates with a learn-to-rank model over cached entity
//! features and live like counts. Degraded answers keep the input order.

pub mod cache;
pub mod config;
pub mod handlers;
mod metrics;
pub mod models;
pub mod predictor;
pub mod preprocess;
pub mod service;

pub use models::{ReorderRequest, ReorderResponse};
pub use service::{RankingModel, ReorderService};
