//! Violation detection consumer
//!
//! Two queue stages and a sweep:
//!
//! - detection classifies an entity photo and forwards likely violations
//! - registration records the violation, then deactivates the entity
//! - the reconciliation sweep deactivates entities whose violation was
//!   recorded but whose deactivation never landed

pub mod classifier;
pub mod config;
pub mod detection;
pub mod error;
pub mod http;
mod metrics;
pub mod models;
pub mod reconcile;
pub mod registration;
pub mod store;

#[cfg(test)]
mod test_support;

pub use classifier::{Classifier, ClassifierError, HttpClassifier};
pub use detection::DetectionHandler;
pub use error::ViolationError;
pub use models::{violation_id, ViolationMessage, ViolationRecord};
pub use reconcile::ReconciliationSweep;
pub use registration::RegistrationHandler;
pub use store::{InMemoryViolationStore, PgViolationStore, ViolationStore};
