use crate::classifier::ClassifierError;
use catalog_store::StoreError;
use thiserror::Error;
use work_queue::QueueError;

#[derive(Debug, Error)]
pub enum ViolationError {
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    #[error("classifier error: {0}")]
    Classifier(#[from] ClassifierError),

    #[error("queue error: {0}")]
    Queue(#[from] QueueError),
}
