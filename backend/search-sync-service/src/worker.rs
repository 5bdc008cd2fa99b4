use crate::consumer::IndexSyncHandler;
use crate::readiness::{await_index_ready, SyncStatus};
use crate::search::SearchIndex;
use resilience::{PollError, PollPolicy};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::info;
use work_queue::QueueConsumer;

/// Drives the consumer through `AwaitingIndexReady -> Consuming`.
pub struct IndexSyncWorker {
    pub index: Arc<dyn SearchIndex>,
    pub index_name: String,
    pub mapping: Value,
    pub policy: PollPolicy,
    pub warn_after: Duration,
    pub consumer: QueueConsumer<IndexSyncHandler>,
    pub status: Arc<SyncStatus>,
}

impl IndexSyncWorker {
    /// Returns once shutdown is signalled, or with an error when a bounded
    /// readiness policy gives up.
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) -> Result<(), PollError> {
        let ready = await_index_ready(
            self.index.as_ref(),
            &self.index_name,
            &self.mapping,
            &self.policy,
            self.warn_after,
        );

        tokio::select! {
            result = ready => {
                result?;
            }
            _ = shutdown.changed() => {
                info!(index = %self.index_name, "Shutdown requested before index became ready");
                return Ok(());
            }
        }

        self.status.mark_consuming();
        info!(index = %self.index_name, "Search index ready, consuming");
        self.consumer.run(shutdown).await;
        Ok(())
    }
}
