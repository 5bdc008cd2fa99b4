use anyhow::{Context, Result};
use redis::aio::ConnectionManager;
use redis::{Client, IntoConnectionInfo};
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::time::Duration;
use tracing::{info, warn};

/// Shared Redis connection manager guarded by a Tokio mutex.
///
/// Callers clone the manager out of the lock before issuing commands so the
/// lock is never held across a round trip.
pub type SharedConnectionManager = Arc<Mutex<ConnectionManager>>;

const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Redis connection pool backed by a multiplexed, auto-reconnecting manager.
pub struct RedisPool {
    manager: SharedConnectionManager,
}

impl RedisPool {
    pub async fn connect(redis_url: &str) -> Result<Self> {
        Self::connect_with_timeout(redis_url, DEFAULT_CONNECT_TIMEOUT).await
    }

    pub async fn connect_with_timeout(redis_url: &str, timeout: Duration) -> Result<Self> {
        let info = redis_url
            .into_connection_info()
            .context("failed to parse REDIS_URL connection string")?;
        let client = Client::open(info).context("failed to construct Redis client")?;

        let connection_manager = tokio::time::timeout(timeout, ConnectionManager::new(client))
            .await
            .context("timed out initializing Redis connection manager")?
            .context("failed to initialize Redis connection manager")?;

        info!("Redis connection manager initialized");
        Ok(Self {
            manager: Arc::new(Mutex::new(connection_manager)),
        })
    }

    pub fn manager(&self) -> SharedConnectionManager {
        self.manager.clone()
    }
}

/// Round-trip a PING, used by readiness endpoints.
pub async fn ping(manager: &SharedConnectionManager) -> bool {
    let mut conn = manager.lock().await.clone();
    match redis::cmd("PING").query_async::<_, String>(&mut conn).await {
        Ok(reply) => reply == "PONG",
        Err(e) => {
            warn!(error = %e, "Redis ping failed");
            false
        }
    }
}
