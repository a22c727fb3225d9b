use std::time::Duration;

use async_trait::async_trait;
use deadpool_redis::{Config, Pool, Runtime};
use redis::AsyncCommands;
use tracing::{debug, info, instrument};

use petal_core::error::BrokerError;
use petal_core::store::EventPublisher;

use crate::config::BrokerConfig;

/// Redis Streams implementation of [`EventPublisher`].
#[derive(Clone)]
pub struct RedisPublisher {
    pool: Pool,
    stream: String,
    timeout: Duration,
}

impl std::fmt::Debug for RedisPublisher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisPublisher")
            .field("stream", &self.stream)
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

impl RedisPublisher {
    /// Build the connection pool and bootstrap the stream and its consumer
    /// group. A group that already exists is fine.
    pub async fn connect(config: &BrokerConfig) -> Result<Self, BrokerError> {
        let pool = Config::from_url(&config.uri)
            .builder()
            .map(|b| b.max_size(config.pool_size).runtime(Runtime::Tokio1).build())
            .map_err(|e| BrokerError::Backend(e.to_string()))?
            .map_err(|e| BrokerError::Backend(e.to_string()))?;

        let publisher = Self {
            pool,
            stream: config.stream.clone(),
            timeout: Duration::from_millis(config.publish_timeout_ms),
        };

        let mut conn = publisher.conn().await?;
        let created: Result<String, redis::RedisError> = conn
            .xgroup_create_mkstream(&config.stream, &config.group, "$")
            .await;
        match created {
            Ok(_) => {}
            Err(e) if is_busy_group(&e) => {}
            Err(e) => return Err(BrokerError::Backend(e.to_string())),
        }

        info!(stream = %config.stream, group = %config.group, "connected to broker");
        Ok(publisher)
    }

    async fn conn(&self) -> Result<deadpool_redis::Connection, BrokerError> {
        self.pool
            .get()
            .await
            .map_err(|e| BrokerError::Backend(e.to_string()))
    }
}

#[async_trait]
impl EventPublisher for RedisPublisher {
    #[instrument(skip(self), fields(stream = %self.stream))]
    async fn publish(&self, hash: &str) -> Result<(), BrokerError> {
        let mut conn = self.conn().await?;
        let xadd = async {
            let id: String = conn
                .xadd(&self.stream, "*", &[("body", hash)])
                .await
                .map_err(|e| BrokerError::Backend(e.to_string()))?;
            debug!(id = %id, "announcement appended");
            Ok::<(), BrokerError>(())
        };

        match tokio::time::timeout(self.timeout, xadd).await {
            Ok(result) => result,
            Err(_) => Err(BrokerError::Timeout),
        }
    }
}

/// `XGROUP CREATE` on an existing group reports `BUSYGROUP`; that is the
/// bootstrap's idempotent success case.
fn is_busy_group(err: &redis::RedisError) -> bool {
    err.code() == Some("BUSYGROUP")
}
