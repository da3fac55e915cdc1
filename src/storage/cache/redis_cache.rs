//! Redis-backed cache shared between registry instances

use super::{Cache, Result};
use crate::errors::CacheError;
use async_trait::async_trait;
use deadpool_redis::{Config, Connection, Pool};
use redis::AsyncCommands;
use std::time::Duration;

/// Cache that stores entries in Redis with a per-key expiry
pub struct RedisCache {
    pool: Pool,
    ttl_seconds: u64,
}

impl RedisCache {
    /// Build a connection pool for `url`. No connection is made until first use.
    pub fn new(url: &str, ttl: Duration) -> Result<Self> {
        let pool = Config::from_url(url)
            .create_pool(Some(deadpool::Runtime::Tokio1))
            .map_err(|e| CacheError::BackendUnavailable(e.to_string()))?;
        Ok(Self {
            pool,
            ttl_seconds: ttl.as_secs().max(1),
        })
    }

    async fn connection(&self) -> Result<Connection> {
        self.pool
            .get()
            .await
            .map_err(|e| CacheError::BackendUnavailable(e.to_string()))
    }
}

#[async_trait]
impl Cache for RedisCache {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        let mut conn = self.connection().await?;
        conn.get::<_, Option<String>>(key)
            .await
            .map_err(|e| CacheError::OperationFailed(e.to_string()))
    }

    async fn set(&self, key: &str, value: &str) -> Result<()> {
        let mut conn = self.connection().await?;
        conn.set_ex::<_, _, ()>(key, value, self.ttl_seconds)
            .await
            .map_err(|e| CacheError::OperationFailed(e.to_string()))
    }

    async fn delete(&self, key: &str) -> Result<()> {
        let mut conn = self.connection().await?;
        conn.del::<_, ()>(key)
            .await
            .map_err(|e| CacheError::OperationFailed(e.to_string()))
    }
}
