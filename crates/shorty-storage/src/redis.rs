use async_trait::async_trait;
use deadpool_redis::redis::{AsyncCommands, RedisError};
use deadpool_redis::{Config, Connection, Pool, PoolError, Runtime};
use shorty_core::backend::KeyValueBackend;
use shorty_core::error::{Result, StorageError};
use tracing::{debug, trace, warn};

/// A Redis-based implementation of [`KeyValueBackend`].
///
/// Connections are checked out of a `deadpool-redis` pool per call, so a
/// single backend can be shared by the allocator and every request task.
#[derive(Clone)]
pub struct RedisBackend {
    pool: Pool,
}

impl std::fmt::Debug for RedisBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let status = self.pool.status();
        f.debug_struct("RedisBackend")
            .field("size", &status.size)
            .field("available", &status.available)
            .finish()
    }
}

fn map_redis_error(operation: &str, err: RedisError) -> StorageError {
    let message = format!("{operation}: {err}");
    if err.is_timeout() {
        StorageError::Timeout(message)
    } else if err.is_io_error() || err.is_connection_refusal() || err.is_connection_dropped() {
        StorageError::Unavailable(message)
    } else {
        StorageError::Operation(message)
    }
}

fn map_pool_error(err: PoolError) -> StorageError {
    match err {
        PoolError::Closed => StorageError::Closed,
        PoolError::Timeout(kind) => {
            StorageError::Timeout(format!("timed out waiting for connection: {kind:?}"))
        }
        PoolError::Backend(e) => map_redis_error("failed to connect to Redis", e),
        other => StorageError::Unavailable(format!("failed to get Redis connection: {other}")),
    }
}

impl RedisBackend {
    /// Wraps an existing connection pool.
    pub fn new(pool: Pool) -> Self {
        Self { pool }
    }

    /// Creates a backend for the server at `redis_url`.
    ///
    /// The pool connects lazily, so an unreachable server is only reported
    /// by the first command.
    pub fn connect(redis_url: &str) -> Result<Self> {
        let pool = Config::from_url(redis_url)
            .create_pool(Some(Runtime::Tokio1))
            .map_err(|e| {
                StorageError::Unavailable(format!("failed to create Redis pool: {e}"))
            })?;
        debug!(url = %redis_url, "Created Redis connection pool");
        Ok(Self::new(pool))
    }

    async fn conn(&self) -> Result<Connection> {
        self.pool.get().await.map_err(|e| {
            warn!(error = %e, "Failed to get Redis connection from pool");
            map_pool_error(e)
        })
    }
}

#[async_trait]
impl KeyValueBackend for RedisBackend {
    async fn exists(&self, key: &str) -> Result<bool> {
        trace!(key, "EXISTS");
        let mut conn = self.conn().await?;
        conn.exists::<_, bool>(key)
            .await
            .map_err(|e| map_redis_error("failed to check key in Redis", e))
    }

    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        trace!(key, "GET");
        let mut conn = self.conn().await?;
        conn.get::<_, Option<Vec<u8>>>(key)
            .await
            .map_err(|e| map_redis_error("failed to read key from Redis", e))
    }

    async fn set(&self, key: &str, value: &[u8]) -> Result<()> {
        trace!(key, "SET");
        let mut conn = self.conn().await?;
        conn.set::<_, _, ()>(key, value)
            .await
            .map_err(|e| map_redis_error("failed to write key to Redis", e))
    }

    async fn hget(&self, map: &str, field: &[u8]) -> Result<Option<Vec<u8>>> {
        trace!(map, "HGET");
        let mut conn = self.conn().await?;
        conn.hget::<_, _, Option<Vec<u8>>>(map, field)
            .await
            .map_err(|e| map_redis_error("failed to read hash field from Redis", e))
    }

    async fn hset(&self, map: &str, field: &[u8], value: &[u8]) -> Result<()> {
        trace!(map, "HSET");
        let mut conn = self.conn().await?;
        conn.hset::<_, _, _, ()>(map, field, value)
            .await
            .map_err(|e| map_redis_error("failed to write hash field to Redis", e))
    }

    async fn hset_nx(&self, map: &str, field: &[u8], value: &[u8]) -> Result<bool> {
        trace!(map, "HSETNX");
        let mut conn = self.conn().await?;
        conn.hset_nx::<_, _, _, bool>(map, field, value)
            .await
            .map_err(|e| map_redis_error("failed to write hash field to Redis", e))
    }

    async fn incr(&self, key: &str) -> Result<i64> {
        trace!(key, "INCR");
        let mut conn = self.conn().await?;
        conn.incr::<_, _, i64>(key, 1)
            .await
            .map_err(|e| map_redis_error("failed to increment key in Redis", e))
    }

    async fn close(&self) {
        self.pool.close();
        debug!("Closed Redis connection pool");
    }
}
