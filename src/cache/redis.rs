//! Redis-backed cache store
//!
//! Values are plain strings written with `SET key value EX ttl`. The
//! `ConnectionManager` reconnects on its own; after a connection-level
//! failure the store reports itself not ready for a short cooldown so
//! request handling skips the cache instead of waiting on a dead socket.

use async_trait::async_trait;
use parking_lot::Mutex;
use redis::aio::ConnectionManager;
use redis::{AsyncCommands, Client, RedisError};
use std::time::Duration;
use tokio::time::Instant;
use tracing::{info, warn};

use super::store::CacheStore;
use crate::error::CacheError;

/// How long the store stays "not ready" after a connection failure
const DEFAULT_COOLDOWN: Duration = Duration::from_secs(5);

/// Cache store backed by a Redis server
pub struct RedisCacheStore {
    conn: ConnectionManager,
    failed_at: Mutex<Option<Instant>>,
    cooldown: Duration,
}

impl RedisCacheStore {
    /// Connect to `url` (e.g. `redis://127.0.0.1:6379`)
    pub async fn connect(url: &str) -> Result<Self, CacheError> {
        let client = Client::open(url).map_err(|e| CacheError::Connection(e.to_string()))?;
        let conn = ConnectionManager::new(client)
            .await
            .map_err(|e| CacheError::Connection(e.to_string()))?;
        info!(url = %url, "Connected to Redis cache");
        Ok(Self {
            conn,
            failed_at: Mutex::new(None),
            cooldown: DEFAULT_COOLDOWN,
        })
    }

    /// Override the post-failure cooldown
    pub fn with_cooldown(mut self, cooldown: Duration) -> Self {
        self.cooldown = cooldown;
        self
    }

    fn record(&self, err: RedisError) -> CacheError {
        if err.is_io_error() || err.is_connection_dropped() || err.is_connection_refusal() {
            warn!(error = %err, "Redis connection failure, pausing cache use");
            *self.failed_at.lock() = Some(Instant::now());
            CacheError::Connection(err.to_string())
        } else {
            CacheError::Command(err.to_string())
        }
    }
}

#[async_trait]
impl CacheStore for RedisCacheStore {
    fn is_ready(&self) -> bool {
        let mut failed_at = self.failed_at.lock();
        match *failed_at {
            Some(at) if at.elapsed() < self.cooldown => false,
            Some(_) => {
                *failed_at = None;
                true
            }
            None => true,
        }
    }

    async fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        let mut conn = self.conn.clone();
        conn.get::<_, Option<String>>(key)
            .await
            .map_err(|e| self.record(e))
    }

    async fn set_ex(&self, key: &str, ttl_secs: u64, value: String) -> Result<(), CacheError> {
        let mut conn = self.conn.clone();
        conn.set_ex::<_, _, ()>(key, value, ttl_secs.max(1))
            .await
            .map_err(|e| self.record(e))
    }

    async fn keys(&self, pattern: &str) -> Result<Vec<String>, CacheError> {
        let mut conn = self.conn.clone();
        conn.keys::<_, Vec<String>>(pattern)
            .await
            .map_err(|e| self.record(e))
    }

    async fn del(&self, keys: &[String]) -> Result<usize, CacheError> {
        if keys.is_empty() {
            return Ok(0);
        }
        let mut conn = self.conn.clone();
        conn.del::<_, usize>(keys).await.map_err(|e| self.record(e))
    }

    fn backend_name(&self) -> &'static str {
        "redis"
    }
}
