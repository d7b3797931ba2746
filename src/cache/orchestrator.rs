//! Cache-aside orchestration
//!
//! `get_or_compute` is the single entry point the KPI sections use:
//!
//! 1. If the store is not ready, skip straight to computing.
//! 2. Look the key up; read errors are logged and count as a miss.
//! 3. A hit that deserializes is returned without computing.
//! 4. Otherwise run the compute closure. Its error is the only one that
//!    reaches the caller, and nothing is cached for it.
//! 5. Spawn a detached write of the serialized value; the caller never
//!    waits on it and its failure is only logged.
//!
//! There is no per-key coalescing. Concurrent misses on one key all run
//! their compute closure and all write back (last writer wins); the values
//! are identical because the inputs are, the cost is duplicated warehouse
//! load.

use serde::de::DeserializeOwned;
use serde::Serialize;
use std::future::Future;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, warn};

use super::stats::CacheStats;
use super::store::CacheStore;
use crate::error::{Error, Result};

/// Cache-aside helper over an injected [`CacheStore`]
pub struct ComputeOrchestrator {
    store: Arc<dyn CacheStore>,
    stats: Arc<CacheStats>,
    pending_writes: TaskTracker,
}

impl ComputeOrchestrator {
    /// Create an orchestrator over `store`
    pub fn new(store: Arc<dyn CacheStore>) -> Self {
        Self {
            store,
            stats: Arc::new(CacheStats::new()),
            pending_writes: TaskTracker::new(),
        }
    }

    /// The underlying store
    pub fn store(&self) -> &Arc<dyn CacheStore> {
        &self.store
    }

    /// Hit/miss/write counters
    pub fn stats(&self) -> &Arc<CacheStats> {
        &self.stats
    }

    /// Return the cached value for `key`, or compute, return and cache it
    /// for `ttl_secs` seconds.
    pub async fn get_or_compute<T, F, Fut>(&self, key: &str, compute: F, ttl_secs: u64) -> Result<T>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let cache_ready = self.store.is_ready();

        if cache_ready {
            if let Some(value) = self.lookup(key).await {
                return Ok(value);
            }
        } else {
            self.stats.record_bypass();
            debug!(key = %key, backend = self.store.backend_name(), "Cache not ready, computing directly");
        }

        let result = compute().await;
        self.stats.record_compute(result.is_ok());
        let value = result?;

        if cache_ready {
            self.spawn_write(key, ttl_secs, &value);
        }

        Ok(value)
    }

    /// Like [`get_or_compute`](Self::get_or_compute), but abandons the
    /// lookup and computation as soon as `cancel` fires.
    ///
    /// Dropping the in-flight future drops any warehouse call inside it.
    /// A cancelled computation caches nothing.
    pub async fn get_or_compute_cancellable<T, F, Fut>(
        &self,
        key: &str,
        compute: F,
        ttl_secs: u64,
        cancel: &CancellationToken,
    ) -> Result<T>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                debug!(key = %key, "Computation cancelled by caller");
                Err(Error::Cancelled)
            }
            result = self.get_or_compute(key, compute, ttl_secs) => result,
        }
    }

    /// Wait until every background cache write spawned so far has finished
    pub async fn flush(&self) {
        self.pending_writes.close();
        self.pending_writes.wait().await;
        self.pending_writes.reopen();
    }

    async fn lookup<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let cached = match self.store.get(key).await {
            Ok(cached) => cached,
            Err(e) => {
                self.stats.record_read_error();
                warn!(key = %key, error = %e, "Cache read failed, treating as miss");
                return None;
            }
        };

        let Some(json) = cached else {
            self.stats.record_miss();
            debug!(key = %key, "Cache miss");
            return None;
        };

        match serde_json::from_str(&json) {
            Ok(value) => {
                self.stats.record_hit();
                debug!(key = %key, "Cache hit");
                Some(value)
            }
            Err(e) => {
                self.stats.record_decode_error();
                warn!(key = %key, error = %e, "Failed to deserialize cached entry, recomputing");
                None
            }
        }
    }

    fn spawn_write<T: Serialize>(&self, key: &str, ttl_secs: u64, value: &T) {
        let json = match serde_json::to_string(value) {
            Ok(json) => json,
            Err(e) => {
                warn!(key = %key, error = %e, "Failed to serialize value for cache");
                return;
            }
        };

        let store = Arc::clone(&self.store);
        let stats = Arc::clone(&self.stats);
        let key = key.to_string();

        self.pending_writes.spawn(async move {
            match store.set_ex(&key, ttl_secs, json).await {
                Ok(()) => {
                    stats.record_write(true);
                    debug!(key = %key, ttl_secs, "Cached computed value");
                }
                Err(e) => {
                    stats.record_write(false);
                    warn!(key = %key, error = %e, "Background cache write failed");
                }
            }
        });
    }
}
