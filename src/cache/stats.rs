//! Cache-aside counters

use std::sync::atomic::{AtomicU64, Ordering};

/// Lock-free counters updated by the orchestrator
#[derive(Debug, Default)]
pub struct CacheStats {
    hits: AtomicU64,
    misses: AtomicU64,
    bypasses: AtomicU64,
    read_errors: AtomicU64,
    decode_errors: AtomicU64,
    computes: AtomicU64,
    compute_errors: AtomicU64,
    writes: AtomicU64,
    write_errors: AtomicU64,
}

/// Point-in-time copy of [`CacheStats`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStatsSnapshot {
    /// Served from cache
    pub hits: u64,
    /// Looked up, not found
    pub misses: u64,
    /// Cache skipped because the store was not ready
    pub bypasses: u64,
    /// Cache reads that failed
    pub read_errors: u64,
    /// Cached values that failed to deserialize
    pub decode_errors: u64,
    /// Compute closures invoked
    pub computes: u64,
    /// Compute closures that failed
    pub compute_errors: u64,
    /// Background writes that succeeded
    pub writes: u64,
    /// Background writes that failed
    pub write_errors: u64,
}

impl CacheStatsSnapshot {
    /// Hits over all lookups, 0.0 when nothing was looked up
    pub fn hit_rate(&self) -> f64 {
        let lookups = self.hits + self.misses + self.bypasses;
        if lookups == 0 {
            0.0
        } else {
            self.hits as f64 / lookups as f64
        }
    }
}

impl CacheStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn record_hit(&self) {
        self.hits.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_miss(&self) {
        self.misses.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_bypass(&self) {
        self.bypasses.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_read_error(&self) {
        self.read_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_decode_error(&self) {
        self.decode_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_compute(&self, ok: bool) {
        self.computes.fetch_add(1, Ordering::Relaxed);
        if !ok {
            self.compute_errors.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub(crate) fn record_write(&self, ok: bool) {
        if ok {
            self.writes.fetch_add(1, Ordering::Relaxed);
        } else {
            self.write_errors.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Take a snapshot of all counters
    pub fn snapshot(&self) -> CacheStatsSnapshot {
        CacheStatsSnapshot {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            bypasses: self.bypasses.load(Ordering::Relaxed),
            read_errors: self.read_errors.load(Ordering::Relaxed),
            decode_errors: self.decode_errors.load(Ordering::Relaxed),
            computes: self.computes.load(Ordering::Relaxed),
            compute_errors: self.compute_errors.load(Ordering::Relaxed),
            writes: self.writes.load(Ordering::Relaxed),
            write_errors: self.write_errors.load(Ordering::Relaxed),
        }
    }
}
