//! Cache-aside layer
//!
//! This module holds everything between a request's filters and the cache
//! store:
//!
//! - **Key derivation**: section + canonical filters → key (`key.rs`)
//! - **TTL tiers**: named lifetimes chosen per section (`ttl.rs`)
//! - **Stores**: the `CacheStore` trait, an in-process store, and a Redis
//!   store behind the `redis` feature (`store.rs`, `redis.rs`)
//! - **Orchestrator**: get-or-compute with detached write-back
//!   (`orchestrator.rs`)
//! - **Stats**: hit/miss/write counters (`stats.rs`)
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────┐   key    ┌─────────────────────┐  get / set_ex  ┌────────────┐
//! │ KeyBuilder   │────────▶│ ComputeOrchestrator │──────────────▶│ CacheStore │
//! └──────────────┘          └──────────┬──────────┘                └────────────┘
//!                                      │ miss
//!                                      ▼
//!                              compute closure
//! ```
//!
//! # Example
//!
//! ```rust,ignore
//! use retail_kpi::cache::{CacheKeyBuilder, ComputeOrchestrator, InMemoryCacheStore, TtlTier};
//!
//! let orchestrator = ComputeOrchestrator::new(Arc::new(InMemoryCacheStore::new()));
//! let key = CacheKeyBuilder::default().build_key("overview", &filters);
//! let value = orchestrator
//!     .get_or_compute(&key, || engine.compute_overview(&filters), TtlTier::Metrics.secs())
//!     .await?;
//! ```

mod key;
pub use key::{CacheKeyBuilder, DEFAULT_NAMESPACE};

mod ttl;
pub use ttl::TtlTier;

mod store;
pub use store::{glob_match, CacheStore, InMemoryCacheStore};

#[cfg(feature = "redis")]
mod redis;
#[cfg(feature = "redis")]
pub use self::redis::RedisCacheStore;

mod stats;
pub use stats::{CacheStats, CacheStatsSnapshot};

mod orchestrator;
pub use orchestrator::ComputeOrchestrator;
