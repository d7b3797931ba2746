//! Retail KPI cache-aside layer
//!
//! Computes inventory KPIs (days on hand, daily run rate, boxes to reorder)
//! for a retail dashboard from warehouse aggregates, and caches each result
//! under a key derived from the request's filters.
//!
//! # Architecture
//!
//! - **Filters** (`filters`): raw request filters normalized into a canonical
//!   [`FilterSet`]
//! - **Cache** (`cache`): key derivation, TTL tiers, stores and the
//!   get-or-compute orchestrator
//! - **Warehouse** (`warehouse`): the query client trait and an in-process
//!   implementation
//! - **Metrics** (`metrics`): KPI formulas, window resolution, sparklines and
//!   the overview engine
//! - **Service** (`service`): wires the above behind a builder
//!
//! # Example
//!
//! ```rust,ignore
//! use retail_kpi::{FilterSet, InMemoryWarehouse, KpiService};
//! use tokio_util::sync::CancellationToken;
//!
//! let service = KpiService::builder()
//!     .with_warehouse(InMemoryWarehouse::from_json_lines("facts.jsonl").await?)
//!     .build()?;
//!
//! let filters = FilterSet::from_raw(&raw_filters);
//! let overview = service.overview(&filters, &CancellationToken::new()).await?;
//! ```

pub mod cache;
pub mod config;
pub mod error;
pub mod filters;
pub mod metrics;
pub mod observability;
pub mod service;
pub mod types;
pub mod warehouse;

pub use cache::{CacheKeyBuilder, CacheStore, ComputeOrchestrator, InMemoryCacheStore, TtlTier};
pub use config::{CacheConfig, EngineConfig, WarehouseConfig};
pub use error::{CacheError, ComputeError, Error, Result, WarehouseError};
pub use filters::{FilterSet, FilterValue, RawFilter};
pub use metrics::{MetricsEngine, OverviewMetrics};
pub use service::{KpiService, KpiServiceBuilder};
pub use warehouse::{InMemoryWarehouse, QueryDescriptor, WarehouseClient};
