//! KPI metrics
//!
//! Turns warehouse aggregates into the overview the dashboard shows:
//!
//! - **Formulas** (`kpi.rs`): DRR, DOH, PO quantity, boxes and deltas, all
//!   guarded against zero denominators
//! - **Windows** (`window.rs`): current and comparison window resolution
//! - **Trends** (`trend.rs`): sparkline bucketing
//! - **Engine** (`engine.rs`): issues the warehouse queries and assembles
//!   [`OverviewMetrics`]
//!
//! # Example
//!
//! ```rust,ignore
//! use retail_kpi::metrics::MetricsEngine;
//!
//! let engine = MetricsEngine::new(warehouse, EngineConfig::default());
//! let overview = engine.compute_overview(&filters).await?;
//! println!("DOH {:.1}", overview.metrics.doh.value);
//! ```

pub mod kpi;

mod window;
pub use window::{resolve_windows, ResolvedWindows};

mod trend;
pub use trend::{bucketize, sparkline, Trend, DAILY_LABEL_FORMAT};

mod engine;
pub use engine::{
    DateRange, MetricCard, MetricsEngine, OverviewCards, OverviewMetrics, OverviewSummary,
};
