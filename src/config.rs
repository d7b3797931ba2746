//! Configuration for the KPI service
//!
//! All sections deserialize from TOML with per-field defaults, so a config
//! file only needs the values it changes.

use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

use crate::cache::{TtlTier, DEFAULT_NAMESPACE};

/// KPI computation settings
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct EngineConfig {
    /// Length of the current window when no start date is given
    #[serde(default = "default_window_days")]
    pub default_window_days: i64,

    /// Longest current or comparison window a request may ask for
    #[serde(default = "default_max_window_days")]
    pub max_window_days: i64,

    /// Days-of-cover target used for PO quantities
    #[serde(default = "default_threshold_doh")]
    pub default_threshold_doh: f64,

    /// Units per shipping box
    #[serde(default = "default_units_per_box")]
    pub units_per_box: f64,

    /// Fetch the daily series and build sparklines
    #[serde(default = "default_true")]
    pub include_sparklines: bool,

    /// Longest window still shown day by day in sparklines
    #[serde(default = "default_sparkline_daily_max_days")]
    pub sparkline_daily_max_days: usize,

    /// Bucket size for longer sparklines
    #[serde(default = "default_sparkline_bucket_days")]
    pub sparkline_bucket_days: usize,
}

fn default_window_days() -> i64 {
    7
}

fn default_max_window_days() -> i64 {
    731
}

fn default_threshold_doh() -> f64 {
    30.0
}

fn default_units_per_box() -> f64 {
    24.0
}

fn default_true() -> bool {
    true
}

fn default_sparkline_daily_max_days() -> usize {
    14
}

fn default_sparkline_bucket_days() -> usize {
    7
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            default_window_days: default_window_days(),
            max_window_days: default_max_window_days(),
            default_threshold_doh: default_threshold_doh(),
            units_per_box: default_units_per_box(),
            include_sparklines: true,
            sparkline_daily_max_days: default_sparkline_daily_max_days(),
            sparkline_bucket_days: default_sparkline_bucket_days(),
        }
    }
}

/// Cache settings
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct CacheConfig {
    /// Key namespace prefix
    #[serde(default = "default_namespace")]
    pub namespace: String,

    /// Redis connection URL; the in-process store is used when absent
    #[serde(default)]
    pub redis_url: Option<String>,

    /// Use the cache at all
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// TTL tier for overview results
    #[serde(default = "default_overview_ttl")]
    pub overview_ttl: TtlTier,
}

fn default_namespace() -> String {
    DEFAULT_NAMESPACE.to_string()
}

fn default_overview_ttl() -> TtlTier {
    TtlTier::Metrics
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            namespace: default_namespace(),
            redis_url: None,
            enabled: true,
            overview_ttl: default_overview_ttl(),
        }
    }
}

/// Warehouse settings
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct WarehouseConfig {
    /// Per-query timeout in milliseconds
    #[serde(default = "default_query_timeout_ms")]
    pub query_timeout_ms: u64,

    /// JSON-lines fact file for the in-process warehouse
    #[serde(default)]
    pub facts_path: Option<PathBuf>,
}

fn default_query_timeout_ms() -> u64 {
    30_000
}

impl WarehouseConfig {
    /// Query timeout as a `Duration`
    pub fn query_timeout(&self) -> Duration {
        Duration::from_millis(self.query_timeout_ms)
    }
}

impl Default for WarehouseConfig {
    fn default() -> Self {
        Self {
            query_timeout_ms: default_query_timeout_ms(),
            facts_path: None,
        }
    }
}
