//! Warehouse access
//!
//! The warehouse is an external collaborator: it receives an already-built
//! query description and returns row objects. Query-dialect generation and
//! connection pooling live behind the [`WarehouseClient`] trait; the KPI
//! layer only decodes the rows it gets back.

use async_trait::async_trait;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::error::WarehouseError;
use crate::filters::FilterSet;
use crate::types::DateWindow;

mod memory;
pub use memory::InMemoryWarehouse;

/// Which aggregation a query asks for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueryKind {
    /// One row per (product, location) over the window: [`PairTotalsRow`]
    PairTotals,
    /// One row per (product, location, date) in the window: [`PairDailyRow`]
    PairDaily,
}

/// An opaque, already-built warehouse query
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryDescriptor {
    pub kind: QueryKind,
    pub window: DateWindow,
    pub filters: FilterSet,
}

impl QueryDescriptor {
    /// Per-pair totals over `window`
    pub fn pair_totals(window: DateWindow, filters: &FilterSet) -> Self {
        Self {
            kind: QueryKind::PairTotals,
            window,
            filters: filters.clone(),
        }
    }

    /// Per-pair, per-day rows over `window`
    pub fn pair_daily(window: DateWindow, filters: &FilterSet) -> Self {
        Self {
            kind: QueryKind::PairDaily,
            window,
            filters: filters.clone(),
        }
    }
}

/// Row shape returned for [`QueryKind::PairTotals`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PairTotalsRow {
    pub product_id: String,
    pub location_id: String,
    /// Inventory at the maximum date present in the window
    pub latest_inventory: f64,
    /// Sum of units sold over the window
    pub units_sold: f64,
}

/// Row shape returned for [`QueryKind::PairDaily`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PairDailyRow {
    pub product_id: String,
    pub location_id: String,
    pub date: NaiveDate,
    pub inventory: f64,
    pub units_sold: f64,
}

/// Executes read queries against the fact warehouse.
///
/// Implementations own their timeout; a timeout is reported as
/// [`WarehouseError::Timeout`]. Callers do not retry.
#[async_trait]
pub trait WarehouseClient: Send + Sync {
    /// Run a query and return its rows as JSON objects
    async fn query(&self, query: &QueryDescriptor) -> Result<Vec<serde_json::Value>, WarehouseError>;

    /// Client name for logging
    fn name(&self) -> &'static str;
}
