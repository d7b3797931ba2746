//! Core data types used throughout the KPI layer

use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Date format used on the wire and in cache keys
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// Inclusive date window for queries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DateWindow {
    /// First day (inclusive)
    pub start: NaiveDate,
    /// Last day (inclusive)
    pub end: NaiveDate,
}

impl DateWindow {
    /// Create a new date window
    pub fn new(start: NaiveDate, end: NaiveDate) -> Self {
        Self { start, end }
    }

    /// Window of `days` days whose last day is `end`, or `None` when the
    /// start would fall before the earliest representable date
    pub fn ending_on(end: NaiveDate, days: i64) -> Option<Self> {
        let days = days.max(1);
        let start = end.checked_sub_signed(Duration::try_days(days - 1)?)?;
        Some(Self { start, end })
    }

    /// Check if a date falls within this window
    pub fn contains(&self, date: NaiveDate) -> bool {
        date >= self.start && date <= self.end
    }

    /// Number of days covered, `end - start + 1`.
    ///
    /// Zero or negative for an inverted window; callers divide through
    /// `kpi::safe_div` so this never produces NaN.
    pub fn period_days(&self) -> i64 {
        (self.end - self.start).num_days() + 1
    }

    /// The window of equal length ending the day before `start`.
    ///
    /// `None` when that window runs off the calendar.
    pub fn preceding(&self) -> Option<Self> {
        let end = self.start.pred_opt()?;
        let start = end.checked_sub_signed(Duration::try_days(self.period_days() - 1)?)?;
        Some(Self { start, end })
    }

    /// Iterate every day of the window in order
    pub fn days(&self) -> impl Iterator<Item = NaiveDate> {
        let start = self.start;
        (0..self.period_days().max(0))
            .map_while(move |offset| start.checked_add_signed(Duration::try_days(offset)?))
    }
}

impl fmt::Display for DateWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}..{}",
            self.start.format(DATE_FORMAT),
            self.end.format(DATE_FORMAT)
        )
    }
}

/// Identifies a (product, location) pair
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EntityPair {
    /// SKU / product identifier
    pub product_id: String,
    /// Store or warehouse identifier
    pub location_id: String,
}

impl EntityPair {
    /// Create a new pair
    pub fn new(product_id: impl Into<String>, location_id: impl Into<String>) -> Self {
        Self {
            product_id: product_id.into(),
            location_id: location_id.into(),
        }
    }
}

impl fmt::Display for EntityPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.product_id, self.location_id)
    }
}

/// One warehouse fact: a (product, location, date) row.
///
/// Facts are append-only; the KPI layer only aggregates them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityPairDaily {
    pub product_id: String,
    pub location_id: String,
    pub date: NaiveDate,
    /// Sales channel the fact belongs to
    #[serde(default)]
    pub platform: String,
    #[serde(default)]
    pub brand: String,
    #[serde(default)]
    pub category: String,
    /// End-of-day inventory snapshot
    pub inventory: f64,
    /// Units sold on `date`
    pub qty_sold: f64,
}

impl EntityPairDaily {
    /// The (product, location) pair of this fact
    pub fn pair(&self) -> EntityPair {
        EntityPair::new(self.product_id.clone(), self.location_id.clone())
    }
}

/// Per-pair KPIs over a window
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PeriodAggregate {
    pub product_id: String,
    pub location_id: String,
    /// Inventory snapshot at the latest date in the window
    pub latest_inventory: f64,
    pub units_sold: f64,
    /// Daily run rate
    pub drr: f64,
    /// Days on hand
    pub doh: f64,
    /// Suggested replenishment units
    pub po_qty: f64,
    /// Unrounded boxes for `po_qty`
    pub boxes: f64,
}

/// Window totals across all matched pairs
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WindowTotals {
    pub total_drr: f64,
    pub total_inventory: f64,
    pub total_po_qty: f64,
    /// `round(total_po_qty / units_per_box)`
    pub total_boxes: f64,
    /// `total_inventory / total_drr`, guarded
    pub aggregate_doh: f64,
    /// Number of pairs that contributed
    pub pair_count: usize,
}

/// KPIs derived for a single day of the current window
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DailyKpi {
    pub date: NaiveDate,
    pub drr: f64,
    pub doh: f64,
    pub boxes: f64,
}
