//! Overview computation

use chrono::{NaiveDate, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::debug;

use super::kpi::{self, daily_kpis, period_aggregate, window_totals};
use super::trend::{sparkline, Trend};
use super::window::{resolve_windows, ResolvedWindows};
use crate::config::EngineConfig;
use crate::error::{ComputeError, Result};
use crate::filters::{dims, FilterSet};
use crate::types::{DailyKpi, PeriodAggregate, WindowTotals};
use crate::warehouse::{PairDailyRow, PairTotalsRow, QueryDescriptor, WarehouseClient};

/// One KPI card: current value, comparison value, deltas and sparkline
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricCard {
    pub value: f64,
    pub previous_value: f64,
    /// Percent change against the comparison window
    pub change: f64,
    /// Absolute change against the comparison window
    pub point_change: f64,
    pub sparkline: Vec<f64>,
    pub labels: Vec<String>,
}

impl MetricCard {
    fn new(value: f64, previous_value: f64, trend: Trend) -> Self {
        Self {
            value,
            previous_value,
            change: kpi::percent_change(value, previous_value),
            point_change: kpi::point_change(value, previous_value),
            sparkline: trend.values,
            labels: trend.labels,
        }
    }
}

/// The three headline cards
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OverviewCards {
    pub doh: MetricCard,
    pub drr: MetricCard,
    pub total_boxes_required: MetricCard,
}

/// Current-window summary figures
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OverviewSummary {
    pub total_inventory: f64,
    pub total_po_qty: f64,
    pub period_days: i64,
    pub threshold_doh: f64,
    pub pair_count: usize,
}

/// Resolved windows echoed back to the caller
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub compare_start: NaiveDate,
    pub compare_end: NaiveDate,
}

impl From<ResolvedWindows> for DateRange {
    fn from(windows: ResolvedWindows) -> Self {
        Self {
            start: windows.current.start,
            end: windows.current.end,
            compare_start: windows.comparison.start,
            compare_end: windows.comparison.end,
        }
    }
}

/// Inventory overview for a filter set
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OverviewMetrics {
    pub metrics: OverviewCards,
    pub summary: OverviewSummary,
    pub date_range: DateRange,
}

/// Computes KPIs from warehouse aggregates
pub struct MetricsEngine {
    warehouse: Arc<dyn WarehouseClient>,
    config: EngineConfig,
}

impl MetricsEngine {
    /// Create an engine over a warehouse client
    pub fn new(warehouse: Arc<dyn WarehouseClient>, config: EngineConfig) -> Self {
        Self { warehouse, config }
    }

    /// Engine configuration
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Compute the overview, defaulting the window to end today (UTC)
    pub async fn compute_overview(&self, filters: &FilterSet) -> Result<OverviewMetrics> {
        self.compute_overview_at(filters, Utc::now().date_naive()).await
    }

    /// Compute the overview with an explicit "today".
    ///
    /// Both window aggregations (and the daily series, when enabled) run
    /// concurrently; if any of them fails the whole computation fails.
    pub async fn compute_overview_at(
        &self,
        filters: &FilterSet,
        today: NaiveDate,
    ) -> Result<OverviewMetrics> {
        let windows = resolve_windows(
            filters,
            today,
            self.config.default_window_days,
            self.config.max_window_days,
        )?;
        let threshold_doh = filters
            .number(dims::THRESHOLD_DOH)
            .unwrap_or(self.config.default_threshold_doh);
        let units_per_box = self.config.units_per_box;

        let current_query = QueryDescriptor::pair_totals(windows.current, filters);
        let comparison_query = QueryDescriptor::pair_totals(windows.comparison, filters);
        let daily_query = QueryDescriptor::pair_daily(windows.current, filters);

        let (current_rows, comparison_rows, daily_rows) = tokio::try_join!(
            self.fetch::<PairTotalsRow>(&current_query),
            self.fetch::<PairTotalsRow>(&comparison_query),
            async {
                if self.config.include_sparklines {
                    self.fetch::<PairDailyRow>(&daily_query).await
                } else {
                    Ok(Vec::new())
                }
            },
        )?;

        let current = self.totals(&current_rows, windows.current.period_days(), threshold_doh);
        let previous = self.totals(
            &comparison_rows,
            windows.comparison.period_days(),
            threshold_doh,
        );

        debug!(
            current = %windows.current,
            comparison = %windows.comparison,
            current_pairs = current.pair_count,
            comparison_pairs = previous.pair_count,
            "Computed overview totals"
        );

        let days = if self.config.include_sparklines {
            daily_kpis(&daily_rows, windows.current, threshold_doh, units_per_box)
        } else {
            Vec::new()
        };

        Ok(OverviewMetrics {
            metrics: OverviewCards {
                doh: MetricCard::new(
                    current.aggregate_doh,
                    previous.aggregate_doh,
                    self.trend(&days, |d| d.doh),
                ),
                drr: MetricCard::new(
                    current.total_drr,
                    previous.total_drr,
                    self.trend(&days, |d| d.drr),
                ),
                total_boxes_required: MetricCard::new(
                    current.total_boxes,
                    previous.total_boxes,
                    self.trend(&days, |d| d.boxes),
                ),
            },
            summary: OverviewSummary {
                total_inventory: current.total_inventory,
                total_po_qty: current.total_po_qty,
                period_days: windows.period_days(),
                threshold_doh,
                pair_count: current.pair_count,
            },
            date_range: windows.into(),
        })
    }

    /// Per-pair KPIs for one window, without comparison
    pub async fn pair_aggregates(
        &self,
        filters: &FilterSet,
        today: NaiveDate,
    ) -> Result<Vec<PeriodAggregate>> {
        let windows = resolve_windows(
            filters,
            today,
            self.config.default_window_days,
            self.config.max_window_days,
        )?;
        let threshold_doh = filters
            .number(dims::THRESHOLD_DOH)
            .unwrap_or(self.config.default_threshold_doh);
        let rows = self
            .fetch::<PairTotalsRow>(&QueryDescriptor::pair_totals(windows.current, filters))
            .await?;

        let period_days = windows.period_days();
        Ok(rows
            .iter()
            .map(|row| period_aggregate(row, period_days, threshold_doh, self.config.units_per_box))
            .collect())
    }

    fn totals(&self, rows: &[PairTotalsRow], period_days: i64, threshold_doh: f64) -> WindowTotals {
        let aggregates: Vec<PeriodAggregate> = rows
            .iter()
            .map(|row| period_aggregate(row, period_days, threshold_doh, self.config.units_per_box))
            .collect();
        window_totals(&aggregates, self.config.units_per_box)
    }

    fn trend(&self, days: &[DailyKpi], field: impl Fn(&DailyKpi) -> f64) -> Trend {
        let series: Vec<(NaiveDate, f64)> = days.iter().map(|d| (d.date, field(d))).collect();
        sparkline(
            &series,
            self.config.sparkline_daily_max_days,
            self.config.sparkline_bucket_days,
        )
    }

    async fn fetch<R: DeserializeOwned>(&self, query: &QueryDescriptor) -> Result<Vec<R>> {
        let rows = self
            .warehouse
            .query(query)
            .await
            .map_err(ComputeError::Warehouse)?;

        rows.into_iter()
            .map(|row| {
                serde_json::from_value(row).map_err(|e| {
                    ComputeError::RowDecode(format!(
                        "{} returned an unexpected {:?} row: {}",
                        self.warehouse.name(),
                        query.kind,
                        e
                    ))
                    .into()
                })
            })
            .collect()
    }
}
