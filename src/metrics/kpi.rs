//! KPI formulas
//!
//! Every division goes through [`safe_div`], so no output field ever holds
//! NaN or infinity: a zero denominator, a non-positive period, or a
//! non-finite intermediate all resolve to `0`.

use std::collections::BTreeMap;

use chrono::NaiveDate;

use crate::types::{DailyKpi, DateWindow, PeriodAggregate, WindowTotals};
use crate::warehouse::{PairDailyRow, PairTotalsRow};

/// Divide, normalizing zero denominators and non-finite results to `0`
pub fn safe_div(numerator: f64, denominator: f64) -> f64 {
    if denominator == 0.0 {
        return 0.0;
    }
    let result = numerator / denominator;
    if result.is_finite() {
        result
    } else {
        0.0
    }
}

/// Daily run rate: units sold per day of the period
pub fn drr(units_sold: f64, period_days: i64) -> f64 {
    if period_days <= 0 {
        return 0.0;
    }
    safe_div(units_sold, period_days as f64)
}

/// Days on hand; `0` whenever nothing sells
pub fn doh(inventory: f64, drr: f64) -> f64 {
    if drr > 0.0 {
        safe_div(inventory, drr)
    } else {
        0.0
    }
}

/// Units needed to lift cover from `doh` to `threshold_doh`, floored at 0
pub fn po_qty(threshold_doh: f64, doh: f64, drr: f64) -> f64 {
    let qty = (threshold_doh - doh) * drr;
    if qty.is_finite() {
        qty.max(0.0)
    } else {
        0.0
    }
}

/// Unrounded boxes for a quantity
pub fn boxes(po_qty: f64, units_per_box: f64) -> f64 {
    safe_div(po_qty, units_per_box)
}

/// Percent change of `current` against `previous`.
///
/// `0` when both are zero, `100` when only `previous` is zero.
pub fn percent_change(current: f64, previous: f64) -> f64 {
    if current == 0.0 && previous == 0.0 {
        return 0.0;
    }
    if previous == 0.0 {
        return 100.0;
    }
    let change = (current - previous) / previous * 100.0;
    if change.is_finite() {
        change
    } else {
        0.0
    }
}

/// Absolute change of `current` against `previous`
pub fn point_change(current: f64, previous: f64) -> f64 {
    let change = current - previous;
    if change.is_finite() {
        change
    } else {
        0.0
    }
}

/// Derive per-pair KPIs from a warehouse totals row
pub fn period_aggregate(
    row: &PairTotalsRow,
    period_days: i64,
    threshold_doh: f64,
    units_per_box: f64,
) -> PeriodAggregate {
    let drr = drr(row.units_sold, period_days);
    let doh = doh(row.latest_inventory, drr);
    let po_qty = po_qty(threshold_doh, doh, drr);

    PeriodAggregate {
        product_id: row.product_id.clone(),
        location_id: row.location_id.clone(),
        latest_inventory: row.latest_inventory,
        units_sold: row.units_sold,
        drr,
        doh,
        po_qty,
        boxes: boxes(po_qty, units_per_box),
    }
}

/// Sum per-pair KPIs into window totals.
///
/// Aggregate DOH is `total_inventory / total_drr`, not a mean of per-pair
/// DOH, and boxes are rounded once from the summed PO quantity.
pub fn window_totals(aggregates: &[PeriodAggregate], units_per_box: f64) -> WindowTotals {
    let mut totals = WindowTotals::default();
    for agg in aggregates {
        totals.total_drr += agg.drr;
        totals.total_inventory += agg.latest_inventory;
        totals.total_po_qty += agg.po_qty;
    }
    totals.pair_count = aggregates.len();
    totals.aggregate_doh = doh(totals.total_inventory, totals.total_drr);
    totals.total_boxes = boxes(totals.total_po_qty, units_per_box).round();
    totals
}

/// Per-day KPIs across all pairs for every day of `window`.
///
/// Each (pair, day) is treated as a one-day period; days are independent of
/// each other. Days with no rows yield zeros so the series stays dense.
pub fn daily_kpis(
    rows: &[PairDailyRow],
    window: DateWindow,
    threshold_doh: f64,
    units_per_box: f64,
) -> Vec<DailyKpi> {
    // date -> (drr, inventory, po_qty)
    let mut by_day: BTreeMap<NaiveDate, (f64, f64, f64)> =
        window.days().map(|d| (d, (0.0, 0.0, 0.0))).collect();

    for row in rows {
        let Some(day) = by_day.get_mut(&row.date) else {
            continue;
        };
        let pair_drr = drr(row.units_sold, 1);
        let pair_doh = doh(row.inventory, pair_drr);
        day.0 += pair_drr;
        day.1 += row.inventory;
        day.2 += po_qty(threshold_doh, pair_doh, pair_drr);
    }

    by_day
        .into_iter()
        .map(|(date, (total_drr, inventory, po))| DailyKpi {
            date,
            drr: total_drr,
            doh: doh(inventory, total_drr),
            boxes: boxes(po, units_per_box).round(),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn totals_row(product: &str, inventory: f64, sold: f64) -> PairTotalsRow {
        PairTotalsRow {
            product_id: product.to_string(),
            location_id: "L1".to_string(),
            latest_inventory: inventory,
            units_sold: sold,
        }
    }

    #[test]
    fn test_drr() {
        assert_eq!(drr(140.0, 7), 20.0);
        assert_eq!(drr(140.0, 0), 0.0);
        assert_eq!(drr(140.0, -3), 0.0);
    }

    #[test]
    fn test_zero_drr_means_zero_doh() {
        assert_eq!(doh(500.0, 0.0), 0.0);
        assert_eq!(doh(0.0, 0.0), 0.0);
        assert_eq!(doh(100.0, 20.0), 5.0);
    }

    #[test]
    fn test_po_qty_and_boxes() {
        let qty = po_qty(8.0, 5.0, 10.0);
        assert_eq!(qty, 30.0);
        assert_eq!(boxes(qty, 24.0), 1.25);
        // Overstocked pairs never go negative
        assert_eq!(po_qty(8.0, 12.0, 10.0), 0.0);
        assert_eq!(boxes(30.0, 0.0), 0.0);
    }

    #[test]
    fn test_percent_change() {
        assert_eq!(percent_change(0.0, 0.0), 0.0);
        assert_eq!(percent_change(5.0, 0.0), 100.0);
        assert_eq!(percent_change(8.0, 10.0), -20.0);
        assert_eq!(percent_change(15.0, 10.0), 50.0);
        assert_eq!(point_change(8.0, 10.0), -2.0);
    }

    #[test]
    fn test_safe_div_never_returns_nan() {
        assert_eq!(safe_div(0.0, 0.0), 0.0);
        assert_eq!(safe_div(1.0, 0.0), 0.0);
        assert_eq!(safe_div(f64::INFINITY, 1.0), 0.0);
        assert_eq!(safe_div(f64::NAN, 2.0), 0.0);
    }

    #[test]
    fn test_period_aggregate_with_no_sales() {
        let agg = period_aggregate(&totals_row("A", 400.0, 0.0), 7, 30.0, 24.0);
        assert_eq!(agg.drr, 0.0);
        assert_eq!(agg.doh, 0.0);
        assert_eq!(agg.po_qty, 0.0);
        assert_eq!(agg.boxes, 0.0);
    }

    #[test]
    fn test_period_aggregate_pair_boxes_are_unrounded() {
        // 70 units over 7 days -> drr 10; 50 on hand -> doh 5
        let agg = period_aggregate(&totals_row("A", 50.0, 70.0), 7, 8.0, 24.0);
        assert_eq!(agg.drr, 10.0);
        assert_eq!(agg.doh, 5.0);
        assert_eq!(agg.po_qty, 30.0);
        assert_eq!(agg.boxes, 1.25);
    }

    #[test]
    fn test_aggregate_doh_is_ratio_of_totals() {
        let aggs = vec![
            period_aggregate(&totals_row("A", 100.0, 70.0), 7, 30.0, 24.0), // drr 10, doh 10
            period_aggregate(&totals_row("B", 300.0, 7.0), 7, 30.0, 24.0),  // drr 1, doh 300
        ];
        let totals = window_totals(&aggs, 24.0);

        assert_eq!(totals.total_inventory, 400.0);
        assert_eq!(totals.total_drr, 11.0);
        // 400 / 11, not (10 + 300) / 2
        assert!((totals.aggregate_doh - 400.0 / 11.0).abs() < 1e-9);
        assert_eq!(totals.pair_count, 2);
    }

    #[test]
    fn test_boxes_rounded_once_after_summing() {
        // Three pairs each needing 30 units -> 1.25 boxes each.
        // Summed first: round(90 / 24) = round(3.75) = 4.
        // Rounded per pair would give 1 + 1 + 1 = 3.
        let aggs: Vec<_> = ["A", "B", "C"]
            .iter()
            .map(|p| period_aggregate(&totals_row(p, 50.0, 70.0), 7, 8.0, 24.0))
            .collect();
        let totals = window_totals(&aggs, 24.0);
        assert_eq!(totals.total_po_qty, 90.0);
        assert_eq!(totals.total_boxes, 4.0);
    }

    #[test]
    fn test_empty_totals_are_zero() {
        let totals = window_totals(&[], 24.0);
        assert_eq!(totals, WindowTotals::default());
    }

    #[test]
    fn test_daily_kpis_are_per_day() {
        let window = DateWindow::new(
            NaiveDate::from_ymd_opt(2026, 1, 1).unwrap(),
            NaiveDate::from_ymd_opt(2026, 1, 3).unwrap(),
        );
        let row = |day: u32, inventory: f64, sold: f64| PairDailyRow {
            product_id: "A".to_string(),
            location_id: "L1".to_string(),
            date: NaiveDate::from_ymd_opt(2026, 1, day).unwrap(),
            inventory,
            units_sold: sold,
        };
        let rows = vec![row(1, 50.0, 10.0), row(3, 90.0, 0.0)];

        let days = daily_kpis(&rows, window, 8.0, 24.0);
        assert_eq!(days.len(), 3);

        // Day 1: drr 10, doh 5, po 30 -> round(1.25) = 1 box
        assert_eq!(days[0].drr, 10.0);
        assert_eq!(days[0].doh, 5.0);
        assert_eq!(days[0].boxes, 1.0);
        // Day 2 has no rows
        assert_eq!(days[1].drr, 0.0);
        assert_eq!(days[1].doh, 0.0);
        // Day 3: stock but no sales
        assert_eq!(days[2].doh, 0.0);
        assert_eq!(days[2].boxes, 0.0);
    }
}
