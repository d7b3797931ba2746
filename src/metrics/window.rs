//! Current / comparison window resolution

use chrono::{Duration, NaiveDate};

use crate::error::{Error, Result};
use crate::filters::{dims, FilterSet};
use crate::types::DateWindow;

/// The pair of windows an overview compares
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolvedWindows {
    pub current: DateWindow,
    pub comparison: DateWindow,
}

impl ResolvedWindows {
    /// Length of the current window in days
    pub fn period_days(&self) -> i64 {
        self.current.period_days()
    }
}

/// Resolve the current and comparison windows from request filters.
///
/// Current window: `startDate..endDate`; a missing end is `today`, a missing
/// start is `default_days` back from the end.
///
/// Comparison window: `compareStartDate..compareEndDate` when both are
/// given. With only one of them, the other is placed so the window has the
/// current window's length. With neither, it is the equally long window
/// ending the day before the current start.
///
/// Fails with [`Error::InvalidWindow`] when either window is longer than
/// `max_days` or would run off the calendar.
pub fn resolve_windows(
    filters: &FilterSet,
    today: NaiveDate,
    default_days: i64,
    max_days: i64,
) -> Result<ResolvedWindows> {
    let end = filters.date(dims::END_DATE).unwrap_or(today);
    let current = match filters.date(dims::START_DATE) {
        Some(start) => DateWindow::new(start, end),
        None => DateWindow::ending_on(end, default_days)
            .ok_or_else(|| out_of_range("current", end))?,
    };
    check_length("current", &current, max_days)?;

    let span = Duration::days(current.period_days() - 1);
    let comparison = match (
        filters.date(dims::COMPARE_START_DATE),
        filters.date(dims::COMPARE_END_DATE),
    ) {
        (Some(start), Some(end)) => Some(DateWindow::new(start, end)),
        (Some(start), None) => start
            .checked_add_signed(span)
            .map(|end| DateWindow::new(start, end)),
        (None, Some(end)) => end
            .checked_sub_signed(span)
            .map(|start| DateWindow::new(start, end)),
        (None, None) => current.preceding(),
    }
    .ok_or_else(|| out_of_range("comparison", current.start))?;
    check_length("comparison", &comparison, max_days)?;

    Ok(ResolvedWindows {
        current,
        comparison,
    })
}

fn check_length(name: &str, window: &DateWindow, max_days: i64) -> Result<()> {
    if window.period_days() > max_days {
        return Err(Error::InvalidWindow(format!(
            "{name} window {window} spans {} days, limit is {max_days}",
            window.period_days()
        )));
    }
    Ok(())
}

fn out_of_range(name: &str, anchor: NaiveDate) -> Error {
    Error::InvalidWindow(format!("{name} window around {anchor} is out of range"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filters::FilterValue;
    use crate::types::DATE_FORMAT;

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn single(s: &str) -> FilterValue {
        FilterValue::Single(s.to_string())
    }

    fn resolve(filters: &FilterSet, default_days: i64) -> Result<ResolvedWindows> {
        resolve_windows(filters, date("2026-10-19"), default_days, 731)
    }

    #[test]
    fn test_explicit_window_with_default_comparison() {
        let filters = FilterSet::new()
            .with(dims::PLATFORM, FilterValue::All)
            .with(dims::START_DATE, single("2026-01-01"))
            .with(dims::END_DATE, single("2026-01-07"));

        let windows = resolve(&filters, 7).unwrap();
        assert_eq!(windows.period_days(), 7);
        assert_eq!(windows.comparison.start, date("2025-12-25"));
        assert_eq!(windows.comparison.end, date("2025-12-31"));
    }

    #[test]
    fn test_default_window_ends_today() {
        let windows = resolve(&FilterSet::new(), 7).unwrap();
        assert_eq!(windows.current, DateWindow::new(date("2026-10-13"), date("2026-10-19")));
        assert_eq!(windows.comparison, DateWindow::new(date("2026-10-06"), date("2026-10-12")));
    }

    #[test]
    fn test_explicit_comparison_is_kept() {
        let filters = FilterSet::new()
            .with(dims::START_DATE, single("2026-02-01"))
            .with(dims::END_DATE, single("2026-02-28"))
            .with(dims::COMPARE_START_DATE, single("2025-02-01"))
            .with(dims::COMPARE_END_DATE, single("2025-02-28"));

        let windows = resolve(&filters, 7).unwrap();
        assert_eq!(windows.period_days(), 28);
        assert_eq!(windows.comparison, DateWindow::new(date("2025-02-01"), date("2025-02-28")));
    }

    #[test]
    fn test_half_specified_comparison_keeps_length() {
        let filters = FilterSet::new()
            .with(dims::START_DATE, single("2026-01-01"))
            .with(dims::END_DATE, single("2026-01-07"))
            .with(dims::COMPARE_START_DATE, single("2025-01-01"));

        let windows = resolve(&filters, 7).unwrap();
        assert_eq!(windows.comparison, DateWindow::new(date("2025-01-01"), date("2025-01-07")));
    }

    #[test]
    fn test_only_end_date_uses_default_length() {
        let filters = FilterSet::new().with(dims::END_DATE, single("2026-03-31"));
        let windows = resolve(&filters, 14).unwrap();
        assert_eq!(windows.current, DateWindow::new(date("2026-03-18"), date("2026-03-31")));
    }

    #[test]
    fn test_extended_year_is_rejected() {
        let filters = FilterSet::new().with(dims::START_DATE, single("-200000-01-01"));
        assert_eq!(filters.date(dims::START_DATE), date_opt(-200_000));

        let err = resolve(&filters, 7).unwrap_err();
        assert!(matches!(err, Error::InvalidWindow(_)));
    }

    #[test]
    fn test_windows_at_calendar_edge_are_rejected() {
        let earliest = NaiveDate::MIN.format(DATE_FORMAT).to_string();

        let only_end = FilterSet::new().with(dims::END_DATE, single(&earliest));
        assert!(matches!(resolve(&only_end, 7), Err(Error::InvalidWindow(_))));

        let first_day = FilterSet::new()
            .with(dims::START_DATE, single(&earliest))
            .with(dims::END_DATE, single(&earliest));
        assert!(matches!(resolve(&first_day, 7), Err(Error::InvalidWindow(_))));

        let latest = NaiveDate::MAX.format(DATE_FORMAT).to_string();
        let compare_from_end = FilterSet::new()
            .with(dims::START_DATE, single("2026-01-01"))
            .with(dims::END_DATE, single("2026-01-07"))
            .with(dims::COMPARE_START_DATE, single(&latest));
        assert!(matches!(
            resolve(&compare_from_end, 7),
            Err(Error::InvalidWindow(_))
        ));
    }

    #[test]
    fn test_window_length_is_capped() {
        let year = FilterSet::new()
            .with(dims::START_DATE, single("2025-01-01"))
            .with(dims::END_DATE, single("2025-12-31"));
        assert_eq!(
            resolve_windows(&year, date("2026-10-19"), 7, 365)
                .unwrap()
                .period_days(),
            365
        );
        assert!(matches!(
            resolve_windows(&year, date("2026-10-19"), 7, 364),
            Err(Error::InvalidWindow(_))
        ));

        let long_comparison = FilterSet::new()
            .with(dims::START_DATE, single("2026-01-01"))
            .with(dims::END_DATE, single("2026-01-07"))
            .with(dims::COMPARE_START_DATE, single("2000-01-01"))
            .with(dims::COMPARE_END_DATE, single("2025-12-31"));
        assert!(matches!(
            resolve(&long_comparison, 7),
            Err(Error::InvalidWindow(_))
        ));
    }

    fn date_opt(year: i32) -> Option<NaiveDate> {
        NaiveDate::from_ymd_opt(year, 1, 1)
    }
}
