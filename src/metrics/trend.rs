//! Trend bucketing for sparklines
//!
//! Reduces a daily metric series into display buckets with generated
//! labels.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Label format for daily sparkline points
pub const DAILY_LABEL_FORMAT: &str = "%b %d";

/// Bucketized series ready for display
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Trend {
    pub labels: Vec<String>,
    pub values: Vec<f64>,
}

/// Split `series` into consecutive chunks of `bucket_size_days` (the last
/// may be shorter) and average each chunk. Labels are `W1`, `W2`, … in
/// series order. A bucket size of 0 is treated as 1.
pub fn bucketize(series: &[(NaiveDate, f64)], bucket_size_days: usize) -> Trend {
    let size = bucket_size_days.max(1);

    let mut trend = Trend::default();
    for (index, chunk) in series.chunks(size).enumerate() {
        trend.labels.push(format!("W{}", index + 1));
        trend.values.push(mean(chunk.iter().map(|(_, v)| *v)));
    }
    trend
}

/// Pick the sparkline shape for a series.
///
/// Series of at most `daily_max_days` points are shown day by day with
/// date labels; longer series are bucketized by `bucket_size_days`.
pub fn sparkline(
    series: &[(NaiveDate, f64)],
    daily_max_days: usize,
    bucket_size_days: usize,
) -> Trend {
    if series.len() <= daily_max_days {
        Trend {
            labels: series
                .iter()
                .map(|(date, _)| date.format(DAILY_LABEL_FORMAT).to_string())
                .collect(),
            values: series.iter().map(|(_, v)| *v).collect(),
        }
    } else {
        bucketize(series, bucket_size_days)
    }
}

/// Welford's running mean; 0.0 for an empty input
fn mean(values: impl Iterator<Item = f64>) -> f64 {
    let mut mean = 0.0f64;
    let mut count = 0u64;
    for v in values {
        count += 1;
        let delta = v - mean;
        mean += delta / count as f64;
    }
    mean
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn series(values: &[f64]) -> Vec<(NaiveDate, f64)> {
        let start = NaiveDate::from_ymd_opt(2026, 1, 1).unwrap();
        values
            .iter()
            .enumerate()
            .map(|(i, v)| (start + Duration::days(i as i64), *v))
            .collect()
    }

    #[test]
    fn test_bucketize_weeks() {
        let values: Vec<f64> = (1..=10).map(|v| v as f64).collect();
        let trend = bucketize(&series(&values), 7);

        assert_eq!(trend.labels, vec!["W1", "W2"]);
        assert_eq!(trend.values[0], 4.0); // mean of 1..=7
        assert_eq!(trend.values[1], 9.0); // mean of 8..=10
    }

    #[test]
    fn test_bucketize_empty() {
        let trend = bucketize(&[], 7);
        assert!(trend.labels.is_empty());
        assert!(trend.values.is_empty());
    }

    #[test]
    fn test_zero_bucket_size_is_daily() {
        let trend = bucketize(&series(&[2.0, 4.0]), 0);
        assert_eq!(trend.labels, vec!["W1", "W2"]);
        assert_eq!(trend.values, vec![2.0, 4.0]);
    }

    #[test]
    fn test_sparkline_short_series_is_daily() {
        let trend = sparkline(&series(&[1.0, 2.0, 3.0]), 14, 7);
        assert_eq!(trend.values, vec![1.0, 2.0, 3.0]);
        assert_eq!(trend.labels[0], "Jan 01");
    }

    #[test]
    fn test_sparkline_long_series_is_weekly() {
        let values = vec![1.0; 30];
        let trend = sparkline(&series(&values), 14, 7);
        assert_eq!(trend.labels.len(), 5);
        assert!(trend.values.iter().all(|v| *v == 1.0));
    }
}
