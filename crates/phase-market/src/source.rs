//! Market-data source abstraction

use crate::error::Result;
use async_trait::async_trait;
use chrono::{Duration, NaiveDateTime};
use serde::{Deserialize, Serialize};

/// What to fetch
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeriesSpec {
    pub symbol: String,
    /// Bar interval, e.g. `5min`
    pub interval: String,
    /// Keep only points this many days before the newest one
    pub lookback_days: u32,
}

/// One observation of an intraday series
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SeriesPoint {
    pub timestamp: NaiveDateTime,
    /// The bar's high price
    pub value: f64,
    pub volume: u64,
}

/// Source of time series data
#[async_trait]
pub trait DataSource: Send + Sync {
    /// Fetch the series, ordered by ascending timestamp
    async fn fetch(&self, spec: &SeriesSpec) -> Result<Vec<SeriesPoint>>;

    /// Get the source name (e.g., "alpha_vantage")
    fn name(&self) -> &str;
}

/// Drop points older than `days` before the newest point
///
/// The cutoff is relative to the data rather than the wall clock, so a
/// series fetched over a weekend still covers the last trading days.
pub fn apply_lookback(mut points: Vec<SeriesPoint>, days: u32) -> Vec<SeriesPoint> {
    let Some(newest) = points.iter().map(|p| p.timestamp).max() else {
        return points;
    };
    let cutoff = newest - Duration::days(i64::from(days));
    points.retain(|p| p.timestamp >= cutoff);
    points
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn point(day: u32, hour: u32, value: f64) -> SeriesPoint {
        SeriesPoint {
            timestamp: NaiveDate::from_ymd_opt(2024, 5, day)
                .unwrap()
                .and_hms_opt(hour, 0, 0)
                .unwrap(),
            value,
            volume: 100,
        }
    }

    #[test]
    fn test_lookback_relative_to_newest() {
        let points = vec![point(1, 10, 1.0), point(10, 10, 2.0), point(20, 10, 3.0)];
        let kept = apply_lookback(points, 15);
        assert_eq!(kept.len(), 2);
        assert_eq!(kept[0].value, 2.0);
    }

    #[test]
    fn test_lookback_boundary_inclusive() {
        let points = vec![point(5, 10, 1.0), point(20, 10, 2.0)];
        assert_eq!(apply_lookback(points, 15).len(), 2);
    }

    #[test]
    fn test_lookback_empty() {
        assert!(apply_lookback(Vec::new(), 15).is_empty());
    }
}
