//! Clustering of intraday highs
//!
//! The shipped [`KMeans`] is one-dimensional Lloyd's algorithm with
//! quantile seeding: the initial centroids are evenly spaced quantiles of
//! the sorted input, so the same series always yields the same clusters.

use crate::error::{MarketError, Result};
use crate::source::SeriesPoint;
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Default number of clusters
pub const DEFAULT_CLUSTERS: usize = 5;

/// Assigns each value to one of `k` groups
pub trait Clusterer: Send + Sync {
    /// Returns one cluster index in `0..k` per input value
    fn cluster(&self, values: &[f64], k: usize) -> Result<Vec<usize>>;
}

/// Deterministic one-dimensional k-means
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KMeans {
    pub max_iterations: usize,
}

impl Default for KMeans {
    fn default() -> Self {
        Self {
            max_iterations: 100,
        }
    }
}

impl KMeans {
    pub fn new(max_iterations: usize) -> Self {
        Self { max_iterations }
    }

    fn seed(values: &[f64], k: usize) -> Vec<f64> {
        let mut sorted = values.to_vec();
        sorted.sort_by(f64::total_cmp);
        let n = sorted.len();
        (0..k).map(|i| sorted[((2 * i + 1) * n) / (2 * k)]).collect()
    }
}

/// Index of the closest centroid; ties go to the lower index
fn nearest(value: f64, centroids: &[f64]) -> usize {
    let mut best = 0;
    for (i, centroid) in centroids.iter().enumerate().skip(1) {
        if (value - centroid).abs() < (value - centroids[best]).abs() {
            best = i;
        }
    }
    best
}

impl Clusterer for KMeans {
    fn cluster(&self, values: &[f64], k: usize) -> Result<Vec<usize>> {
        if k == 0 {
            return Err(MarketError::InvalidInput(
                "cluster count must be at least 1".to_string(),
            ));
        }
        if values.iter().any(|v| !v.is_finite()) {
            return Err(MarketError::InvalidInput(
                "series contains non-finite values".to_string(),
            ));
        }
        if values.is_empty() {
            return Ok(Vec::new());
        }

        let k = k.min(values.len());
        let mut centroids = Self::seed(values, k);
        let mut assignments: Vec<usize> = values.iter().map(|v| nearest(*v, &centroids)).collect();

        for _ in 0..self.max_iterations {
            let mut sums = vec![0.0; k];
            let mut counts = vec![0usize; k];
            for (value, &cluster) in values.iter().zip(&assignments) {
                sums[cluster] += value;
                counts[cluster] += 1;
            }
            // An empty cluster keeps its previous centroid
            for (centroid, (sum, count)) in centroids.iter_mut().zip(sums.iter().zip(&counts)) {
                if *count > 0 {
                    *centroid = sum / *count as f64;
                }
            }

            let next: Vec<usize> = values.iter().map(|v| nearest(*v, &centroids)).collect();
            if next == assignments {
                break;
            }
            assignments = next;
        }

        Ok(assignments)
    }
}

/// Points that fell into the same cluster
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClusterGroup {
    /// Zero-based cluster index
    pub index: usize,
    /// Mean of the member values
    pub average: f64,
    /// Member timestamps, in series order
    pub times: Vec<NaiveDateTime>,
}

impl ClusterGroup {
    /// One-based label used in prompts and output
    pub fn number(&self) -> usize {
        self.index + 1
    }

    pub fn len(&self) -> usize {
        self.times.len()
    }

    pub fn is_empty(&self) -> bool {
        self.times.is_empty()
    }
}

/// Group points by their assignment, ordered by cluster index
///
/// Clusters with no members do not appear in the output.
pub fn group_clusters(points: &[SeriesPoint], assignments: &[usize]) -> Result<Vec<ClusterGroup>> {
    if points.len() != assignments.len() {
        return Err(MarketError::InvalidInput(format!(
            "{} assignments for {} points",
            assignments.len(),
            points.len()
        )));
    }

    let mut members: BTreeMap<usize, (f64, Vec<NaiveDateTime>)> = BTreeMap::new();
    for (point, &cluster) in points.iter().zip(assignments) {
        let entry = members.entry(cluster).or_default();
        entry.0 += point.value;
        entry.1.push(point.timestamp);
    }

    Ok(members
        .into_iter()
        .map(|(index, (sum, times))| ClusterGroup {
            index,
            average: sum / times.len() as f64,
            times,
        })
        .collect())
}
