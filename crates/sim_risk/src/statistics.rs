//! Descriptive statistics per sample column.
//!
//! Percentiles interpolate linearly between order statistics: for sorted
//! values `x₀ ≤ … ≤ xₙ₋₁` the `p`-th percentile sits at rank `h = (n − 1)p`
//! and equals `x⌊h⌋ + (h − ⌊h⌋)(x⌈h⌉ − x⌊h⌋)`.

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use sim_core::types::SampleMatrix;
use std::collections::BTreeMap;

/// Two-sided z value for a 95% interval.
pub const Z_95: f64 = 1.959964;

/// Two-sided z value for a 99% interval.
pub const Z_99: f64 = 2.575829;

/// Standard percentile set.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Percentiles {
    /// 1st percentile
    pub p1: f64,
    /// 5th percentile
    pub p5: f64,
    /// 10th percentile
    pub p10: f64,
    /// 25th percentile
    pub p25: f64,
    /// Median
    pub p50: f64,
    /// 75th percentile
    pub p75: f64,
    /// 90th percentile
    pub p90: f64,
    /// 95th percentile
    pub p95: f64,
    /// 99th percentile
    pub p99: f64,
}

impl Percentiles {
    /// Percentiles of already sorted values.
    pub fn from_sorted(sorted: &[f64]) -> Self {
        let q = |p| percentile_sorted(sorted, p);
        Self {
            p1: q(0.01),
            p5: q(0.05),
            p10: q(0.10),
            p25: q(0.25),
            p50: q(0.50),
            p75: q(0.75),
            p90: q(0.90),
            p95: q(0.95),
            p99: q(0.99),
        }
    }
}

/// Confidence interval of the mean.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct ConfidenceInterval {
    /// Confidence level (0.95 or 0.99)
    pub level: f64,
    /// Lower bound
    pub lower: f64,
    /// Upper bound
    pub upper: f64,
}

impl ConfidenceInterval {
    fn around(mean: f64, std_error: f64, level: f64, z: f64) -> Self {
        Self {
            level,
            lower: mean - z * std_error,
            upper: mean + z * std_error,
        }
    }
}

/// Summary of one column.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct VariableSummary {
    /// Number of samples
    pub count: usize,
    /// Sample mean
    pub mean: f64,
    /// Sample standard deviation (n − 1 denominator)
    pub std_dev: f64,
    /// Smallest sample
    pub min: f64,
    /// Largest sample
    pub max: f64,
    /// Standard percentiles
    pub percentiles: Percentiles,
    /// 95% confidence interval of the mean
    pub confidence_interval: ConfidenceInterval,
    /// 99% confidence interval of the mean
    pub confidence_interval_99: ConfidenceInterval,
}

/// Percentile of sorted values with linear interpolation.
///
/// Returns NaN for an empty slice.
///
/// # Examples
///
/// ```rust
/// use sim_risk::statistics::percentile_sorted;
///
/// let xs = [1.0, 2.0, 3.0, 4.0, 5.0];
/// assert_eq!(percentile_sorted(&xs, 0.5), 3.0);
/// assert_eq!(percentile_sorted(&xs, 0.9), 4.6);
/// ```
pub fn percentile_sorted(sorted: &[f64], p: f64) -> f64 {
    match sorted.len() {
        0 => f64::NAN,
        1 => sorted[0],
        n => {
            let h = (n - 1) as f64 * p.clamp(0.0, 1.0);
            let lo = h.floor() as usize;
            let hi = h.ceil() as usize;
            sorted[lo] + (h - lo as f64) * (sorted[hi] - sorted[lo])
        }
    }
}

/// Sorted copy of `values`.
pub fn sorted(values: &[f64]) -> Vec<f64> {
    let mut out = values.to_vec();
    out.sort_by(|a, b| a.total_cmp(b));
    out
}

/// Mean and sample standard deviation.
pub fn mean_std(values: &[f64]) -> (f64, f64) {
    let n = values.len();
    if n == 0 {
        return (f64::NAN, f64::NAN);
    }
    let mean = values.iter().sum::<f64>() / n as f64;
    if n < 2 {
        return (mean, 0.0);
    }
    let ss: f64 = values.iter().map(|x| (x - mean) * (x - mean)).sum();
    (mean, (ss / (n - 1) as f64).sqrt())
}

/// Summarises one column. Returns `None` for an empty column.
pub fn summarise(values: &[f64]) -> Option<VariableSummary> {
    if values.is_empty() {
        return None;
    }
    let count = values.len();
    let (mean, std_dev) = mean_std(values);
    let sorted = sorted(values);
    let std_error = std_dev / (count as f64).sqrt();
    Some(VariableSummary {
        count,
        mean,
        std_dev,
        min: sorted[0],
        max: sorted[count - 1],
        percentiles: Percentiles::from_sorted(&sorted),
        confidence_interval: ConfidenceInterval::around(mean, std_error, 0.95, Z_95),
        confidence_interval_99: ConfidenceInterval::around(mean, std_error, 0.99, Z_99),
    })
}

/// Summarises every column in parallel.
///
/// Each column is reduced independently, so the result does not depend on
/// how Rayon schedules the work.
pub fn summarise_columns(samples: &SampleMatrix) -> BTreeMap<String, VariableSummary> {
    let summaries: Vec<Option<VariableSummary>> = (0..samples.n_columns())
        .into_par_iter()
        .map(|i| summarise(samples.column_at(i)))
        .collect();
    samples
        .names()
        .iter()
        .cloned()
        .zip(summaries)
        .filter_map(|(name, summary)| summary.map(|s| (name, s)))
        .collect()
}

/// Pearson correlation; 0 when either series is constant.
pub fn correlation_or_zero(x: &[f64], y: &[f64]) -> f64 {
    sim_core::correlation::pearson(x, y).unwrap_or(0.0)
}
