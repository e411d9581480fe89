//! Statistical checks over numeric columns

use super::rules::OutlierMethod;

/// Minimum number of numeric values before outlier detection runs
pub const DEFAULT_MIN_SAMPLES: usize = 8;

/// Default ratio of null values above which a column is flagged
pub const DEFAULT_NULL_THRESHOLD: f64 = 0.1;

pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some(values.iter().sum::<f64>() / values.len() as f64)
}

/// Population standard deviation
pub fn std_dev(values: &[f64]) -> Option<f64> {
    let mean = mean(values)?;
    let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / values.len() as f64;
    Some(variance.sqrt())
}

/// Quantile with linear interpolation between closest ranks
pub fn quantile(sorted: &[f64], q: f64) -> Option<f64> {
    if sorted.is_empty() {
        return None;
    }
    let position = q.clamp(0.0, 1.0) * (sorted.len() - 1) as f64;
    let lower = position.floor() as usize;
    let upper = position.ceil() as usize;
    let fraction = position - lower as f64;
    Some(sorted[lower] + (sorted[upper] - sorted[lower]) * fraction)
}

/// Smallest sample in which a z-score above `threshold` is possible.
///
/// With the population deviation no value of `n` samples can score more
/// than `(n - 1) / sqrt(n)`.
pub fn zscore_min_samples(threshold: f64) -> usize {
    let reachable = |n: usize| ((n - 1) as f64) / (n as f64).sqrt() > threshold;
    // root of s^2 - threshold*s - 1 = 0, with s = sqrt(n)
    let root = (threshold + (threshold * threshold + 4.0).sqrt()) / 2.0;
    let mut n = ((root * root).floor() as usize).saturating_add(1).max(2);
    while n > 2 && reachable(n - 1) {
        n -= 1;
    }
    while !reachable(n) {
        n += 1;
    }
    n
}

/// Positions (into `values`) of outliers under the given method
///
/// Returns nothing when fewer than `min_samples` values are available, the
/// spread is zero, or (for z-scores) the sample is too small for the
/// threshold to be reachable.
pub fn outliers(values: &[(usize, f64)], method: OutlierMethod, min_samples: usize) -> Vec<usize> {
    let required = match method {
        OutlierMethod::ZScore { threshold } => min_samples.max(zscore_min_samples(threshold)),
        OutlierMethod::Iqr { .. } => min_samples,
    };
    if values.len() < required.max(2) {
        return Vec::new();
    }
    let numbers: Vec<f64> = values.iter().map(|(_, v)| *v).collect();

    match method {
        OutlierMethod::ZScore { threshold } => {
            let (Some(mean), Some(std_dev)) = (mean(&numbers), std_dev(&numbers)) else {
                return Vec::new();
            };
            if std_dev == 0.0 {
                return Vec::new();
            }
            values
                .iter()
                .filter(|(_, v)| ((v - mean) / std_dev).abs() > threshold)
                .map(|(row, _)| *row)
                .collect()
        }
        OutlierMethod::Iqr { multiplier } => {
            let mut sorted = numbers;
            sorted.sort_by(f64::total_cmp);
            let (Some(q1), Some(q3)) = (quantile(&sorted, 0.25), quantile(&sorted, 0.75)) else {
                return Vec::new();
            };
            let spread = q3 - q1;
            let (low, high) = (q1 - multiplier * spread, q3 + multiplier * spread);
            values
                .iter()
                .filter(|(_, v)| *v < low || *v > high)
                .map(|(row, _)| *row)
                .collect()
        }
    }
}
