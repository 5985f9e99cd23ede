//! Class boundaries for graduated symbology.
//!
//! Every function returns exactly `k` boundaries: the inclusive upper bound of
//! each class, non-decreasing, the last one being the sample maximum.
//! Duplicate boundaries are kept, so some classes may be empty.

use crate::{core::config::ClassificationConfig, MapError, Result};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ClassificationMethod {
    Quantile,
    NaturalBreaks,
}

impl ClassificationMethod {
    pub fn breaks(self, values: &[f64], k: usize, config: &ClassificationConfig) -> Result<Vec<f64>> {
        match self {
            ClassificationMethod::Quantile => quantiles(values, k),
            ClassificationMethod::NaturalBreaks => natural_breaks(
                values,
                k,
                config.natural_breaks_max_iterations,
                config.natural_breaks_epsilon,
            ),
        }
    }
}

/// Finite values sorted ascending; fails unless there are at least `k`
/// distinct ones. `NaN` and infinities are dropped, never read as zero.
fn prepare(values: &[f64], k: usize) -> Result<Vec<f64>> {
    if k == 0 {
        return Err(MapError::InsufficientData("class count must be at least 1".into()));
    }
    let mut sorted: Vec<f64> = values.iter().copied().filter(|v| v.is_finite()).collect();
    sorted.sort_by(f64::total_cmp);

    let mut distinct = sorted.len().min(1);
    for pair in sorted.windows(2) {
        if pair[1] != pair[0] {
            distinct += 1;
        }
    }
    if distinct < k {
        return Err(MapError::InsufficientData(format!(
            "{} classes need {} distinct values, found {}",
            k, k, distinct
        )));
    }
    Ok(sorted)
}

/// Boundary `i` (1-based) is the sorted value at index `min(ceil(i*n/k), n-1)`.
pub fn quantiles(values: &[f64], k: usize) -> Result<Vec<f64>> {
    let sorted = prepare(values, k)?;
    let n = sorted.len();
    Ok((1..=k)
        .map(|i| {
            let rank = (i * n + k - 1) / k;
            sorted[rank.min(n - 1)]
        })
        .collect())
}

/// Running sums for O(1) within-class squared deviation
struct PrefixSums {
    sum: Vec<f64>,
    sum_sq: Vec<f64>,
}

impl PrefixSums {
    fn new(sorted: &[f64]) -> Self {
        let mut sum = Vec::with_capacity(sorted.len() + 1);
        let mut sum_sq = Vec::with_capacity(sorted.len() + 1);
        sum.push(0.0);
        sum_sq.push(0.0);
        for v in sorted {
            sum.push(sum[sum.len() - 1] + v);
            sum_sq.push(sum_sq[sum_sq.len() - 1] + v * v);
        }
        Self { sum, sum_sq }
    }

    /// Sum of squared deviations from the mean over `[start, end)`
    fn ssd(&self, start: usize, end: usize) -> f64 {
        let len = (end - start) as f64;
        if len == 0.0 {
            return 0.0;
        }
        let s = self.sum[end] - self.sum[start];
        let s2 = self.sum_sq[end] - self.sum_sq[start];
        (s2 - s * s / len).max(0.0)
    }
}

/// Jenks-style natural breaks by local search.
///
/// This is a heuristic, not the global optimum. Classes start from the
/// equal-count partition; each pass tries to move every internal boundary by
/// one value in either direction and keeps the move that lowers the total
/// within-class squared deviation the most. Passes stop when no move improves
/// it by more than `epsilon` or after `max_iterations` passes. The same input
/// always produces the same breaks.
pub fn natural_breaks(values: &[f64], k: usize, max_iterations: usize, epsilon: f64) -> Result<Vec<f64>> {
    let sorted = prepare(values, k)?;
    let n = sorted.len();
    let sums = PrefixSums::new(&sorted);

    // ends[j] is the exclusive end index of class j; ends[k-1] == n
    let mut ends: Vec<usize> = (1..=k).map(|j| j * n / k).collect();

    for _ in 0..max_iterations {
        let mut moved = false;
        for b in 0..k.saturating_sub(1) {
            let start = if b == 0 { 0 } else { ends[b - 1] };
            let end = ends[b + 1];
            let current = sums.ssd(start, ends[b]) + sums.ssd(ends[b], end);

            let mut best: Option<(usize, f64)> = None;
            for candidate in [ends[b] - 1, ends[b] + 1] {
                // both classes keep at least one value
                if candidate <= start || candidate >= end {
                    continue;
                }
                let cost = sums.ssd(start, candidate) + sums.ssd(candidate, end);
                let gain = current - cost;
                if gain > epsilon && best.map_or(true, |(_, g)| gain > g) {
                    best = Some((candidate, gain));
                }
            }
            if let Some((candidate, _)) = best {
                ends[b] = candidate;
                moved = true;
            }
        }
        if !moved {
            break;
        }
    }

    Ok(ends.iter().map(|&end| sorted[end - 1]).collect())
}

/// Index of the class `value` falls in: the first boundary not below it.
/// Values above the last boundary land in the last class.
pub fn class_index(breaks: &[f64], value: f64) -> usize {
    breaks
        .iter()
        .position(|b| value <= *b)
        .unwrap_or(breaks.len().saturating_sub(1))
}
