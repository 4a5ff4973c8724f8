//! Forward-return statistics over resolved events.

use serde::{Deserialize, Serialize};

/// Distribution of forward returns over resolved events.
///
/// Only constructed from a non-empty sample: "no events" is represented by
/// the absence of a `ForwardStats`, never by zeros or NaN.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ForwardStats {
    pub count: usize,
    pub mean: f64,
    pub median: f64,
    pub min: f64,
    pub max: f64,
    /// Population standard deviation.
    pub std_dev: f64,
    /// Events with a negative forward return.
    pub declines: usize,
    /// Events with a positive forward return.
    pub advances: usize,
    /// `declines / count`.
    pub decline_probability: f64,
    /// `advances / declines`; `None` when nothing declined.
    pub win_loss_ratio: Option<f64>,
}

impl ForwardStats {
    /// Summarize `returns`; `None` for an empty sample.
    pub fn from_returns(returns: &[f64]) -> Option<Self> {
        if returns.is_empty() {
            return None;
        }

        let count = returns.len();
        let n = count as f64;
        let mean = returns.iter().sum::<f64>() / n;
        let variance = returns.iter().map(|r| (r - mean).powi(2)).sum::<f64>() / n;

        let declines = returns.iter().filter(|r| **r < 0.0).count();
        let advances = returns.iter().filter(|r| **r > 0.0).count();

        Some(Self {
            count,
            mean,
            median: median(returns),
            min: returns.iter().copied().fold(f64::INFINITY, f64::min),
            max: returns.iter().copied().fold(f64::NEG_INFINITY, f64::max),
            std_dev: variance.sqrt(),
            declines,
            advances,
            decline_probability: declines as f64 / n,
            win_loss_ratio: (declines > 0).then(|| advances as f64 / declines as f64),
        })
    }
}

/// Median of a non-empty slice (mean of the two middle values for even length).
fn median(values: &[f64]) -> f64 {
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        (sorted[mid - 1] + sorted[mid]) / 2.0
    } else {
        sorted[mid]
    }
}
