//! Event-study parameters.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Rounding slack for threshold comparisons, so a move of exactly the
/// threshold still qualifies after floating-point division.
pub const THRESHOLD_EPSILON: f64 = 1e-12;

/// Which side of the threshold counts as an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    /// Trailing change `>= threshold` (the quoted series appreciates).
    Up,
    /// Trailing change `<= -threshold` (the quoted series depreciates).
    Down,
}

/// How consecutive qualifying dates are treated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClusterPolicy {
    /// Every qualifying date is its own event.
    #[default]
    EveryDate,
    /// After an event at row `i`, the next event must be at row `>= i + n`.
    MinGap(usize),
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ParamError {
    #[error("lookback window must be at least 1 trading day")]
    ZeroLookback,

    #[error("forward horizon must be at least 1 trading day")]
    ZeroHorizon,

    #[error("threshold must be a finite, non-negative fraction (got {0})")]
    InvalidThreshold(f64),

    #[error("minimum gap between events must be at least 1 row")]
    ZeroGap,
}

/// Parameters of one event-conditional backtest.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EventParams {
    /// Trailing window `W`, in index rows (trading days).
    pub lookback: usize,
    /// Threshold `T` as a fraction (0.03 = 3%).
    pub threshold: f64,
    pub direction: Direction,
    /// Forward horizon `H`, in index rows (trading days).
    pub horizon: usize,
    #[serde(default)]
    pub cluster: ClusterPolicy,
}

impl Default for EventParams {
    /// USD/JPY falling 3% over 10 days, Nasdaq measured 20 days later.
    fn default() -> Self {
        Self {
            lookback: 10,
            threshold: 0.03,
            direction: Direction::Down,
            horizon: 20,
            cluster: ClusterPolicy::EveryDate,
        }
    }
}

impl EventParams {
    pub fn new(lookback: usize, threshold: f64, direction: Direction, horizon: usize) -> Self {
        Self {
            lookback,
            threshold,
            direction,
            horizon,
            cluster: ClusterPolicy::EveryDate,
        }
    }

    pub fn with_cluster(mut self, cluster: ClusterPolicy) -> Self {
        self.cluster = cluster;
        self
    }

    pub fn validate(&self) -> Result<(), ParamError> {
        if self.lookback == 0 {
            return Err(ParamError::ZeroLookback);
        }
        if self.horizon == 0 {
            return Err(ParamError::ZeroHorizon);
        }
        if !self.threshold.is_finite() || self.threshold < 0.0 {
            return Err(ParamError::InvalidThreshold(self.threshold));
        }
        if self.cluster == ClusterPolicy::MinGap(0) {
            return Err(ParamError::ZeroGap);
        }
        Ok(())
    }

    /// Whether a trailing change meets the threshold in the configured direction.
    pub fn triggers(&self, change: f64) -> bool {
        match self.direction {
            Direction::Up => change >= self.threshold - THRESHOLD_EPSILON,
            Direction::Down => change <= -self.threshold + THRESHOLD_EPSILON,
        }
    }
}
