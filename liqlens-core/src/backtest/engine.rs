//! Event-conditional backtest engine.
//!
//! Given a driver and a target column on one shared index:
//! 1. detect driver events (trailing `W`-row change crossing the threshold)
//! 2. measure the target's forward return `H` rows after each event
//! 3. aggregate the resolved returns into [`ForwardStats`]
//!
//! Events too close to the end of the data are *pending*; events where the
//! target has no value at either end are *unpriced*. Both are counted but
//! kept out of the aggregate.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use super::events::{detect_events, eligible_rows, trailing_change};
use super::params::{EventParams, ParamError};
use super::stats::ForwardStats;
use crate::align::AlignedPanel;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum BacktestError {
    #[error("series '{0}' is not in the panel")]
    UnknownSeries(String),

    #[error("invalid parameters: {0}")]
    InvalidParams(#[from] ParamError),

    #[error("length mismatch: {dates} dates, {driver} driver values, {target} target values")]
    LengthMismatch {
        dates: usize,
        driver: usize,
        target: usize,
    },
}

/// What happened to the target after one event.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Outcome {
    Resolved {
        exit_date: NaiveDate,
        forward_return: f64,
    },
    /// `t + H` lies beyond the last row.
    Pending,
    /// Target undefined (or zero) at `t`, or undefined at `t + H`.
    Unpriced,
}

/// One detected event and its outcome.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EventRecord {
    pub index: usize,
    pub date: NaiveDate,
    pub driver_change: f64,
    pub outcome: Outcome,
}

impl EventRecord {
    pub fn forward_return(&self) -> Option<f64> {
        match self.outcome {
            Outcome::Resolved { forward_return, .. } => Some(forward_return),
            _ => None,
        }
    }
}

/// Result of one event-conditional backtest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BacktestResult {
    pub driver: String,
    pub target: String,
    pub params: EventParams,
    /// First and last dates on which the driver's trailing change is defined.
    pub eligible_range: Option<(NaiveDate, NaiveDate)>,
    pub events: Vec<EventRecord>,
    pub event_count: usize,
    pub resolved_count: usize,
    pub pending_count: usize,
    pub unpriced_count: usize,
    /// `None` when no event resolved.
    pub stats: Option<ForwardStats>,
}

impl BacktestResult {
    /// No event qualified.
    pub fn is_empty(&self) -> bool {
        self.event_count == 0
    }

    /// Forward returns of resolved events, in date order.
    pub fn resolved_returns(&self) -> Vec<f64> {
        self.events
            .iter()
            .filter_map(EventRecord::forward_return)
            .collect()
    }

    /// BLAKE3 digest over the counts and aggregate statistics.
    ///
    /// Two runs on identical inputs produce identical digests.
    pub fn digest(&self) -> String {
        let mut hasher = blake3::Hasher::new();
        for n in [
            self.event_count,
            self.resolved_count,
            self.pending_count,
            self.unpriced_count,
        ] {
            hasher.update(&(n as u64).to_le_bytes());
        }
        match &self.stats {
            None => {
                hasher.update(b"none");
            }
            Some(s) => {
                hasher.update(&(s.count as u64).to_le_bytes());
                for v in [
                    s.mean,
                    s.median,
                    s.min,
                    s.max,
                    s.std_dev,
                    s.decline_probability,
                    s.win_loss_ratio.unwrap_or(f64::NAN),
                ] {
                    hasher.update(&v.to_bits().to_le_bytes());
                }
            }
        }
        hasher.finalize().to_hex().to_string()
    }
}

/// Driver and target columns on a shared date index.
#[derive(Debug, Clone, Copy)]
pub struct EventStudy<'a> {
    pub dates: &'a [NaiveDate],
    pub driver_name: &'a str,
    pub driver: &'a [Option<f64>],
    pub target_name: &'a str,
    pub target: &'a [Option<f64>],
}

impl<'a> EventStudy<'a> {
    /// Borrow two columns of an aligned panel.
    pub fn from_panel(
        panel: &'a AlignedPanel,
        driver: &'a str,
        target: &'a str,
    ) -> Result<Self, BacktestError> {
        let driver_col = panel
            .column(driver)
            .ok_or_else(|| BacktestError::UnknownSeries(driver.to_string()))?;
        let target_col = panel
            .column(target)
            .ok_or_else(|| BacktestError::UnknownSeries(target.to_string()))?;
        Ok(Self {
            dates: panel.dates(),
            driver_name: driver,
            driver: driver_col,
            target_name: target,
            target: target_col,
        })
    }

    /// Run the scan. Short histories shrink the eligible range; they never fail.
    pub fn run(&self, params: &EventParams) -> Result<BacktestResult, BacktestError> {
        params.validate()?;
        let n = self.dates.len();
        if self.driver.len() != n || self.target.len() != n {
            return Err(BacktestError::LengthMismatch {
                dates: n,
                driver: self.driver.len(),
                target: self.target.len(),
            });
        }

        let eligible_range = eligible_rows(&trailing_change(self.driver, params.lookback))
            .map(|(first, last)| (self.dates[first], self.dates[last]));

        let events: Vec<EventRecord> = detect_events(self.dates, self.driver, params)
            .into_iter()
            .map(|e| EventRecord {
                index: e.index,
                date: e.date,
                driver_change: e.driver_change,
                outcome: self.outcome(e.index, params.horizon),
            })
            .collect();

        let pending_count = events
            .iter()
            .filter(|e| e.outcome == Outcome::Pending)
            .count();
        let unpriced_count = events
            .iter()
            .filter(|e| e.outcome == Outcome::Unpriced)
            .count();
        let returns: Vec<f64> = events.iter().filter_map(EventRecord::forward_return).collect();

        debug!(
            driver = self.driver_name,
            target = self.target_name,
            events = events.len(),
            resolved = returns.len(),
            pending = pending_count,
            "event study complete"
        );

        Ok(BacktestResult {
            driver: self.driver_name.to_string(),
            target: self.target_name.to_string(),
            params: *params,
            eligible_range,
            event_count: events.len(),
            resolved_count: returns.len(),
            pending_count,
            unpriced_count,
            stats: ForwardStats::from_returns(&returns),
            events,
        })
    }

    fn outcome(&self, index: usize, horizon: usize) -> Outcome {
        let Some(exit) = index
            .checked_add(horizon)
            .filter(|&e| e < self.dates.len())
        else {
            return Outcome::Pending;
        };
        match (self.target[index], self.target[exit]) {
            (Some(entry), Some(later)) if entry != 0.0 => Outcome::Resolved {
                exit_date: self.dates[exit],
                forward_return: later / entry - 1.0,
            },
            _ => Outcome::Unpriced,
        }
    }
}

/// Run an event study on two columns of `panel`.
pub fn run_on_panel(
    panel: &AlignedPanel,
    driver: &str,
    target: &str,
    params: &EventParams,
) -> Result<BacktestResult, BacktestError> {
    EventStudy::from_panel(panel, driver, target)?.run(params)
}
