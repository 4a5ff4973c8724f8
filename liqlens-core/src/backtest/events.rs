//! Trailing percentage change and event detection on the driver series.
//!
//! Events depend only on the driver column and the parameters; the target
//! is never consulted here.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::params::{ClusterPolicy, EventParams};

/// A qualifying date on the driver series.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Event {
    /// Row in the shared index.
    pub index: usize,
    pub date: NaiveDate,
    /// Trailing `W`-row change that triggered the event.
    pub driver_change: f64,
}

/// `change[t] = v[t] / v[t - w] - 1`.
///
/// `None` for the first `w` rows, where either value is undefined, or where
/// the base value is zero.
pub fn trailing_change(values: &[Option<f64>], w: usize) -> Vec<Option<f64>> {
    (0..values.len())
        .map(|t| {
            if w == 0 || t < w {
                return None;
            }
            match (values[t - w], values[t]) {
                (Some(base), Some(now)) if base != 0.0 => Some(now / base - 1.0),
                _ => None,
            }
        })
        .collect()
}

/// First and last rows where the trailing change is defined.
pub fn eligible_rows(changes: &[Option<f64>]) -> Option<(usize, usize)> {
    let first = changes.iter().position(|c| c.is_some())?;
    let last = changes.iter().rposition(|c| c.is_some())?;
    Some((first, last))
}

/// Scan the driver for threshold crossings.
///
/// `dates` and `driver` must have the same length.
pub fn detect_events(dates: &[NaiveDate], driver: &[Option<f64>], params: &EventParams) -> Vec<Event> {
    let changes = trailing_change(driver, params.lookback);
    let mut events: Vec<Event> = Vec::new();

    for (index, change) in changes.iter().enumerate() {
        let Some(change) = *change else {
            continue;
        };
        if !params.triggers(change) {
            continue;
        }
        if let (ClusterPolicy::MinGap(gap), Some(prev)) = (params.cluster, events.last()) {
            if index < prev.index.saturating_add(gap) {
                continue;
            }
        }
        events.push(Event {
            index,
            date: dates[index],
            driver_change: change,
        });
    }

    events
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backtest::params::Direction;

    fn days(n: usize) -> Vec<NaiveDate> {
        let start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        start.iter_days().take(n).collect()
    }

    fn some(values: &[f64]) -> Vec<Option<f64>> {
        values.iter().copied().map(Some).collect()
    }

    #[test]
    fn trailing_change_needs_full_window() {
        let v = some(&[100.0, 110.0, 121.0]);
        let c = trailing_change(&v, 1);
        assert_eq!(c[0], None);
        assert!((c[1].unwrap() - 0.10).abs() < 1e-12);
        assert!((c[2].unwrap() - 0.10).abs() < 1e-12);

        let c2 = trailing_change(&v, 2);
        assert_eq!(&c2[..2], &[None, None]);
        assert!((c2[2].unwrap() - 0.21).abs() < 1e-12);
    }

    #[test]
    fn trailing_change_skips_undefined_and_zero_bases() {
        let v = vec![None, Some(0.0), Some(5.0), Some(6.0)];
        let c = trailing_change(&v, 1);
        assert_eq!(c[1], None); // base undefined
        assert_eq!(c[2], None); // base zero
        assert!((c[3].unwrap() - 0.2).abs() < 1e-12);
    }

    #[test]
    fn single_event_after_full_lookback() {
        let mut values = vec![100.0; 10];
        values.push(103.0);
        let driver = some(&values);
        let dates = days(11);

        let params = EventParams::new(10, 0.03, Direction::Up, 20);
        let events = detect_events(&dates, &driver, &params);

        assert_eq!(events.len(), 1);
        assert_eq!(events[0].index, 10);
        assert_eq!(events[0].date, dates[10]);
        assert!((events[0].driver_change - 0.03).abs() < 1e-12);
    }

    #[test]
    fn every_date_policy_keeps_clusters() {
        let driver = some(&[100.0, 96.0, 92.0, 92.0, 92.0]);
        let dates = days(5);
        let params = EventParams::new(2, 0.03, Direction::Down, 1);

        let events = detect_events(&dates, &driver, &params);
        let idx: Vec<_> = events.iter().map(|e| e.index).collect();
        // row 2: 92/100-1 = -8%, row 3: 92/96-1 = -4.2%, row 4: 0%
        assert_eq!(idx, vec![2, 3]);
    }

    #[test]
    fn huge_min_gap_keeps_only_the_first_event() {
        let values: Vec<f64> = (0..10).map(|i| 100.0 - 5.0 * i as f64).collect();
        let driver = some(&values);
        let dates = days(10);
        let params = EventParams::new(1, 0.03, Direction::Down, 1)
            .with_cluster(ClusterPolicy::MinGap(usize::MAX));

        let events = detect_events(&dates, &driver, &params);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].index, 1);
    }

    #[test]
    fn min_gap_suppresses_nearby_events() {
        let driver = some(&[100.0, 100.0, 90.0, 85.0, 80.0, 75.0, 70.0]);
        let dates = days(7);
        let params =
            EventParams::new(1, 0.03, Direction::Down, 1).with_cluster(ClusterPolicy::MinGap(3));

        let events = detect_events(&dates, &driver, &params);
        let idx: Vec<_> = events.iter().map(|e| e.index).collect();
        // qualifying rows 2..=6; accepted 2, then >= 5
        assert_eq!(idx, vec![2, 5]);
    }

    #[test]
    fn eligible_rows_bounds() {
        assert_eq!(eligible_rows(&[None, Some(0.1), None, Some(0.2), None]), Some((1, 3)));
        assert_eq!(eligible_rows(&[None, None]), None);
    }
}
