//! Multi-series time alignment.
//!
//! Given series on independent calendars (daily equity closes, weekly Fed
//! balance-sheet data, 7-day crypto prices), align them onto one shared date
//! index. Both choices that shape every downstream statistic are explicit:
//!
//! - [`Calendar`]: the index is an anchor series' dates (default: the equity
//!   index), the union, or the intersection of all input dates.
//! - [`FillPolicy`]: `ForwardFill` carries the last observation forward until
//!   a new one arrives; `Exact` only uses same-date observations.
//!
//! Values are never interpolated or back-filled. Slots before a series' first
//! observation stay `None`.

use std::collections::{BTreeSet, HashSet};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::series::{Observation, TimeSeries};

/// Which dates make up the shared index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Calendar {
    /// Dates of the named series (typically the equity index).
    Anchor(String),
    /// Every date observed in any series.
    Union,
    /// Only dates observed in every series.
    Intersection,
}

/// How a column gets a value on an index date it did not observe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FillPolicy {
    #[default]
    ForwardFill,
    Exact,
}

/// Alignment configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlignConfig {
    pub calendar: Calendar,
    pub fill: FillPolicy,
}

impl Default for AlignConfig {
    fn default() -> Self {
        Self {
            calendar: Calendar::Anchor("nasdaq".into()),
            fill: FillPolicy::ForwardFill,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AlignError {
    #[error("nothing to align: no input series")]
    EmptyInput,

    #[error("duplicate series name '{0}'")]
    DuplicateName(String),

    #[error("anchor series '{0}' is not among the inputs")]
    AnchorMissing(String),

    #[error("anchor series '{0}' has no observations")]
    AnchorEmpty(String),
}

/// Named columns on one shared, ascending date index.
///
/// Every column has exactly one slot per index date.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AlignedPanel {
    dates: Vec<NaiveDate>,
    names: Vec<String>,
    columns: Vec<Vec<Option<f64>>>,
    fill: FillPolicy,
}

/// Align `series` according to `config`. Column order follows input order.
pub fn align(series: &[TimeSeries], config: &AlignConfig) -> Result<AlignedPanel, AlignError> {
    if series.is_empty() {
        return Err(AlignError::EmptyInput);
    }

    let mut seen = HashSet::new();
    for s in series {
        if !seen.insert(s.name()) {
            return Err(AlignError::DuplicateName(s.name().to_string()));
        }
    }

    let dates: Vec<NaiveDate> = match &config.calendar {
        Calendar::Anchor(name) => {
            let anchor = series
                .iter()
                .find(|s| s.name() == name)
                .ok_or_else(|| AlignError::AnchorMissing(name.clone()))?;
            if anchor.is_empty() {
                return Err(AlignError::AnchorEmpty(name.clone()));
            }
            anchor.dates().collect()
        }
        Calendar::Union => series
            .iter()
            .flat_map(|s| s.dates())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect(),
        Calendar::Intersection => {
            let mut common: BTreeSet<NaiveDate> = series[0].dates().collect();
            for s in &series[1..] {
                let other: HashSet<NaiveDate> = s.dates().collect();
                common.retain(|d| other.contains(d));
            }
            common.into_iter().collect()
        }
    };

    let names = series.iter().map(|s| s.name().to_string()).collect();
    let columns = series
        .iter()
        .map(|s| resample(s.points(), &dates, config.fill))
        .collect();

    Ok(AlignedPanel {
        dates,
        names,
        columns,
        fill: config.fill,
    })
}

/// Map sorted observations onto sorted `dates`.
fn resample(points: &[Observation], dates: &[NaiveDate], fill: FillPolicy) -> Vec<Option<f64>> {
    let mut out = Vec::with_capacity(dates.len());
    let mut j = 0;
    let mut last: Option<f64> = None;

    for &date in dates {
        let mut exact = None;
        while j < points.len() && points[j].date <= date {
            last = Some(points[j].value);
            if points[j].date == date {
                exact = Some(points[j].value);
            }
            j += 1;
        }
        out.push(match fill {
            FillPolicy::ForwardFill => last,
            FillPolicy::Exact => exact,
        });
    }

    out
}

impl AlignedPanel {
    pub fn dates(&self) -> &[NaiveDate] {
        &self.dates
    }

    /// Number of index dates.
    pub fn len(&self) -> usize {
        self.dates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dates.is_empty()
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn fill_policy(&self) -> FillPolicy {
        self.fill
    }

    pub fn contains(&self, name: &str) -> bool {
        self.position(name).is_some()
    }

    fn position(&self, name: &str) -> Option<usize> {
        self.names.iter().position(|n| n == name)
    }

    pub fn column(&self, name: &str) -> Option<&[Option<f64>]> {
        self.position(name).map(|i| self.columns[i].as_slice())
    }

    pub fn value(&self, name: &str, row: usize) -> Option<f64> {
        self.column(name).and_then(|c| c.get(row).copied().flatten())
    }

    /// Index of the first row where `name` is defined.
    pub fn first_defined(&self, name: &str) -> Option<usize> {
        self.column(name)?.iter().position(|v| v.is_some())
    }

    /// Count of defined slots in `name`.
    pub fn defined_count(&self, name: &str) -> usize {
        self.column(name)
            .map(|c| c.iter().filter(|v| v.is_some()).count())
            .unwrap_or(0)
    }

    /// Align one more series onto the existing index with the panel's fill policy.
    pub fn insert_series(&mut self, series: &TimeSeries) -> Result<(), AlignError> {
        if self.contains(series.name()) {
            return Err(AlignError::DuplicateName(series.name().to_string()));
        }
        self.columns
            .push(resample(series.points(), &self.dates, self.fill));
        self.names.push(series.name().to_string());
        Ok(())
    }

    /// Defined slots of a column as a standalone series.
    pub fn column_series(&self, name: &str) -> Option<TimeSeries> {
        let col = self.column(name)?;
        let points = self
            .dates
            .iter()
            .zip(col)
            .filter_map(|(&date, v)| v.map(|value| Observation::new(date, value)))
            .collect();
        Some(TimeSeries::from_unsorted(name, points))
    }

    /// Rows where every column is defined.
    pub fn complete_rows(&self) -> Vec<usize> {
        (0..self.dates.len())
            .filter(|&i| self.columns.iter().all(|c| c[i].is_some()))
            .collect()
    }

    /// Values of every column on one row, in column order.
    pub fn row(&self, row: usize) -> Vec<Option<f64>> {
        self.columns
            .iter()
            .map(|c| c.get(row).copied().flatten())
            .collect()
    }

    /// Panel restricted to `rows` (ascending indices).
    pub fn select_rows(&self, rows: &[usize]) -> AlignedPanel {
        AlignedPanel {
            dates: rows.iter().map(|&i| self.dates[i]).collect(),
            names: self.names.clone(),
            columns: self
                .columns
                .iter()
                .map(|c| rows.iter().map(|&i| c[i]).collect())
                .collect(),
            fill: self.fill,
        }
    }

    /// The last `n` rows.
    pub fn tail(&self, n: usize) -> AlignedPanel {
        let start = self.dates.len().saturating_sub(n);
        let rows: Vec<usize> = (start..self.dates.len()).collect();
        self.select_rows(&rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn ts(name: &str, pts: &[(&str, f64)]) -> TimeSeries {
        TimeSeries::from_pairs(name, pts.iter().map(|(s, v)| (d(s), *v))).unwrap()
    }

    fn nasdaq() -> TimeSeries {
        ts(
            "nasdaq",
            &[
                ("2024-01-02", 100.0),
                ("2024-01-03", 101.0),
                ("2024-01-04", 102.0),
                ("2024-01-05", 103.0),
                ("2024-01-08", 104.0),
            ],
        )
    }

    fn walcl() -> TimeSeries {
        // Weekly, Wednesdays
        ts("walcl", &[("2024-01-03", 7700.0), ("2024-01-10", 7650.0)])
    }

    #[test]
    fn anchor_calendar_forward_fills_weekly_series() {
        let panel = align(&[nasdaq(), walcl()], &AlignConfig::default()).unwrap();

        assert_eq!(panel.len(), 5);
        assert_eq!(panel.dates()[0], d("2024-01-02"));
        // Leading date before the first observation stays undefined
        assert_eq!(panel.value("walcl", 0), None);
        assert_eq!(panel.value("walcl", 1), Some(7700.0));
        assert_eq!(panel.value("walcl", 4), Some(7700.0));
        assert_eq!(panel.first_defined("walcl"), Some(1));
        // Observation after the last anchor date is not on the index
        assert!(!panel.dates().contains(&d("2024-01-10")));
    }

    #[test]
    fn exact_fill_leaves_gaps() {
        let cfg = AlignConfig {
            calendar: Calendar::Anchor("nasdaq".into()),
            fill: FillPolicy::Exact,
        };
        let panel = align(&[nasdaq(), walcl()], &cfg).unwrap();
        assert_eq!(panel.defined_count("walcl"), 1);
        assert_eq!(panel.value("walcl", 2), None);
    }

    #[test]
    fn weekend_observation_carries_to_next_trading_day() {
        let btc = ts("btc", &[("2024-01-06", 44000.0), ("2024-01-07", 44100.0)]);
        let panel = align(&[nasdaq(), btc], &AlignConfig::default()).unwrap();
        // Monday picks up Sunday's value
        assert_eq!(panel.value("btc", 4), Some(44100.0));
        assert_eq!(panel.value("btc", 3), None);
    }

    #[test]
    fn union_and_intersection_calendars() {
        let union = align(
            &[nasdaq(), walcl()],
            &AlignConfig {
                calendar: Calendar::Union,
                fill: FillPolicy::ForwardFill,
            },
        )
        .unwrap();
        assert_eq!(union.len(), 6);
        assert_eq!(union.value("nasdaq", 5), Some(104.0));

        let inter = align(
            &[nasdaq(), walcl()],
            &AlignConfig {
                calendar: Calendar::Intersection,
                fill: FillPolicy::ForwardFill,
            },
        )
        .unwrap();
        assert_eq!(inter.dates(), &[d("2024-01-03")]);
    }

    #[test]
    fn errors_are_explicit() {
        assert_eq!(
            align(&[], &AlignConfig::default()).unwrap_err(),
            AlignError::EmptyInput
        );
        assert_eq!(
            align(&[walcl()], &AlignConfig::default()).unwrap_err(),
            AlignError::AnchorMissing("nasdaq".into())
        );
        assert_eq!(
            align(&[TimeSeries::empty("nasdaq")], &AlignConfig::default()).unwrap_err(),
            AlignError::AnchorEmpty("nasdaq".into())
        );
        assert_eq!(
            align(&[nasdaq(), nasdaq()], &AlignConfig::default()).unwrap_err(),
            AlignError::DuplicateName("nasdaq".into())
        );
    }

    #[test]
    fn complete_rows_and_tail() {
        let panel = align(&[nasdaq(), walcl()], &AlignConfig::default()).unwrap();
        assert_eq!(panel.complete_rows(), vec![1, 2, 3, 4]);

        let tail = panel.tail(2);
        assert_eq!(tail.len(), 2);
        assert_eq!(tail.dates()[0], d("2024-01-05"));
        assert_eq!(tail.row(1), vec![Some(104.0), Some(7700.0)]);
        assert_eq!(panel.tail(100).len(), 5);
    }

    #[test]
    fn insert_series_uses_panel_index() {
        let mut panel = align(&[nasdaq()], &AlignConfig::default()).unwrap();
        panel.insert_series(&walcl()).unwrap();
        assert_eq!(panel.names(), &["nasdaq".to_string(), "walcl".to_string()]);
        assert_eq!(panel.value("walcl", 3), Some(7700.0));
        assert!(panel.insert_series(&walcl()).is_err());
    }

    #[test]
    fn column_series_drops_undefined_slots() {
        let panel = align(&[nasdaq(), walcl()], &AlignConfig::default()).unwrap();
        let col = panel.column_series("walcl").unwrap();
        assert_eq!(col.len(), 4);
        assert_eq!(col.first().unwrap().date, d("2024-01-03"));
        assert!(panel.column_series("missing").is_none());
    }
}
