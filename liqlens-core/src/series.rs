//! Time series: a named, strictly ordered sequence of dated observations.
//!
//! Every series in the workspace goes through one of two constructors:
//! - [`TimeSeries::new`] validates input and rejects anything out of order,
//!   duplicated, or non-finite.
//! - [`TimeSeries::from_unsorted`] normalizes raw provider output (sort,
//!   drop non-finite values, last observation wins on duplicate dates).
//!
//! After construction the invariant holds: dates strictly increase and
//! every value is finite.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A single dated value.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    pub date: NaiveDate,
    pub value: f64,
}

impl Observation {
    pub fn new(date: NaiveDate, value: f64) -> Self {
        Self { date, value }
    }
}

/// Validation failures for [`TimeSeries::new`].
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SeriesError {
    #[error("series '{name}': observation on {date} is out of order")]
    OutOfOrder { name: String, date: NaiveDate },

    #[error("series '{name}': duplicate observation on {date}")]
    DuplicateDate { name: String, date: NaiveDate },

    #[error("series '{name}': non-finite value on {date}")]
    NonFinite { name: String, date: NaiveDate },
}

/// Named, ordered time series with one finite value per date.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TimeSeries {
    name: String,
    points: Vec<Observation>,
}

impl TimeSeries {
    /// Build a series, rejecting unordered, duplicated, or non-finite input.
    pub fn new(name: impl Into<String>, points: Vec<Observation>) -> Result<Self, SeriesError> {
        let name = name.into();
        for (i, p) in points.iter().enumerate() {
            if !p.value.is_finite() {
                return Err(SeriesError::NonFinite {
                    name,
                    date: p.date,
                });
            }
            if i > 0 {
                let prev = points[i - 1].date;
                if p.date == prev {
                    return Err(SeriesError::DuplicateDate {
                        name,
                        date: p.date,
                    });
                }
                if p.date < prev {
                    return Err(SeriesError::OutOfOrder {
                        name,
                        date: p.date,
                    });
                }
            }
        }
        Ok(Self { name, points })
    }

    /// Build a series from `(date, value)` pairs with validation.
    pub fn from_pairs(
        name: impl Into<String>,
        pairs: impl IntoIterator<Item = (NaiveDate, f64)>,
    ) -> Result<Self, SeriesError> {
        let points = pairs
            .into_iter()
            .map(|(date, value)| Observation::new(date, value))
            .collect();
        Self::new(name, points)
    }

    /// Normalize raw provider output into a valid series.
    ///
    /// Non-finite values are dropped, observations are sorted by date, and
    /// when a date repeats the last observation in input order wins.
    pub fn from_unsorted(name: impl Into<String>, mut points: Vec<Observation>) -> Self {
        points.retain(|p| p.value.is_finite());
        // Stable sort keeps input order among equal dates.
        points.sort_by_key(|p| p.date);

        let mut out: Vec<Observation> = Vec::with_capacity(points.len());
        for p in points {
            match out.last_mut() {
                Some(last) if last.date == p.date => *last = p,
                _ => out.push(p),
            }
        }

        Self {
            name: name.into(),
            points: out,
        }
    }

    /// An empty series with the given name.
    pub fn empty(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            points: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Same data under a different name.
    pub fn renamed(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn points(&self) -> &[Observation] {
        &self.points
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn first(&self) -> Option<&Observation> {
        self.points.first()
    }

    pub fn last(&self) -> Option<&Observation> {
        self.points.last()
    }

    pub fn dates(&self) -> impl Iterator<Item = NaiveDate> + '_ {
        self.points.iter().map(|p| p.date)
    }

    pub fn values(&self) -> impl Iterator<Item = f64> + '_ {
        self.points.iter().map(|p| p.value)
    }

    /// Value observed exactly on `date`.
    pub fn value_on(&self, date: NaiveDate) -> Option<f64> {
        self.points
            .binary_search_by_key(&date, |p| p.date)
            .ok()
            .map(|i| self.points[i].value)
    }

    /// Most recent value observed on or before `date`.
    pub fn value_as_of(&self, date: NaiveDate) -> Option<f64> {
        let idx = self.points.partition_point(|p| p.date <= date);
        if idx == 0 {
            None
        } else {
            Some(self.points[idx - 1].value)
        }
    }

    /// Observations with `start <= date <= end`.
    pub fn between(&self, start: NaiveDate, end: NaiveDate) -> TimeSeries {
        let lo = self.points.partition_point(|p| p.date < start);
        let hi = self.points.partition_point(|p| p.date <= end);
        let points = if lo < hi {
            self.points[lo..hi].to_vec()
        } else {
            Vec::new()
        };
        Self {
            name: self.name.clone(),
            points,
        }
    }

    /// Multiply every value by `factor` (unit conversion).
    pub fn scaled(&self, factor: f64) -> TimeSeries {
        Self {
            name: self.name.clone(),
            points: self
                .points
                .iter()
                .map(|p| Observation::new(p.date, p.value * factor))
                .collect(),
        }
    }
}
