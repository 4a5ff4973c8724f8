//! Synthetic series provider for offline runs and tests.
//!
//! Produces a deterministic random walk per identifier. The RNG seed is the
//! BLAKE3 hash of the identifier, so the same identifier and range always
//! yield the same series. Results are tagged [`DataSource::Synthetic`] and
//! must never be mistaken for market data.

use std::collections::HashMap;

use chrono::{Datelike, NaiveDate, Weekday};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use super::provider::{non_empty, DataError, DataSource, FetchResult, SeriesProvider};
use crate::series::{Observation, TimeSeries};

/// Observation calendar of a synthetic series.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Frequency {
    /// Monday to Friday.
    BusinessDays,
    /// Once a week on the given weekday (FRED's H.4.1 releases are Wednesdays).
    Weekly(Weekday),
    /// Every calendar day (crypto).
    Daily,
}

impl Frequency {
    fn includes(self, date: NaiveDate) -> bool {
        match self {
            Frequency::BusinessDays => !matches!(date.weekday(), Weekday::Sat | Weekday::Sun),
            Frequency::Weekly(day) => date.weekday() == day,
            Frequency::Daily => true,
        }
    }
}

/// Shape of one synthetic series.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SyntheticProfile {
    /// First value of the walk.
    pub level: f64,
    /// Maximum absolute per-step return.
    pub step: f64,
    pub frequency: Frequency,
}

impl Default for SyntheticProfile {
    fn default() -> Self {
        Self {
            level: 100.0,
            step: 0.02,
            frequency: Frequency::BusinessDays,
        }
    }
}

/// Provider that fabricates deterministic random walks.
#[derive(Debug, Clone, Default)]
pub struct SyntheticProvider {
    profiles: HashMap<String, SyntheticProfile>,
    default_profile: SyntheticProfile,
}

impl SyntheticProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Use `profile` for `identifier` instead of the default.
    pub fn with_profile(mut self, identifier: impl Into<String>, profile: SyntheticProfile) -> Self {
        self.profiles.insert(identifier.into(), profile);
        self
    }

    fn profile(&self, identifier: &str) -> SyntheticProfile {
        self.profiles
            .get(identifier)
            .copied()
            .unwrap_or(self.default_profile)
    }

    /// Generate the walk for `identifier` over `[start, end]`.
    pub fn generate(&self, identifier: &str, start: NaiveDate, end: NaiveDate) -> TimeSeries {
        let profile = self.profile(identifier);
        let seed: [u8; 32] = *blake3::hash(identifier.as_bytes()).as_bytes();
        let mut rng = StdRng::from_seed(seed);

        let mut points = Vec::new();
        let mut value = profile.level;
        let step = profile.step.abs();

        for date in start.iter_days().take_while(|d| *d <= end) {
            if !profile.frequency.includes(date) {
                continue;
            }
            points.push(Observation::new(date, value));
            let ret: f64 = if step > 0.0 {
                rng.gen_range(-step..step)
            } else {
                0.0
            };
            value *= 1.0 + ret;
        }

        TimeSeries::from_unsorted(identifier, points)
    }
}

impl SeriesProvider for SyntheticProvider {
    fn name(&self) -> &str {
        "synthetic"
    }

    fn fetch_series(
        &self,
        identifier: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<FetchResult, DataError> {
        let series = self.generate(identifier, start, end);
        non_empty(identifier, series, DataSource::Synthetic, start, end)
    }

    fn is_available(&self) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    #[test]
    fn same_identifier_is_deterministic() {
        let p = SyntheticProvider::new();
        let a = p.generate("^IXIC", d("2024-01-01"), d("2024-03-31"));
        let b = p.generate("^IXIC", d("2024-01-01"), d("2024-03-31"));
        assert_eq!(a, b);
        assert!(!a.is_empty());
    }

    #[test]
    fn different_identifiers_diverge() {
        let p = SyntheticProvider::new();
        let a = p.generate("^IXIC", d("2024-01-01"), d("2024-01-31"));
        let b = p.generate("JPY=X", d("2024-01-01"), d("2024-01-31"));
        assert_eq!(a.len(), b.len());
        assert_ne!(a.last().unwrap().value, b.last().unwrap().value);
    }

    #[test]
    fn business_days_skip_weekends() {
        let p = SyntheticProvider::new();
        // 2024-01-06/07 is a weekend
        let ts = p.generate("X", d("2024-01-01"), d("2024-01-07"));
        assert_eq!(ts.len(), 5);
        assert!(ts.dates().all(|d| d.weekday() != Weekday::Sat && d.weekday() != Weekday::Sun));
    }

    #[test]
    fn weekly_profile_emits_one_point_per_week() {
        let p = SyntheticProvider::new().with_profile(
            "WALCL",
            SyntheticProfile {
                level: 7_500_000.0,
                step: 0.005,
                frequency: Frequency::Weekly(Weekday::Wed),
            },
        );
        let ts = p.generate("WALCL", d("2024-01-01"), d("2024-01-31"));
        // Wednesdays: Jan 3, 10, 17, 24, 31
        assert_eq!(ts.len(), 5);
        assert_eq!(ts.first().unwrap().value, 7_500_000.0);
    }

    #[test]
    fn empty_range_is_no_data() {
        let p = SyntheticProvider::new();
        let err = p
            .fetch_series("X", d("2024-01-06"), d("2024-01-07"))
            .unwrap_err();
        assert!(matches!(err, DataError::NoData { .. }));
    }

    #[test]
    fn fetch_is_tagged_synthetic() {
        let p = SyntheticProvider::new();
        let res = p.fetch_series("BTC-USD", d("2024-01-01"), d("2024-01-10")).unwrap();
        assert_eq!(res.source, DataSource::Synthetic);
        assert_eq!(res.identifier, "BTC-USD");
    }
}
