//! FRED (St. Louis Fed) series provider.
//!
//! Uses the public `fredgraph.csv` endpoint, which needs no API key:
//!
//! ```text
//! observation_date,WALCL
//! 2024-01-03,7713908
//! 2024-01-10,.
//! ```
//!
//! The first column is the date, the second the value; `.` marks a missing
//! observation and is skipped.

use std::sync::Arc;

use chrono::NaiveDate;
use tracing::debug;

use super::circuit_breaker::CircuitBreaker;
use super::http::{HttpFetcher, RetryPolicy};
use super::provider::{non_empty, DataError, DataSource, FetchResult, SeriesProvider};
use crate::series::{Observation, TimeSeries};

/// FRED provider for macroeconomic series ids (`WALCL`, `WTREGEN`, `RRPONTSYD`, ...).
pub struct FredProvider {
    http: HttpFetcher,
}

impl FredProvider {
    pub fn new(circuit_breaker: Arc<CircuitBreaker>) -> Result<Self, DataError> {
        Self::with_policy(circuit_breaker, RetryPolicy::default())
    }

    pub fn with_policy(
        circuit_breaker: Arc<CircuitBreaker>,
        policy: RetryPolicy,
    ) -> Result<Self, DataError> {
        Ok(Self {
            http: HttpFetcher::new(circuit_breaker, policy)?,
        })
    }

    fn csv_url(series_id: &str, start: NaiveDate, end: NaiveDate) -> String {
        format!(
            "https://fred.stlouisfed.org/graph/fredgraph.csv?id={series_id}\
             &cosd={}&coed={}",
            start.format("%Y-%m-%d"),
            end.format("%Y-%m-%d")
        )
    }

    /// Parse a fredgraph CSV body into a series named after `series_id`.
    fn parse_csv(series_id: &str, body: &str) -> Result<TimeSeries, DataError> {
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .trim(csv::Trim::All)
            .from_reader(body.as_bytes());

        let headers = reader
            .headers()
            .map_err(|e| DataError::ResponseFormatChanged(format!("{series_id}: {e}")))?;
        if headers.len() < 2 {
            return Err(DataError::ResponseFormatChanged(format!(
                "{series_id}: expected date and value columns, got {}",
                headers.len()
            )));
        }

        let mut points = Vec::new();
        for (row, record) in reader.records().enumerate() {
            let record = record
                .map_err(|e| DataError::ResponseFormatChanged(format!("{series_id}: {e}")))?;
            let (Some(date_str), Some(value_str)) = (record.get(0), record.get(1)) else {
                continue;
            };

            let date = NaiveDate::parse_from_str(date_str, "%Y-%m-%d").map_err(|e| {
                DataError::ResponseFormatChanged(format!(
                    "{series_id}: bad date '{date_str}' on row {}: {e}",
                    row + 1
                ))
            })?;

            if value_str.is_empty() || value_str == "." {
                continue;
            }
            let value: f64 = value_str.parse().map_err(|e| {
                DataError::ResponseFormatChanged(format!(
                    "{series_id}: bad value '{value_str}' on {date}: {e}"
                ))
            })?;
            points.push(Observation::new(date, value));
        }

        Ok(TimeSeries::from_unsorted(series_id, points))
    }
}

impl SeriesProvider for FredProvider {
    fn name(&self) -> &str {
        "fred"
    }

    fn fetch_series(
        &self,
        identifier: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<FetchResult, DataError> {
        let url = Self::csv_url(identifier, start, end);
        let body = self
            .http
            .get(identifier, &url)?
            .text()
            .map_err(|e| DataError::NetworkUnreachable(e.to_string()))?;

        let series = Self::parse_csv(identifier, &body)?.between(start, end);
        debug!(identifier, points = series.len(), "parsed fred csv");
        non_empty(identifier, series, DataSource::Fred, start, end)
    }

    fn is_available(&self) -> bool {
        self.http.breaker().is_allowed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    #[test]
    fn csv_url_has_id_and_range() {
        let url = FredProvider::csv_url("WALCL", d("2021-10-18"), d("2024-10-18"));
        assert_eq!(
            url,
            "https://fred.stlouisfed.org/graph/fredgraph.csv?id=WALCL&cosd=2021-10-18&coed=2024-10-18"
        );
    }

    #[test]
    fn parses_and_skips_missing_markers() {
        let body = "observation_date,RRPONTSYD\n\
                    2024-01-02,701.5\n\
                    2024-01-03,.\n\
                    2024-01-04,689.25\n";
        let ts = FredProvider::parse_csv("RRPONTSYD", body).unwrap();
        assert_eq!(ts.len(), 2);
        assert_eq!(ts.value_on(d("2024-01-02")), Some(701.5));
        assert_eq!(ts.value_on(d("2024-01-03")), None);
        assert_eq!(ts.value_on(d("2024-01-04")), Some(689.25));
    }

    #[test]
    fn legacy_date_header_is_accepted() {
        let body = "DATE,WALCL\n2024-01-03,7713908\n";
        let ts = FredProvider::parse_csv("WALCL", body).unwrap();
        assert_eq!(ts.first().unwrap().value, 7_713_908.0);
    }

    #[test]
    fn html_body_is_format_change() {
        let body = "<!DOCTYPE html>\n<html><body>Error</body></html>\n";
        let err = FredProvider::parse_csv("NOPE", body).unwrap_err();
        assert!(matches!(err, DataError::ResponseFormatChanged(_)));
    }

    #[test]
    fn bad_value_is_format_change() {
        let body = "observation_date,WTREGEN\n2024-01-03,abc\n";
        let err = FredProvider::parse_csv("WTREGEN", body).unwrap_err();
        assert!(matches!(err, DataError::ResponseFormatChanged(_)));
    }
}
