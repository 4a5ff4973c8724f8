//! Yahoo Finance series provider.
//!
//! Fetches daily closes from Yahoo's v8 chart API for market symbols
//! (`^IXIC`, `JPY=X`, `BTC-USD`, ...). Retries and the circuit breaker live
//! in [`super::http`].
//!
//! Yahoo Finance has no official API and is subject to unannounced format
//! changes; parsing failures surface as [`DataError::ResponseFormatChanged`].

use std::sync::Arc;

use chrono::NaiveDate;
use serde::Deserialize;
use tracing::debug;

use super::circuit_breaker::CircuitBreaker;
use super::http::{HttpFetcher, RetryPolicy};
use super::provider::{non_empty, DataError, DataSource, FetchResult, SeriesProvider};
use crate::series::{Observation, TimeSeries};

/// Yahoo Finance v8 chart API response.
#[derive(Debug, Deserialize)]
struct ChartResponse {
    chart: ChartResult,
}

#[derive(Debug, Deserialize)]
struct ChartResult {
    result: Option<Vec<ChartData>>,
    error: Option<ChartError>,
}

#[derive(Debug, Deserialize)]
struct ChartError {
    code: String,
    description: String,
}

#[derive(Debug, Deserialize)]
struct ChartData {
    meta: Option<ChartMeta>,
    timestamp: Option<Vec<i64>>,
    indicators: Indicators,
}

#[derive(Debug, Deserialize)]
struct ChartMeta {
    gmtoffset: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct Indicators {
    quote: Vec<QuoteData>,
}

#[derive(Debug, Deserialize)]
struct QuoteData {
    close: Vec<Option<f64>>,
}

/// Yahoo Finance provider for daily closing prices.
pub struct YahooProvider {
    http: HttpFetcher,
}

impl YahooProvider {
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

    /// Build the chart API URL for a symbol and date range.
    fn chart_url(symbol: &str, start: NaiveDate, end: NaiveDate) -> String {
        let start_ts = start.and_time(chrono::NaiveTime::MIN).and_utc().timestamp();
        let end_ts = start_ts + (end - start).num_seconds() + 86_399;
        format!(
            "https://query2.finance.yahoo.com/v8/finance/chart/{symbol}\
             ?period1={start_ts}&period2={end_ts}&interval=1d"
        )
    }

    /// Parse a chart API body into a close-price series named after `symbol`.
    fn parse_response(symbol: &str, body: &str) -> Result<TimeSeries, DataError> {
        let resp: ChartResponse = serde_json::from_str(body).map_err(|e| {
            DataError::ResponseFormatChanged(format!("failed to parse response for {symbol}: {e}"))
        })?;

        let result = resp.chart.result.ok_or_else(|| match resp.chart.error {
            Some(err) if err.code == "Not Found" => DataError::SeriesNotFound {
                identifier: symbol.to_string(),
            },
            Some(err) => {
                DataError::ResponseFormatChanged(format!("{}: {}", err.code, err.description))
            }
            None => DataError::ResponseFormatChanged("empty result with no error".into()),
        })?;

        let data = result
            .into_iter()
            .next()
            .ok_or_else(|| DataError::ResponseFormatChanged("result array is empty".into()))?;

        // A symbol with no trades in range comes back without timestamps.
        let timestamps = data.timestamp.unwrap_or_default();
        let offset = data.meta.and_then(|m| m.gmtoffset).unwrap_or(0);

        let closes = data
            .indicators
            .quote
            .into_iter()
            .next()
            .map(|q| q.close)
            .unwrap_or_default();

        let mut points = Vec::with_capacity(timestamps.len());
        for (i, &ts) in timestamps.iter().enumerate() {
            // Skip null closes (holidays, halted sessions)
            let Some(close) = closes.get(i).copied().flatten() else {
                continue;
            };
            let date = chrono::DateTime::from_timestamp(ts + offset, 0)
                .map(|dt| dt.date_naive())
                .ok_or_else(|| {
                    DataError::ResponseFormatChanged(format!("invalid timestamp: {ts}"))
                })?;
            points.push(Observation::new(date, close));
        }

        Ok(TimeSeries::from_unsorted(symbol, points))
    }
}

impl SeriesProvider for YahooProvider {
    fn name(&self) -> &str {
        "yahoo_finance"
    }

    fn fetch_series(
        &self,
        identifier: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<FetchResult, DataError> {
        let url = Self::chart_url(identifier, start, end);
        let body = self
            .http
            .get(identifier, &url)?
            .text()
            .map_err(|e| DataError::NetworkUnreachable(e.to_string()))?;

        let series = Self::parse_response(identifier, &body)?.between(start, end);
        debug!(identifier, points = series.len(), "parsed yahoo chart");
        non_empty(identifier, series, DataSource::YahooFinance, start, end)
    }

    fn is_available(&self) -> bool {
        self.http.breaker().is_allowed()
    }
}
