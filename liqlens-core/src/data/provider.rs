//! Series provider trait and structured error types.
//!
//! The SeriesProvider trait abstracts over data sources (Yahoo Finance, FRED,
//! synthetic) so the loader can route each indicator to its source and tests
//! can substitute in-memory providers.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};

use crate::series::TimeSeries;

/// Structured error types for data operations.
///
/// These are designed to be displayable in CLI output and in per-series
/// failure reports.
#[derive(Debug, Error)]
pub enum DataError {
    #[error("network unreachable: {0}")]
    NetworkUnreachable(String),

    #[error("rate limited by provider (retry after {retry_after_secs}s)")]
    RateLimited { retry_after_secs: u64 },

    #[error("response format changed: {0}")]
    ResponseFormatChanged(String),

    #[error("series not found: {identifier}")]
    SeriesNotFound { identifier: String },

    #[error("no data for '{identifier}' between {start} and {end}")]
    NoData {
        identifier: String,
        start: NaiveDate,
        end: NaiveDate,
    },

    #[error("hard stop: data provider has blocked requests (circuit breaker tripped)")]
    CircuitBreakerTripped,

    #[error("http client error: {0}")]
    Client(String),

    #[error("data error: {0}")]
    Other(String),
}

impl DataError {
    /// True for the "provider has nothing for this identifier/range" family.
    pub fn is_unavailable(&self) -> bool {
        matches!(
            self,
            DataError::SeriesNotFound { .. } | DataError::NoData { .. }
        )
    }
}

/// Where a series came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DataSource {
    YahooFinance,
    Fred,
    Synthetic,
}

/// Result of a successful fetch for a single identifier.
#[derive(Debug, Clone)]
pub struct FetchResult {
    pub identifier: String,
    pub series: TimeSeries,
    pub source: DataSource,
    /// True when served from a session cache rather than the provider.
    pub cached: bool,
}

/// Trait for series providers (Yahoo Finance, FRED, synthetic).
///
/// Implementations handle the specifics of one source. Caching sits above
/// this trait in [`super::cache::CachedProvider`]; providers don't know about it.
pub trait SeriesProvider: Send + Sync {
    /// Human-readable name of this provider.
    fn name(&self) -> &str;

    /// Fetch the series for `identifier` over `[start, end]`.
    ///
    /// An identifier with no observations in range is a
    /// [`DataError::NoData`], never an empty success.
    fn fetch_series(
        &self,
        identifier: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<FetchResult, DataError>;

    /// Check if the provider is currently available (not rate-limited, not blocked).
    fn is_available(&self) -> bool;
}

impl<P: SeriesProvider + ?Sized> SeriesProvider for Box<P> {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn fetch_series(
        &self,
        identifier: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<FetchResult, DataError> {
        (**self).fetch_series(identifier, start, end)
    }

    fn is_available(&self) -> bool {
        (**self).is_available()
    }
}

/// Progress callback for multi-series loads.
pub trait FetchProgress {
    /// Called when starting to fetch a series.
    fn on_start(&self, name: &str, index: usize, total: usize);

    /// Called when a series fetch completes.
    fn on_complete(&self, name: &str, index: usize, total: usize, result: &Result<(), DataError>);

    /// Called when the entire batch is done.
    fn on_batch_complete(&self, succeeded: usize, failed: usize, total: usize);
}

/// Progress reporter that emits tracing events.
pub struct LogProgress;

impl FetchProgress for LogProgress {
    fn on_start(&self, name: &str, index: usize, total: usize) {
        info!(series = name, "[{}/{}] fetching", index + 1, total);
    }

    fn on_complete(&self, name: &str, _index: usize, _total: usize, result: &Result<(), DataError>) {
        match result {
            Ok(()) => info!(series = name, "fetched"),
            Err(e) => warn!(series = name, error = %e, "fetch failed"),
        }
    }

    fn on_batch_complete(&self, succeeded: usize, failed: usize, total: usize) {
        info!(succeeded, failed, total, "load complete");
    }
}

/// Turn a fetched series into a [`FetchResult`], mapping empty output to
/// [`DataError::NoData`].
pub(crate) fn non_empty(
    identifier: &str,
    series: TimeSeries,
    source: DataSource,
    start: NaiveDate,
    end: NaiveDate,
) -> Result<FetchResult, DataError> {
    if series.is_empty() {
        return Err(DataError::NoData {
            identifier: identifier.to_string(),
            start,
            end,
        });
    }
    Ok(FetchResult {
        identifier: identifier.to_string(),
        series,
        source,
        cached: false,
    })
}
