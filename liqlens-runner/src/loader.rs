//! Panel loading for the dashboard.
//!
//! Given a [`DashboardConfig`], fetches every indicator from its source,
//! aligns the results onto one calendar, and derives net liquidity.
//! Failure policy:
//! 1. A series that cannot be fetched is recorded as a [`SeriesFailure`] and
//!    left out of the panel; everything else still loads.
//! 2. If the anchor of an anchored calendar fails, the panel fails as a whole.
//! 3. If net liquidity cannot be composed, the panel still loads without it
//!    and the reason is kept on the result.
//!
//! Offline mode swaps both sources for deterministic synthetic walks. Panels
//! built from synthetic data are tagged.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{NaiveDate, Weekday};
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info, warn};

use liqlens_core::align::{align, AlignError, AlignedPanel};
use liqlens_core::data::{
    CacheStats, CachedProvider, CircuitBreaker, DataError, DataSource, FetchProgress,
    FredProvider, Frequency, SeriesProvider, SyntheticProfile, SyntheticProvider, YahooProvider,
};
use liqlens_core::liquidity::{compose_on_panel, LiquidityError};
use liqlens_core::series::TimeSeries;

use crate::config::{DashboardConfig, SourceKind};

/// Errors that fail a whole panel load.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("anchor series '{anchor}' is unavailable: {reason}")]
    AnchorUnavailable { anchor: String, reason: String },

    #[error("no series could be loaded ({} failures)", .failures.len())]
    NothingLoaded { failures: Vec<SeriesFailure> },

    #[error("alignment failed: {0}")]
    Align(#[from] AlignError),
}

/// An indicator that could not be fetched.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SeriesFailure {
    pub name: String,
    pub identifier: String,
    pub reason: String,
}

/// One cached provider per source.
pub struct ProviderSet {
    yahoo: CachedProvider<Box<dyn SeriesProvider>>,
    fred: CachedProvider<Box<dyn SeriesProvider>>,
    offline: bool,
}

impl ProviderSet {
    /// Wrap arbitrary providers, each behind its own session cache.
    pub fn new(yahoo: Box<dyn SeriesProvider>, fred: Box<dyn SeriesProvider>, ttl: Duration) -> Self {
        Self {
            yahoo: CachedProvider::new(yahoo, ttl),
            fred: CachedProvider::new(fred, ttl),
            offline: false,
        }
    }

    /// Live Yahoo Finance and FRED providers, each with its own circuit breaker.
    pub fn live(ttl: Duration) -> Result<Self, DataError> {
        let yahoo = YahooProvider::new(Arc::new(CircuitBreaker::default_provider()))?;
        let fred = FredProvider::new(Arc::new(CircuitBreaker::default_provider()))?;
        Ok(Self::new(Box::new(yahoo), Box::new(fred), ttl))
    }

    /// Synthetic stand-ins for both sources. Never touches the network.
    pub fn offline(ttl: Duration) -> Self {
        let synthetic = offline_provider();
        let mut set = Self::new(Box::new(synthetic.clone()), Box::new(synthetic), ttl);
        set.offline = true;
        set
    }

    pub fn is_offline(&self) -> bool {
        self.offline
    }

    pub fn provider(&self, source: SourceKind) -> &dyn SeriesProvider {
        match source {
            SourceKind::Yahoo => &self.yahoo,
            SourceKind::Fred => &self.fred,
        }
    }

    /// Combined cache counters over both sources.
    pub fn cache_stats(&self) -> CacheStats {
        let (a, b) = (self.yahoo.stats(), self.fred.stats());
        CacheStats {
            hits: a.hits + b.hits,
            misses: a.misses + b.misses,
            entries: a.entries + b.entries,
        }
    }

    pub fn clear_cache(&self) {
        self.yahoo.clear();
        self.fred.clear();
    }

    pub fn purge_expired(&self) -> usize {
        self.yahoo.purge_expired() + self.fred.purge_expired()
    }
}

/// Synthetic provider shaped like the stock indicators.
///
/// Levels and frequencies follow the real series closely enough for the
/// liquidity units and calendars to behave as they do online.
pub fn offline_provider() -> SyntheticProvider {
    let daily = |level: f64, step: f64| SyntheticProfile {
        level,
        step,
        frequency: Frequency::BusinessDays,
    };
    let weekly = |level: f64, step: f64| SyntheticProfile {
        level,
        step,
        frequency: Frequency::Weekly(Weekday::Wed),
    };
    SyntheticProvider::new()
        .with_profile("^IXIC", daily(15_000.0, 0.015))
        .with_profile("JPY=X", daily(145.0, 0.006))
        .with_profile(
            "BTC-USD",
            SyntheticProfile {
                level: 40_000.0,
                step: 0.04,
                frequency: Frequency::Daily,
            },
        )
        .with_profile("^VIX", daily(18.0, 0.06))
        .with_profile("TLT", daily(95.0, 0.01))
        .with_profile("GC=F", daily(2_000.0, 0.01))
        // FRED: WALCL in millions, the others in billions
        .with_profile("WALCL", weekly(7_500_000.0, 0.003))
        .with_profile("WTREGEN", weekly(750.0, 0.03))
        .with_profile("RRPONTSYD", daily(500.0, 0.03))
}

/// Result of loading a panel, including provenance.
#[derive(Debug, Clone)]
pub struct LoadedPanel {
    /// Aligned indicator columns, plus net liquidity when it composed.
    pub panel: AlignedPanel,
    pub start: NaiveDate,
    pub end: NaiveDate,
    /// Data source per loaded indicator.
    pub sources: HashMap<String, DataSource>,
    pub failures: Vec<SeriesFailure>,
    /// Why net liquidity is missing, if it is.
    pub liquidity_error: Option<LiquidityError>,
    /// BLAKE3 over names, dates and values of the panel.
    pub dataset_hash: String,
    pub has_synthetic: bool,
}

impl LoadedPanel {
    pub fn failure(&self, name: &str) -> Option<&SeriesFailure> {
        self.failures.iter().find(|f| f.name == name)
    }
}

/// Fetch, align and derive the dashboard panel over `[start, end]`.
pub fn load_panel(
    config: &DashboardConfig,
    providers: &ProviderSet,
    progress: Option<&dyn FetchProgress>,
    start: NaiveDate,
    end: NaiveDate,
) -> Result<LoadedPanel, LoadError> {
    let total = config.indicators.len();
    let mut series: Vec<TimeSeries> = Vec::with_capacity(total);
    let mut sources: HashMap<String, DataSource> = HashMap::new();
    let mut failures: Vec<SeriesFailure> = Vec::new();

    for (i, ind) in config.indicators.iter().enumerate() {
        if let Some(p) = progress {
            p.on_start(&ind.name, i, total);
        }
        let provider = providers.provider(ind.source);

        match provider.fetch_series(&ind.identifier, start, end) {
            Ok(fetched) => {
                debug!(
                    series = %ind.name,
                    points = fetched.series.len(),
                    cached = fetched.cached,
                    "series loaded"
                );
                sources.insert(ind.name.clone(), fetched.source);
                series.push(fetched.series.renamed(ind.name.as_str()));
                if let Some(p) = progress {
                    p.on_complete(&ind.name, i, total, &Ok(()));
                }
            }
            Err(e) => {
                warn!(series = %ind.name, identifier = %ind.identifier, error = %e, "series unavailable");
                failures.push(SeriesFailure {
                    name: ind.name.clone(),
                    identifier: ind.identifier.clone(),
                    reason: e.to_string(),
                });
                if let Some(p) = progress {
                    p.on_complete(&ind.name, i, total, &Err(e));
                }
            }
        }
    }

    if let Some(p) = progress {
        p.on_batch_complete(series.len(), failures.len(), total);
    }

    if series.is_empty() {
        return Err(LoadError::NothingLoaded { failures });
    }
    if let Some(anchor) = config.alignment.anchor() {
        if let Some(f) = failures.iter().find(|f| f.name == anchor) {
            return Err(LoadError::AnchorUnavailable {
                anchor: anchor.to_string(),
                reason: f.reason.clone(),
            });
        }
    }

    let mut panel = align(&series, &config.alignment.to_align_config())?;

    let liquidity_error = match compose_on_panel(
        &panel,
        &config.liquidity.component_names(),
        config.liquidity_units(),
    ) {
        Ok(net) => {
            panel.insert_series(&net.renamed(config.liquidity.output.as_str()))?;
            None
        }
        Err(e) => {
            warn!(error = %e, "net liquidity not available");
            Some(e)
        }
    };

    let has_synthetic = sources.values().any(|s| *s == DataSource::Synthetic);
    let dataset_hash = compute_dataset_hash(&panel);

    info!(
        rows = panel.len(),
        columns = panel.names().len(),
        failed = failures.len(),
        synthetic = has_synthetic,
        "panel ready"
    );

    Ok(LoadedPanel {
        panel,
        start,
        end,
        sources,
        failures,
        liquidity_error,
        dataset_hash,
        has_synthetic,
    })
}

/// Deterministic BLAKE3 hash over a panel.
///
/// Covers column names in panel order, every index date, and every slot
/// (with a marker for undefined slots).
pub fn compute_dataset_hash(panel: &AlignedPanel) -> String {
    let mut hasher = blake3::Hasher::new();

    for name in panel.names() {
        hasher.update(name.as_bytes());
        hasher.update(&[0]);
    }
    for (row, date) in panel.dates().iter().enumerate() {
        hasher.update(date.to_string().as_bytes());
        for value in panel.row(row) {
            match value {
                Some(v) => hasher.update(&v.to_le_bytes()),
                None => hasher.update(b"-"),
            };
        }
    }

    hasher.finalize().to_hex().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::IndicatorSpec;
    use liqlens_core::data::FetchResult;

    fn d(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    /// Synthetic provider that refuses a fixed set of identifiers.
    struct Flaky {
        inner: SyntheticProvider,
        refuse: Vec<&'static str>,
    }

    impl SeriesProvider for Flaky {
        fn name(&self) -> &str {
            "flaky"
        }

        fn fetch_series(
            &self,
            identifier: &str,
            start: NaiveDate,
            end: NaiveDate,
        ) -> Result<FetchResult, DataError> {
            if self.refuse.iter().any(|r| *r == identifier) {
                return Err(DataError::NetworkUnreachable(format!("{identifier}: timed out")));
            }
            self.inner.fetch_series(identifier, start, end)
        }

        fn is_available(&self) -> bool {
            true
        }
    }

    fn flaky_set(yahoo_refuse: Vec<&'static str>, fred_refuse: Vec<&'static str>) -> ProviderSet {
        ProviderSet::new(
            Box::new(Flaky {
                inner: offline_provider(),
                refuse: yahoo_refuse,
            }),
            Box::new(Flaky {
                inner: offline_provider(),
                refuse: fred_refuse,
            }),
            Duration::from_secs(60),
        )
    }

    fn range() -> (NaiveDate, NaiveDate) {
        (d("2024-01-01"), d("2024-06-30"))
    }

    #[test]
    fn offline_panel_has_every_column_and_liquidity() {
        let config = DashboardConfig::default();
        let providers = ProviderSet::offline(Duration::from_secs(60));
        let (start, end) = range();

        let loaded = load_panel(&config, &providers, None, start, end).unwrap();

        assert!(loaded.failures.is_empty());
        assert!(loaded.has_synthetic);
        assert!(loaded.liquidity_error.is_none());
        assert_eq!(loaded.panel.names().len(), 10);
        assert!(loaded.panel.contains("net_liquidity"));
        assert_eq!(loaded.sources["walcl"], DataSource::Synthetic);
    }

    #[test]
    fn failing_series_is_isolated() {
        let config = DashboardConfig::default();
        let providers = flaky_set(vec!["BTC-USD"], vec![]);
        let (start, end) = range();

        let loaded = load_panel(&config, &providers, None, start, end).unwrap();

        assert_eq!(loaded.failures.len(), 1);
        let f = loaded.failure("btc").unwrap();
        assert_eq!(f.identifier, "BTC-USD");
        assert!(f.reason.contains("timed out"));
        assert!(!loaded.panel.contains("btc"));
        assert!(loaded.panel.contains("nasdaq"));
        assert!(loaded.panel.contains("net_liquidity"));
    }

    #[test]
    fn missing_component_drops_only_liquidity() {
        let config = DashboardConfig::default();
        let providers = flaky_set(vec![], vec!["WTREGEN"]);
        let (start, end) = range();

        let loaded = load_panel(&config, &providers, None, start, end).unwrap();

        assert!(!loaded.panel.contains("net_liquidity"));
        assert!(matches!(
            loaded.liquidity_error,
            Some(LiquidityError::MissingComponent(_))
        ));
        assert!(loaded.panel.contains("walcl"));
    }

    #[test]
    fn anchor_failure_fails_the_panel() {
        let config = DashboardConfig::default();
        let providers = flaky_set(vec!["^IXIC"], vec![]);
        let (start, end) = range();

        let err = load_panel(&config, &providers, None, start, end).unwrap_err();
        assert!(matches!(err, LoadError::AnchorUnavailable { ref anchor, .. } if anchor == "nasdaq"));
    }

    #[test]
    fn nothing_loaded_is_an_error() {
        let mut config = DashboardConfig::default();
        config.indicators = vec![IndicatorSpec::yahoo("nasdaq", "^IXIC", "")];
        let providers = flaky_set(vec!["^IXIC"], vec![]);
        let (start, end) = range();

        let err = load_panel(&config, &providers, None, start, end).unwrap_err();
        match err {
            LoadError::NothingLoaded { failures } => assert_eq!(failures.len(), 1),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn second_load_is_served_from_cache() {
        let config = DashboardConfig::default();
        let providers = ProviderSet::offline(Duration::from_secs(60));
        let (start, end) = range();

        let a = load_panel(&config, &providers, None, start, end).unwrap();
        let b = load_panel(&config, &providers, None, start, end).unwrap();

        assert_eq!(a.dataset_hash, b.dataset_hash);
        let stats = providers.cache_stats();
        assert_eq!(stats.misses, 9);
        assert_eq!(stats.hits, 9);

        providers.clear_cache();
        assert_eq!(providers.cache_stats().entries, 0);
    }

    #[test]
    fn dataset_hash_tracks_content() {
        let config = DashboardConfig::default();
        let providers = ProviderSet::offline(Duration::from_secs(60));

        let a = load_panel(&config, &providers, None, d("2024-01-01"), d("2024-06-30")).unwrap();
        let b = load_panel(&config, &providers, None, d("2024-01-01"), d("2024-07-31")).unwrap();
        assert_ne!(a.dataset_hash, b.dataset_hash);
    }
}
