//! Dashboard session: request-driven recomputation over one loaded panel.
//!
//! A session owns its configuration, its providers (and therefore its fetch
//! cache), and the most recently loaded panel. Changing anything that shapes
//! the panel drops it; the next request reloads, with repeat fetches served
//! from the cache until the TTL expires. Backtests and correlations are
//! recomputed on every call and never stored.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

use liqlens_core::backtest::{run_on_panel, BacktestError, BacktestResult, ParamError};
use liqlens_core::correlation::{complete_correlation_table, Correlation};
use liqlens_core::data::{CacheStats, FetchProgress};

use crate::config::{AlignmentSettings, BacktestSettings, ConfigError, DashboardConfig};
use crate::loader::{load_panel, LoadError, LoadedPanel, ProviderSet};

/// Current schema version for exported reports.
pub const SCHEMA_VERSION: u32 = 1;

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("config error: {0}")]
    Config(#[from] ConfigError),
    #[error("load error: {0}")]
    Load(#[from] LoadError),
    #[error("backtest error: {0}")]
    Backtest(#[from] BacktestError),
    #[error("invalid backtest parameters: {0}")]
    Params(#[from] ParamError),
    #[error("series '{0}' is not in the panel")]
    UnknownSeries(String),
    #[error("series '{0}' has too few observations to correlate")]
    NotCorrelatable(String),
}

/// A backtest result with the provenance of the panel it ran on.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BacktestReport {
    #[serde(default = "default_schema_version")]
    pub schema_version: u32,
    pub dataset_hash: String,
    pub has_synthetic: bool,
    pub start: NaiveDate,
    pub end: NaiveDate,
    /// BLAKE3 digest of the aggregate statistics.
    pub digest: String,
    pub result: BacktestResult,
}

fn default_schema_version() -> u32 {
    SCHEMA_VERSION
}

pub struct Session {
    config: DashboardConfig,
    providers: ProviderSet,
    today: NaiveDate,
    loaded: Option<LoadedPanel>,
}

impl Session {
    /// Validate `config` and start a session ending today (local date).
    pub fn new(config: DashboardConfig, providers: ProviderSet) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            config,
            providers,
            today: chrono::Local::now().date_naive(),
            loaded: None,
        })
    }

    /// Pin the end of the date range.
    pub fn with_today(mut self, today: NaiveDate) -> Self {
        self.today = today;
        self.loaded = None;
        self
    }

    pub fn config(&self) -> &DashboardConfig {
        &self.config
    }

    pub fn providers(&self) -> &ProviderSet {
        &self.providers
    }

    pub fn date_range(&self) -> (NaiveDate, NaiveDate) {
        self.config.date_range(self.today)
    }

    /// The current panel, loading it on first use.
    pub fn panel(&mut self) -> Result<&LoadedPanel, LoadError> {
        self.panel_with_progress(None)
    }

    pub fn panel_with_progress(
        &mut self,
        progress: Option<&dyn FetchProgress>,
    ) -> Result<&LoadedPanel, LoadError> {
        let loaded = match self.loaded.take() {
            Some(loaded) => loaded,
            None => {
                let (start, end) = self.date_range();
                load_panel(&self.config, &self.providers, progress, start, end)?
            }
        };
        Ok(self.loaded.insert(loaded))
    }

    /// Drop the panel and load again. Cached fetches are reused.
    pub fn refresh(&mut self) -> Result<&LoadedPanel, LoadError> {
        self.loaded = None;
        self.panel()
    }

    /// Drop the panel and the fetch cache, then load again.
    pub fn hard_refresh(&mut self) -> Result<&LoadedPanel, LoadError> {
        self.providers.clear_cache();
        self.refresh()
    }

    pub fn set_years_back(&mut self, years: u32) -> Result<(), ConfigError> {
        self.update(|c| c.data.years_back = years)
    }

    pub fn set_alignment(&mut self, alignment: AlignmentSettings) -> Result<(), ConfigError> {
        self.update(|c| c.alignment = alignment)
    }

    /// Backtest settings do not shape the panel, so it is kept.
    pub fn set_backtest(&mut self, backtest: BacktestSettings) -> Result<(), ConfigError> {
        let mut next = self.config.clone();
        next.backtest = backtest;
        next.validate()?;
        self.config = next;
        Ok(())
    }

    /// Apply a panel-shaping change; the old config stays if the new one is invalid.
    fn update(&mut self, change: impl FnOnce(&mut DashboardConfig)) -> Result<(), ConfigError> {
        let mut next = self.config.clone();
        change(&mut next);
        next.validate()?;
        self.config = next;
        self.loaded = None;
        Ok(())
    }

    /// Run the configured backtest.
    pub fn backtest(&mut self) -> Result<BacktestReport, SessionError> {
        let settings = self.config.backtest.clone();
        self.backtest_with(&settings)
    }

    /// Run a backtest with explicit settings, leaving the config unchanged.
    pub fn backtest_with(
        &mut self,
        settings: &BacktestSettings,
    ) -> Result<BacktestReport, SessionError> {
        let params = settings.to_params()?;
        let loaded = self.panel()?;
        let result = run_on_panel(&loaded.panel, &settings.driver, &settings.target, &params)?;

        info!(
            driver = %settings.driver,
            target = %settings.target,
            events = result.event_count,
            resolved = result.resolved_count,
            "backtest complete"
        );

        Ok(BacktestReport {
            schema_version: SCHEMA_VERSION,
            dataset_hash: loaded.dataset_hash.clone(),
            has_synthetic: loaded.has_synthetic,
            start: loaded.start,
            end: loaded.end,
            digest: result.digest(),
            result,
        })
    }

    /// Correlation of every panel column with `target`, over rows where
    /// every column is defined.
    pub fn correlations(&mut self, target: &str) -> Result<Vec<Correlation>, SessionError> {
        let loaded = self.panel()?;
        if !loaded.panel.contains(target) {
            return Err(SessionError::UnknownSeries(target.to_string()));
        }
        complete_correlation_table(&loaded.panel, target)
            .ok_or_else(|| SessionError::NotCorrelatable(target.to_string()))
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.providers.cache_stats()
    }
}
