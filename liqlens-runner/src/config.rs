//! Dashboard configuration loaded from TOML.
//!
//! Every section has defaults, so an empty file (or no file) reproduces the
//! stock dashboard: six Yahoo market series, three FRED balance-sheet series,
//! three years of history, and the USD/JPY carry-unwind backtest.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use liqlens_core::align::{AlignConfig, Calendar, FillPolicy};
use liqlens_core::backtest::{ClusterPolicy, Direction, EventParams, ParamError};
use liqlens_core::liquidity::{ComponentNames, LiquidityUnits, Units, NET_LIQUIDITY};

/// Longest history the loader will request.
pub const MAX_YEARS_BACK: u32 = 30;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("no indicators configured")]
    NoIndicators,

    #[error("indicator '{0}' is defined more than once")]
    DuplicateIndicator(String),

    #[error("indicator '{0}' has an empty identifier")]
    EmptyIdentifier(String),

    #[error("[{section}] refers to unknown series '{name}'")]
    UnknownReference { section: &'static str, name: String },

    #[error("liquidity output '{0}' clashes with an indicator name")]
    OutputCollision(String),

    #[error("years_back must be between 1 and {max} (got {0})", max = MAX_YEARS_BACK)]
    InvalidYearsBack(u32),

    #[error("invalid backtest parameters: {0}")]
    InvalidBacktest(#[from] ParamError),
}

/// Where an indicator is fetched from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    Yahoo,
    Fred,
}

/// One configured series.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndicatorSpec {
    /// Column name in the panel.
    pub name: String,
    pub source: SourceKind,
    /// Yahoo symbol or FRED series id.
    pub identifier: String,
    #[serde(default)]
    pub label: String,
    /// Reporting units; only consulted for liquidity components.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub units: Option<Units>,
}

impl IndicatorSpec {
    pub fn yahoo(name: &str, identifier: &str, label: &str) -> Self {
        Self {
            name: name.into(),
            source: SourceKind::Yahoo,
            identifier: identifier.into(),
            label: label.into(),
            units: None,
        }
    }

    pub fn fred(name: &str, identifier: &str, label: &str, units: Units) -> Self {
        Self {
            name: name.into(),
            source: SourceKind::Fred,
            identifier: identifier.into(),
            label: label.into(),
            units: Some(units),
        }
    }

    /// Label for display, falling back to the name.
    pub fn display_label(&self) -> &str {
        if self.label.is_empty() {
            &self.name
        } else {
            &self.label
        }
    }
}

/// The stock indicator catalog.
pub fn default_indicators() -> Vec<IndicatorSpec> {
    vec![
        IndicatorSpec::yahoo("nasdaq", "^IXIC", "Nasdaq Composite"),
        IndicatorSpec::yahoo("usd_jpy", "JPY=X", "USD/JPY"),
        IndicatorSpec::yahoo("btc", "BTC-USD", "Bitcoin"),
        IndicatorSpec::yahoo("vix", "^VIX", "VIX"),
        IndicatorSpec::yahoo("tlt", "TLT", "20+ Year Treasury Bond ETF"),
        IndicatorSpec::yahoo("gold", "GC=F", "Gold Futures"),
        IndicatorSpec::fred("walcl", "WALCL", "Fed Balance Sheet", Units::Millions),
        IndicatorSpec::fred("tga", "WTREGEN", "Treasury General Account", Units::Billions),
        IndicatorSpec::fred("rrp", "RRPONTSYD", "Overnight Reverse Repo", Units::Billions),
    ]
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DataSettings {
    pub years_back: u32,
    /// Session cache lifetime for fetched series.
    pub cache_ttl_secs: u64,
}

impl Default for DataSettings {
    fn default() -> Self {
        Self {
            years_back: 3,
            cache_ttl_secs: 3600,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CalendarKind {
    Anchor,
    Union,
    Intersection,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AlignmentSettings {
    pub calendar: CalendarKind,
    /// Anchor series name; only used with `calendar = "anchor"`.
    pub anchor: String,
    pub fill: FillPolicy,
}

impl Default for AlignmentSettings {
    fn default() -> Self {
        Self {
            calendar: CalendarKind::Anchor,
            anchor: "nasdaq".into(),
            fill: FillPolicy::ForwardFill,
        }
    }
}

impl AlignmentSettings {
    pub fn to_align_config(&self) -> AlignConfig {
        let calendar = match self.calendar {
            CalendarKind::Anchor => Calendar::Anchor(self.anchor.clone()),
            CalendarKind::Union => Calendar::Union,
            CalendarKind::Intersection => Calendar::Intersection,
        };
        AlignConfig {
            calendar,
            fill: self.fill,
        }
    }

    /// The anchor name, when the calendar is anchored.
    pub fn anchor(&self) -> Option<&str> {
        (self.calendar == CalendarKind::Anchor).then_some(self.anchor.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LiquiditySettings {
    pub balance_sheet: String,
    pub treasury_general_account: String,
    pub reverse_repo: String,
    /// Name of the derived panel column.
    pub output: String,
}

impl Default for LiquiditySettings {
    fn default() -> Self {
        let names = ComponentNames::default();
        Self {
            balance_sheet: names.balance_sheet,
            treasury_general_account: names.treasury_general_account,
            reverse_repo: names.reverse_repo,
            output: NET_LIQUIDITY.into(),
        }
    }
}

impl LiquiditySettings {
    pub fn component_names(&self) -> ComponentNames {
        ComponentNames {
            balance_sheet: self.balance_sheet.clone(),
            treasury_general_account: self.treasury_general_account.clone(),
            reverse_repo: self.reverse_repo.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BacktestSettings {
    pub driver: String,
    pub target: String,
    pub lookback: usize,
    pub threshold: f64,
    pub direction: Direction,
    pub horizon: usize,
    /// Minimum rows between events; 0 keeps every qualifying date.
    pub min_gap: usize,
}

impl Default for BacktestSettings {
    fn default() -> Self {
        let p = EventParams::default();
        Self {
            driver: "usd_jpy".into(),
            target: "nasdaq".into(),
            lookback: p.lookback,
            threshold: p.threshold,
            direction: p.direction,
            horizon: p.horizon,
            min_gap: 0,
        }
    }
}

impl BacktestSettings {
    /// Validated engine parameters.
    pub fn to_params(&self) -> Result<EventParams, ParamError> {
        let cluster = match self.min_gap {
            0 => ClusterPolicy::EveryDate,
            n => ClusterPolicy::MinGap(n),
        };
        let params = EventParams::new(self.lookback, self.threshold, self.direction, self.horizon)
            .with_cluster(cluster);
        params.validate()?;
        Ok(params)
    }
}

/// Top-level dashboard configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DashboardConfig {
    pub data: DataSettings,
    pub alignment: AlignmentSettings,
    pub liquidity: LiquiditySettings,
    pub backtest: BacktestSettings,
    pub indicators: Vec<IndicatorSpec>,
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            data: DataSettings::default(),
            alignment: AlignmentSettings::default(),
            liquidity: LiquiditySettings::default(),
            backtest: BacktestSettings::default(),
            indicators: default_indicators(),
        }
    }
}

impl DashboardConfig {
    /// Parse and validate a TOML document.
    pub fn from_toml(text: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a TOML file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&text)
    }

    pub fn to_toml(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    pub fn indicator(&self, name: &str) -> Option<&IndicatorSpec> {
        self.indicators.iter().find(|i| i.name == name)
    }

    /// Check references and ranges. Called by the constructors.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.indicators.is_empty() {
            return Err(ConfigError::NoIndicators);
        }
        if !(1..=MAX_YEARS_BACK).contains(&self.data.years_back) {
            return Err(ConfigError::InvalidYearsBack(self.data.years_back));
        }

        let mut seen = HashSet::new();
        for ind in &self.indicators {
            if !seen.insert(ind.name.as_str()) {
                return Err(ConfigError::DuplicateIndicator(ind.name.clone()));
            }
            if ind.identifier.trim().is_empty() {
                return Err(ConfigError::EmptyIdentifier(ind.name.clone()));
            }
        }

        let known = |section: &'static str, name: &str| {
            if seen.contains(name) {
                Ok(())
            } else {
                Err(ConfigError::UnknownReference {
                    section,
                    name: name.to_string(),
                })
            }
        };

        if let Some(anchor) = self.alignment.anchor() {
            known("alignment", anchor)?;
        }

        let liq = &self.liquidity;
        known("liquidity", &liq.balance_sheet)?;
        known("liquidity", &liq.treasury_general_account)?;
        known("liquidity", &liq.reverse_repo)?;
        if seen.contains(liq.output.as_str()) {
            return Err(ConfigError::OutputCollision(liq.output.clone()));
        }

        for name in [&self.backtest.driver, &self.backtest.target] {
            if *name != liq.output {
                known("backtest", name)?;
            }
        }
        self.backtest.to_params()?;
        Ok(())
    }

    /// Units of the three liquidity components, from their indicator entries.
    pub fn liquidity_units(&self) -> LiquidityUnits {
        let defaults = LiquidityUnits::default();
        let units_of = |name: &str, fallback: Units| {
            self.indicator(name).and_then(|i| i.units).unwrap_or(fallback)
        };
        LiquidityUnits {
            balance_sheet: units_of(&self.liquidity.balance_sheet, defaults.balance_sheet),
            treasury_general_account: units_of(
                &self.liquidity.treasury_general_account,
                defaults.treasury_general_account,
            ),
            reverse_repo: units_of(&self.liquidity.reverse_repo, defaults.reverse_repo),
        }
    }

    /// `[today - years_back * 365 days, today]`.
    pub fn date_range(&self, today: NaiveDate) -> (NaiveDate, NaiveDate) {
        let days = u64::from(self.data.years_back) * 365;
        let start = today
            .checked_sub_days(chrono::Days::new(days))
            .unwrap_or(NaiveDate::MIN);
        (start, today)
    }

    pub fn cache_ttl(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.data.cache_ttl_secs)
    }
}
