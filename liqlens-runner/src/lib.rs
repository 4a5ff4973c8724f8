//! LiqLens Runner: dashboard configuration, panel loading, sessions, export.
//!
//! This crate builds on `liqlens-core` to provide:
//! - TOML configuration with the stock indicator catalog
//! - Panel loading with per-series failure isolation and synthetic offline mode
//! - Sessions that recompute backtests and correlations on request
//! - DataFrame, JSON, CSV and Markdown export

pub mod config;
pub mod export;
pub mod loader;
pub mod session;

pub use config::{
    default_indicators, AlignmentSettings, BacktestSettings, CalendarKind, ConfigError,
    DashboardConfig, IndicatorSpec, SourceKind,
};
pub use loader::{load_panel, LoadError, LoadedPanel, ProviderSet, SeriesFailure};
pub use session::{BacktestReport, Session, SessionError, SCHEMA_VERSION};

#[cfg(test)]
mod send_sync_checks {
    use super::*;

    fn assert_send<T: Send>() {}
    fn assert_sync<T: Sync>() {}

    #[test]
    fn config_types_are_send_sync() {
        assert_send::<DashboardConfig>();
        assert_sync::<DashboardConfig>();
    }

    #[test]
    fn loaded_panel_is_send_sync() {
        assert_send::<LoadedPanel>();
        assert_sync::<LoadedPanel>();
        assert_send::<BacktestReport>();
        assert_sync::<BacktestReport>();
    }

    #[test]
    fn session_is_send_sync() {
        assert_send::<ProviderSet>();
        assert_sync::<ProviderSet>();
        assert_send::<Session>();
        assert_sync::<Session>();
    }
}
