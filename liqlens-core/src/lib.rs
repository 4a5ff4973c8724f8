//! LiqLens Core: time series, data providers, alignment, net liquidity and
//! event-conditional backtests.
//!
//! The crate is organised leaf first:
//! - `series`: validated, strictly ordered dated observations
//! - `data`: Yahoo/FRED/synthetic providers, circuit breaker, session cache
//! - `align`: joining series onto one calendar with an explicit fill policy
//! - `liquidity`: Fed balance sheet minus TGA minus reverse repo
//! - `backtest`: driver events and forward returns on a target
//! - `correlation`: Pearson table against a target column
//!
//! Everything here is computed on demand. Nothing is written to disk.

pub mod align;
pub mod backtest;
pub mod correlation;
pub mod data;
pub mod liquidity;
pub mod series;

pub use align::{align, AlignConfig, AlignError, AlignedPanel, Calendar, FillPolicy};
pub use backtest::{BacktestError, BacktestResult, Direction, EventParams, EventStudy};
pub use liquidity::{compose, LiquidityError, LiquidityInputs, LiquidityUnits, Units};
pub use series::{Observation, SeriesError, TimeSeries};

#[cfg(test)]
mod tests {
    use super::*;

    /// Compile-time check: shared types can cross threads.
    #[allow(dead_code)]
    fn assert_send_sync() {
        fn require_send<T: Send>() {}
        fn require_sync<T: Sync>() {}

        require_send::<series::TimeSeries>();
        require_sync::<series::TimeSeries>();
        require_send::<align::AlignedPanel>();
        require_sync::<align::AlignedPanel>();
        require_send::<backtest::BacktestResult>();
        require_sync::<backtest::BacktestResult>();
        require_send::<backtest::EventParams>();
        require_sync::<backtest::EventParams>();

        require_send::<data::CircuitBreaker>();
        require_sync::<data::CircuitBreaker>();
        require_send::<data::YahooProvider>();
        require_sync::<data::YahooProvider>();
        require_send::<data::FredProvider>();
        require_sync::<data::FredProvider>();
        require_send::<data::SyntheticProvider>();
        require_sync::<data::SyntheticProvider>();
        require_send::<data::CachedProvider<data::SyntheticProvider>>();
        require_sync::<data::CachedProvider<data::SyntheticProvider>>();
    }

    /// Compile-time check: the detector's signature has no target column.
    #[test]
    fn detect_events_signature_has_no_target() {
        fn _check(
            dates: &[chrono::NaiveDate],
            driver: &[Option<f64>],
            params: &EventParams,
        ) -> Vec<backtest::Event> {
            backtest::detect_events(dates, driver, params)
        }
    }
}
