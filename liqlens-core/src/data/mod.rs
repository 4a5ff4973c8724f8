//! Data fetching: providers, retry/circuit breaker, and the session cache.

pub mod cache;
pub mod circuit_breaker;
pub mod fred;
mod http;
pub mod provider;
pub mod synthetic;
pub mod yahoo;

pub use cache::{CacheKey, CacheStats, CachedProvider, SeriesCache, DEFAULT_TTL};
pub use circuit_breaker::{BreakerState, CircuitBreaker};
pub use fred::FredProvider;
pub use http::RetryPolicy;
pub use provider::{
    DataError, DataSource, FetchProgress, FetchResult, LogProgress, SeriesProvider,
};
pub use synthetic::{Frequency, SyntheticProfile, SyntheticProvider};
pub use yahoo::YahooProvider;
