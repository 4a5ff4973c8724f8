//! Session-scoped fetch cache.
//!
//! Fetched series are memoized in memory under `(identifier, start, end)`
//! with a time-to-live (default one hour). The cache is an explicit value
//! owned by a session; there is no process-wide state. Errors are never
//! cached, so a failed fetch is retried on the next request.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};
use std::time::{Duration, Instant};

use chrono::NaiveDate;
use serde::Serialize;
use tracing::debug;

use super::provider::{DataError, FetchResult, SeriesProvider};

/// Default time-to-live for cached series.
pub const DEFAULT_TTL: Duration = Duration::from_secs(3600);

/// Cache key: one fetch request.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub identifier: String,
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl CacheKey {
    pub fn new(identifier: impl Into<String>, start: NaiveDate, end: NaiveDate) -> Self {
        Self {
            identifier: identifier.into(),
            start,
            end,
        }
    }
}

#[derive(Debug)]
struct Entry {
    result: FetchResult,
    stored_at: Instant,
}

/// Hit/miss counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub entries: usize,
}

/// In-memory TTL cache of fetch results.
#[derive(Debug)]
pub struct SeriesCache {
    entries: HashMap<CacheKey, Entry>,
    ttl: Duration,
    hits: u64,
    misses: u64,
}

impl SeriesCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: HashMap::new(),
            ttl,
            hits: 0,
            misses: 0,
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Look up a fresh entry. Expired entries are evicted and count as a miss.
    pub fn get(&mut self, key: &CacheKey) -> Option<FetchResult> {
        let fresh = match self.entries.get(key) {
            Some(entry) if entry.stored_at.elapsed() < self.ttl => Some(entry.result.clone()),
            Some(_) => {
                self.entries.remove(key);
                None
            }
            None => None,
        };

        match fresh {
            Some(mut result) => {
                self.hits += 1;
                result.cached = true;
                Some(result)
            }
            None => {
                self.misses += 1;
                None
            }
        }
    }

    pub fn insert(&mut self, key: CacheKey, result: FetchResult) {
        self.entries.insert(
            key,
            Entry {
                result,
                stored_at: Instant::now(),
            },
        );
    }

    /// Drop every entry for `identifier`, whatever its range. Returns the count removed.
    pub fn invalidate(&mut self, identifier: &str) -> usize {
        let before = self.entries.len();
        self.entries.retain(|k, _| k.identifier != identifier);
        before - self.entries.len()
    }

    /// Drop entries older than the TTL. Returns the count removed.
    pub fn purge_expired(&mut self) -> usize {
        let before = self.entries.len();
        let ttl = self.ttl;
        self.entries.retain(|_, e| e.stored_at.elapsed() < ttl);
        before - self.entries.len()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits,
            misses: self.misses,
            entries: self.entries.len(),
        }
    }
}

impl Default for SeriesCache {
    fn default() -> Self {
        Self::new(DEFAULT_TTL)
    }
}

/// A provider wrapped with a [`SeriesCache`].
pub struct CachedProvider<P> {
    inner: P,
    cache: Mutex<SeriesCache>,
}

impl<P: SeriesProvider> CachedProvider<P> {
    pub fn new(inner: P, ttl: Duration) -> Self {
        Self {
            inner,
            cache: Mutex::new(SeriesCache::new(ttl)),
        }
    }

    pub fn inner(&self) -> &P {
        &self.inner
    }

    fn cache(&self) -> MutexGuard<'_, SeriesCache> {
        self.cache.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn invalidate(&self, identifier: &str) -> usize {
        self.cache().invalidate(identifier)
    }

    pub fn clear(&self) {
        self.cache().clear();
    }

    pub fn purge_expired(&self) -> usize {
        self.cache().purge_expired()
    }

    pub fn stats(&self) -> CacheStats {
        self.cache().stats()
    }
}

impl<P: SeriesProvider> SeriesProvider for CachedProvider<P> {
    fn name(&self) -> &str {
        self.inner.name()
    }

    fn fetch_series(
        &self,
        identifier: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<FetchResult, DataError> {
        let key = CacheKey::new(identifier, start, end);
        if let Some(hit) = self.cache().get(&key) {
            debug!(identifier, %start, %end, "cache hit");
            return Ok(hit);
        }

        // Lock released while the provider blocks on the network.
        let result = self.inner.fetch_series(identifier, start, end)?;
        self.cache().insert(key, result.clone());
        Ok(result)
    }

    fn is_available(&self) -> bool {
        self.inner.is_available()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::provider::DataSource;
    use crate::series::TimeSeries;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn d(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    /// Counts calls; fails for identifiers starting with "BAD".
    struct CountingProvider {
        calls: AtomicUsize,
    }

    impl SeriesProvider for CountingProvider {
        fn name(&self) -> &str {
            "counting"
        }

        fn fetch_series(
            &self,
            identifier: &str,
            start: NaiveDate,
            end: NaiveDate,
        ) -> Result<FetchResult, DataError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if identifier.starts_with("BAD") {
                return Err(DataError::SeriesNotFound {
                    identifier: identifier.to_string(),
                });
            }
            Ok(FetchResult {
                identifier: identifier.to_string(),
                series: TimeSeries::from_pairs(identifier, [(start, 1.0), (end, 2.0)]).unwrap(),
                source: DataSource::Synthetic,
                cached: false,
            })
        }

        fn is_available(&self) -> bool {
            true
        }
    }

    fn counting() -> CountingProvider {
        CountingProvider {
            calls: AtomicUsize::new(0),
        }
    }

    #[test]
    fn second_fetch_is_served_from_cache() {
        let p = CachedProvider::new(counting(), Duration::from_secs(60));
        let a = p.fetch_series("WALCL", d("2024-01-01"), d("2024-02-01")).unwrap();
        let b = p.fetch_series("WALCL", d("2024-01-01"), d("2024-02-01")).unwrap();

        assert!(!a.cached);
        assert!(b.cached);
        assert_eq!(a.series, b.series);
        assert_eq!(p.inner().calls.load(Ordering::SeqCst), 1);
        assert_eq!(
            p.stats(),
            CacheStats {
                hits: 1,
                misses: 1,
                entries: 1
            }
        );
    }

    #[test]
    fn different_range_is_a_different_key() {
        let p = CachedProvider::new(counting(), Duration::from_secs(60));
        p.fetch_series("WALCL", d("2024-01-01"), d("2024-02-01")).unwrap();
        p.fetch_series("WALCL", d("2024-01-01"), d("2024-03-01")).unwrap();
        assert_eq!(p.inner().calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn expired_entries_are_refetched() {
        let p = CachedProvider::new(counting(), Duration::from_millis(10));
        p.fetch_series("^VIX", d("2024-01-01"), d("2024-02-01")).unwrap();
        std::thread::sleep(Duration::from_millis(20));
        let again = p.fetch_series("^VIX", d("2024-01-01"), d("2024-02-01")).unwrap();
        assert!(!again.cached);
        assert_eq!(p.inner().calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn errors_are_not_cached() {
        let p = CachedProvider::new(counting(), Duration::from_secs(60));
        assert!(p.fetch_series("BAD", d("2024-01-01"), d("2024-02-01")).is_err());
        assert!(p.fetch_series("BAD", d("2024-01-01"), d("2024-02-01")).is_err());
        assert_eq!(p.inner().calls.load(Ordering::SeqCst), 2);
        assert_eq!(p.stats().entries, 0);
    }

    #[test]
    fn invalidate_drops_all_ranges_for_identifier() {
        let p = CachedProvider::new(counting(), Duration::from_secs(60));
        p.fetch_series("WALCL", d("2024-01-01"), d("2024-02-01")).unwrap();
        p.fetch_series("WALCL", d("2024-01-01"), d("2024-03-01")).unwrap();
        p.fetch_series("WTREGEN", d("2024-01-01"), d("2024-02-01")).unwrap();

        assert_eq!(p.invalidate("WALCL"), 2);
        assert_eq!(p.stats().entries, 1);
    }

    #[test]
    fn purge_expired_removes_stale_entries() {
        let mut cache = SeriesCache::new(Duration::from_millis(10));
        let key = CacheKey::new("X", d("2024-01-01"), d("2024-01-02"));
        cache.insert(
            key.clone(),
            FetchResult {
                identifier: "X".into(),
                series: TimeSeries::empty("X"),
                source: DataSource::Synthetic,
                cached: false,
            },
        );
        assert_eq!(cache.len(), 1);
        std::thread::sleep(Duration::from_millis(20));
        assert_eq!(cache.purge_expired(), 1);
        assert!(cache.is_empty());
        assert!(cache.get(&key).is_none());
    }
}
