//! Freshness cache: serve a stored forecast while it is young enough,
//! download a new one otherwise.
//!
//! Decision order for `resolve(query, force_refresh)`:
//! - forced refresh: download (requires network)
//! - no readable stored entry: download (requires network)
//! - stored entry within the freshness window: serve it
//! - stored entry past the window, network up: download
//! - stored entry past the window, network down: serve it anyway
//!
//! A failed download is reported as such; an old entry is never substituted
//! for it. Every successful resolution becomes the current location.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;

use crate::error::WeatherError;
use crate::events::{CacheEvent, ResolvedFrom};
use crate::location::CurrentLocation;
use crate::preferences::PreferenceStore;
use crate::provider::WeatherProvider;
use crate::reachability::ReachabilityChecker;
use crate::storage::BlobStore;
use crate::types::{normalize_query, CacheKey, Units, WeatherDocument};
use crate::units::UnitPreference;

/// Stored forecasts older than this (in seconds) are refreshed when possible.
pub const DEFAULT_FRESHNESS_SECS: i64 = 3600;

const EVENT_CAPACITY: usize = 16;

/// Wall clock in seconds since the epoch.
pub trait Clock: Send + Sync {
    fn now(&self) -> i64;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> i64 {
        chrono::Utc::now().timestamp()
    }
}

pub struct FreshnessCache {
    store: Arc<dyn BlobStore>,
    provider: Arc<dyn WeatherProvider>,
    reachability: Arc<dyn ReachabilityChecker>,
    clock: Arc<dyn Clock>,
    units: UnitPreference,
    location: CurrentLocation,
    freshness_secs: i64,
    /// One async lock per key with work in flight
    key_locks: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
    events: broadcast::Sender<CacheEvent>,
}

impl FreshnessCache {
    pub fn new(
        store: Arc<dyn BlobStore>,
        preferences: Arc<dyn PreferenceStore>,
        provider: Arc<dyn WeatherProvider>,
        reachability: Arc<dyn ReachabilityChecker>,
    ) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            store,
            provider,
            reachability,
            clock: Arc::new(SystemClock),
            units: UnitPreference::new(preferences.clone()),
            location: CurrentLocation::new(preferences),
            freshness_secs: DEFAULT_FRESHNESS_SECS,
            key_locks: Mutex::new(HashMap::new()),
            events,
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_freshness(mut self, window: Duration) -> Self {
        self.freshness_secs = i64::try_from(window.as_secs()).unwrap_or(i64::MAX);
        self
    }

    pub fn units(&self) -> &UnitPreference {
        &self.units
    }

    pub fn current_location(&self) -> &CurrentLocation {
        &self.location
    }

    /// Receive a [`CacheEvent`] after every resolution and every clear.
    pub fn subscribe(&self) -> broadcast::Receiver<CacheEvent> {
        self.events.subscribe()
    }

    /// Resolve `query` to a forecast document.
    ///
    /// # Errors
    /// - `InvalidArgument` for an empty query
    /// - `NetworkUnavailable` when a download is needed and the network is down
    /// - `FetchFailed` when the provider fails
    /// - `Storage` when the local store or preferences fail
    pub async fn resolve(
        &self,
        query: &str,
        force_refresh: bool,
    ) -> Result<WeatherDocument, WeatherError> {
        normalize_query(query)?;
        let prefs = self.units.clone();
        let units = run_blocking(move || prefs.get()).await?;
        let key = CacheKey::new(query, units)?;
        let query = query.trim();

        let (document, source) = self
            .locked(key.as_str(), async {
                let (document, source) =
                    self.resolve_locked(query, &key, units, force_refresh).await?;
                let location = self.location.clone();
                let saved = document.clone();
                run_blocking(move || location.save(&saved)).await?;
                Ok::<_, WeatherError>((document, source))
            })
            .await?;

        self.notify(CacheEvent::Resolved {
            key,
            city: document.city_name().to_string(),
            source,
        });
        Ok(document)
    }

    async fn resolve_locked(
        &self,
        query: &str,
        key: &CacheKey,
        units: Units,
        force_refresh: bool,
    ) -> Result<(WeatherDocument, ResolvedFrom), WeatherError> {
        if force_refresh {
            tracing::debug!("Forced refresh of {}", key);
            let document = self.fetch_online(query, key, units).await?;
            return Ok((document, ResolvedFrom::Fetched));
        }

        let Some(cached) = self.read_entry(key).await? else {
            tracing::debug!("Downloading data for {}", key);
            let document = self.fetch_online(query, key, units).await?;
            return Ok((document, ResolvedFrom::Fetched));
        };

        let age = cached.age_at(self.clock.now());
        if age <= self.freshness_secs {
            tracing::debug!("Data for {} is not older than the window ({} seconds)", key, age);
            return Ok((cached, ResolvedFrom::Fresh));
        }

        if !self.reachability.is_connected().await {
            tracing::info!("No network connection, serving {} seconds old data for {}", age, key);
            return Ok((cached, ResolvedFrom::StaleOffline));
        }

        tracing::debug!("Data for {} is {} seconds old, downloading new data", key, age);
        let document = self.download(query, key, units).await?;
        Ok((document, ResolvedFrom::Fetched))
    }

    async fn fetch_online(
        &self,
        query: &str,
        key: &CacheKey,
        units: Units,
    ) -> Result<WeatherDocument, WeatherError> {
        if !self.reachability.is_connected().await {
            return Err(WeatherError::NetworkUnavailable);
        }
        self.download(query, key, units).await
    }

    async fn download(
        &self,
        query: &str,
        key: &CacheKey,
        units: Units,
    ) -> Result<WeatherDocument, WeatherError> {
        let document = self.provider.fetch(query, units).await?;
        self.store
            .write(key.as_str(), &document.to_bytes())
            .await
            .map_err(|e| WeatherError::storage(key.as_str(), e))?;
        tracing::info!("Saved data to {}", key);
        Ok(document)
    }

    /// Stored entry for `key`. Entries that no longer parse count as missing
    /// and get overwritten by the next download.
    async fn read_entry(&self, key: &CacheKey) -> Result<Option<WeatherDocument>, WeatherError> {
        let stored = self
            .store
            .read(key.as_str())
            .await
            .map_err(|e| WeatherError::storage(key.as_str(), e))?;

        let Some(bytes) = stored else {
            return Ok(None);
        };

        match WeatherDocument::from_slice(&bytes) {
            Ok(document) => Ok(Some(document)),
            Err(e) => {
                tracing::warn!("Ignoring unreadable cache entry {}: {}", key, e);
                Ok(None)
            }
        }
    }

    /// Delete every stored forecast. Preferences are untouched.
    ///
    /// Best effort: a failed deletion does not stop the remaining ones. If any
    /// failed, the error names the first failed key and how many failed.
    /// Returns the number of deleted entries.
    pub async fn purge_all(&self) -> Result<usize, WeatherError> {
        let keys = self
            .store
            .list()
            .await
            .map_err(|e| WeatherError::storage("*", e))?;
        let total = keys.len();

        let mut deleted = 0;
        let mut failed = 0;
        let mut first_failure: Option<(String, std::io::Error)> = None;

        for key in keys {
            match self.locked(&key, self.store.delete(&key)).await {
                Ok(()) => {
                    tracing::debug!("Deleted cache entry {}", key);
                    deleted += 1;
                }
                Err(e) => {
                    tracing::error!("Error deleting cache entry {}: {}", key, e);
                    failed += 1;
                    if first_failure.is_none() {
                        first_failure = Some((key, e));
                    }
                }
            }
        }

        match first_failure {
            None => {
                tracing::info!("Deleted {} cached forecasts", deleted);
                Ok(deleted)
            }
            Some((key, e)) => Err(WeatherError::Storage {
                key,
                message: format!("{} of {} deletions failed, first error: {}", failed, total, e),
            }),
        }
    }

    /// Forget everything shown by default: all stored forecasts and the
    /// current location.
    ///
    /// The current location is cleared even when the purge partially fails;
    /// the purge error is returned afterwards.
    pub async fn clear_local_data(&self) -> Result<usize, WeatherError> {
        let purged = self.purge_all().await;

        let location = self.location.clone();
        if let Err(e) = run_blocking(move || location.clear()).await {
            if let Err(purge_error) = &purged {
                tracing::error!("Purge failed before clearing current location: {}", purge_error);
            }
            return Err(e);
        }

        self.notify(CacheEvent::Cleared);
        purged
    }

    /// Resolve the current location without forcing a download.
    /// `None` when there is no current location.
    pub async fn resolve_current(&self) -> Result<Option<WeatherDocument>, WeatherError> {
        self.resolve_saved(false).await
    }

    /// Re-download the current location (pull-to-refresh).
    /// `None` when there is nothing to refresh.
    pub async fn refresh_current(&self) -> Result<Option<WeatherDocument>, WeatherError> {
        self.resolve_saved(true).await
    }

    /// Persist new units, then re-download the current location in them.
    ///
    /// The new units stay in effect even if the refresh fails.
    pub async fn change_units(&self, value: &str) -> Result<Option<WeatherDocument>, WeatherError> {
        let units = self.units.clone();
        let value = value.to_string();
        run_blocking(move || units.set(&value)).await?;
        self.refresh_current().await
    }

    async fn resolve_saved(
        &self,
        force_refresh: bool,
    ) -> Result<Option<WeatherDocument>, WeatherError> {
        let location = self.location.clone();
        let Some(current) = run_blocking(move || location.load()).await? else {
            tracing::debug!("No current location");
            return Ok(None);
        };
        self.resolve(current.city_name(), force_refresh)
            .await
            .map(Some)
    }

    /// Run `work` while holding the lock for `key`.
    async fn locked<T>(&self, key: &str, work: impl Future<Output = T>) -> T {
        let lock = self
            .key_locks
            .lock()
            .entry(key.to_string())
            .or_default()
            .clone();

        let result = {
            let _guard = lock.lock().await;
            work.await
        };

        drop(lock);
        self.key_locks
            .lock()
            .retain(|_, lock| Arc::strong_count(lock) > 1);
        result
    }

    fn notify(&self, event: CacheEvent) {
        // no subscribers is fine
        let _ = self.events.send(event);
    }
}

/// Run a preference operation on the blocking pool; file-backed preferences
/// do synchronous I/O.
async fn run_blocking<T, F>(f: F) -> Result<T, WeatherError>
where
    F: FnOnce() -> Result<T, WeatherError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| WeatherError::storage("preferences", e))?
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]
    use super::*;
    use crate::error::{ErrorKind, ProviderError};
    use crate::preferences::{MemoryPreferences, LOCATION_KEY};
    use crate::storage::MemoryStore;
    use async_trait::async_trait;
    use serde_json::json;
    use std::io;
    use std::thread::{self, ThreadId};

    struct EchoProvider;

    #[async_trait]
    impl WeatherProvider for EchoProvider {
        async fn fetch(&self, query: &str, _units: Units) -> Result<WeatherDocument, ProviderError> {
            Ok(WeatherDocument::from_value(json!({
                "city": { "name": query, "timezone": 0 },
                "list": [{ "dt": 1000, "main": { "temp": 1.0, "pressure": 1000, "humidity": 40 } }]
            }))?)
        }
    }

    struct Online;

    #[async_trait]
    impl ReachabilityChecker for Online {
        async fn is_connected(&self) -> bool {
            true
        }
    }

    struct Frozen(i64);

    impl Clock for Frozen {
        fn now(&self) -> i64 {
            self.0
        }
    }

    /// Remembers which threads touched it.
    #[derive(Default)]
    struct ThreadTrackingPrefs {
        inner: MemoryPreferences,
        threads: Mutex<Vec<ThreadId>>,
    }

    impl ThreadTrackingPrefs {
        fn record(&self) {
            self.threads.lock().push(thread::current().id());
        }
    }

    impl PreferenceStore for ThreadTrackingPrefs {
        fn get(&self, key: &str) -> io::Result<Option<String>> {
            self.record();
            self.inner.get(key)
        }

        fn set(&self, key: &str, value: &str) -> io::Result<()> {
            self.record();
            self.inner.set(key, value)
        }

        fn remove(&self, key: &str) -> io::Result<()> {
            self.record();
            self.inner.remove(key)
        }
    }

    struct BrokenPrefs;

    impl PreferenceStore for BrokenPrefs {
        fn get(&self, _key: &str) -> io::Result<Option<String>> {
            Err(io::Error::new(io::ErrorKind::PermissionDenied, "locked"))
        }

        fn set(&self, _key: &str, _value: &str) -> io::Result<()> {
            Err(io::Error::new(io::ErrorKind::PermissionDenied, "locked"))
        }

        fn remove(&self, _key: &str) -> io::Result<()> {
            Err(io::Error::new(io::ErrorKind::PermissionDenied, "locked"))
        }
    }

    /// Lists one entry that can never be deleted.
    struct ReadOnlyStore;

    #[async_trait]
    impl BlobStore for ReadOnlyStore {
        async fn write(&self, _key: &str, _bytes: &[u8]) -> io::Result<()> {
            Err(io::Error::new(io::ErrorKind::PermissionDenied, "read-only"))
        }

        async fn read(&self, _key: &str) -> io::Result<Option<Vec<u8>>> {
            Ok(None)
        }

        async fn delete(&self, _key: &str) -> io::Result<()> {
            Err(io::Error::new(io::ErrorKind::PermissionDenied, "read-only"))
        }

        async fn list(&self) -> io::Result<Vec<String>> {
            Ok(vec!["lisbon:metric.json".to_string()])
        }
    }

    fn cache_with(store: Arc<dyn BlobStore>, prefs: Arc<dyn PreferenceStore>) -> FreshnessCache {
        FreshnessCache::new(store, prefs, Arc::new(EchoProvider), Arc::new(Online))
            .with_clock(Arc::new(Frozen(1000)))
    }

    fn cache() -> FreshnessCache {
        cache_with(Arc::new(MemoryStore::new()), Arc::new(MemoryPreferences::new()))
    }

    #[tokio::test]
    async fn test_key_locks_are_released() {
        let cache = cache();
        cache.resolve("Lisbon", false).await.unwrap();
        cache.resolve("Porto", true).await.unwrap();
        assert!(cache.key_locks.lock().is_empty());
    }

    #[tokio::test]
    async fn test_freshness_window_is_configurable() {
        let cache = cache()
            .with_freshness(Duration::from_secs(60))
            .with_clock(Arc::new(Frozen(1000 + 61)));
        let mut events = cache.subscribe();

        cache.resolve("Lisbon", false).await.unwrap();
        cache.resolve("Lisbon", false).await.unwrap();

        let first = events.recv().await.unwrap();
        let second = events.recv().await.unwrap();
        assert!(matches!(first, CacheEvent::Resolved { source: ResolvedFrom::Fetched, .. }));
        assert!(matches!(second, CacheEvent::Resolved { source: ResolvedFrom::Fetched, .. }));
    }

    #[tokio::test]
    async fn test_preferences_are_not_touched_on_the_runtime_thread() {
        let prefs = Arc::new(ThreadTrackingPrefs::default());
        let cache = cache_with(Arc::new(MemoryStore::new()), prefs.clone());

        cache.resolve("Lisbon", false).await.unwrap();
        cache.change_units("imperial").await.unwrap().unwrap();
        cache.resolve_current().await.unwrap().unwrap();
        cache.clear_local_data().await.unwrap();

        // current-thread runtime: the test body runs on the runtime thread
        let runtime_thread = thread::current().id();
        let threads = prefs.threads.lock();
        assert!(!threads.is_empty());
        assert!(threads.iter().all(|id| *id != runtime_thread));
    }

    #[tokio::test]
    async fn test_empty_query_is_rejected_before_reading_preferences() {
        let cache = cache_with(Arc::new(MemoryStore::new()), Arc::new(BrokenPrefs));

        let err = cache.resolve("  ", false).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);

        let err = cache.resolve("Lisbon", false).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Storage);
    }

    #[tokio::test]
    async fn test_clear_reports_location_failure_after_failed_purge() {
        let cache = cache_with(Arc::new(ReadOnlyStore), Arc::new(BrokenPrefs));
        let mut events = cache.subscribe();

        let err = cache.clear_local_data().await.unwrap_err();

        assert!(matches!(
            err,
            WeatherError::Storage { ref key, .. } if key == LOCATION_KEY
        ));
        assert!(events.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_clear_returns_purge_failure_once_location_is_cleared() {
        let prefs = Arc::new(MemoryPreferences::new());
        prefs.set(LOCATION_KEY, "{}").unwrap();
        let cache = cache_with(Arc::new(ReadOnlyStore), prefs.clone());

        let err = cache.clear_local_data().await.unwrap_err();

        assert!(matches!(
            err,
            WeatherError::Storage { ref key, .. } if key == "lisbon:metric.json"
        ));
        assert!(prefs.get(LOCATION_KEY).unwrap().is_none());
    }

    #[test]
    fn test_system_clock_is_recent() {
        // 2020-01-01
        assert!(SystemClock.now() > 1_577_836_800);
    }
}
