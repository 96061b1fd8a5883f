//! Test doubles shared by the integration tests.
#![allow(dead_code, clippy::unwrap_used, clippy::expect_used)]

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::json;
use std::collections::HashSet;
use std::io;
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::sync::Arc;

use wxcache_weather::{
    BlobStore, Clock, FreshnessCache, MemoryPreferences, MemoryStore, ProviderError,
    ReachabilityChecker, Units, WeatherDocument, WeatherProvider,
};

/// 2023-11-14T22:13:20Z
pub const NOW: i64 = 1_700_000_000;

pub fn forecast(city: &str, dt: i64, timezone: i64, units: Units) -> serde_json::Value {
    json!({
        "cod": "200",
        "units": units.as_str(),
        "city": {
            "name": city,
            "coord": { "lat": 48.8534, "lon": 2.3488 },
            "timezone": timezone
        },
        "list": [
            {
                "dt": dt,
                "main": { "temp": 14.2, "feels_like": 13.1, "pressure": 1016, "humidity": 72 },
                "wind": { "speed": 3.6, "deg": 200 },
                "weather": [{ "main": "Clouds", "description": "broken clouds", "icon": "04d" }],
                "visibility": 10000
            },
            {
                "dt": dt + 10_800,
                "main": { "temp": 12.9, "pressure": 1017, "humidity": 78 },
                "weather": [{ "main": "Rain", "description": "light rain", "icon": "10n" }]
            }
        ]
    })
}

pub fn document(city: &str, dt: i64, timezone: i64, units: Units) -> WeatherDocument {
    WeatherDocument::from_value(forecast(city, dt, timezone, units)).unwrap()
}

/// Unit system recorded in a document built by [`forecast`].
pub fn units_of(document: &WeatherDocument) -> &str {
    document.as_value()["units"].as_str().unwrap()
}

#[derive(Debug)]
pub struct TestClock(AtomicI64);

impl TestClock {
    pub fn new(now: i64) -> Self {
        Self(AtomicI64::new(now))
    }

    pub fn advance(&self, secs: i64) {
        self.0.fetch_add(secs, Ordering::SeqCst);
    }
}

impl Clock for TestClock {
    fn now(&self) -> i64 {
        self.0.load(Ordering::SeqCst)
    }
}

#[derive(Debug)]
pub struct Switch(AtomicBool);

impl Switch {
    pub fn set_online(&self, online: bool) {
        self.0.store(online, Ordering::SeqCst);
    }
}

#[async_trait]
impl ReachabilityChecker for Switch {
    async fn is_connected(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Provider answering with a document stamped "now" for the queried city.
pub struct FakeProvider {
    clock: Arc<TestClock>,
    timezone: i64,
    calls: Mutex<Vec<(String, Units)>>,
    fail_status: Mutex<Option<u16>>,
}

impl FakeProvider {
    pub fn calls(&self) -> Vec<(String, Units)> {
        self.calls.lock().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().len()
    }

    pub fn fail_with_status(&self, status: u16) {
        *self.fail_status.lock() = Some(status);
    }
}

#[async_trait]
impl WeatherProvider for FakeProvider {
    async fn fetch(&self, query: &str, units: Units) -> Result<WeatherDocument, ProviderError> {
        self.calls.lock().push((query.to_string(), units));
        if let Some(status) = *self.fail_status.lock() {
            return Err(ProviderError::Status {
                status,
                body: "{\"cod\":\"500\"}".to_string(),
            });
        }
        let now = self.clock.now();
        Ok(document(query, now + self.timezone, self.timezone, units))
    }
}

/// Memory store that can be told to fail specific operations.
#[derive(Default)]
pub struct FlakyStore {
    inner: MemoryStore,
    fail_deletes: Mutex<HashSet<String>>,
    fail_writes: AtomicBool,
}

impl FlakyStore {
    pub fn fail_delete_of(&self, key: &str) {
        self.fail_deletes.lock().insert(key.to_string());
    }

    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    pub async fn seed(&self, key: &str, document: &WeatherDocument) {
        self.inner.write(key, &document.to_bytes()).await.unwrap();
    }

    pub async fn raw(&self, key: &str) -> Option<Vec<u8>> {
        self.inner.read(key).await.unwrap()
    }

    pub async fn keys(&self) -> Vec<String> {
        self.inner.list().await.unwrap()
    }
}

#[async_trait]
impl BlobStore for FlakyStore {
    async fn write(&self, key: &str, bytes: &[u8]) -> io::Result<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(io::Error::new(io::ErrorKind::Other, "disk full"));
        }
        self.inner.write(key, bytes).await
    }

    async fn read(&self, key: &str) -> io::Result<Option<Vec<u8>>> {
        self.inner.read(key).await
    }

    async fn delete(&self, key: &str) -> io::Result<()> {
        if self.fail_deletes.lock().contains(key) {
            return Err(io::Error::new(io::ErrorKind::PermissionDenied, "read-only file"));
        }
        self.inner.delete(key).await
    }

    async fn list(&self) -> io::Result<Vec<String>> {
        self.inner.list().await
    }
}

pub struct Harness {
    pub cache: FreshnessCache,
    pub store: Arc<FlakyStore>,
    pub prefs: Arc<MemoryPreferences>,
    pub provider: Arc<FakeProvider>,
    pub network: Arc<Switch>,
    pub clock: Arc<TestClock>,
}

/// Online harness with an empty store; provider documents use `timezone`.
pub fn harness_with_timezone(timezone: i64) -> Harness {
    let clock = Arc::new(TestClock::new(NOW));
    let store = Arc::new(FlakyStore::default());
    let prefs = Arc::new(MemoryPreferences::new());
    let network = Arc::new(Switch(AtomicBool::new(true)));
    let provider = Arc::new(FakeProvider {
        clock: clock.clone(),
        timezone,
        calls: Mutex::new(Vec::new()),
        fail_status: Mutex::new(None),
    });

    let cache = FreshnessCache::new(
        store.clone(),
        prefs.clone(),
        provider.clone(),
        network.clone(),
    )
    .with_clock(clock.clone());

    Harness {
        cache,
        store,
        prefs,
        provider,
        network,
        clock,
    }
}

pub fn harness() -> Harness {
    harness_with_timezone(0)
}
