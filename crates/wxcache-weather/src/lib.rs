//! Forecast freshness cache for wxcache
//!
//! Decides whether a stored forecast snapshot is good enough to show or a new
//! one has to be downloaded, and keeps track of the last resolved location.

pub mod cache;
pub mod error;
pub mod events;
pub mod location;
pub mod preferences;
pub mod provider;
pub mod reachability;
pub mod storage;
pub mod types;
pub mod units;

pub use cache::{Clock, FreshnessCache, SystemClock, DEFAULT_FRESHNESS_SECS};
pub use error::{ErrorKind, ProviderError, WeatherError};
pub use events::{CacheEvent, ResolvedFrom};
pub use location::CurrentLocation;
pub use preferences::{FilePreferences, MemoryPreferences, PreferenceStore};
pub use provider::{OpenWeatherMapProvider, WeatherProvider};
pub use reachability::{ReachabilityChecker, TcpProbe};
pub use storage::{BlobStore, FileStore, MemoryStore};
pub use types::*;
pub use units::UnitPreference;
