//! Flat string preferences that survive restarts.

use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::PathBuf;

/// Preference holding the serialized current-location document
pub const LOCATION_KEY: &str = "location";

/// Preference holding the unit system
pub const UNITS_KEY: &str = "units";

/// Small string-keyed preference map.
///
/// Calls may block. `FreshnessCache` makes them from tokio's blocking pool,
/// never from a runtime worker.
pub trait PreferenceStore: Send + Sync {
    fn get(&self, key: &str) -> io::Result<Option<String>>;

    fn set(&self, key: &str, value: &str) -> io::Result<()>;

    /// Remove `key`. Removing a missing key is not an error.
    fn remove(&self, key: &str) -> io::Result<()>;
}

/// Preferences stored as one JSON object in a file.
#[derive(Debug)]
pub struct FilePreferences {
    path: PathBuf,
    values: Mutex<Option<BTreeMap<String, String>>>,
}

impl FilePreferences {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            values: Mutex::new(None),
        }
    }

    fn load(&self) -> io::Result<BTreeMap<String, String>> {
        let contents = match fs::read_to_string(&self.path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(BTreeMap::new()),
            Err(e) => return Err(e),
        };

        serde_json::from_str(&contents).map_err(|e| {
            io::Error::new(
                io::ErrorKind::InvalidData,
                format!("preferences file {:?} is corrupt: {}", self.path, e),
            )
        })
    }

    /// Save using the write-to-temp-then-rename pattern.
    fn save(&self, values: &BTreeMap<String, String>) -> io::Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }

        let content = serde_json::to_string_pretty(values)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;

        let temp_path = self.path.with_extension("json.tmp");
        fs::write(&temp_path, content)?;
        fs::rename(&temp_path, &self.path)
    }

    /// Run `f` against the loaded map, persisting it if `f` reports a change.
    fn with_values<T>(
        &self,
        f: impl FnOnce(&mut BTreeMap<String, String>) -> (T, bool),
    ) -> io::Result<T> {
        let mut guard = self.values.lock();
        if guard.is_none() {
            *guard = Some(self.load()?);
        }
        let values = guard.get_or_insert_with(BTreeMap::new);

        let mut updated = values.clone();
        let (result, changed) = f(&mut updated);
        if changed {
            self.save(&updated)?;
            *values = updated;
        }
        Ok(result)
    }
}

impl PreferenceStore for FilePreferences {
    fn get(&self, key: &str) -> io::Result<Option<String>> {
        self.with_values(|values| (values.get(key).cloned(), false))
    }

    fn set(&self, key: &str, value: &str) -> io::Result<()> {
        self.with_values(|values| {
            let previous = values.insert(key.to_string(), value.to_string());
            ((), previous.as_deref() != Some(value))
        })
    }

    fn remove(&self, key: &str) -> io::Result<()> {
        self.with_values(|values| ((), values.remove(key).is_some()))
    }
}

/// In-process preferences, for tests and embedders.
#[derive(Debug, Default)]
pub struct MemoryPreferences {
    values: Mutex<BTreeMap<String, String>>,
}

impl MemoryPreferences {
    pub fn new() -> Self {
        Self::default()
    }
}

impl PreferenceStore for MemoryPreferences {
    fn get(&self, key: &str) -> io::Result<Option<String>> {
        Ok(self.values.lock().get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> io::Result<()> {
        self.values.lock().insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> io::Result<()> {
        self.values.lock().remove(key);
        Ok(())
    }
}
