//! The "current location": the last document any lookup resolved to.
//!
//! Kept in preferences, not in the forecast store, so a purge of cached
//! forecasts leaves it alone unless it is cleared explicitly.

use std::sync::Arc;

use crate::error::WeatherError;
use crate::preferences::{PreferenceStore, LOCATION_KEY};
use crate::types::WeatherDocument;

#[derive(Clone)]
pub struct CurrentLocation {
    prefs: Arc<dyn PreferenceStore>,
}

impl CurrentLocation {
    pub fn new(prefs: Arc<dyn PreferenceStore>) -> Self {
        Self { prefs }
    }

    /// Replace the current location with `document`.
    pub fn save(&self, document: &WeatherDocument) -> Result<(), WeatherError> {
        self.prefs
            .set(LOCATION_KEY, &document.to_json())
            .map_err(|e| WeatherError::storage(LOCATION_KEY, e))?;
        tracing::debug!("Saved current location: {}", document.city_name());
        Ok(())
    }

    /// The current location, or `None` if never set or cleared.
    ///
    /// A stored value that no longer parses is reported as absent.
    pub fn load(&self) -> Result<Option<WeatherDocument>, WeatherError> {
        let stored = self
            .prefs
            .get(LOCATION_KEY)
            .map_err(|e| WeatherError::storage(LOCATION_KEY, e))?;

        let Some(json) = stored else {
            return Ok(None);
        };

        match WeatherDocument::from_slice(json.as_bytes()) {
            Ok(document) => Ok(Some(document)),
            Err(e) => {
                tracing::warn!("Discarding unreadable current location: {}", e);
                Ok(None)
            }
        }
    }

    pub fn clear(&self) -> Result<(), WeatherError> {
        self.prefs
            .remove(LOCATION_KEY)
            .map_err(|e| WeatherError::storage(LOCATION_KEY, e))
    }
}
