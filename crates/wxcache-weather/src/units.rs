use std::sync::Arc;

use crate::error::WeatherError;
use crate::preferences::{PreferenceStore, UNITS_KEY};
use crate::types::Units;

/// Persisted unit system, `metric` unless set otherwise.
#[derive(Clone)]
pub struct UnitPreference {
    prefs: Arc<dyn PreferenceStore>,
}

impl UnitPreference {
    pub fn new(prefs: Arc<dyn PreferenceStore>) -> Self {
        Self { prefs }
    }

    /// Current units. An unreadable stored value falls back to metric.
    pub fn get(&self) -> Result<Units, WeatherError> {
        let stored = self
            .prefs
            .get(UNITS_KEY)
            .map_err(|e| WeatherError::storage(UNITS_KEY, e))?;

        match stored {
            None => Ok(Units::default()),
            Some(value) => Ok(value.parse().unwrap_or_else(|_| {
                tracing::warn!("Ignoring unknown stored units {:?}, using metric", value);
                Units::default()
            })),
        }
    }

    /// Persist `value`, which must be `metric` or `imperial`.
    pub fn set(&self, value: &str) -> Result<Units, WeatherError> {
        let units: Units = value.parse()?;
        self.prefs
            .set(UNITS_KEY, units.as_str())
            .map_err(|e| WeatherError::storage(UNITS_KEY, e))?;
        tracing::info!("Changing units to: {}", units);
        Ok(units)
    }
}
