use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;

use crate::error::WeatherError;

/// Unit system requested from the provider
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Units {
    #[default]
    Metric,
    Imperial,
}

impl Units {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Metric => "metric",
            Self::Imperial => "imperial",
        }
    }

    pub fn temperature_symbol(&self) -> &'static str {
        match self {
            Self::Metric => "°C",
            Self::Imperial => "°F",
        }
    }

    pub fn speed_unit(&self) -> &'static str {
        match self {
            Self::Metric => "m/s",
            Self::Imperial => "mph",
        }
    }
}

impl fmt::Display for Units {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Units {
    type Err = WeatherError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "metric" => Ok(Self::Metric),
            "imperial" => Ok(Self::Imperial),
            other => Err(WeatherError::invalid(format!(
                "unsupported units {:?}, expected \"metric\" or \"imperial\"",
                other
            ))),
        }
    }
}

/// Storage key of one cached forecast: `<query-lowercased>:<units>.json`
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey(String);

impl CacheKey {
    /// Build the key for `query` under `units`.
    ///
    /// Returns `InvalidArgument` for an empty or whitespace-only query.
    pub fn new(query: &str, units: Units) -> Result<Self, WeatherError> {
        let normalized = normalize_query(query)?;
        Ok(Self(format!("{}:{}.json", normalized, units)))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Trim and case-fold a city query.
pub fn normalize_query(query: &str) -> Result<String, WeatherError> {
    let trimmed = query.trim();
    if trimmed.is_empty() {
        return Err(WeatherError::invalid("query must not be empty"));
    }
    Ok(trimmed.to_lowercase())
}

/// A payload that does not look like a forecast response.
#[derive(Debug, Clone, thiserror::Error)]
#[error("Malformed weather document: {0}")]
pub struct DocumentError(pub String);

/// Main readings of a forecast slot
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct MainReadings {
    pub temp: f64,
    #[serde(default)]
    pub feels_like: Option<f64>,
    pub pressure: f64,
    pub humidity: u8,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct Wind {
    #[serde(default)]
    pub speed: f64,
    #[serde(default)]
    pub deg: f64,
}

/// Weather condition as reported by the provider
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Condition {
    #[serde(default)]
    pub main: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub icon: String,
}

/// One forecast slot
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ForecastEntry {
    /// Seconds since the epoch
    pub dt: i64,
    pub main: MainReadings,
    #[serde(default)]
    pub wind: Wind,
    #[serde(default)]
    pub weather: Vec<Condition>,
    #[serde(default)]
    pub visibility: Option<u32>,
}

impl ForecastEntry {
    pub fn temperature(&self) -> f64 {
        self.main.temp
    }

    pub fn description(&self) -> Option<&str> {
        self.weather.first().map(|c| c.description.as_str())
    }

    pub fn icon(&self) -> Option<&str> {
        self.weather.first().map(|c| c.icon.as_str())
    }
}

/// One forecast response, kept verbatim.
///
/// The raw JSON is what gets persisted; the typed fields are a validated view
/// over it. A document always has a city name and at least one entry, and
/// entry 0 is the current one.
#[derive(Debug, Clone)]
pub struct WeatherDocument {
    raw: Value,
    city_name: String,
    timezone_offset: i64,
    entries: Vec<ForecastEntry>,
}

impl WeatherDocument {
    pub fn from_value(raw: Value) -> Result<Self, DocumentError> {
        let city = raw
            .get("city")
            .ok_or_else(|| DocumentError("missing \"city\"".into()))?;

        let city_name = city
            .get("name")
            .and_then(Value::as_str)
            .ok_or_else(|| DocumentError("missing \"city.name\"".into()))?
            .to_string();

        let timezone_offset = match city.get("timezone") {
            None | Some(Value::Null) => 0,
            Some(Value::Number(n)) => n
                .as_i64()
                .ok_or_else(|| DocumentError(format!("bad \"city.timezone\": {}", n)))?,
            Some(Value::String(s)) => s
                .trim()
                .parse()
                .map_err(|_| DocumentError(format!("bad \"city.timezone\": {:?}", s)))?,
            Some(other) => {
                return Err(DocumentError(format!("bad \"city.timezone\": {}", other)));
            }
        };

        let list = raw
            .get("list")
            .cloned()
            .ok_or_else(|| DocumentError("missing \"list\"".into()))?;
        let entries: Vec<ForecastEntry> = serde_json::from_value(list)
            .map_err(|e| DocumentError(format!("bad \"list\": {}", e)))?;
        if entries.is_empty() {
            return Err(DocumentError("empty forecast list".into()));
        }

        Ok(Self {
            raw,
            city_name,
            timezone_offset,
            entries,
        })
    }

    pub fn from_slice(bytes: &[u8]) -> Result<Self, DocumentError> {
        let raw: Value =
            serde_json::from_slice(bytes).map_err(|e| DocumentError(e.to_string()))?;
        Self::from_value(raw)
    }

    /// Compact JSON encoding; identical documents encode identically.
    pub fn to_json(&self) -> String {
        self.raw.to_string()
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        self.to_json().into_bytes()
    }

    pub fn as_value(&self) -> &Value {
        &self.raw
    }

    pub fn city_name(&self) -> &str {
        &self.city_name
    }

    /// Offset of the city from UTC, in seconds
    pub fn timezone_offset(&self) -> i64 {
        self.timezone_offset
    }

    /// (latitude, longitude) of the city, when the provider sent them
    pub fn coordinates(&self) -> Option<(f64, f64)> {
        let coord = self.raw.get("city")?.get("coord")?;
        Some((coord.get("lat")?.as_f64()?, coord.get("lon")?.as_f64()?))
    }

    pub fn current(&self) -> &ForecastEntry {
        // from_value rejects empty lists
        &self.entries[0]
    }

    pub fn entries(&self) -> &[ForecastEntry] {
        &self.entries
    }

    /// Age in seconds of the current entry at `now`, compensated for the
    /// city's UTC offset. Saturates instead of overflowing on absurd stamps.
    pub fn age_at(&self, now: i64) -> i64 {
        now.saturating_sub(self.current().dt)
            .saturating_sub(self.timezone_offset)
    }
}

impl PartialEq for WeatherDocument {
    fn eq(&self, other: &Self) -> bool {
        self.raw == other.raw
    }
}

impl TryFrom<Value> for WeatherDocument {
    type Error = DocumentError;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        Self::from_value(value)
    }
}

impl Serialize for WeatherDocument {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.raw.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for WeatherDocument {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = Value::deserialize(deserializer)?;
        Self::from_value(raw).map_err(serde::de::Error::custom)
    }
}
