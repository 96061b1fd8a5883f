//! Terminal rendering of forecasts and errors.

use wxcache_weather::{ErrorKind, Units, WeatherDocument, WeatherError};

/// Short multi-line summary of the current forecast slot.
pub fn summary(document: &WeatherDocument, units: Units) -> String {
    let current = document.current();
    let mut lines = vec![format!(
        "{}: {:.1}{}",
        document.city_name(),
        current.temperature(),
        units.temperature_symbol()
    )];

    if let Some(description) = current.description().filter(|d| !d.is_empty()) {
        lines.push(format!("  {}", description));
    }
    if let Some(feels_like) = current.main.feels_like {
        lines.push(format!("  Feels like {:.1}{}", feels_like, units.temperature_symbol()));
    }
    lines.push(format!(
        "  Humidity {}%, pressure {} hPa",
        current.main.humidity, current.main.pressure
    ));
    lines.push(format!(
        "  Wind {:.1} {} from {:.0}°",
        current.wind.speed,
        units.speed_unit(),
        current.wind.deg
    ));

    let upcoming: Vec<String> = document
        .entries()
        .iter()
        .skip(1)
        .take(4)
        .map(|entry| format!("{:.0}{}", entry.temperature(), units.temperature_symbol()))
        .collect();
    if !upcoming.is_empty() {
        lines.push(format!("  Next: {}", upcoming.join(", ")));
    }

    lines.join("\n")
}

/// Process exit code for each failure kind.
pub fn exit_code(error: &WeatherError) -> u8 {
    match error.kind() {
        ErrorKind::InvalidArgument => 2,
        ErrorKind::NetworkUnavailable => 3,
        ErrorKind::FetchFailed => 4,
        ErrorKind::Storage => 5,
    }
}
