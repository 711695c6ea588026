//! ==============================================================================
//! extract.rs - sensor extractor
//! ==============================================================================
//!
//! purpose:
//!     turns one station payload into a NormalizedObservation.
//!     every sensor is looked up by its exact code; a missing sensor leaves its
//!     fields empty instead of failing the extraction.
//!
//! relationships:
//!     - used by: scheduler.rs (once per station per sweep)
//!     - uses: domain.rs (RawPayload, StationBlock), wind.rs (compass text)
//!
//! ==============================================================================

use chrono::{DateTime, Utc};

use crate::domain::{NormalizedObservation, RawPayload, SensorValue};
use crate::error::ExtractError;
use crate::wind::wind_direction_text;

// upstream sensor codes
pub const TEMPERATURE: &str = "ILMA";
pub const TEMPERATURE_CHANGE: &str = "ILMA_DERIVAATTA";
pub const WIND_SPEED_AVG: &str = "KESKITUULI";
pub const WIND_DIRECTION: &str = "TUULENSUUNTA";
pub const HUMIDITY: &str = "ILMAN_KOSTEUS";
pub const PRECIPITATION: &str = "SADE";

/// first reading whose name equals the code exactly
fn find_sensor<'a>(values: &'a [SensorValue], code: &str) -> Option<&'a SensorValue> {
    values.iter().find(|s| s.name == code)
}

fn rain_suffix(language: &str) -> &'static str {
    if language == "fi" {
        "sade"
    } else {
        "rain"
    }
}

/// precipitation description, suffixed with the rain word when the sensor
/// reports a positive amount. the suffix is appended even if the description
/// already says the same thing ("Heikko sade" -> "Heikko sade sade").
/// with no description at all the rain word stands alone.
pub fn present_weather(sensor: &SensorValue, language: &str) -> Option<String> {
    let base = sensor.description(language).filter(|d| !d.is_empty());
    match (sensor.value, base) {
        (Some(amount), Some(base)) if amount > 0.0 => Some(format!("{} {}", base, rain_suffix(language))),
        (Some(amount), None) if amount > 0.0 => Some(rain_suffix(language).to_string()),
        _ => sensor.description(language).map(str::to_string),
    }
}

pub fn parse_observation_time(raw: &str) -> Result<DateTime<Utc>, ExtractError> {
    DateTime::parse_from_rfc3339(raw)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|_| ExtractError::BadTimestamp(raw.to_string()))
}

pub fn extract(
    payload: &RawPayload,
    station_id: &str,
    station_name: &str,
    language: &str,
) -> Result<NormalizedObservation, ExtractError> {
    extract_at(payload, station_id, station_name, language, Utc::now())
}

/// same as `extract` with an explicit fetch time
pub fn extract_at(
    payload: &RawPayload,
    station_id: &str,
    station_name: &str,
    language: &str,
    fetch_time: DateTime<Utc>,
) -> Result<NormalizedObservation, ExtractError> {
    let block = payload.station_block()?;
    let measured = block
        .measured_time
        .as_deref()
        .ok_or(ExtractError::MissingTimestamp)?;
    let observation_time = parse_observation_time(measured)?;

    let values = &block.sensor_values;
    let value = |code: &str| find_sensor(values, code).and_then(|s| s.value);
    let unit = |code: &str| find_sensor(values, code).and_then(|s| s.unit.clone());

    let wind_direction_degrees = value(WIND_DIRECTION);

    Ok(NormalizedObservation {
        station_id: station_id.to_string(),
        station_name: station_name.to_string(),
        fetch_time,
        observation_time,
        temperature: value(TEMPERATURE),
        temperature_unit: unit(TEMPERATURE),
        temperature_change: value(TEMPERATURE_CHANGE),
        temperature_change_unit: unit(TEMPERATURE_CHANGE),
        wind_speed_avg: value(WIND_SPEED_AVG),
        wind_speed_avg_unit: unit(WIND_SPEED_AVG),
        wind_direction_degrees,
        wind_direction_unit: unit(WIND_DIRECTION),
        wind_direction_text: wind_direction_degrees
            .map(|d| wind_direction_text(d, language).to_string()),
        humidity: value(HUMIDITY),
        humidity_unit: unit(HUMIDITY),
        present_weather_description: find_sensor(values, PRECIPITATION)
            .and_then(|s| present_weather(s, language)),
    })
}
