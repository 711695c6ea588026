use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer};

use crate::error::ExtractError;

/// one configured station, immutable for the process lifetime
#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct StationConfig {
    pub id: String,
    /// display names keyed by language code ("fi", "en", ...)
    #[serde(default)]
    pub names: HashMap<String, String>,
}

impl StationConfig {
    /// display name in the given language, or the id if that language is missing
    pub fn display_name(&self, language: &str) -> &str {
        self.names.get(language).map(String::as_str).unwrap_or(&self.id)
    }
}

/// shape of stations.json
#[derive(Clone, Debug, Deserialize)]
pub struct StationRegistry {
    pub stations: Vec<StationConfig>,
}

/// the fetched json for one station, kept verbatim for archiving
#[derive(Clone, Debug, PartialEq)]
pub struct RawPayload(serde_json::Value);

impl RawPayload {
    pub fn new(value: serde_json::Value) -> Self {
        Self(value)
    }

    pub fn as_json(&self) -> &serde_json::Value {
        &self.0
    }

    /// typed view of `weatherStations[0]`
    pub fn station_block(&self) -> Result<StationBlock, ExtractError> {
        let block = self
            .0
            .get("weatherStations")
            .and_then(|s| s.as_array())
            .and_then(|s| s.first())
            .ok_or(ExtractError::MissingStationBlock)?;

        StationBlock::deserialize(block).map_err(|e| ExtractError::BadStationBlock(e.to_string()))
    }
}

#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StationBlock {
    #[serde(default)]
    pub measured_time: Option<String>,
    #[serde(default, deserialize_with = "lenient_sensors")]
    pub sensor_values: Vec<SensorValue>,
}

/// entries without a string name are dropped, so one odd reading never
/// takes the rest of the station down with it
fn lenient_sensors<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<SensorValue>, D::Error> {
    let entries = Vec::<serde_json::Value>::deserialize(deserializer)?;
    Ok(entries.iter().filter_map(SensorValue::from_json).collect())
}

/// a single upstream sensor reading
#[derive(Clone, Debug, PartialEq)]
pub struct SensorValue {
    pub name: String,
    pub value: Option<f64>,
    pub unit: Option<String>,
    pub description_fi: Option<String>,
    pub description_en: Option<String>,
    pub description: Option<String>,
}

impl SensorValue {
    /// reads one `sensorValues` entry field by field. a field of the wrong
    /// type is treated as absent. `value`/`unit` are accepted as generic
    /// spellings of `sensorValue`/`sensorUnit`.
    pub fn from_json(entry: &serde_json::Value) -> Option<Self> {
        let field = |keys: &[&str]| keys.iter().find_map(|k| entry.get(*k));
        let text = |keys: &[&str]| field(keys).and_then(|v| v.as_str()).map(str::to_string);

        Some(Self {
            name: entry.get("name")?.as_str()?.to_string(),
            value: field(&["sensorValue", "value"]).and_then(|v| v.as_f64()),
            unit: text(&["sensorUnit", "unit"]),
            description_fi: text(&["sensorValueDescriptionFi"]),
            description_en: text(&["sensorValueDescriptionEn"]),
            description: text(&["description"]),
        })
    }

    pub fn description(&self, language: &str) -> Option<&str> {
        let localized = if language == "fi" {
            self.description_fi.as_deref()
        } else {
            self.description_en.as_deref()
        };
        localized.or(self.description.as_deref())
    }
}

/// the fixed, typed record derived from one poll of one station
#[derive(Clone, Debug, PartialEq)]
pub struct NormalizedObservation {
    pub station_id: String,
    pub station_name: String,
    pub fetch_time: DateTime<Utc>,
    pub observation_time: DateTime<Utc>,
    pub temperature: Option<f64>,
    pub temperature_unit: Option<String>,
    pub temperature_change: Option<f64>,
    pub temperature_change_unit: Option<String>,
    pub wind_speed_avg: Option<f64>,
    pub wind_speed_avg_unit: Option<String>,
    pub wind_direction_degrees: Option<f64>,
    pub wind_direction_unit: Option<String>,
    pub wind_direction_text: Option<String>,
    pub humidity: Option<f64>,
    pub humidity_unit: Option<String>,
    pub present_weather_description: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn display_name_falls_back_to_id() {
        let station = StationConfig {
            id: "1012".into(),
            names: HashMap::from([("fi".to_string(), "Vt4 Kemi".to_string())]),
        };
        assert_eq!(station.display_name("fi"), "Vt4 Kemi");
        assert_eq!(station.display_name("sv"), "1012");
    }

    #[test]
    fn station_block_requires_weather_stations() {
        let payload = RawPayload::new(json!({ "dataUpdatedTime": "2019-07-14T12:00:00Z" }));
        assert_eq!(payload.station_block().unwrap_err(), ExtractError::MissingStationBlock);

        let payload = RawPayload::new(json!({ "weatherStations": [] }));
        assert_eq!(payload.station_block().unwrap_err(), ExtractError::MissingStationBlock);
    }

    #[test]
    fn sensor_value_accepts_generic_names() {
        let payload = RawPayload::new(json!({
            "weatherStations": [{
                "measuredTime": "2019-07-14T12:00:00Z",
                "sensorValues": [
                    { "name": "ILMA", "value": 18.5, "unit": "°C", "description": "lämmin" }
                ]
            }]
        }));
        let block = payload.station_block().unwrap();
        let sensor = &block.sensor_values[0];
        assert_eq!(sensor.value, Some(18.5));
        assert_eq!(sensor.unit.as_deref(), Some("°C"));
        assert_eq!(sensor.description("fi"), Some("lämmin"));
    }

    #[test]
    fn description_prefers_requested_language() {
        let sensor = SensorValue::from_json(&json!({
            "name": "SADE",
            "sensorValue": 0.0,
            "sensorValueDescriptionFi": "Pouta",
            "sensorValueDescriptionEn": "Dry"
        }))
        .unwrap();
        assert_eq!(sensor.description("fi"), Some("Pouta"));
        assert_eq!(sensor.description("en"), Some("Dry"));
    }

    #[test]
    fn odd_sensor_entries_do_not_spoil_the_block() {
        let payload = RawPayload::new(json!({
            "weatherStations": [{
                "measuredTime": "2019-07-14T12:00:00Z",
                "sensorValues": [
                    { "name": "TIE_TILA", "sensorValue": "n/a" },
                    { "sensorValue": 3.0 },
                    { "name": 42, "sensorValue": 1.0 },
                    "garbage",
                    { "name": "ILMA", "sensorValue": 18.3, "sensorUnit": ["°C"] }
                ]
            }]
        }));
        let block = payload.station_block().unwrap();
        let names: Vec<&str> = block.sensor_values.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["TIE_TILA", "ILMA"]);
        assert_eq!(block.sensor_values[0].value, None);
        assert_eq!(block.sensor_values[1].value, Some(18.3));
        assert_eq!(block.sensor_values[1].unit, None);
    }
}
