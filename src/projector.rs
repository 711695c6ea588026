//! ==============================================================================
//! projector.rs - value projector
//! ==============================================================================
//!
//! purpose:
//!     answers "what is field F of station S right now" from the cache alone.
//!     a single entry point parameterized over the field set, so the export
//!     layer does not need one getter per exposed variable.
//!
//! contract:
//!     - never fetches, never fails. a station that was never polled, or a
//!       field whose sensor was missing, is Projection::Unavailable.
//!     - safe to call at any rate, from any task, while sweeps are writing.
//!
//! ==============================================================================

use std::str::FromStr;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::cache::ObservationCache;
use crate::domain::NormalizedObservation;

/// every field the projector can serve
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Field {
    ObservationTime,
    Temperature,
    TemperatureChange,
    WindSpeedAvg,
    WindDirectionDegrees,
    WindDirectionText,
    Humidity,
    PresentWeatherDescription,
}

impl Field {
    pub const ALL: [Field; 8] = [
        Field::ObservationTime,
        Field::Temperature,
        Field::TemperatureChange,
        Field::WindSpeedAvg,
        Field::WindDirectionDegrees,
        Field::WindDirectionText,
        Field::Humidity,
        Field::PresentWeatherDescription,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Field::ObservationTime => "observationTime",
            Field::Temperature => "temperature",
            Field::TemperatureChange => "temperatureChange",
            Field::WindSpeedAvg => "windSpeedAvg",
            Field::WindDirectionDegrees => "windDirectionDegrees",
            Field::WindDirectionText => "windDirectionText",
            Field::Humidity => "humidity",
            Field::PresentWeatherDescription => "presentWeatherDescription",
        }
    }

    /// browse name of the variable node in the export address space
    pub fn browse_name(&self) -> &'static str {
        match self {
            Field::ObservationTime => "ObservationTime",
            Field::Temperature => "Temperature",
            Field::TemperatureChange => "TemperatureChange",
            Field::WindSpeedAvg => "WindSpeedAvg",
            Field::WindDirectionDegrees => "WindDirection",
            Field::WindDirectionText => "WindDirectionText",
            Field::Humidity => "Humidity",
            Field::PresentWeatherDescription => "Weather",
        }
    }

    pub fn data_type(&self) -> DataType {
        match self {
            Field::ObservationTime => DataType::DateTime,
            Field::WindDirectionText | Field::PresentWeatherDescription => DataType::String,
            _ => DataType::Double,
        }
    }

    fn pick(&self, obs: &NormalizedObservation) -> Option<ProjectedValue> {
        let double = |v: Option<f64>| v.map(ProjectedValue::Double);
        let text = |v: &Option<String>| v.clone().map(ProjectedValue::Text);

        match self {
            Field::ObservationTime => Some(ProjectedValue::Timestamp(obs.observation_time)),
            Field::Temperature => double(obs.temperature),
            Field::TemperatureChange => double(obs.temperature_change),
            Field::WindSpeedAvg => double(obs.wind_speed_avg),
            Field::WindDirectionDegrees => double(obs.wind_direction_degrees),
            Field::WindDirectionText => text(&obs.wind_direction_text),
            Field::Humidity => double(obs.humidity),
            Field::PresentWeatherDescription => text(&obs.present_weather_description),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown field {0:?}")]
pub struct UnknownField(pub String);

impl FromStr for Field {
    type Err = UnknownField;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Field::ALL
            .iter()
            .copied()
            .find(|f| f.name() == s || f.browse_name() == s)
            .ok_or_else(|| UnknownField(s.to_string()))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum DataType {
    DateTime,
    Double,
    String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ProjectedValue {
    Timestamp(DateTime<Utc>),
    Double(f64),
    Text(String),
}

/// a value, or the "unavailable" sentinel
#[derive(Debug, Clone, PartialEq)]
pub enum Projection {
    Value(ProjectedValue),
    Unavailable,
}

impl From<Option<ProjectedValue>> for Projection {
    fn from(value: Option<ProjectedValue>) -> Self {
        value.map(Projection::Value).unwrap_or(Projection::Unavailable)
    }
}

#[derive(Clone)]
pub struct ValueProjector {
    cache: Arc<ObservationCache>,
}

impl ValueProjector {
    pub fn new(cache: Arc<ObservationCache>) -> Self {
        Self { cache }
    }

    pub fn project(&self, station_id: &str, field: Field) -> Projection {
        self.cache
            .read(station_id)
            .and_then(|obs| field.pick(&obs))
            .into()
    }

    /// like `project`, with an unknown field name also mapping to Unavailable
    pub fn project_named(&self, station_id: &str, field_name: &str) -> Projection {
        match field_name.parse::<Field>() {
            Ok(field) => self.project(station_id, field),
            Err(_) => Projection::Unavailable,
        }
    }
}
