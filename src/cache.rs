//! ==============================================================================
//! cache.rs - latest observation per station
//! ==============================================================================
//!
//! purpose:
//!     an owned store, injected into the scheduler (writer) and the projector
//!     (readers). each entry is an Arc'd record that is swapped whole, so a
//!     reader holds either the old or the new record and never a mix.
//!
//! concurrency:
//!     std RwLock, held only for a map lookup or insert. nothing awaits while
//!     the lock is held, so readers on other tasks/threads never wait on a
//!     fetch.
//!
//! ==============================================================================

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use chrono::{DateTime, Utc};

use crate::domain::NormalizedObservation;

/// the (previous, new) pair produced by one `update` call
#[derive(Clone, Debug)]
pub struct CacheUpdate {
    pub previous_observation_time: Option<DateTime<Utc>>,
    pub current: Arc<NormalizedObservation>,
}

impl CacheUpdate {
    /// true only when there was a baseline and its time differs at ms resolution.
    /// an earlier timestamp counts as a change too.
    pub fn is_changed(&self) -> bool {
        match self.previous_observation_time {
            Some(prev) => prev.timestamp_millis() != self.current.observation_time.timestamp_millis(),
            None => false,
        }
    }
}

#[derive(Debug, Default)]
pub struct ObservationCache {
    entries: RwLock<HashMap<String, Arc<NormalizedObservation>>>,
}

impl ObservationCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// install `record` and report the observation time it replaced
    pub fn update(&self, station_id: &str, record: NormalizedObservation) -> CacheUpdate {
        let current = Arc::new(record);
        // a poisoned lock still guards whole records
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        let previous = entries.insert(station_id.to_string(), current.clone());

        CacheUpdate {
            previous_observation_time: previous.map(|p| p.observation_time),
            current,
        }
    }

    pub fn read(&self, station_id: &str) -> Option<Arc<NormalizedObservation>> {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(station_id)
            .cloned()
    }

    pub fn len(&self) -> usize {
        self.entries.read().unwrap_or_else(PoisonError::into_inner).len()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    pub(crate) fn observation(station: &str, observed: DateTime<Utc>, temperature: f64) -> NormalizedObservation {
        NormalizedObservation {
            station_id: station.to_string(),
            station_name: format!("station {}", station),
            fetch_time: observed,
            observation_time: observed,
            temperature: Some(temperature),
            temperature_unit: Some("°C".into()),
            temperature_change: None,
            temperature_change_unit: None,
            wind_speed_avg: None,
            wind_speed_avg_unit: None,
            wind_direction_degrees: None,
            wind_direction_unit: None,
            wind_direction_text: None,
            humidity: None,
            humidity_unit: None,
            present_weather_description: None,
        }
    }

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2019, 7, 14, 12, 0, 0).unwrap()
    }

    #[test]
    fn first_update_has_no_baseline() {
        let cache = ObservationCache::new();
        assert!(cache.read("1012").is_none());

        let update = cache.update("1012", observation("1012", t0(), 18.0));
        assert_eq!(update.previous_observation_time, None);
        assert!(!update.is_changed());
        assert_eq!(cache.read("1012").unwrap().temperature, Some(18.0));
    }

    #[test]
    fn same_observation_time_is_not_a_change() {
        let cache = ObservationCache::new();
        cache.update("1012", observation("1012", t0(), 18.0));
        let update = cache.update("1012", observation("1012", t0(), 19.0));

        assert_eq!(update.previous_observation_time, Some(t0()));
        assert!(!update.is_changed());
        // the record is still replaced
        assert_eq!(cache.read("1012").unwrap().temperature, Some(19.0));
    }

    #[test]
    fn new_observation_time_is_a_change() {
        let cache = ObservationCache::new();
        cache.update("1012", observation("1012", t0(), 18.0));
        let later = t0() + Duration::minutes(5);
        let update = cache.update("1012", observation("1012", later, 18.0));

        assert_eq!(update.previous_observation_time, Some(t0()));
        assert_eq!(update.current.observation_time, later);
        assert!(update.is_changed());
    }

    #[test]
    fn earlier_observation_time_is_also_a_change() {
        let cache = ObservationCache::new();
        cache.update("1012", observation("1012", t0(), 18.0));
        let update = cache.update("1012", observation("1012", t0() - Duration::minutes(5), 18.0));
        assert!(update.is_changed());
    }

    #[test]
    fn sub_millisecond_difference_is_not_a_change() {
        let cache = ObservationCache::new();
        cache.update("1012", observation("1012", t0(), 18.0));
        let update = cache.update("1012", observation("1012", t0() + Duration::microseconds(300), 18.0));
        assert!(!update.is_changed());
    }

    #[test]
    fn stations_are_independent() {
        let cache = ObservationCache::new();
        cache.update("1012", observation("1012", t0(), 18.0));
        cache.update("2052", observation("2052", t0(), 11.0));
        assert_eq!(cache.len(), 2);
        assert_eq!(cache.read("2052").unwrap().temperature, Some(11.0));
        assert_eq!(cache.read("1012").unwrap().temperature, Some(18.0));
    }

    #[test]
    fn readers_see_whole_records_during_writes() {
        let cache = Arc::new(ObservationCache::new());
        cache.update("1012", observation("1012", t0(), 0.0));

        let writer = {
            let cache = cache.clone();
            std::thread::spawn(move || {
                for i in 1..500 {
                    let mut obs = observation("1012", t0() + Duration::seconds(i), i as f64);
                    obs.humidity = Some(i as f64);
                    cache.update("1012", obs);
                }
            })
        };

        for _ in 0..500 {
            let obs = cache.read("1012").unwrap();
            if let Some(h) = obs.humidity {
                assert_eq!(obs.temperature, Some(h));
            }
        }
        writer.join().unwrap();
    }
}
