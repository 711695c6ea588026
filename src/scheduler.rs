//! ==============================================================================
//! scheduler.rs - poll scheduler
//! ==============================================================================
//!
//! purpose:
//!     runs one sweep over every configured station at startup and then on
//!     every timer tick. per station: fetch -> extract -> cache update ->
//!     archive decision.
//!
//! behaviour:
//!     - stations are polled one after another, in registry order, so at most
//!       one fetch is in flight per sweep.
//!     - a fetch or extract failure is logged with the station id and the
//!       station is skipped; its cache entry stays as it was.
//!     - no retries inside a sweep, the next tick revisits the station.
//!     - each tick spawns its own sweep, so a sweep that outlasts the interval
//!       overlaps with the next one unless `skip_if_running` is set.
//!
//! relationships:
//!     - uses: fetch.rs (Fetcher), extract.rs, cache.rs, archive.rs
//!     - used by: main.rs
//!
//! ==============================================================================

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::archive::{ArchiveOutcome, Archiver};
use crate::cache::{CacheUpdate, ObservationCache};
use crate::domain::{RawPayload, StationConfig};
use crate::error::{FetchError, StationError};
use crate::extract;
use crate::fetch::Fetcher;

#[derive(Debug, Clone)]
pub struct SchedulerOptions {
    pub language: String,
    pub fetch_timeout: Duration,
    pub skip_if_running: bool,
    pub show_station_data: bool,
}

impl Default for SchedulerOptions {
    fn default() -> Self {
        Self {
            language: "fi".to_string(),
            fetch_timeout: Duration::from_secs(30),
            skip_if_running: false,
            show_station_data: false,
        }
    }
}

/// what happened to each station during one sweep
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SweepReport {
    pub polled: Vec<String>,
    pub failed: Vec<String>,
    pub changed: Vec<String>,
    pub archived: Vec<String>,
}

pub struct PollScheduler {
    stations: Vec<StationConfig>,
    fetcher: Arc<dyn Fetcher>,
    cache: Arc<ObservationCache>,
    archiver: Archiver,
    options: SchedulerOptions,
    sweeping: AtomicBool,
}

/// clears the sweeping flag even if the sweep task panics
struct SweepGuard<'a>(&'a AtomicBool);

impl Drop for SweepGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

impl PollScheduler {
    pub fn new(
        stations: Vec<StationConfig>,
        fetcher: Arc<dyn Fetcher>,
        cache: Arc<ObservationCache>,
        archiver: Archiver,
        options: SchedulerOptions,
    ) -> Self {
        Self {
            stations,
            fetcher,
            cache,
            archiver,
            options,
            sweeping: AtomicBool::new(false),
        }
    }

    /// fetch with the per-fetch timeout applied
    async fn fetch(&self, station_id: &str) -> Result<RawPayload, FetchError> {
        let timeout = self.options.fetch_timeout;
        match tokio::time::timeout(timeout, self.fetcher.fetch(station_id)).await {
            Ok(result) => result,
            Err(_) => Err(FetchError::Timeout(timeout)),
        }
    }

    /// fetch and extract one station, then install the record
    async fn poll_station(&self, station: &StationConfig) -> Result<(CacheUpdate, RawPayload), StationError> {
        let name = station.display_name(&self.options.language);
        let raw = self.fetch(&station.id).await?;
        let record = extract::extract(&raw, &station.id, name, &self.options.language)?;
        let update = self.cache.update(&station.id, record);
        Ok((update, raw))
    }

    /// one full pass over every station, in order. never fails.
    pub async fn run_sweep(&self) -> SweepReport {
        let mut report = SweepReport::default();

        for station in &self.stations {
            tracing::debug!(
                station = %station.id,
                name = station.display_name(&self.options.language),
                "[POLL] updating station"
            );

            let (update, raw) = match self.poll_station(station).await {
                Ok(polled) => polled,
                Err(e) => {
                    tracing::warn!(station = %station.id, "[POLL] station skipped: {}", e);
                    report.failed.push(station.id.clone());
                    continue;
                }
            };

            if self.options.show_station_data {
                tracing::info!(station = %station.id, "[POLL] {:?}", update.current);
            }

            report.polled.push(station.id.clone());
            if update.is_changed() {
                report.changed.push(station.id.clone());
            }
            if self.archiver.maybe_archive(&station.id, &update, &raw).await == ArchiveOutcome::Written {
                report.archived.push(station.id.clone());
            }
        }

        tracing::info!(
            polled = report.polled.len(),
            failed = report.failed.len(),
            changed = report.changed.len(),
            archived = report.archived.len(),
            cached = self.cache.len(),
            "[POLL] sweep finished"
        );
        report
    }

    /// runs a sweep unless one is already in flight and the guard is on.
    /// returns None when the sweep was skipped.
    pub async fn trigger(&self) -> Option<SweepReport> {
        if !self.options.skip_if_running {
            return Some(self.run_sweep().await);
        }

        if self
            .sweeping
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            tracing::warn!("[POLL] previous sweep still running, skipping this tick");
            return None;
        }
        let _guard = SweepGuard(&self.sweeping);
        Some(self.run_sweep().await)
    }

    /// sweep now, then once per `interval`, forever. each tick spawns its own
    /// sweep so a slow sweep does not hold back the timer.
    pub async fn run(self: Arc<Self>, interval: Duration) {
        let mut ticker = tokio::time::interval(interval);
        tracing::info!(
            stations = self.stations.len(),
            "[POLL] starting station polling ({}s interval)",
            interval.as_secs()
        );

        loop {
            // first tick completes immediately
            ticker.tick().await;
            let scheduler = self.clone();
            tokio::spawn(async move {
                scheduler.trigger().await;
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::archive::tests::RecordingSink;
    use crate::error::ExtractError;
    use crate::extract::tests::full_payload;
    use crate::fetch::tests::ScriptedFetcher;
    use async_trait::async_trait;
    use serde_json::json;
    use std::collections::HashMap;
    use tracing_test::traced_test;

    fn station(id: &str) -> StationConfig {
        StationConfig {
            id: id.to_string(),
            names: HashMap::from([("fi".to_string(), format!("asema {}", id))]),
        }
    }

    fn scheduler(
        ids: &[&str],
        fetcher: Arc<ScriptedFetcher>,
        sink: RecordingSink,
    ) -> (PollScheduler, Arc<ObservationCache>) {
        let cache = Arc::new(ObservationCache::new());
        let scheduler = PollScheduler::new(
            ids.iter().map(|id| station(id)).collect(),
            fetcher,
            cache.clone(),
            Archiver::new(true, Box::new(sink)),
            SchedulerOptions::default(),
        );
        (scheduler, cache)
    }

    #[tokio::test]
    async fn sweep_visits_stations_in_order() {
        let fetcher = Arc::new(ScriptedFetcher::default());
        for id in ["3", "1", "2"] {
            fetcher.push(id, Ok(full_payload("2019-07-14T12:00:00Z")));
        }
        let (scheduler, cache) = scheduler(&["3", "1", "2"], fetcher.clone(), RecordingSink::default());

        let report = scheduler.run_sweep().await;
        assert_eq!(fetcher.calls(), vec!["3", "1", "2"]);
        assert_eq!(report.polled, vec!["3", "1", "2"]);
        assert!(report.failed.is_empty());
        assert_eq!(cache.read("1").unwrap().station_name, "asema 1");
    }

    #[tokio::test]
    #[traced_test]
    async fn failing_station_keeps_previous_entry() {
        let fetcher = Arc::new(ScriptedFetcher::default());
        fetcher.push("A", Ok(full_payload("2019-07-14T12:00:00Z")));
        fetcher.push("B", Ok(full_payload("2019-07-14T12:00:00Z")));
        fetcher.push("A", Err(FetchError::Status(503)));
        fetcher.push("B", Ok(full_payload("2019-07-14T12:05:00Z")));
        let (scheduler, cache) = scheduler(&["A", "B"], fetcher, RecordingSink::default());

        scheduler.run_sweep().await;
        let a_before = cache.read("A").unwrap();

        let report = scheduler.run_sweep().await;
        assert_eq!(report.failed, vec!["A"]);
        assert_eq!(report.polled, vec!["B"]);
        assert_eq!(*cache.read("A").unwrap(), *a_before);
        assert!(Arc::ptr_eq(&cache.read("A").unwrap(), &a_before));
        assert_eq!(
            cache.read("B").unwrap().observation_time.to_rfc3339(),
            "2019-07-14T12:05:00+00:00"
        );
        assert!(logs_contain("[POLL] station skipped"));
    }

    #[tokio::test]
    async fn malformed_payload_is_isolated() {
        let fetcher = Arc::new(ScriptedFetcher::default());
        fetcher.push("A", Ok(RawPayload::new(json!({ "error": "no such station" }))));
        fetcher.push("B", Ok(full_payload("2019-07-14T12:00:00Z")));
        let (scheduler, cache) = scheduler(&["A", "B"], fetcher, RecordingSink::default());

        let report = scheduler.run_sweep().await;
        assert_eq!(report.failed, vec!["A"]);
        assert!(cache.read("A").is_none());
        assert!(cache.read("B").is_some());
    }

    #[tokio::test]
    async fn archives_only_when_observation_time_moves() {
        let fetcher = Arc::new(ScriptedFetcher::default());
        fetcher.push("A", Ok(full_payload("2019-07-14T12:00:00Z")));
        fetcher.push("A", Ok(full_payload("2019-07-14T12:00:00Z")));
        let newer = full_payload("2019-07-14T12:05:00Z");
        fetcher.push("A", Ok(newer.clone()));
        let sink = RecordingSink::default();
        let (scheduler, _cache) = scheduler(&["A"], fetcher, sink.clone());

        let first = scheduler.run_sweep().await;
        let second = scheduler.run_sweep().await;
        assert!(first.archived.is_empty() && second.archived.is_empty());
        assert!(sink.appended.lock().unwrap().is_empty());

        let third = scheduler.run_sweep().await;
        assert_eq!(third.changed, vec!["A"]);
        assert_eq!(third.archived, vec!["A"]);
        assert_eq!(*sink.appended.lock().unwrap(), vec![("A".to_string(), newer)]);
    }

    struct StalledFetcher;

    #[async_trait]
    impl Fetcher for StalledFetcher {
        async fn fetch(&self, station_id: &str) -> Result<RawPayload, FetchError> {
            if station_id == "slow" {
                std::future::pending::<()>().await;
            }
            Ok(full_payload("2019-07-14T12:00:00Z"))
        }
    }

    #[tokio::test(start_paused = true)]
    async fn stalled_fetch_times_out_and_sweep_continues() {
        let cache = Arc::new(ObservationCache::new());
        let scheduler = PollScheduler::new(
            vec![station("slow"), station("fast")],
            Arc::new(StalledFetcher),
            cache.clone(),
            Archiver::new(false, Box::new(RecordingSink::default())),
            SchedulerOptions {
                fetch_timeout: Duration::from_secs(5),
                ..SchedulerOptions::default()
            },
        );

        let report = scheduler.run_sweep().await;
        assert_eq!(report.failed, vec!["slow"]);
        assert_eq!(report.polled, vec!["fast"]);
        assert!(cache.read("fast").is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn guard_skips_overlapping_trigger() {
        let scheduler = Arc::new(PollScheduler::new(
            vec![station("slow")],
            Arc::new(StalledFetcher),
            Arc::new(ObservationCache::new()),
            Archiver::new(false, Box::new(RecordingSink::default())),
            SchedulerOptions {
                fetch_timeout: Duration::from_secs(60),
                skip_if_running: true,
                ..SchedulerOptions::default()
            },
        ));

        let running = {
            let scheduler = scheduler.clone();
            tokio::spawn(async move { scheduler.trigger().await })
        };
        // let the spawned sweep start and park on the stalled fetch
        tokio::task::yield_now().await;
        tokio::task::yield_now().await;

        assert_eq!(scheduler.trigger().await, None);
        let finished = running.await.unwrap().unwrap();
        assert_eq!(finished.failed, vec!["slow"]);
        // flag is released once the sweep ends
        assert!(scheduler.trigger().await.is_some());
    }

    #[test]
    fn station_error_wraps_both_kinds() {
        let fetch: StationError = FetchError::Status(500).into();
        let extract: StationError = ExtractError::MissingStationBlock.into();
        assert_eq!(fetch.to_string(), "fetch failed: api returned status 500");
        assert_eq!(extract.to_string(), "malformed payload: payload has no station block");
    }
}
