//! ==============================================================================
//! main.rs - road weather host entry point
//! ==============================================================================
//!
//! purpose:
//!     polls a fixed list of road weather stations, keeps the latest
//!     normalized observation of each in memory, archives payloads that carry
//!     a new observation, and serves the cached values on demand.
//!
//! responsibilities:
//!     - load host.toml and the station registry (fatal on error)
//!     - initialize logging
//!     - wire fetcher -> scheduler -> cache -> archiver
//!     - serve the projector through the export layer (if enabled)
//!     - run the sweep timer until ctrl-c
//!
//! architecture:
//!
//!     ┌──────────────────────────────────────────────────────────────┐
//!     │                        host (this file)                      │
//!     │  ┌──────────────┐                       ┌──────────────────┐ │
//!     │  │ poll timer   │                       │ export server    │ │
//!     │  │ (180s cycle) │                       │ (port 4334)      │ │
//!     │  └──────┬───────┘                       └────────┬─────────┘ │
//!     │         │ sweep                                  │ project  │
//!     │  ┌──────┴───────┐   update    ┌─────────┐  read  ┌┴────────┐ │
//!     │  │  scheduler   ├────────────►│  cache  │◄───────┤projector│ │
//!     │  └──┬────────┬──┘             └─────────┘        └─────────┘ │
//!     │     │        │ (prev, new)                                   │
//!     │  fetcher  archiver ──► <base_path>/<id>_<YYYYMM>.json        │
//!     └─────┼────────────────────────────────────────────────────────┘
//!           ▼
//!     road weather api
//!
//! ==============================================================================

mod archive;
mod cache;
mod config;
mod domain;
mod error;
mod export;
mod extract;
mod fetch;
mod projector;
mod scheduler;
mod wind;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use tracing_subscriber::EnvFilter;

use crate::archive::{Archiver, FileArchive};
use crate::cache::ObservationCache;
use crate::config::HostConfig;
use crate::fetch::HttpFetcher;
use crate::projector::ValueProjector;
use crate::scheduler::{PollScheduler, SchedulerOptions};

fn init_logging(default_level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

fn config_path() -> Option<PathBuf> {
    std::env::args()
        .nth(1)
        .or_else(|| std::env::var("ROADWEATHER_CONFIG").ok())
        .map(PathBuf::from)
}

#[tokio::main]
async fn main() -> Result<()> {
    // step 1: load configuration
    let config_file = HostConfig::locate(config_path());
    let config = HostConfig::load_or_default(config_file.as_deref()).context("failed to load configuration")?;
    init_logging(&config.logging.level);
    match &config_file {
        Some(path) => tracing::info!("[CONFIG] Loaded from {}", path.display()),
        None => tracing::warn!("[CONFIG] No config file found - using defaults"),
    }
    config.log_summary();

    let stations = config::load_stations(&config.stations.path).context("failed to load station registry")?;
    tracing::info!("[STARTUP] {} stations loaded", stations.len());

    // step 2: the cache is shared by the scheduler (writer) and projector (reader)
    let cache = Arc::new(ObservationCache::new());

    // step 3: export layer in background
    if config.export.enabled {
        let app = export::router(ValueProjector::new(cache.clone()), &stations, &config.stations.language);
        let bind = config.export.bind;
        tokio::spawn(async move {
            if let Err(e) = export::run_server(bind, app).await {
                tracing::error!("[EXPORT] server error: {:#}", e);
            }
        });
    }

    // step 4: scheduler
    let fetcher = HttpFetcher::new(&config.api.base_url, &config.api.user_agent, config.fetch_timeout())
        .context("failed to build http client")?;
    let archiver = Archiver::new(config.archive.enabled, Box::new(FileArchive::new(&config.archive.base_path)));
    let scheduler = Arc::new(PollScheduler::new(
        stations,
        Arc::new(fetcher),
        cache,
        archiver,
        SchedulerOptions {
            language: config.stations.language.clone(),
            fetch_timeout: config.fetch_timeout(),
            skip_if_running: config.polling.skip_if_running,
            show_station_data: config.logging.show_station_data,
        },
    ));

    // step 5: sweep now and on every tick until ctrl-c
    tokio::select! {
        _ = scheduler.run(config.poll_interval()) => {}
        res = tokio::signal::ctrl_c() => {
            res.context("failed to listen for ctrl-c")?;
            tracing::info!("[SHUTDOWN] ctrl-c received, stopping");
        }
    }

    Ok(())
}
