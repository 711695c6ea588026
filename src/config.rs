//! ==============================================================================
//! config.rs - Runtime Configuration Loader
//! ==============================================================================
//!
//! purpose:
//!     defines the schema for `host.toml` and loads the station registry
//!     (`stations.json`) it points at.
//!
//! structure:
//!     - ApiConfig: Where station payloads are fetched from.
//!     - PollingConfig: Sweep interval, per-fetch timeout, overlap guard.
//!     - StationsConfig: Registry path and display language.
//!     - ArchiveConfig: Change-triggered archive toggle and directory.
//!     - ExportConfig: Optional HTTP export layer.
//!     - LoggingConfig: Default log level.
//!
//! failure policy:
//!     no host.toml anywhere -> defaults. a host.toml that cannot be read or
//!     parsed, a zero interval, or a bad/empty registry -> ConfigError, and
//!     the process does not start.
//!
//! ==============================================================================

use std::collections::HashSet;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::domain::{StationConfig, StationRegistry};
use crate::error::ConfigError;

/// Root configuration structure
#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct HostConfig {
    pub api: ApiConfig,
    pub polling: PollingConfig,
    pub stations: StationsConfig,
    pub archive: ArchiveConfig,
    pub export: ExportConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ApiConfig {
    pub base_url: String,
    pub user_agent: String,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct PollingConfig {
    pub interval_seconds: u64,
    pub fetch_timeout_seconds: u64,
    pub skip_if_running: bool,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct StationsConfig {
    pub path: PathBuf,
    pub language: String,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ArchiveConfig {
    pub enabled: bool,
    pub base_path: PathBuf,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ExportConfig {
    pub enabled: bool,
    pub bind: SocketAddr,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub show_station_data: bool,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: "https://tie.digitraffic.fi/api/v1/data/weather-data/".to_string(),
            user_agent: concat!("roadweather-host/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            interval_seconds: 180,
            fetch_timeout_seconds: 30,
            skip_if_running: false,
        }
    }
}

impl Default for StationsConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("config").join("stations.json"),
            language: "fi".to_string(),
        }
    }
}

impl Default for ArchiveConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            base_path: PathBuf::from("archive"),
        }
    }
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            bind: SocketAddr::from(([0, 0, 0, 0], 4334)),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            show_station_data: false,
        }
    }
}

impl HostConfig {
    /// Load configuration from file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&content, path)
    }

    fn parse(content: &str, path: &Path) -> Result<Self, ConfigError> {
        let config: HostConfig = toml::from_str(content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    /// The explicit path if given, else the first host.toml that exists
    pub fn locate(explicit: Option<PathBuf>) -> Option<PathBuf> {
        if explicit.is_some() {
            return explicit;
        }

        let paths = [
            PathBuf::from("config").join("host.toml"),
            PathBuf::from("..").join("config").join("host.toml"),
        ];
        paths.into_iter().find(|p| p.exists())
    }

    /// Load the located file, or defaults when there is none
    pub fn load_or_default(path: Option<&Path>) -> Result<Self, ConfigError> {
        match path {
            Some(path) => Self::load(path),
            None => Ok(Self::default()),
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.polling.interval_seconds == 0 {
            return Err(ConfigError::InvalidOption(
                "polling.interval_seconds must be at least 1".into(),
            ));
        }
        if self.polling.fetch_timeout_seconds == 0 {
            return Err(ConfigError::InvalidOption(
                "polling.fetch_timeout_seconds must be at least 1".into(),
            ));
        }
        if self.api.base_url.is_empty() {
            return Err(ConfigError::InvalidOption("api.base_url is empty".into()));
        }
        Ok(())
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.polling.interval_seconds)
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.polling.fetch_timeout_seconds)
    }

    /// Log configuration summary
    pub fn log_summary(&self) {
        tracing::info!("[CONFIG] API: {}", self.api.base_url);
        tracing::info!("[CONFIG] Poll Interval: {}s", self.polling.interval_seconds);
        tracing::info!("[CONFIG] Fetch Timeout: {}s", self.polling.fetch_timeout_seconds);
        tracing::info!("[CONFIG] Stations: {} ({})", self.stations.path.display(), self.stations.language);
        if self.archive.enabled {
            tracing::info!("[CONFIG] Archive: {}", self.archive.base_path.display());
        } else {
            tracing::info!("[CONFIG] Archive: disabled");
        }
        if self.export.enabled {
            tracing::info!("[CONFIG] Export: {}", self.export.bind);
        } else {
            tracing::info!("[CONFIG] Export: disabled");
        }
    }
}

/// Load and check the station registry
pub fn load_stations<P: AsRef<Path>>(path: P) -> Result<Vec<StationConfig>, ConfigError> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    parse_stations(&content, path)
}

fn parse_stations(content: &str, path: &Path) -> Result<Vec<StationConfig>, ConfigError> {
    let registry: StationRegistry = serde_json::from_str(content).map_err(|source| ConfigError::Registry {
        path: path.to_path_buf(),
        source,
    })?;

    if registry.stations.is_empty() {
        return Err(ConfigError::EmptyRegistry(path.to_path_buf()));
    }

    let mut seen = HashSet::new();
    for station in &registry.stations {
        if station.id.trim().is_empty() {
            return Err(ConfigError::InvalidOption("station with empty id".into()));
        }
        if !seen.insert(station.id.as_str()) {
            return Err(ConfigError::InvalidOption(format!(
                "station {} listed twice",
                station.id
            )));
        }
    }

    Ok(registry.stations)
}
