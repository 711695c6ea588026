//! ==============================================================================
//! error.rs - failure taxonomy
//! ==============================================================================
//!
//! purpose:
//!     one enum per failure kind. none of these ever escape a sweep: the
//!     scheduler catches fetch/extract errors per station, the archiver catches
//!     its own write errors, and only configuration errors stop the process.
//!
//! relationships:
//!     - FetchError: fetch.rs (TransportError)
//!     - ExtractError: extract.rs (MalformedPayloadError)
//!     - ArchiveError: archive.rs (ArchiveWriteError)
//!     - ConfigError: config.rs (ConfigurationError, fatal at startup)
//!
//! ==============================================================================

use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("api returned status {0}")]
    Status(u16),
    #[error("no response within {0:?}")]
    Timeout(Duration),
    #[error("response is not valid json: {0}")]
    Decode(#[from] serde_json::Error),
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ExtractError {
    #[error("payload has no station block")]
    MissingStationBlock,
    #[error("station block is malformed: {0}")]
    BadStationBlock(String),
    #[error("station block has no measurement time")]
    MissingTimestamp,
    #[error("measurement time {0:?} is not an rfc3339 timestamp")]
    BadTimestamp(String),
}

#[derive(Debug, thiserror::Error)]
pub enum ArchiveError {
    #[error("cannot create archive directory {path:?}: {source}")]
    CreateDir {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("cannot open archive file {path:?}: {source}")]
    Open {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("cannot serialize payload: {0}")]
    Serialize(#[from] serde_json::Error),
    #[error("cannot append to archive file {path:?}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read {path:?}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse {path:?}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
    #[error("failed to parse station registry {path:?}: {source}")]
    Registry {
        path: PathBuf,
        source: serde_json::Error,
    },
    #[error("station registry {0:?} lists no stations")]
    EmptyRegistry(PathBuf),
    #[error("invalid option: {0}")]
    InvalidOption(String),
}

/// why a single station was skipped for this sweep
#[derive(Debug, thiserror::Error)]
pub enum StationError {
    #[error("fetch failed: {0}")]
    Fetch(#[from] FetchError),
    #[error("malformed payload: {0}")]
    Extract(#[from] ExtractError),
}
