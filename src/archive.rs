//! ==============================================================================
//! archive.rs - change-triggered archiver
//! ==============================================================================
//!
//! purpose:
//!     appends the raw payload of a poll to a per-station monthly json-lines
//!     file, but only when the poll produced a genuinely new observation.
//!
//! rules:
//!     - archive iff enabled AND a previous observation time exists AND it
//!       differs from the new one. the decision is taken from the CacheUpdate
//!       returned by the same cache write, never from a second cache read.
//!     - target: <base_path>/<station_id>_<YYYY><MM>.json (utc wall clock).
//!     - write failures are logged and swallowed; no retry this cycle.
//!
//! ==============================================================================

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, Datelike, Utc};
use tokio::fs::{self, OpenOptions};
use tokio::io::AsyncWriteExt;

use crate::cache::CacheUpdate;
use crate::domain::RawPayload;
use crate::error::ArchiveError;

#[async_trait]
pub trait ArchiveSink: Send + Sync {
    async fn append(&self, station_id: &str, payload: &RawPayload, now: DateTime<Utc>) -> Result<(), ArchiveError>;
}

/// monthly rotated file for a station
pub fn target_path(base_path: &Path, station_id: &str, now: DateTime<Utc>) -> PathBuf {
    base_path.join(format!("{}_{}{:02}.json", station_id, now.year(), now.month()))
}

/// append-only json-lines files on the local filesystem
pub struct FileArchive {
    base_path: PathBuf,
}

impl FileArchive {
    pub fn new(base_path: impl Into<PathBuf>) -> Self {
        Self {
            base_path: base_path.into(),
        }
    }
}

#[async_trait]
impl ArchiveSink for FileArchive {
    async fn append(&self, station_id: &str, payload: &RawPayload, now: DateTime<Utc>) -> Result<(), ArchiveError> {
        let mut line = serde_json::to_vec(payload.as_json())?;
        line.push(b'\n');

        fs::create_dir_all(&self.base_path)
            .await
            .map_err(|source| ArchiveError::CreateDir {
                path: self.base_path.clone(),
                source,
            })?;

        let path = target_path(&self.base_path, station_id, now);
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await
            .map_err(|source| ArchiveError::Open {
                path: path.clone(),
                source,
            })?;

        file.write_all(&line)
            .await
            .map_err(|source| ArchiveError::Write { path: path.clone(), source })?;
        file.flush()
            .await
            .map_err(|source| ArchiveError::Write { path, source })?;
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveOutcome {
    Disabled,
    Unchanged,
    Written,
    Failed,
}

pub struct Archiver {
    enabled: bool,
    sink: Box<dyn ArchiveSink>,
}

impl Archiver {
    pub fn new(enabled: bool, sink: Box<dyn ArchiveSink>) -> Self {
        Self { enabled, sink }
    }

    pub fn should_archive(&self, update: &CacheUpdate) -> bool {
        self.enabled && update.is_changed()
    }

    pub async fn maybe_archive(&self, station_id: &str, update: &CacheUpdate, raw: &RawPayload) -> ArchiveOutcome {
        self.maybe_archive_at(station_id, update, raw, Utc::now()).await
    }

    pub async fn maybe_archive_at(
        &self,
        station_id: &str,
        update: &CacheUpdate,
        raw: &RawPayload,
        now: DateTime<Utc>,
    ) -> ArchiveOutcome {
        if !self.enabled {
            return ArchiveOutcome::Disabled;
        }
        if !self.should_archive(update) {
            return ArchiveOutcome::Unchanged;
        }

        match self.sink.append(station_id, raw, now).await {
            Ok(()) => {
                tracing::info!(
                    station = station_id,
                    observed = %update.current.observation_time,
                    "[ARCHIVE] new observation archived"
                );
                ArchiveOutcome::Written
            }
            Err(e) => {
                tracing::error!(station = station_id, "[ARCHIVE] write failed: {}", e);
                ArchiveOutcome::Failed
            }
        }
    }
}
