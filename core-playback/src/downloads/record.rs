//! Durable completion record: track id → downloaded file.
//!
//! Read once at startup, rewritten on every COMPLETED transition and on every
//! delete. [`FileRecordStore`] writes a sibling temp file and renames it over
//! the record, so a crash mid-write leaves the previous record intact.

use crate::error::{PlaybackError, Result};
use async_trait::async_trait;
use bridge_traits::FileSystemAccess;
use bytes::Bytes;
use core_library::TrackId;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, warn};

pub type DownloadRecords = BTreeMap<TrackId, PathBuf>;

const RECORD_VERSION: u32 = 1;

/// Persistence for the completion record.
#[async_trait]
pub trait DownloadRecordStore: Send + Sync {
    /// Missing record means no downloads yet.
    async fn load(&self) -> Result<DownloadRecords>;

    /// Replaces the whole record.
    async fn save(&self, records: &DownloadRecords) -> Result<()>;
}

#[derive(Debug, Serialize, Deserialize)]
struct RecordFile {
    version: u32,
    downloads: DownloadRecords,
}

/// JSON record in the app data directory.
pub struct FileRecordStore {
    fs: Arc<dyn FileSystemAccess>,
    file_name: String,
}

impl FileRecordStore {
    pub fn new(fs: Arc<dyn FileSystemAccess>, file_name: impl Into<String>) -> Self {
        Self {
            fs,
            file_name: file_name.into(),
        }
    }

    async fn path(&self) -> Result<PathBuf> {
        Ok(self.fs.get_data_directory().await?.join(&self.file_name))
    }
}

fn io_error(reason: impl Into<String>) -> PlaybackError {
    PlaybackError::DownloadIo {
        track_id: "*".to_string(),
        reason: reason.into(),
    }
}

#[async_trait]
impl DownloadRecordStore for FileRecordStore {
    async fn load(&self) -> Result<DownloadRecords> {
        let path = self.path().await?;
        if !self.fs.exists(&path).await? {
            debug!("No download record yet");
            return Ok(DownloadRecords::new());
        }

        let data = self.fs.read_file(&path).await?;
        match serde_json::from_slice::<RecordFile>(&data) {
            Ok(file) => Ok(file.downloads),
            Err(e) => {
                // Files are still on disk; startup reconciliation cannot
                // recover ids from them, so begin with an empty record.
                warn!(error = %e, "Download record unreadable, starting empty");
                Ok(DownloadRecords::new())
            }
        }
    }

    async fn save(&self, records: &DownloadRecords) -> Result<()> {
        let path = self.path().await?;
        let tmp = path.with_extension("json.tmp");

        let body = serde_json::to_vec_pretty(&RecordFile {
            version: RECORD_VERSION,
            downloads: records.clone(),
        })
        .map_err(|e| io_error(format!("encode download record: {e}")))?;

        self.fs.write_file(&tmp, Bytes::from(body)).await?;
        self.fs.rename(&tmp, &path).await?;
        debug!(entries = records.len(), "Download record saved");
        Ok(())
    }
}

/// In-memory record for hosts without durable storage and for tests.
#[derive(Default)]
pub struct MemoryRecordStore {
    records: Mutex<DownloadRecords>,
    fail_saves: AtomicBool,
}

impl MemoryRecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_records(records: DownloadRecords) -> Self {
        Self {
            records: Mutex::new(records),
            fail_saves: AtomicBool::new(false),
        }
    }

    /// Makes subsequent saves fail.
    pub fn set_fail_saves(&self, fail: bool) {
        self.fail_saves.store(fail, Ordering::SeqCst);
    }

    pub fn records(&self) -> DownloadRecords {
        self.records.lock().clone()
    }
}

#[async_trait]
impl DownloadRecordStore for MemoryRecordStore {
    async fn load(&self) -> Result<DownloadRecords> {
        Ok(self.records.lock().clone())
    }

    async fn save(&self, records: &DownloadRecords) -> Result<()> {
        if self.fail_saves.load(Ordering::SeqCst) {
            return Err(io_error("record store unavailable"));
        }
        *self.records.lock() = records.clone();
        Ok(())
    }
}
