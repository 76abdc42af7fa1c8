//! Download task model

use core_library::TrackId;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// Lifecycle of a download.
///
/// ```text
/// QUEUED ──► DOWNLOADING ──► COMPLETED
///   │             │  ▲
///   │             │  └── retry ──┐
///   │             ├──────────► FAILED
///   └─────────────┴──────────► CANCELLED
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DownloadStatus {
    Queued,
    Downloading,
    Completed,
    Failed,
    Cancelled,
}

impl DownloadStatus {
    /// Queued or transferring.
    pub fn is_in_flight(&self) -> bool {
        matches!(self, DownloadStatus::Queued | DownloadStatus::Downloading)
    }

    pub fn is_terminal(&self) -> bool {
        !self.is_in_flight()
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            DownloadStatus::Queued => "queued",
            DownloadStatus::Downloading => "downloading",
            DownloadStatus::Completed => "completed",
            DownloadStatus::Failed => "failed",
            DownloadStatus::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for DownloadStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// Resolution, connection or transfer failure
    Network,
    /// Local disk failure
    Io,
}

impl FailureKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FailureKind::Network => "network",
            FailureKind::Io => "io",
        }
    }
}

/// Why a task ended in FAILED.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DownloadFailure {
    pub kind: FailureKind,
    pub message: String,
}

impl DownloadFailure {
    pub fn network(message: impl Into<String>) -> Self {
        Self {
            kind: FailureKind::Network,
            message: message.into(),
        }
    }

    pub fn io(message: impl Into<String>) -> Self {
        Self {
            kind: FailureKind::Io,
            message: message.into(),
        }
    }
}

/// A tracked download.
///
/// `bytes_downloaded <= total_bytes` whenever `total_bytes` is non-zero;
/// `local_path` is set only once COMPLETED.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DownloadTask {
    pub track_id: TrackId,
    pub status: DownloadStatus,
    pub bytes_downloaded: u64,
    /// `0` until the response headers announce a length
    pub total_bytes: u64,
    pub local_path: Option<PathBuf>,
    pub failure: Option<DownloadFailure>,
    /// Starts at 1; bumped on every retry
    pub attempt: u32,
}

impl DownloadTask {
    pub fn queued(track_id: TrackId, attempt: u32) -> Self {
        Self {
            track_id,
            status: DownloadStatus::Queued,
            bytes_downloaded: 0,
            total_bytes: 0,
            local_path: None,
            failure: None,
            attempt,
        }
    }

    pub fn completed(track_id: TrackId, path: PathBuf) -> Self {
        Self {
            track_id,
            status: DownloadStatus::Completed,
            bytes_downloaded: 0,
            total_bytes: 0,
            local_path: Some(path),
            failure: None,
            attempt: 1,
        }
    }

    /// Records transfer progress.
    ///
    /// A body longer than its announced length raises `total_bytes` to match
    /// rather than breaking the bound.
    pub fn set_progress(&mut self, bytes_downloaded: u64, total_bytes: u64) {
        self.bytes_downloaded = bytes_downloaded;
        self.total_bytes = if total_bytes > 0 {
            total_bytes.max(bytes_downloaded)
        } else {
            0
        };
    }

    /// Fraction in `0.0..=1.0`, when the total is known.
    pub fn fraction(&self) -> Option<f64> {
        (self.total_bytes > 0).then(|| self.bytes_downloaded as f64 / self.total_bytes as f64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_progress_never_exceeds_known_total() {
        let mut task = DownloadTask::queued(TrackId::remote("42"), 1);
        task.set_progress(500, 1000);
        assert_eq!(task.fraction(), Some(0.5));

        task.set_progress(1200, 1000);
        assert!(task.bytes_downloaded <= task.total_bytes);
        assert_eq!(task.fraction(), Some(1.0));
    }

    #[test]
    fn test_unknown_total() {
        let mut task = DownloadTask::queued(TrackId::remote("42"), 1);
        task.set_progress(4096, 0);
        assert_eq!(task.total_bytes, 0);
        assert_eq!(task.fraction(), None);
    }

    #[test]
    fn test_status_classification() {
        assert!(DownloadStatus::Queued.is_in_flight());
        assert!(DownloadStatus::Downloading.is_in_flight());
        assert!(DownloadStatus::Failed.is_terminal());
        assert_eq!(DownloadStatus::Cancelled.to_string(), "cancelled");
    }
}
