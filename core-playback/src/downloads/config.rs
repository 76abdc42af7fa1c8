//! Download configuration

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Configuration for the download manager.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DownloadConfig {
    /// Downloads transferring at the same time (default: 3). Further
    /// requests wait in QUEUED.
    #[serde(default = "default_max_parallel")]
    pub max_parallel: usize,

    /// Minimum gap between byte-progress notifications per task (default: 250ms)
    #[serde(default = "default_progress_interval")]
    pub progress_interval: Duration,

    /// Directory for finished files, relative to the app data dir
    #[serde(default = "default_directory")]
    pub directory: String,

    /// Completion record file, relative to the app data dir
    #[serde(default = "default_record_file")]
    pub record_file: String,

    /// Suffix of in-flight files (default: `.part`)
    #[serde(default = "default_partial_suffix")]
    pub partial_suffix: String,

    /// Deadline for resolving the stream URL of a download (default: 8s)
    #[serde(default = "crate::config::default_resolve_deadline")]
    pub resolve_deadline: Duration,
}

impl Default for DownloadConfig {
    fn default() -> Self {
        Self {
            max_parallel: default_max_parallel(),
            progress_interval: default_progress_interval(),
            directory: default_directory(),
            record_file: default_record_file(),
            partial_suffix: default_partial_suffix(),
            resolve_deadline: crate::config::default_resolve_deadline(),
        }
    }
}

impl DownloadConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_parallel(mut self, count: usize) -> Self {
        self.max_parallel = count;
        self
    }

    pub fn with_progress_interval(mut self, interval: Duration) -> Self {
        self.progress_interval = interval;
        self
    }

    pub fn with_directory(mut self, dir: impl Into<String>) -> Self {
        self.directory = dir.into();
        self
    }

    pub fn with_record_file(mut self, file: impl Into<String>) -> Self {
        self.record_file = file.into();
        self
    }

    pub fn with_partial_suffix(mut self, suffix: impl Into<String>) -> Self {
        self.partial_suffix = suffix.into();
        self
    }

    pub fn with_resolve_deadline(mut self, deadline: Duration) -> Self {
        self.resolve_deadline = deadline;
        self
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.max_parallel == 0 {
            return Err("max_parallel must be at least 1".to_string());
        }
        if self.directory.trim().is_empty() {
            return Err("directory cannot be empty".to_string());
        }
        if self.record_file.trim().is_empty() {
            return Err("record_file cannot be empty".to_string());
        }
        if self.partial_suffix.is_empty() {
            return Err("partial_suffix cannot be empty".to_string());
        }
        if format!(".{FALLBACK_EXTENSION}").ends_with(&self.partial_suffix) {
            return Err(format!(
                "partial_suffix cannot be a suffix of .{FALLBACK_EXTENSION}"
            ));
        }
        if self.resolve_deadline.is_zero() {
            return Err("resolve_deadline must be > 0".to_string());
        }
        Ok(())
    }
}

/// Extension for finished files whose URL gives no usable one.
pub(crate) const FALLBACK_EXTENSION: &str = "audio";

fn default_max_parallel() -> usize {
    3
}

fn default_progress_interval() -> Duration {
    Duration::from_millis(250)
}

fn default_directory() -> String {
    "downloads".to_string()
}

fn default_record_file() -> String {
    "downloads.json".to_string()
}

fn default_partial_suffix() -> String {
    ".part".to_string()
}
