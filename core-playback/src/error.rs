//! # Playback Error Types
//!
//! Error taxonomy for resolution, transport and download operations.
//!
//! Resolution errors are local and recoverable: the item keeps its remote id
//! and the caller decides whether to skip it. Download errors are recorded on
//! the task they belong to; the manager itself never stops because one task
//! failed.

use bridge_traits::BridgeError;
use thiserror::Error;

/// Errors that can occur during playback and download operations.
#[derive(Error, Debug)]
pub enum PlaybackError {
    // ========================================================================
    // Resolution Errors
    // ========================================================================
    /// The catalog did not answer before the deadline.
    #[error("Resolution of {remote_id} timed out after {deadline_ms}ms")]
    ResolutionTimeout { remote_id: String, deadline_ms: u64 },

    /// The catalog answered with an error.
    #[error("Resolution of {remote_id} failed: {reason}")]
    ResolutionFailed { remote_id: String, reason: String },

    // ========================================================================
    // Transport Errors
    // ========================================================================
    /// The host playback engine reported a failure.
    #[error("Playback engine error: {0}")]
    Engine(String),

    /// The transport actor is no longer running.
    #[error("Transport engine stopped")]
    EngineStopped,

    // ========================================================================
    // Download Errors
    // ========================================================================
    /// Transfer failed on the network side.
    #[error("Download of {track_id} failed (network): {reason}")]
    DownloadNetwork { track_id: String, reason: String },

    /// Transfer failed writing to disk.
    #[error("Download of {track_id} failed (io): {reason}")]
    DownloadIo { track_id: String, reason: String },

    /// The task observed a cancellation request.
    #[error("Cancelled")]
    Cancelled,

    /// No completed download exists for the track.
    #[error("Track not downloaded: {0}")]
    NotDownloaded(String),

    // ========================================================================
    // Generic Errors
    // ========================================================================
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Bridge error: {0}")]
    Bridge(#[from] BridgeError),
}

impl PlaybackError {
    /// Returns `true` if this error is transient and the operation can be retried.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            PlaybackError::ResolutionTimeout { .. }
                | PlaybackError::Engine(_)
                | PlaybackError::DownloadNetwork { .. }
        ) || matches!(self, PlaybackError::Bridge(e) if e.is_network())
    }

    /// Returns `true` if this error is due to network issues.
    pub fn is_network_error(&self) -> bool {
        match self {
            PlaybackError::ResolutionTimeout { .. } | PlaybackError::DownloadNetwork { .. } => {
                true
            }
            PlaybackError::Bridge(e) => e.is_network(),
            _ => false,
        }
    }

    /// Returns `true` if the user can meaningfully press "retry".
    ///
    /// Cancellation is not a failure and configuration errors will not go
    /// away by trying again.
    pub fn is_user_retriable(&self) -> bool {
        matches!(
            self,
            PlaybackError::ResolutionTimeout { .. }
                | PlaybackError::ResolutionFailed { .. }
                | PlaybackError::DownloadNetwork { .. }
                | PlaybackError::DownloadIo { .. }
        )
    }
}

/// Result type for playback operations.
pub type Result<T> = std::result::Result<T, PlaybackError>;
