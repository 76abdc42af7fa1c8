//! Playback bridge traits and supporting types.
//!
//! The host owns the actual audio engine (a platform media player, a desktop
//! output stream, ...). The core drives it through [`PlaybackAdapter`] and
//! learns about buffering, progress, completion and failures from the
//! adapter's [`AdapterEvent`] stream.

use async_trait::async_trait;
use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

use crate::error::Result;
use core_async::sync::broadcast;

/// Source handed to the host engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AudioSource {
    /// Local file accessible to the host runtime.
    LocalFile { path: PathBuf },
    /// Remote HTTP(S) stream to be fetched by the host.
    RemoteStream {
        url: String,
        headers: HashMap<String, String>,
    },
}

impl AudioSource {
    pub fn remote(url: impl Into<String>) -> Self {
        AudioSource::RemoteStream {
            url: url.into(),
            headers: HashMap::new(),
        }
    }

    pub fn is_remote(&self) -> bool {
        matches!(self, AudioSource::RemoteStream { .. })
    }
}

/// Display metadata forwarded with a load so the host can label its output.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PlaybackMetadata {
    pub track_id: Option<String>,
    pub title: Option<String>,
    pub artist: Option<String>,
    pub artwork: Option<String>,
}

/// Request to replace whatever the engine has loaded.
#[derive(Debug, Clone, PartialEq)]
pub struct PlaybackRequest {
    pub source: AudioSource,
    pub start_position: Duration,
    pub metadata: PlaybackMetadata,
}

impl PlaybackRequest {
    pub fn new(source: AudioSource) -> Self {
        Self {
            source,
            start_position: Duration::ZERO,
            metadata: PlaybackMetadata::default(),
        }
    }

    pub fn with_start_position(mut self, position: Duration) -> Self {
        self.start_position = position;
        self
    }

    pub fn with_metadata(mut self, metadata: PlaybackMetadata) -> Self {
        self.metadata = metadata;
        self
    }
}

/// Notifications raised by the host engine.
#[derive(Debug, Clone, PartialEq)]
pub enum AdapterEvent {
    /// Enough data is buffered to play; carries the duration when known.
    Ready { duration: Option<Duration> },
    /// Periodic playback position report.
    Position(Duration),
    /// The loaded item played to its end.
    Ended,
    /// The stream broke while playing (connection reset, expired URL, ...).
    NetworkError(String),
    /// Any other engine failure.
    Error(String),
}

impl AdapterEvent {
    pub fn is_failure(&self) -> bool {
        matches!(self, AdapterEvent::NetworkError(_) | AdapterEvent::Error(_))
    }
}

/// Trait for host playback engines.
///
/// The engine holds at most one loaded item. Calls are issued by a single
/// owner in order, so implementations never see concurrent control calls.
#[async_trait]
pub trait PlaybackAdapter: Send + Sync {
    /// Load a new item, replacing the current one, without starting output.
    async fn load(&self, request: PlaybackRequest) -> Result<()>;

    /// Begin or resume output.
    async fn play(&self) -> Result<()>;

    /// Pause output while keeping the item loaded.
    async fn pause(&self) -> Result<()>;

    /// Seek to an absolute position within the loaded item.
    async fn seek(&self, position: Duration) -> Result<()>;

    /// Stop output and release the loaded item.
    async fn stop(&self) -> Result<()>;

    /// Subscribe to engine notifications.
    fn events(&self) -> broadcast::Receiver<AdapterEvent>;
}

/// Transport status as shown by the host media session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionStatus {
    #[default]
    Idle,
    Buffering,
    Playing,
    Paused,
    Error,
}

/// Repeat mode as shown by the host media session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionRepeat {
    #[default]
    Off,
    All,
    One,
}

/// Snapshot pushed to the lock screen / notification / hardware controls.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NowPlaying {
    pub metadata: PlaybackMetadata,
    pub status: SessionStatus,
    pub position: Duration,
    pub duration: Option<Duration>,
    pub shuffle: bool,
    pub repeat: SessionRepeat,
}

/// Host media-session mirror.
///
/// Control-surface commands travel the other way, as `SessionCommand`s
/// submitted to the core.
#[async_trait]
pub trait MediaSessionSink: Send + Sync {
    /// Replace the now-playing entry.
    async fn update_now_playing(&self, now_playing: NowPlaying) -> Result<()>;

    /// Remove the now-playing entry (queue ended or stopped).
    async fn clear(&self) -> Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_builder_sets_fields() {
        let request = PlaybackRequest::new(AudioSource::remote("https://cdn.example/a.m4a"))
            .with_start_position(Duration::from_secs(12))
            .with_metadata(PlaybackMetadata {
                title: Some("Song".into()),
                ..Default::default()
            });

        assert!(request.source.is_remote());
        assert_eq!(request.start_position, Duration::from_secs(12));
        assert_eq!(request.metadata.title.as_deref(), Some("Song"));
    }

    #[test]
    fn failure_events_are_classified() {
        assert!(AdapterEvent::NetworkError("reset".into()).is_failure());
        assert!(AdapterEvent::Error("codec".into()).is_failure());
        assert!(!AdapterEvent::Ended.is_failure());
    }
}
