//! # Session Adapter
//!
//! Boundary between the host media session (lock screen, notification,
//! headset and car controls) and the transport.
//!
//! Control-surface input arrives as [`SessionCommand`] values and is
//! forwarded to the transport's command channel. "Add items" batches get
//! their stream URLs resolved first, every item concurrently under the
//! batch deadline. Items that time out or fail pass through unchanged
//! rather than being dropped; the transport resolves them again when they
//! come up.
//!
//! In the other direction, [`SessionAdapter::spawn_now_playing_mirror`] keeps
//! a host [`MediaSessionSink`] in step with the published playback state.

use crate::config::SessionConfig;
use crate::downloads::DownloadManager;
use crate::error::Result;
use crate::queue::{QueueItem, RepeatMode};
use crate::resolver::{Resolution, StreamResolver};
use crate::transport::{PlaybackState, PlaybackStatus, TransportHandle};
use bridge_traits::{MediaSessionSink, NowPlaying, PlaybackMetadata, SessionRepeat, SessionStatus};
use core_async::task::{self, JoinHandle};
use core_async::time::Duration;
use core_library::Track;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

/// Commands raised by host control surfaces.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionCommand {
    Play,
    Pause,
    Seek(Duration),
    SkipNext,
    SkipPrevious,
    SkipToIndex(usize),
    Stop,
    SetShuffle(bool),
    SetRepeat(RepeatMode),
}

/// An item handed over by the host, with a direct URL when it already has one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaItem {
    pub track: Track,
    pub uri: Option<String>,
}

impl MediaItem {
    pub fn new(track: Track) -> Self {
        Self { track, uri: None }
    }

    pub fn with_uri(mut self, uri: impl Into<String>) -> Self {
        self.uri = Some(uri.into());
        self
    }

    /// Remote, not downloaded, and no URL yet.
    pub fn needs_resolution(&self) -> bool {
        self.uri.is_none() && self.track.local_file().is_none() && self.track.remote_id().is_some()
    }
}

impl From<MediaItem> for QueueItem {
    fn from(item: MediaItem) -> Self {
        QueueItem {
            track: item.track,
            stream_url: item.uri,
        }
    }
}

/// Result of resolving an "add items" batch.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AddItemsOutcome {
    /// Every input item, in input order
    pub items: Vec<MediaItem>,
    pub resolved: usize,
    pub timed_out: usize,
    pub failed: usize,
}

#[derive(Clone)]
pub struct SessionAdapter {
    transport: TransportHandle,
    resolver: StreamResolver,
    config: SessionConfig,
    downloads: Option<DownloadManager>,
}

impl SessionAdapter {
    pub fn new(transport: TransportHandle, resolver: StreamResolver, config: SessionConfig) -> Self {
        Self {
            transport,
            resolver,
            config,
            downloads: None,
        }
    }

    /// Prefer offline copies over resolution for added items.
    pub fn with_downloads(mut self, downloads: DownloadManager) -> Self {
        self.downloads = Some(downloads);
        self
    }

    pub fn transport(&self) -> &TransportHandle {
        &self.transport
    }

    /// Forwards a control-surface command to the transport.
    #[instrument(skip(self))]
    pub async fn handle(&self, command: SessionCommand) -> Result<()> {
        match command {
            SessionCommand::Play => self.transport.resume().await,
            SessionCommand::Pause => self.transport.pause().await,
            SessionCommand::Seek(position) => self.transport.seek(position).await,
            SessionCommand::SkipNext => self.transport.skip_next().await,
            SessionCommand::SkipPrevious => self.transport.skip_previous().await,
            SessionCommand::SkipToIndex(index) => self.transport.play_index(index).await,
            SessionCommand::Stop => self.transport.stop().await,
            SessionCommand::SetShuffle(enabled) => self.transport.set_shuffle(enabled).await,
            SessionCommand::SetRepeat(mode) => self.transport.set_repeat(mode).await,
        }
    }

    /// Resolves URLs for a batch.
    ///
    /// Completes once every item has resolved, timed out or failed, so the
    /// batch takes about as long as its slowest item and never longer than
    /// the deadline.
    #[instrument(skip(self, items), fields(count = items.len()))]
    pub async fn resolve_items(&self, items: Vec<MediaItem>) -> AddItemsOutcome {
        let mut items: Vec<MediaItem> = items
            .into_iter()
            .map(|item| self.prefer_download(item))
            .collect();

        let pending: Vec<usize> = items
            .iter()
            .enumerate()
            .filter(|(_, item)| item.needs_resolution())
            .map(|(i, _)| i)
            .collect();
        let remote_ids: Vec<String> = pending
            .iter()
            .filter_map(|&i| items[i].track.remote_id().map(str::to_string))
            .collect();

        let resolutions = self
            .resolver
            .resolve_all(&remote_ids, self.config.batch_deadline)
            .await;

        let mut outcome = AddItemsOutcome::default();
        for (index, resolution) in pending.into_iter().zip(resolutions) {
            match resolution {
                Resolution::Resolved(url) => {
                    items[index].uri = Some(url);
                    outcome.resolved += 1;
                }
                Resolution::TimedOut => outcome.timed_out += 1,
                Resolution::Failed(_) => outcome.failed += 1,
            }
        }

        debug!(
            resolved = outcome.resolved,
            timed_out = outcome.timed_out,
            failed = outcome.failed,
            "Batch resolved"
        );
        outcome.items = items;
        outcome
    }

    /// Resolves a batch and appends it to the queue.
    pub async fn add_items(&self, items: Vec<MediaItem>) -> Result<AddItemsOutcome> {
        let outcome = self.resolve_items(items).await;
        let queue_items: Vec<QueueItem> = outcome.items.iter().cloned().map(QueueItem::from).collect();
        self.transport.enqueue(queue_items).await?;
        info!(count = outcome.items.len(), "Items added from media session");
        Ok(outcome)
    }

    /// Resolves a batch and makes it the whole queue, starting at `start`.
    pub async fn set_items(&self, items: Vec<MediaItem>, start: usize) -> Result<AddItemsOutcome> {
        let outcome = self.resolve_items(items).await;
        let queue_items: Vec<QueueItem> = outcome.items.iter().cloned().map(QueueItem::from).collect();
        let start = (!queue_items.is_empty()).then_some(start);
        self.transport.set_queue(queue_items, start, true).await?;
        Ok(outcome)
    }

    /// Pushes every state change to the host media session until the
    /// transport goes away.
    pub fn spawn_now_playing_mirror(&self, sink: Arc<dyn MediaSessionSink>) -> JoinHandle<()> {
        let mut rx = self.transport.subscribe();
        task::spawn(async move {
            loop {
                let state = rx.borrow_and_update().clone();
                let result = match now_playing(&state) {
                    Some(entry) => sink.update_now_playing(entry).await,
                    None => sink.clear().await,
                };
                if let Err(e) = result {
                    warn!(error = %e, "Media session update failed");
                }
                if rx.changed().await.is_err() {
                    break;
                }
            }
            debug!("Now-playing mirror stopped");
        })
    }

    fn prefer_download(&self, item: MediaItem) -> MediaItem {
        match &self.downloads {
            Some(downloads) if item.uri.is_none() => MediaItem {
                track: downloads.downloaded_track(&item.track),
                uri: None,
            },
            _ => item,
        }
    }
}

/// Host-facing view of the state; `None` clears the session.
pub fn now_playing(state: &PlaybackState) -> Option<NowPlaying> {
    let track = state.track.as_ref()?;
    if state.status == PlaybackStatus::Idle && state.queue_length == 0 {
        return None;
    }

    Some(NowPlaying {
        metadata: PlaybackMetadata {
            track_id: Some(track.id.to_string()),
            title: Some(track.title.clone()),
            artist: Some(track.artist.clone()),
            artwork: track.thumbnail.clone(),
        },
        status: match state.status {
            PlaybackStatus::Idle => SessionStatus::Idle,
            PlaybackStatus::Buffering => SessionStatus::Buffering,
            PlaybackStatus::Playing => SessionStatus::Playing,
            PlaybackStatus::Paused => SessionStatus::Paused,
            PlaybackStatus::Error => SessionStatus::Error,
        },
        position: Duration::from_millis(state.position_ms),
        duration: state.duration_ms.map(Duration::from_millis),
        shuffle: state.shuffle,
        repeat: match state.repeat {
            RepeatMode::Off => SessionRepeat::Off,
            RepeatMode::All => SessionRepeat::All,
            RepeatMode::One => SessionRepeat::One,
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use core_library::TrackId;

    #[test]
    fn test_needs_resolution() {
        let remote = Track::remote("42", "Song", "Artist");
        assert!(MediaItem::new(remote.clone()).needs_resolution());
        assert!(!MediaItem::new(remote.clone())
            .with_uri("https://cdn.example/42")
            .needs_resolution());
        assert!(!MediaItem::new(remote.with_downloaded_file("/d/42.mp3")).needs_resolution());

        let local = Track::local(TrackId::local(7), "Local", "Artist", "/music/a.mp3");
        assert!(!MediaItem::new(local).needs_resolution());
    }

    #[test]
    fn test_now_playing_mapping() {
        let mut state = PlaybackState {
            status: PlaybackStatus::Playing,
            track: Some(Track::remote("42", "Song", "Artist")),
            position_ms: 1_500,
            duration_ms: Some(180_000),
            queue_length: 3,
            shuffle: true,
            repeat: RepeatMode::One,
            ..Default::default()
        };

        let entry = now_playing(&state).unwrap();
        assert_eq!(entry.status, SessionStatus::Playing);
        assert_eq!(entry.metadata.title.as_deref(), Some("Song"));
        assert_eq!(entry.position, Duration::from_millis(1_500));
        assert_eq!(entry.repeat, SessionRepeat::One);
        assert!(entry.shuffle);

        state.status = PlaybackStatus::Idle;
        state.queue_length = 0;
        assert!(now_playing(&state).is_none());
    }
}
