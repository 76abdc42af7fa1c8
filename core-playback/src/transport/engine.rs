//! Transport actor.
//!
//! One task owns the queue, the published state and every call into the host
//! engine. Commands, resolution results and engine events all arrive on the
//! same channel and are handled one at a time, so no two of them ever
//! interleave. Resolution runs in spawned tasks that post their result back
//! tagged with the generation they were started for; a result whose
//! generation is no longer current is dropped.

use crate::config::TransportConfig;
use crate::error::{PlaybackError, Result};
use crate::queue::{AdvanceOutcome, Direction, QueueController, QueueItem};
use crate::resolver::{Resolution, StreamResolver};
use crate::transport::command::{EngineMessage, TransportCommand};
use crate::transport::state::{PlaybackState, PlaybackStatus, TransportSnapshot};
use crate::transport::TransportHandle;
use bridge_traits::{AdapterEvent, AudioSource, PlaybackAdapter, PlaybackMetadata, PlaybackRequest};
use core_async::sync::broadcast::{self, error::RecvError};
use core_async::sync::{mpsc, watch};
use core_async::task::{self, AbortHandle, JoinHandle};
use core_async::time::{sleep, Duration};
use core_library::{Track, TrackId};
use core_runtime::events::{CoreEvent, EventBus, PlaybackEvent, QueueEvent};
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

pub struct TransportEngine {
    adapter: Arc<dyn PlaybackAdapter>,
    resolver: StreamResolver,
    queue: QueueController,
    config: TransportConfig,
    events: Option<EventBus>,
    state: PlaybackState,
    state_tx: watch::Sender<PlaybackState>,
    self_tx: mpsc::WeakSender<EngineMessage>,
    /// Bumped whenever a different item is loaded or playback stops
    generation: u64,
    retry_attempt: u32,
    /// Start output as soon as the engine reports ready
    play_when_ready: bool,
    /// The engine has the current item loaded
    attached: bool,
    pending: Option<AbortHandle>,
}

impl TransportEngine {
    /// Starts the actor and returns a handle to it.
    ///
    /// The actor runs until [`TransportHandle::shutdown`] is called or every
    /// handle has been dropped.
    pub fn spawn(
        adapter: Arc<dyn PlaybackAdapter>,
        resolver: StreamResolver,
        queue: QueueController,
        config: TransportConfig,
        events: Option<EventBus>,
    ) -> Result<TransportHandle> {
        config.validate().map_err(PlaybackError::InvalidConfig)?;

        let (tx, rx) = mpsc::channel(config.command_buffer);
        let (state_tx, state_rx) = watch::channel(PlaybackState::default());
        let forwarder = spawn_adapter_forwarder(adapter.events(), tx.downgrade());

        let engine = TransportEngine {
            adapter,
            resolver,
            queue,
            config,
            events,
            state: PlaybackState::default(),
            state_tx,
            self_tx: tx.downgrade(),
            generation: 0,
            retry_attempt: 0,
            play_when_ready: false,
            attached: false,
            pending: None,
        };
        task::spawn(engine.run(rx, forwarder));

        Ok(TransportHandle::new(tx, state_rx))
    }

    async fn run(mut self, mut rx: mpsc::Receiver<EngineMessage>, forwarder: JoinHandle<()>) {
        info!("Transport engine started");
        self.publish();

        while let Some(message) = rx.recv().await {
            let keep_running = self.handle(message).await;
            self.publish();
            if !keep_running {
                break;
            }
        }

        self.cancel_pending();
        forwarder.abort();
        info!("Transport engine stopped");
    }

    async fn handle(&mut self, message: EngineMessage) -> bool {
        match message {
            EngineMessage::Command { command, reply } => {
                let shutdown = matches!(command, TransportCommand::Shutdown);
                let name = command.name();
                let result = self.apply(command).await;
                if let Err(e) = &result {
                    warn!(command = name, error = %e, "Transport command failed");
                }
                if let Some(reply) = reply {
                    let _ = reply.send(result);
                }
                !shutdown
            }
            EngineMessage::Resolved {
                generation,
                track_id,
                resolution,
            } => {
                self.on_resolved(generation, track_id, resolution).await;
                true
            }
            EngineMessage::Adapter(event) => {
                self.on_adapter_event(event).await;
                true
            }
        }
    }

    // ========================================================================
    // Commands
    // ========================================================================

    #[instrument(skip(self, command), fields(command = command.name()))]
    async fn apply(&mut self, command: TransportCommand) -> Result<()> {
        match command {
            TransportCommand::Play(track) => {
                let queued = self.queue.play_order().iter().position(|t| t.id == track.id);
                let index = match queued {
                    Some(index) => index,
                    None => {
                        self.queue.enqueue(vec![QueueItem::new(track)]);
                        self.queue.len() - 1
                    }
                };
                self.queue.jump_to(index)?;
                self.emit_current_changed();
                self.load_current(Duration::ZERO, true).await
            }
            TransportCommand::PlayIndex(index) => {
                self.queue.jump_to(index)?;
                self.emit_current_changed();
                self.load_current(Duration::ZERO, true).await
            }
            TransportCommand::Pause => self.pause().await,
            TransportCommand::Resume => self.resume().await,
            TransportCommand::Seek(position) => self.seek(position).await,
            TransportCommand::SkipNext => {
                let autoplay = self.state.status != PlaybackStatus::Paused;
                let outcome = self.queue.advance(Direction::Next);
                self.follow(outcome, Direction::Next, autoplay).await
            }
            TransportCommand::SkipPrevious => self.skip_previous().await,
            TransportCommand::Stop => self.stop().await,
            TransportCommand::SetShuffle(enabled) => {
                if self.queue.set_shuffle(enabled) {
                    self.emit(CoreEvent::Queue(QueueEvent::ShuffleChanged { enabled }));
                }
                Ok(())
            }
            TransportCommand::SetRepeat(mode) => {
                self.queue.set_repeat(mode);
                self.emit(CoreEvent::Queue(QueueEvent::RepeatChanged {
                    mode: mode.to_string(),
                }));
                Ok(())
            }
            TransportCommand::SetQueue {
                items,
                start,
                autoplay,
            } => {
                self.queue.set_queue(items, start)?;
                self.emit(CoreEvent::Queue(QueueEvent::Replaced {
                    length: self.queue.len(),
                    current_index: self.queue.current_index(),
                }));
                if self.queue.current().is_some() {
                    self.load_current(Duration::ZERO, autoplay).await
                } else {
                    self.stop().await
                }
            }
            TransportCommand::Enqueue(items) => {
                let count = items.len();
                self.queue.enqueue(items);
                self.emit(CoreEvent::Queue(QueueEvent::ItemsAdded {
                    count,
                    length: self.queue.len(),
                }));
                Ok(())
            }
            TransportCommand::Remove(index) => {
                let removed = self.queue.remove(index)?;
                self.emit(CoreEvent::Queue(QueueEvent::ItemRemoved {
                    index,
                    length: self.queue.len(),
                }));
                if !removed.was_current {
                    return Ok(());
                }
                if self.queue.current().is_some() {
                    let autoplay = self.play_when_ready;
                    self.emit_current_changed();
                    self.load_current(Duration::ZERO, autoplay).await
                } else {
                    self.stop().await
                }
            }
            TransportCommand::MoveItem { from, to } => {
                self.queue.move_item(from, to)?;
                self.emit(CoreEvent::Queue(QueueEvent::ItemMoved { from, to }));
                Ok(())
            }
            TransportCommand::Snapshot(reply) => {
                self.sync_queue_fields();
                let _ = reply.send(TransportSnapshot {
                    playback: self.state.clone(),
                    queue: self.queue.snapshot(),
                });
                Ok(())
            }
            TransportCommand::Shutdown => self.stop().await,
        }
    }

    async fn pause(&mut self) -> Result<()> {
        match self.state.status {
            PlaybackStatus::Playing => {
                self.adapter.pause().await?;
                self.play_when_ready = false;
                self.state.status = PlaybackStatus::Paused;
                self.emit_paused();
            }
            PlaybackStatus::Buffering => {
                self.play_when_ready = false;
                if self.attached {
                    self.adapter.pause().await?;
                }
                self.emit_paused();
            }
            _ => debug!(status = ?self.state.status, "Pause ignored"),
        }
        Ok(())
    }

    async fn resume(&mut self) -> Result<()> {
        match self.state.status {
            PlaybackStatus::Paused => {
                self.adapter.play().await?;
                self.play_when_ready = true;
                self.state.status = PlaybackStatus::Playing;
                self.emit_playback(PlaybackEvent::Resumed {
                    track_id: self.state.track_id().unwrap_or_default(),
                    position_ms: self.state.position_ms,
                });
            }
            PlaybackStatus::Buffering => {
                self.play_when_ready = true;
                if self.attached {
                    self.adapter.play().await?;
                }
            }
            PlaybackStatus::Idle | PlaybackStatus::Error => {
                if self.queue.current().is_none() {
                    return Ok(());
                }
                // From ERROR this is the manual retry; pick up where it broke.
                let start = if self.state.status == PlaybackStatus::Error {
                    Duration::from_millis(self.state.position_ms)
                } else {
                    Duration::ZERO
                };
                self.load_current(start, true).await?;
            }
            PlaybackStatus::Playing => {}
        }
        Ok(())
    }

    async fn seek(&mut self, position: Duration) -> Result<()> {
        if self.state.track.is_none() || self.state.status == PlaybackStatus::Idle {
            debug!("Seek ignored with nothing loaded");
            return Ok(());
        }

        self.state.set_position(position.as_millis() as u64);
        if self.attached {
            self.adapter
                .seek(Duration::from_millis(self.state.position_ms))
                .await?;
        }
        self.emit_playback(PlaybackEvent::Seeked {
            track_id: self.state.track_id().unwrap_or_default(),
            position_ms: self.state.position_ms,
        });
        Ok(())
    }

    async fn skip_previous(&mut self) -> Result<()> {
        let threshold = self.config.previous_restart_threshold.as_millis() as u64;
        if self.state.status.is_active() && self.state.position_ms > threshold {
            return self.restart_current().await;
        }

        let autoplay = self.state.status != PlaybackStatus::Paused;
        let outcome = self.queue.advance(Direction::Previous);
        self.follow(outcome, Direction::Previous, autoplay).await
    }

    async fn stop(&mut self) -> Result<()> {
        self.cancel_pending();
        self.generation += 1;
        self.play_when_ready = false;

        let was_idle = self.state.status == PlaybackStatus::Idle;
        if self.attached || !was_idle {
            if let Err(e) = self.adapter.stop().await {
                warn!(error = %e, "Engine stop failed");
            }
        }
        self.attached = false;

        self.state.status = PlaybackStatus::Idle;
        self.state.position_ms = 0;
        self.state.error = None;
        if !was_idle {
            self.emit_playback(PlaybackEvent::Stopped {
                track_id: self.state.track_id(),
            });
        }
        Ok(())
    }

    /// Applies the queue's answer to a skip or track end.
    async fn follow(
        &mut self,
        outcome: AdvanceOutcome,
        direction: Direction,
        autoplay: bool,
    ) -> Result<()> {
        match outcome {
            AdvanceOutcome::Moved { .. } => {
                self.emit_current_changed();
                self.load_current(Duration::ZERO, autoplay).await
            }
            AdvanceOutcome::Restart { .. } => self.restart_current().await,
            AdvanceOutcome::Boundary { index: Some(_) } if direction == Direction::Previous => {
                self.restart_current().await
            }
            AdvanceOutcome::Boundary { index: Some(_) } => {
                info!("Reached end of queue");
                self.emit(CoreEvent::Queue(QueueEvent::Ended));
                self.stop().await
            }
            AdvanceOutcome::Boundary { index: None } => Ok(()),
        }
    }

    async fn restart_current(&mut self) -> Result<()> {
        if !self.attached {
            return self.load_current(Duration::ZERO, true).await;
        }

        self.adapter.seek(Duration::ZERO).await?;
        self.state.position_ms = 0;
        if self.state.status == PlaybackStatus::Playing || self.play_when_ready {
            self.adapter.play().await?;
        }
        self.emit_playback(PlaybackEvent::Seeked {
            track_id: self.state.track_id().unwrap_or_default(),
            position_ms: 0,
        });
        Ok(())
    }

    // ========================================================================
    // Loading
    // ========================================================================

    /// Loads the queue's current item, resolving its stream URL first when
    /// it has neither a file nor a cached URL.
    async fn load_current(&mut self, start: Duration, autoplay: bool) -> Result<()> {
        let Some(item) = self.queue.current().cloned() else {
            return self.stop().await;
        };

        self.cancel_pending();
        if self.attached {
            if let Err(e) = self.adapter.stop().await {
                warn!(error = %e, "Engine stop before load failed");
            }
        }
        self.generation += 1;
        self.retry_attempt = 0;
        self.attached = false;
        self.play_when_ready = autoplay;

        self.state.track = Some(item.track.clone());
        self.state.error = None;
        self.state.status = PlaybackStatus::Buffering;
        self.state.duration_ms = None;
        self.state.position_ms = 0;
        self.state.set_duration(Some(item.track.duration_ms));
        self.state.set_position(start.as_millis() as u64);

        self.emit_playback(PlaybackEvent::Buffering {
            track_id: item.track.id.to_string(),
        });

        if let Some(source) = playable_source(&item) {
            return self.attach(source).await;
        }

        match item.track.remote_id() {
            Some(remote_id) => {
                debug!(remote_id, "Resolving stream URL before playback");
                self.spawn_resolution(remote_id.to_string(), item.track.id.clone(), Duration::ZERO);
                Ok(())
            }
            None => {
                let message = "Track has no playable source".to_string();
                self.enter_error(message.clone()).await;
                Err(PlaybackError::InvalidRequest(message))
            }
        }
    }

    async fn attach(&mut self, source: AudioSource) -> Result<()> {
        let Some(track) = self.state.track.clone() else {
            return Ok(());
        };

        let request = PlaybackRequest::new(source)
            .with_start_position(Duration::from_millis(self.state.position_ms))
            .with_metadata(metadata_for(&track));

        if let Err(e) = self.adapter.load(request).await {
            self.enter_error(format!("Engine rejected item: {e}")).await;
            return Err(PlaybackError::Engine(e.to_string()));
        }
        self.attached = true;

        if self.play_when_ready {
            self.adapter.play().await?;
        }
        debug!(track_id = %track.id, "Item attached to engine");
        Ok(())
    }

    fn spawn_resolution(&mut self, remote_id: String, track_id: TrackId, delay: Duration) {
        let generation = self.generation;
        let resolver = self.resolver.clone();
        let tx = self.self_tx.clone();

        let handle = task::spawn(async move {
            if !delay.is_zero() {
                sleep(delay).await;
            }
            let resolution = resolver.resolve_default(&remote_id).await;
            if let Some(tx) = tx.upgrade() {
                let _ = tx
                    .send(EngineMessage::Resolved {
                        generation,
                        track_id,
                        resolution,
                    })
                    .await;
            }
        });
        self.pending = Some(handle.abort_handle());
    }

    async fn on_resolved(&mut self, generation: u64, track_id: TrackId, resolution: Resolution) {
        if generation != self.generation {
            debug!(
                generation,
                current = self.generation,
                "Discarding stale resolution"
            );
            return;
        }
        self.pending = None;

        match resolution {
            Resolution::Resolved(url) => {
                self.queue.set_stream_url(&track_id, &url);
                if let Err(e) = self.attach(AudioSource::remote(url)).await {
                    warn!(track_id = %track_id, error = %e, "Attach after resolution failed");
                }
            }
            Resolution::TimedOut => {
                self.fail_current("Stream resolution timed out".to_string())
                    .await
            }
            Resolution::Failed(reason) => {
                self.fail_current(format!("Stream resolution failed: {reason}"))
                    .await
            }
        }
    }

    // ========================================================================
    // Engine events
    // ========================================================================

    async fn on_adapter_event(&mut self, event: AdapterEvent) {
        match event {
            AdapterEvent::Ready { duration } => {
                if !self.state.status.is_active() {
                    return;
                }
                if let Some(duration) = duration {
                    self.state.set_duration(Some(duration.as_millis() as u64));
                }
                if self.state.status == PlaybackStatus::Buffering {
                    if self.play_when_ready {
                        self.state.status = PlaybackStatus::Playing;
                        self.emit_playback(PlaybackEvent::Started {
                            track_id: self.state.track_id().unwrap_or_default(),
                        });
                    } else {
                        self.state.status = PlaybackStatus::Paused;
                    }
                }
            }
            AdapterEvent::Position(position) => {
                if self.state.status.is_active() {
                    self.state.set_position(position.as_millis() as u64);
                }
            }
            AdapterEvent::Ended => {
                if !self.state.status.is_active() {
                    return;
                }
                if let Some(track_id) = self.state.track_id() {
                    self.emit_playback(PlaybackEvent::Completed { track_id });
                }
                let outcome = self.queue.advance(Direction::Next);
                if let Err(e) = self.follow(outcome, Direction::Next, true).await {
                    warn!(error = %e, "Advancing after track end failed");
                }
            }
            AdapterEvent::NetworkError(message) | AdapterEvent::Error(message) => {
                self.on_engine_failure(message).await
            }
        }
    }

    /// Re-resolves and reattaches a remote item a bounded number of times
    /// before giving up on it.
    async fn on_engine_failure(&mut self, message: String) {
        if !self.state.status.is_active() {
            debug!(error = %message, "Ignoring engine failure while inactive");
            return;
        }
        let Some(track) = self.state.track.clone() else {
            return;
        };

        let retriable = track.local_file().is_none() && track.remote_id().is_some();
        if !retriable || self.retry_attempt >= self.config.max_engine_retries {
            self.fail_current(format!("Playback engine error: {message}"))
                .await;
            return;
        }

        self.retry_attempt += 1;
        warn!(
            track_id = %track.id,
            attempt = self.retry_attempt,
            max_attempts = self.config.max_engine_retries,
            error = %message,
            "Stream failed mid-playback, re-resolving"
        );
        self.emit_playback(PlaybackEvent::Retrying {
            track_id: track.id.to_string(),
            attempt: self.retry_attempt,
            max_attempts: self.config.max_engine_retries,
        });

        self.cancel_pending();
        self.queue.clear_stream_url(&track.id);
        self.attached = false;
        self.state.status = PlaybackStatus::Buffering;

        let delay = self.config.retry_backoff * self.retry_attempt;
        if let Some(remote_id) = track.remote_id() {
            self.spawn_resolution(remote_id.to_string(), track.id.clone(), delay);
        }
    }

    /// Puts the current item in ERROR and optionally moves on.
    async fn fail_current(&mut self, message: String) {
        self.enter_error(message).await;

        if !self.config.advance_on_error {
            return;
        }
        if let AdvanceOutcome::Moved { .. } = self.queue.advance(Direction::Next) {
            self.emit_current_changed();
            if let Err(e) = self.load_current(Duration::ZERO, true).await {
                warn!(error = %e, "Loading next item after error failed");
            }
        }
    }

    async fn enter_error(&mut self, message: String) {
        self.cancel_pending();
        if self.attached {
            if let Err(e) = self.adapter.stop().await {
                warn!(error = %e, "Engine stop after failure failed");
            }
            self.attached = false;
        }

        warn!(track_id = ?self.state.track_id(), error = %message, "Item failed");
        self.state.status = PlaybackStatus::Error;
        self.state.error = Some(message.clone());
        self.emit_playback(PlaybackEvent::Error {
            track_id: self.state.track_id(),
            message,
            recoverable: true,
        });
    }

    // ========================================================================
    // Helpers
    // ========================================================================

    fn cancel_pending(&mut self) {
        if let Some(pending) = self.pending.take() {
            pending.abort();
        }
    }

    fn sync_queue_fields(&mut self) {
        self.state.queue_index = self.queue.current_index();
        self.state.queue_length = self.queue.len();
        self.state.shuffle = self.queue.shuffle();
        self.state.repeat = self.queue.repeat();
    }

    fn publish(&mut self) {
        self.sync_queue_fields();
        let state = &self.state;
        self.state_tx.send_if_modified(|published| {
            if published != state {
                *published = state.clone();
                true
            } else {
                false
            }
        });
    }

    fn emit(&self, event: CoreEvent) {
        if let Some(bus) = &self.events {
            let _ = bus.emit(event);
        }
    }

    fn emit_playback(&self, event: PlaybackEvent) {
        self.emit(CoreEvent::Playback(event));
    }

    fn emit_paused(&self) {
        self.emit_playback(PlaybackEvent::Paused {
            track_id: self.state.track_id().unwrap_or_default(),
            position_ms: self.state.position_ms,
        });
    }

    fn emit_current_changed(&self) {
        if let (Some(index), Some(item)) = (self.queue.current_index(), self.queue.current()) {
            self.emit(CoreEvent::Queue(QueueEvent::CurrentChanged {
                index,
                track_id: item.track.id.to_string(),
            }));
        }
    }
}

/// Source that can be handed to the engine without resolution.
fn playable_source(item: &QueueItem) -> Option<AudioSource> {
    if let Some(path) = item.track.local_file() {
        return Some(AudioSource::LocalFile {
            path: path.to_path_buf(),
        });
    }
    item.stream_url.as_deref().map(AudioSource::remote)
}

fn metadata_for(track: &Track) -> PlaybackMetadata {
    PlaybackMetadata {
        track_id: Some(track.id.to_string()),
        title: Some(track.title.clone()),
        artist: Some(track.artist.clone()),
        artwork: track.thumbnail.clone(),
    }
}

fn spawn_adapter_forwarder(
    mut events: broadcast::Receiver<AdapterEvent>,
    tx: mpsc::WeakSender<EngineMessage>,
) -> JoinHandle<()> {
    task::spawn(async move {
        loop {
            match events.recv().await {
                Ok(event) => {
                    let Some(tx) = tx.upgrade() else {
                        break;
                    };
                    if tx.send(EngineMessage::Adapter(event)).await.is_err() {
                        break;
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    warn!(skipped, "Transport fell behind engine events");
                }
                Err(RecvError::Closed) => break,
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use core_library::Track;

    #[test]
    fn test_playable_source_prefers_local_file() {
        let local = QueueItem::new(Track::local(
            TrackId::local(1),
            "Song",
            "Artist",
            "/music/song.mp3",
        ));
        assert!(matches!(
            playable_source(&local),
            Some(AudioSource::LocalFile { .. })
        ));

        let remote = Track::remote("42", "Song", "Artist");
        let downloaded = QueueItem::new(remote.with_downloaded_file("/data/downloads/42.mp3"))
            .with_stream_url("https://cdn.example/42");
        assert!(matches!(
            playable_source(&downloaded),
            Some(AudioSource::LocalFile { .. })
        ));

        assert!(playable_source(&QueueItem::new(remote.clone())).is_none());
        assert_eq!(
            playable_source(&QueueItem::new(remote).with_stream_url("https://cdn.example/42")),
            Some(AudioSource::remote("https://cdn.example/42"))
        );
    }

    #[test]
    fn test_metadata_for_track() {
        let track = Track::remote("42", "Song", "Artist").with_thumbnail("https://img/42.jpg");
        let metadata = metadata_for(&track);
        assert_eq!(metadata.track_id.as_deref(), Some("remote:42"));
        assert_eq!(metadata.artwork.as_deref(), Some("https://img/42.jpg"));
    }
}
