//! # Transport Engine
//!
//! Single-owner state machine wrapping the host playback engine.
//!
//! ## Overview
//!
//! ```text
//!                 ┌──────────────────────── mpsc ────────────────────────┐
//!  TransportHandle ── TransportCommand ──►│                              │
//!  resolution task ── Resolved{gen} ─────►│      TransportEngine         │──► PlaybackAdapter
//!  adapter forwarder ─ AdapterEvent ─────►│ (queue + state, one task)    │
//!                 └────────────────────────────────┬─────────────────────┘
//!                                                  │ watch / EventBus
//!                                                  ▼
//!                                           PlaybackState, CoreEvent
//! ```
//!
//! ## States
//!
//! ```text
//!  IDLE ──play──► BUFFERING ──ready──► PLAYING ◄──pause/resume──► PAUSED
//!                     │                    │
//!           timeout / │ failure            │ network failure (bounded re-resolve)
//!                     ▼                    ▼
//!                   ERROR ◄────────── retries exhausted
//!
//!  any ──stop / queue end──► IDLE
//! ```
//!
//! A remote item without a cached URL stays in BUFFERING while its URL is
//! resolved off the command path. Commands keep flowing meanwhile; skipping
//! away bumps the generation so the late result is ignored.

mod command;
mod engine;
mod state;

pub use command::TransportCommand;
pub use engine::TransportEngine;
pub use state::{PlaybackState, PlaybackStatus, TransportSnapshot};

use crate::error::{PlaybackError, Result};
use crate::queue::{QueueItem, RepeatMode};
use command::EngineMessage;
use core_async::sync::{mpsc, oneshot, watch};
use core_async::time::Duration;
use core_library::Track;

/// Cloneable front door to the transport actor.
///
/// Every method enqueues one command and waits until the actor has applied
/// it. Waiting never covers stream resolution, which happens in the
/// background.
#[derive(Clone)]
pub struct TransportHandle {
    tx: mpsc::Sender<EngineMessage>,
    state_rx: watch::Receiver<PlaybackState>,
}

impl TransportHandle {
    pub(crate) fn new(tx: mpsc::Sender<EngineMessage>, state_rx: watch::Receiver<PlaybackState>) -> Self {
        Self { tx, state_rx }
    }

    /// Sends a command and waits for the actor's verdict.
    pub async fn send(&self, command: TransportCommand) -> Result<()> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(EngineMessage::Command {
                command,
                reply: Some(reply),
            })
            .await
            .map_err(|_| PlaybackError::EngineStopped)?;
        rx.await.map_err(|_| PlaybackError::EngineStopped)?
    }

    pub async fn play(&self, track: Track) -> Result<()> {
        self.send(TransportCommand::Play(track)).await
    }

    pub async fn play_index(&self, index: usize) -> Result<()> {
        self.send(TransportCommand::PlayIndex(index)).await
    }

    pub async fn pause(&self) -> Result<()> {
        self.send(TransportCommand::Pause).await
    }

    pub async fn resume(&self) -> Result<()> {
        self.send(TransportCommand::Resume).await
    }

    pub async fn seek(&self, position: Duration) -> Result<()> {
        self.send(TransportCommand::Seek(position)).await
    }

    pub async fn skip_next(&self) -> Result<()> {
        self.send(TransportCommand::SkipNext).await
    }

    pub async fn skip_previous(&self) -> Result<()> {
        self.send(TransportCommand::SkipPrevious).await
    }

    pub async fn stop(&self) -> Result<()> {
        self.send(TransportCommand::Stop).await
    }

    pub async fn set_shuffle(&self, enabled: bool) -> Result<()> {
        self.send(TransportCommand::SetShuffle(enabled)).await
    }

    pub async fn set_repeat(&self, mode: RepeatMode) -> Result<()> {
        self.send(TransportCommand::SetRepeat(mode)).await
    }

    /// Replaces the queue. With `start` set, that item is loaded and, when
    /// `autoplay` is true, started.
    pub async fn set_queue(
        &self,
        items: Vec<QueueItem>,
        start: Option<usize>,
        autoplay: bool,
    ) -> Result<()> {
        self.send(TransportCommand::SetQueue {
            items,
            start,
            autoplay,
        })
        .await
    }

    pub async fn enqueue(&self, items: Vec<QueueItem>) -> Result<()> {
        self.send(TransportCommand::Enqueue(items)).await
    }

    pub async fn remove(&self, index: usize) -> Result<()> {
        self.send(TransportCommand::Remove(index)).await
    }

    pub async fn move_item(&self, from: usize, to: usize) -> Result<()> {
        self.send(TransportCommand::MoveItem { from, to }).await
    }

    /// State and queue as of the moment the actor reaches this request.
    pub async fn snapshot(&self) -> Result<TransportSnapshot> {
        let (reply, rx) = oneshot::channel();
        self.send(TransportCommand::Snapshot(reply)).await?;
        rx.await.map_err(|_| PlaybackError::EngineStopped)
    }

    /// Stops playback and ends the actor.
    pub async fn shutdown(&self) -> Result<()> {
        self.send(TransportCommand::Shutdown).await
    }

    /// Latest published state.
    pub fn state(&self) -> PlaybackState {
        self.state_rx.borrow().clone()
    }

    /// Receiver that wakes on every state change.
    pub fn subscribe(&self) -> watch::Receiver<PlaybackState> {
        self.state_rx.clone()
    }

    pub fn is_running(&self) -> bool {
        !self.tx.is_closed()
    }
}
