//! Messages consumed by the transport actor.

use crate::error::Result;
use crate::queue::{QueueItem, RepeatMode};
use crate::resolver::Resolution;
use crate::transport::state::TransportSnapshot;
use bridge_traits::AdapterEvent;
use core_async::sync::oneshot;
use core_async::time::Duration;
use core_library::{Track, TrackId};

/// Requests accepted by the transport.
///
/// User actions, hardware buttons and the media session all arrive as one of
/// these and are applied strictly in the order they were sent.
#[derive(Debug)]
pub enum TransportCommand {
    /// Play a track, jumping to it if queued or appending it otherwise.
    Play(Track),
    /// Play the item at a queue position.
    PlayIndex(usize),
    Pause,
    Resume,
    Seek(Duration),
    SkipNext,
    SkipPrevious,
    Stop,
    SetShuffle(bool),
    SetRepeat(RepeatMode),
    SetQueue {
        items: Vec<QueueItem>,
        start: Option<usize>,
        autoplay: bool,
    },
    Enqueue(Vec<QueueItem>),
    Remove(usize),
    MoveItem {
        from: usize,
        to: usize,
    },
    Snapshot(oneshot::Sender<TransportSnapshot>),
    Shutdown,
}

impl TransportCommand {
    pub fn name(&self) -> &'static str {
        match self {
            TransportCommand::Play(_) => "play",
            TransportCommand::PlayIndex(_) => "play_index",
            TransportCommand::Pause => "pause",
            TransportCommand::Resume => "resume",
            TransportCommand::Seek(_) => "seek",
            TransportCommand::SkipNext => "skip_next",
            TransportCommand::SkipPrevious => "skip_previous",
            TransportCommand::Stop => "stop",
            TransportCommand::SetShuffle(_) => "set_shuffle",
            TransportCommand::SetRepeat(_) => "set_repeat",
            TransportCommand::SetQueue { .. } => "set_queue",
            TransportCommand::Enqueue(_) => "enqueue",
            TransportCommand::Remove(_) => "remove",
            TransportCommand::MoveItem { .. } => "move_item",
            TransportCommand::Snapshot(_) => "snapshot",
            TransportCommand::Shutdown => "shutdown",
        }
    }
}

/// Everything that reaches the actor's single channel.
#[derive(Debug)]
pub(crate) enum EngineMessage {
    Command {
        command: TransportCommand,
        reply: Option<oneshot::Sender<Result<()>>>,
    },
    /// A resolution finished. Dropped unless `generation` is current.
    Resolved {
        generation: u64,
        track_id: TrackId,
        resolution: Resolution,
    },
    /// Forwarded from the host engine's event stream.
    Adapter(AdapterEvent),
}
