//! Published transport state.

use crate::queue::{QueueSnapshot, RepeatMode};
use core_library::Track;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlaybackStatus {
    #[default]
    Idle,
    /// Waiting for a stream URL, or for the engine to buffer.
    Buffering,
    Playing,
    Paused,
    /// The current item could not be played.
    Error,
}

impl PlaybackStatus {
    /// An item is loaded (or being loaded) into the engine.
    pub fn is_active(&self) -> bool {
        matches!(
            self,
            PlaybackStatus::Buffering | PlaybackStatus::Playing | PlaybackStatus::Paused
        )
    }
}

/// Snapshot of the transport, published on every change.
///
/// `position_ms` never exceeds `duration_ms` once the duration is known.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PlaybackState {
    pub status: PlaybackStatus,
    pub track: Option<Track>,
    pub position_ms: u64,
    pub duration_ms: Option<u64>,
    /// Set while `status` is `Error`
    pub error: Option<String>,
    pub queue_index: Option<usize>,
    pub queue_length: usize,
    pub shuffle: bool,
    pub repeat: RepeatMode,
}

impl PlaybackState {
    pub fn set_position(&mut self, position_ms: u64) {
        self.position_ms = match self.duration_ms {
            Some(duration) if duration > 0 => position_ms.min(duration),
            _ => position_ms,
        };
    }

    /// Known duration; zero is treated as unknown.
    pub fn set_duration(&mut self, duration_ms: Option<u64>) {
        self.duration_ms = duration_ms.filter(|d| *d > 0);
        let position = self.position_ms;
        self.set_position(position);
    }

    pub fn track_id(&self) -> Option<String> {
        self.track.as_ref().map(|t| t.id.to_string())
    }
}

/// Transport state together with the queue it is playing from.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TransportSnapshot {
    pub playback: PlaybackState,
    pub queue: QueueSnapshot,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_position_clamped_to_duration() {
        let mut state = PlaybackState::default();
        state.set_position(9_000);
        assert_eq!(state.position_ms, 9_000);

        state.set_duration(Some(5_000));
        assert_eq!(state.position_ms, 5_000);

        state.set_position(7_000);
        assert_eq!(state.position_ms, 5_000);
    }

    #[test]
    fn test_zero_duration_is_unknown() {
        let mut state = PlaybackState::default();
        state.set_duration(Some(0));
        assert_eq!(state.duration_ms, None);
        state.set_position(1_000);
        assert_eq!(state.position_ms, 1_000);
    }

    #[test]
    fn test_active_statuses() {
        assert!(PlaybackStatus::Buffering.is_active());
        assert!(PlaybackStatus::Paused.is_active());
        assert!(!PlaybackStatus::Idle.is_active());
        assert!(!PlaybackStatus::Error.is_active());
    }
}
