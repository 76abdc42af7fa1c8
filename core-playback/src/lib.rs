//! # Playback Core
//!
//! Queue, transport, stream resolution, offline downloads and the host
//! media-session boundary.
//!
//! ## Overview
//!
//! ```text
//!  host controls ──► SessionAdapter ──┐
//!  UI            ──► TransportHandle ─┴─► TransportEngine ──► PlaybackAdapter
//!                                             │   ▲
//!                                             │   └── StreamResolver ◄── CatalogClient
//!                                             ▼
//!                                    QueueController (order, shuffle, repeat)
//!
//!  UI ──► DownloadManager ──► HttpClient / FileSystemAccess
//! ```
//!
//! - [`queue`]: ordered items, shuffle permutation, repeat modes
//! - [`resolver`]: remote id to stream URL under a deadline
//! - [`transport`]: the single-owner playback state machine
//! - [`downloads`]: offline copies with progress and cancellation
//! - [`session`]: media-session commands, batch resolution, now-playing mirror

pub mod config;
pub mod downloads;
pub mod error;
pub mod queue;
pub mod resolver;
pub mod session;
pub mod transport;

pub use config::{ResolverConfig, SessionConfig, TransportConfig};
pub use downloads::{
    DownloadConfig, DownloadFailure, DownloadManager, DownloadProgress, DownloadRecordStore,
    DownloadRecords, DownloadStatus, DownloadSubscription, DownloadTask, FailureKind,
    FileRecordStore, MemoryRecordStore,
};
pub use error::{PlaybackError, Result};
pub use queue::{
    AdvanceOutcome, Direction, QueueController, QueueItem, QueueSnapshot, Removed, RepeatMode,
};
pub use resolver::{Resolution, StreamResolver};
pub use session::{AddItemsOutcome, MediaItem, SessionAdapter, SessionCommand};
pub use transport::{
    PlaybackState, PlaybackStatus, TransportCommand, TransportEngine, TransportHandle,
    TransportSnapshot,
};
