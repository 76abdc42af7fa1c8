//! # Offline Downloads
//!
//! Tracked, cancellable, bounded-parallel downloads of remote tracks.
//!
//! ## Overview
//!
//! ```text
//!  request(track) ──► DownloadManager ──► worker (per track id)
//!                          │                 │ permit ◄── Semaphore(max_parallel)
//!                          │                 │ resolve ◄── StreamResolver
//!                          │                 │ chunks ◄── HttpClient::download_stream
//!                          │                 │ write  ──► {id}.part ──rename──► {id}.{ext}
//!                          │                 ▼
//!                          ├── DownloadSubscription (throttled, coalesced progress)
//!                          └── DownloadRecordStore (track id → file, durable)
//! ```
//!
//! ## Components
//!
//! - [`DownloadManager`]: request / cancel / delete and queries
//! - [`DownloadConfig`]: parallelism, throttle interval, directory names
//! - [`DownloadTask`]: per-track status and byte counters
//! - [`DownloadSubscription`]: progress feed
//! - [`DownloadRecordStore`]: completion record persistence

mod config;
mod manager;
mod progress;
mod record;
mod task;

pub use config::DownloadConfig;
pub use manager::DownloadManager;
pub use progress::{DownloadProgress, DownloadSubscription};
pub use record::{DownloadRecordStore, DownloadRecords, FileRecordStore, MemoryRecordStore};
pub use task::{DownloadFailure, DownloadStatus, DownloadTask, FailureKind};
