//! # Host Bridge Traits
//!
//! Capabilities the playback core needs from its host but cannot provide
//! itself.
//!
//! ## Overview
//!
//! Each trait is a seam between the platform-independent core and a
//! platform-specific adapter. The core only ever holds `Arc<dyn Trait>`
//! handles, which keeps every component testable with in-memory fakes.
//!
//! ## Traits
//!
//! ### Networking & I/O
//! - [`HttpClient`](http::HttpClient) - Request/response calls and chunked downloads
//! - [`FileSystemAccess`](storage::FileSystemAccess) - Download directory, completion record
//! - [`CatalogClient`](catalog::CatalogClient) - Remote track id to stream URL
//!
//! ### Playback
//! - [`PlaybackAdapter`](playback::PlaybackAdapter) - Host audio engine and its event stream
//! - [`MediaSessionSink`](playback::MediaSessionSink) - Lock-screen / hardware control mirror
//!
//! ### Security & Storage
//! - [`SecureStore`](storage::SecureStore) - Streaming account token at rest
//! - [`SettingsStore`](storage::SettingsStore) - Key-value preferences
//!
//! ### Utilities
//! - [`LoggerSink`](logging::LoggerSink) - Forward structured logs to host logging
//!
//! ## Platform Requirements
//!
//! | Platform | Implementation Crate |
//! |----------|---------------------|
//! | Desktop  | `bridge-desktop`    |
//! | Mobile   | Host-injected       |
//!
//! ## Thread Safety
//!
//! All bridge traits require `Send + Sync` so a single instance can be shared
//! between the transport actor, download workers and resolver tasks.

pub mod catalog;
pub mod error;
pub mod http;
pub mod logging;
pub mod playback;
pub mod storage;

pub use error::BridgeError;

pub use catalog::CatalogClient;
pub use http::{ByteStream, HttpClient, HttpMethod, HttpRequest, HttpResponse, RetryPolicy};
pub use logging::{ConsoleLogger, LogEntry, LogLevel, LoggerSink};
pub use playback::{
    AdapterEvent, AudioSource, MediaSessionSink, NowPlaying, PlaybackAdapter, PlaybackMetadata,
    PlaybackRequest, SessionRepeat, SessionStatus,
};
pub use storage::{FileMetadata, FileSystemAccess, SecureStore, SettingsStore};
