//! # Library Module
//!
//! Track models and the read-only view of the local music library.
//!
//! ## Overview
//!
//! - [`Track`] is an immutable value tagged with its [`TrackSource`]
//!   (on-device file or remote catalog entry).
//! - [`LibrarySource`] is the host's snapshot query over on-device audio.
//! - [`FolderExclusions`] drops tracks living under user-excluded folders.
//! - [`available_folders`] groups a snapshot by folder for the exclusion picker.

pub mod error;
pub mod folders;
pub mod models;
pub mod source;

pub use error::{LibraryError, Result};
pub use folders::{available_folders, FolderExclusions, FolderInfo};
pub use models::{SourceKind, Track, TrackId, TrackSource};
pub use source::{filtered_snapshot, LibrarySource};
