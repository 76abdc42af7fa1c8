//! Domain models for tracks
//!
//! A track is either an on-device file or an entry in the remote catalog.
//! The distinction is carried by [`TrackSource`] so every consumer matches on
//! it exhaustively instead of probing optional fields.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

// =============================================================================
// ID Types
// =============================================================================

/// Unique identifier for a track
///
/// Local tracks use the host's media id; remote tracks use the catalog id.
/// Both live in the same namespace, prefixed by their origin.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TrackId(String);

impl TrackId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Identifier for an on-device track.
    pub fn local(media_id: impl fmt::Display) -> Self {
        Self(format!("local:{media_id}"))
    }

    /// Identifier for a remote catalog track.
    pub fn remote(remote_id: impl fmt::Display) -> Self {
        Self(format!("remote:{remote_id}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// File-name-safe form of the id, used for download artifacts.
    ///
    /// Bytes outside `[A-Za-z0-9-]` are written as `_XX` (uppercase hex), so
    /// distinct ids always get distinct stems.
    pub fn file_stem(&self) -> String {
        use std::fmt::Write as _;

        let mut stem = String::with_capacity(self.0.len());
        for byte in self.0.bytes() {
            if byte.is_ascii_alphanumeric() || byte == b'-' {
                stem.push(char::from(byte));
            } else {
                let _ = write!(stem, "_{byte:02X}");
            }
        }
        stem
    }
}

impl fmt::Display for TrackId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for TrackId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

// =============================================================================
// Domain Models
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    Local,
    Remote,
}

/// Where a track's audio comes from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TrackSource {
    /// File enumerated from on-device storage.
    Local { path: PathBuf },
    /// Catalog entry; `downloaded` is set once an offline copy exists.
    Remote {
        remote_id: String,
        downloaded: Option<PathBuf>,
    },
}

/// Music track
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Track {
    pub id: TrackId,
    pub title: String,
    pub artist: String,
    pub album: Option<String>,
    /// Duration in milliseconds, `0` when unknown
    pub duration_ms: u64,
    pub source: TrackSource,
    /// Artwork URI (content URI or HTTPS thumbnail)
    pub thumbnail: Option<String>,
}

impl Track {
    pub fn local(
        id: TrackId,
        title: impl Into<String>,
        artist: impl Into<String>,
        path: impl Into<PathBuf>,
    ) -> Self {
        Self {
            id,
            title: title.into(),
            artist: artist.into(),
            album: None,
            duration_ms: 0,
            source: TrackSource::Local { path: path.into() },
            thumbnail: None,
        }
    }

    pub fn remote(
        remote_id: impl Into<String>,
        title: impl Into<String>,
        artist: impl Into<String>,
    ) -> Self {
        let remote_id = remote_id.into();
        Self {
            id: TrackId::remote(&remote_id),
            title: title.into(),
            artist: artist.into(),
            album: None,
            duration_ms: 0,
            source: TrackSource::Remote {
                remote_id,
                downloaded: None,
            },
            thumbnail: None,
        }
    }

    pub fn with_album(mut self, album: impl Into<String>) -> Self {
        self.album = Some(album.into());
        self
    }

    pub fn with_duration_ms(mut self, duration_ms: u64) -> Self {
        self.duration_ms = duration_ms;
        self
    }

    pub fn with_thumbnail(mut self, thumbnail: impl Into<String>) -> Self {
        self.thumbnail = Some(thumbnail.into());
        self
    }

    /// Returns a copy pointing at an offline file. Local tracks are returned
    /// unchanged since they already are files.
    pub fn with_downloaded_file(&self, path: impl Into<PathBuf>) -> Self {
        let mut track = self.clone();
        if let TrackSource::Remote { downloaded, .. } = &mut track.source {
            *downloaded = Some(path.into());
        }
        track
    }

    pub fn kind(&self) -> SourceKind {
        match self.source {
            TrackSource::Local { .. } => SourceKind::Local,
            TrackSource::Remote { .. } => SourceKind::Remote,
        }
    }

    pub fn remote_id(&self) -> Option<&str> {
        match &self.source {
            TrackSource::Remote { remote_id, .. } => Some(remote_id),
            TrackSource::Local { .. } => None,
        }
    }

    /// The file that can be played without network access, if any.
    pub fn local_file(&self) -> Option<&Path> {
        match &self.source {
            TrackSource::Local { path } => Some(path),
            TrackSource::Remote { downloaded, .. } => downloaded.as_deref(),
        }
    }

    /// Folder containing the track's file, for local tracks.
    pub fn folder(&self) -> Option<&Path> {
        match &self.source {
            TrackSource::Local { path } => path.parent(),
            TrackSource::Remote { .. } => None,
        }
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.id.as_str().trim().is_empty() {
            return Err("Track id cannot be empty".to_string());
        }
        if self.title.trim().is_empty() {
            return Err("Track title cannot be empty".to_string());
        }
        if let TrackSource::Remote { remote_id, .. } = &self.source {
            if remote_id.trim().is_empty() {
                return Err("Remote track must carry a remote id".to_string());
            }
        }
        Ok(())
    }
}
