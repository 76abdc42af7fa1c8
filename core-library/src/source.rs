//! Library snapshot source.

use async_trait::async_trait;
use tracing::{debug, instrument};

use crate::error::Result;
use crate::folders::FolderExclusions;
use crate::models::Track;

/// Host-provided enumeration of on-device audio.
///
/// Returns a point-in-time snapshot; the core never watches for changes.
#[async_trait]
pub trait LibrarySource: Send + Sync {
    async fn snapshot(&self) -> Result<Vec<Track>>;
}

/// Takes a snapshot and drops tracks under excluded folders.
#[instrument(skip(source, exclusions))]
pub async fn filtered_snapshot(
    source: &dyn LibrarySource,
    exclusions: &FolderExclusions,
) -> Result<Vec<Track>> {
    let tracks = source.snapshot().await?;
    let total = tracks.len();
    let visible = exclusions.apply(tracks);
    debug!(total, visible = visible.len(), "Library snapshot filtered");
    Ok(visible)
}
