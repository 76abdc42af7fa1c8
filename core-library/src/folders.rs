//! Folder exclusion and folder listing.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use std::path::{Path, PathBuf};

use crate::models::Track;

/// Set of folders whose tracks are hidden from the library.
///
/// A track is excluded when its containing folder equals an excluded folder or
/// lies beneath one. Matching is by path component, so excluding
/// `/music/rock` hides `/music/rock/live` but not `/music/rockabilly`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FolderExclusions {
    folders: BTreeSet<PathBuf>,
}

impl FolderExclusions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, folder: impl Into<PathBuf>) -> bool {
        self.folders.insert(folder.into())
    }

    pub fn remove(&mut self, folder: &Path) -> bool {
        self.folders.remove(folder)
    }

    pub fn is_empty(&self) -> bool {
        self.folders.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Path> {
        self.folders.iter().map(PathBuf::as_path)
    }

    pub fn is_folder_excluded(&self, folder: &Path) -> bool {
        self.folders
            .iter()
            .any(|excluded| folder.starts_with(excluded))
    }

    /// Remote tracks have no folder and are never excluded.
    pub fn excludes(&self, track: &Track) -> bool {
        track
            .folder()
            .map(|folder| self.is_folder_excluded(folder))
            .unwrap_or(false)
    }

    pub fn apply(&self, tracks: Vec<Track>) -> Vec<Track> {
        if self.is_empty() {
            return tracks;
        }
        tracks.into_iter().filter(|t| !self.excludes(t)).collect()
    }
}

impl<P: Into<PathBuf>> FromIterator<P> for FolderExclusions {
    fn from_iter<I: IntoIterator<Item = P>>(iter: I) -> Self {
        Self {
            folders: iter.into_iter().map(Into::into).collect(),
        }
    }
}

/// A folder that contains at least one local track.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FolderInfo {
    pub path: PathBuf,
    pub display_name: String,
    pub track_count: usize,
}

/// Groups local tracks by containing folder, sorted case-insensitively by
/// display name.
pub fn available_folders(tracks: &[Track]) -> Vec<FolderInfo> {
    let mut counts: HashMap<&Path, usize> = HashMap::new();
    for folder in tracks.iter().filter_map(Track::folder) {
        *counts.entry(folder).or_default() += 1;
    }

    let mut folders: Vec<FolderInfo> = counts
        .into_iter()
        .map(|(path, track_count)| FolderInfo {
            path: path.to_path_buf(),
            display_name: path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| path.to_string_lossy().into_owned()),
            track_count,
        })
        .collect();

    folders.sort_by(|a, b| {
        a.display_name
            .to_lowercase()
            .cmp(&b.display_name.to_lowercase())
            .then_with(|| a.path.cmp(&b.path))
    });
    folders
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::TrackId;

    fn local(id: u32, path: &str) -> Track {
        Track::local(TrackId::local(id), format!("Song {id}"), "Artist", path)
    }

    #[test]
    fn excludes_exact_folder_and_descendants() {
        let exclusions: FolderExclusions = ["/music/rock"].into_iter().collect();

        assert!(exclusions.excludes(&local(1, "/music/rock/a.mp3")));
        assert!(exclusions.excludes(&local(2, "/music/rock/live/b.mp3")));
    }

    #[test]
    fn prefix_is_not_substring() {
        let exclusions: FolderExclusions = ["/music/rock"].into_iter().collect();

        assert!(!exclusions.excludes(&local(1, "/music/rockabilly/a.mp3")));
        assert!(!exclusions.excludes(&local(2, "/music/a.mp3")));
    }

    #[test]
    fn remote_tracks_are_never_excluded() {
        let exclusions: FolderExclusions = ["/"].into_iter().collect();
        assert!(!exclusions.excludes(&Track::remote("x", "Song", "Artist")));
    }

    #[test]
    fn apply_keeps_order_of_survivors() {
        let exclusions: FolderExclusions = ["/music/podcasts"].into_iter().collect();
        let tracks = vec![
            local(1, "/music/a.mp3"),
            local(2, "/music/podcasts/ep1.mp3"),
            local(3, "/music/b.mp3"),
        ];

        let ids: Vec<_> = exclusions
            .apply(tracks)
            .into_iter()
            .map(|t| t.id.to_string())
            .collect();
        assert_eq!(ids, vec!["local:1", "local:3"]);
    }

    #[test]
    fn available_folders_counts_and_sorts() {
        let tracks = vec![
            local(1, "/sd/Zeta/a.mp3"),
            local(2, "/sd/alpha/b.mp3"),
            local(3, "/sd/alpha/c.mp3"),
            Track::remote("r", "Remote", "Artist"),
        ];

        let folders = available_folders(&tracks);
        assert_eq!(folders.len(), 2);
        assert_eq!(folders[0].display_name, "alpha");
        assert_eq!(folders[0].track_count, 2);
        assert_eq!(folders[1].display_name, "Zeta");
        assert_eq!(folders[1].path, PathBuf::from("/sd/Zeta"));
    }
}
