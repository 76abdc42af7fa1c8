//! # Queue Controller
//!
//! Ordered play queue with shuffle and repeat.
//!
//! ## Overview
//!
//! The queue keeps two orders:
//!
//! - the **original order**, exactly as items were set or enqueued
//! - the **play order**, a permutation of the original used for navigation
//!
//! With shuffle off the play order is the identity. Turning shuffle on derives
//! a seeded random permutation with the current item first; turning it off
//! throws the permutation away, which restores the original sequence exactly.
//! Every index accepted or returned by [`QueueController`] is a position in
//! the play order.
//!
//! The controller is plain synchronous state. It is owned by the transport
//! actor and is never shared across tasks.

use crate::error::{PlaybackError, Result};
use core_library::{Track, TrackId};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Repeat behaviour at track end and on skip.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RepeatMode {
    #[default]
    Off,
    All,
    One,
}

impl RepeatMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            RepeatMode::Off => "off",
            RepeatMode::All => "all",
            RepeatMode::One => "one",
        }
    }
}

impl fmt::Display for RepeatMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Next,
    Previous,
}

/// Result of [`QueueController::advance`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdvanceOutcome {
    /// The cursor moved to a different position.
    Moved { index: usize },
    /// Repeat-one: stay on `index` and start it again from zero.
    Restart { index: usize },
    /// Repeat-off at an edge of the queue (or an empty queue). Nothing moved.
    Boundary { index: Option<usize> },
}

/// A queue entry: the track plus its stream URL once one has been resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueItem {
    pub track: Track,
    pub stream_url: Option<String>,
}

impl QueueItem {
    pub fn new(track: Track) -> Self {
        Self {
            track,
            stream_url: None,
        }
    }

    pub fn with_stream_url(mut self, url: impl Into<String>) -> Self {
        self.stream_url = Some(url.into());
        self
    }
}

impl From<Track> for QueueItem {
    fn from(track: Track) -> Self {
        Self::new(track)
    }
}

/// Item taken out by [`QueueController::remove`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Removed {
    pub item: QueueItem,
    /// The removed item was the current one.
    pub was_current: bool,
}

/// Read-only view of the queue.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct QueueSnapshot {
    /// Tracks in play order
    pub tracks: Vec<Track>,
    pub current_index: Option<usize>,
    pub shuffle: bool,
    pub repeat: RepeatMode,
}

impl QueueSnapshot {
    pub fn current(&self) -> Option<&Track> {
        self.current_index.and_then(|i| self.tracks.get(i))
    }
}

/// The play queue.
pub struct QueueController {
    /// Original order
    items: Vec<QueueItem>,
    /// Play order: indices into `items`
    order: Vec<usize>,
    /// Position in `order`
    cursor: Option<usize>,
    shuffle: bool,
    repeat: RepeatMode,
    rng: StdRng,
}

impl Default for QueueController {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for QueueController {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QueueController")
            .field("len", &self.items.len())
            .field("cursor", &self.cursor)
            .field("shuffle", &self.shuffle)
            .field("repeat", &self.repeat)
            .finish()
    }
}

impl QueueController {
    /// Empty queue with an entropy-seeded shuffle.
    pub fn new() -> Self {
        Self::with_rng(StdRng::from_entropy())
    }

    /// Empty queue whose shuffles are reproducible from `seed`.
    pub fn with_seed(seed: u64) -> Self {
        Self::with_rng(StdRng::seed_from_u64(seed))
    }

    fn with_rng(rng: StdRng) -> Self {
        Self {
            items: Vec::new(),
            order: Vec::new(),
            cursor: None,
            shuffle: false,
            repeat: RepeatMode::Off,
            rng,
        }
    }

    // ========================================================================
    // Accessors
    // ========================================================================

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn current_index(&self) -> Option<usize> {
        self.cursor
    }

    pub fn current(&self) -> Option<&QueueItem> {
        self.item_at(self.cursor?)
    }

    /// Item at a play-order position.
    pub fn item_at(&self, index: usize) -> Option<&QueueItem> {
        self.order.get(index).map(|&i| &self.items[i])
    }

    pub fn shuffle(&self) -> bool {
        self.shuffle
    }

    pub fn repeat(&self) -> RepeatMode {
        self.repeat
    }

    /// Tracks in the order they were added.
    pub fn original_tracks(&self) -> Vec<&Track> {
        self.items.iter().map(|item| &item.track).collect()
    }

    /// Tracks in play order.
    pub fn play_order(&self) -> Vec<&Track> {
        self.order.iter().map(|&i| &self.items[i].track).collect()
    }

    pub fn snapshot(&self) -> QueueSnapshot {
        QueueSnapshot {
            tracks: self.play_order().into_iter().cloned().collect(),
            current_index: self.cursor,
            shuffle: self.shuffle,
            repeat: self.repeat,
        }
    }

    // ========================================================================
    // Mutation
    // ========================================================================

    /// Replaces the whole queue. `start` is a position in the new list.
    ///
    /// With shuffle on, the start item leads a fresh permutation.
    pub fn set_queue(&mut self, items: Vec<QueueItem>, start: Option<usize>) -> Result<()> {
        if let Some(start) = start {
            if start >= items.len() {
                return Err(PlaybackError::InvalidRequest(format!(
                    "start index {start} out of range for {} items",
                    items.len()
                )));
            }
        }

        self.items = items;
        self.order = (0..self.items.len()).collect();
        self.cursor = start;
        if self.shuffle {
            self.reshuffle();
        }
        Ok(())
    }

    /// Appends items. They go to the end of the original order and, shuffled
    /// among themselves, to the end of the play order.
    pub fn enqueue(&mut self, items: Vec<QueueItem>) {
        let first = self.items.len();
        self.items.extend(items);
        let mut added: Vec<usize> = (first..self.items.len()).collect();
        if self.shuffle {
            added.shuffle(&mut self.rng);
        }
        self.order.extend(added);
    }

    /// Returns `true` when the mode actually changed.
    pub fn set_shuffle(&mut self, enabled: bool) -> bool {
        if self.shuffle == enabled {
            return false;
        }
        self.shuffle = enabled;
        if enabled {
            self.reshuffle();
        } else {
            let current = self.cursor.map(|c| self.order[c]);
            self.order = (0..self.items.len()).collect();
            self.cursor = current;
        }
        true
    }

    pub fn set_repeat(&mut self, mode: RepeatMode) {
        self.repeat = mode;
    }

    /// Moves the cursor according to the repeat mode.
    ///
    /// - `One`: restart the current item
    /// - `All`: wrap around both ends
    /// - `Off`: stop at both ends
    pub fn advance(&mut self, direction: Direction) -> AdvanceOutcome {
        let len = self.order.len();
        let Some(cursor) = self.cursor else {
            if len > 0 && direction == Direction::Next {
                self.cursor = Some(0);
                return AdvanceOutcome::Moved { index: 0 };
            }
            return AdvanceOutcome::Boundary { index: None };
        };

        if self.repeat == RepeatMode::One {
            return AdvanceOutcome::Restart { index: cursor };
        }

        let target = match direction {
            Direction::Next if cursor + 1 < len => Some(cursor + 1),
            Direction::Next if self.repeat == RepeatMode::All => Some(0),
            Direction::Previous if cursor > 0 => Some(cursor - 1),
            Direction::Previous if self.repeat == RepeatMode::All => Some(len - 1),
            _ => None,
        };

        match target {
            Some(index) => {
                self.cursor = Some(index);
                AdvanceOutcome::Moved { index }
            }
            None => AdvanceOutcome::Boundary {
                index: Some(cursor),
            },
        }
    }

    /// Makes `index` current.
    pub fn jump_to(&mut self, index: usize) -> Result<&QueueItem> {
        if index >= self.order.len() {
            return Err(self.out_of_range(index));
        }
        self.cursor = Some(index);
        Ok(&self.items[self.order[index]])
    }

    /// Removes the item at a play-order position.
    ///
    /// When the current item is removed, the item sliding into its place
    /// becomes current (or the new last item, or nothing).
    pub fn remove(&mut self, index: usize) -> Result<Removed> {
        if index >= self.order.len() {
            return Err(self.out_of_range(index));
        }

        let item_index = self.order.remove(index);
        let item = self.items.remove(item_index);
        for slot in self.order.iter_mut() {
            if *slot > item_index {
                *slot -= 1;
            }
        }

        let was_current = self.cursor == Some(index);
        self.cursor = match self.cursor {
            Some(c) if c > index => Some(c - 1),
            Some(c) if c == index => {
                if self.order.is_empty() {
                    None
                } else {
                    Some(c.min(self.order.len() - 1))
                }
            }
            other => other,
        };

        Ok(Removed { item, was_current })
    }

    /// Moves an item within the play order. With shuffle off the original
    /// order follows, since the two are the same list.
    pub fn move_item(&mut self, from: usize, to: usize) -> Result<()> {
        let len = self.order.len();
        if from >= len {
            return Err(self.out_of_range(from));
        }
        if to >= len {
            return Err(self.out_of_range(to));
        }
        if from == to {
            return Ok(());
        }

        if self.shuffle {
            let moved = self.order.remove(from);
            self.order.insert(to, moved);
        } else {
            let moved = self.items.remove(from);
            self.items.insert(to, moved);
        }

        self.cursor = self.cursor.map(|c| {
            if c == from {
                to
            } else if from < c && to >= c {
                c - 1
            } else if from > c && to <= c {
                c + 1
            } else {
                c
            }
        });
        Ok(())
    }

    /// Caches a resolved stream URL on every entry for `track_id`.
    pub fn set_stream_url(&mut self, track_id: &TrackId, url: &str) {
        for item in self.items.iter_mut().filter(|i| &i.track.id == track_id) {
            item.stream_url = Some(url.to_string());
        }
    }

    /// Drops a cached stream URL, e.g. after it expired mid-playback.
    pub fn clear_stream_url(&mut self, track_id: &TrackId) {
        for item in self.items.iter_mut().filter(|i| &i.track.id == track_id) {
            item.stream_url = None;
        }
    }

    pub fn clear(&mut self) {
        self.items.clear();
        self.order.clear();
        self.cursor = None;
    }

    fn reshuffle(&mut self) {
        let current = self.cursor.map(|c| self.order[c]);
        let mut rest: Vec<usize> = (0..self.items.len())
            .filter(|&i| Some(i) != current)
            .collect();
        rest.shuffle(&mut self.rng);

        self.order = current.into_iter().chain(rest).collect();
        self.cursor = current.map(|_| 0);
    }

    fn out_of_range(&self, index: usize) -> PlaybackError {
        PlaybackError::InvalidRequest(format!(
            "index {index} out of range for queue of {}",
            self.order.len()
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn items(titles: &[&str]) -> Vec<QueueItem> {
        titles
            .iter()
            .map(|t| QueueItem::new(Track::remote(*t, *t, "Artist")))
            .collect()
    }

    fn titles(queue: &QueueController) -> Vec<String> {
        queue.play_order().iter().map(|t| t.title.clone()).collect()
    }

    fn queue_of(titles: &[&str], start: usize) -> QueueController {
        let mut queue = QueueController::with_seed(7);
        queue.set_queue(items(titles), Some(start)).unwrap();
        queue
    }

    #[test]
    fn test_shuffle_off_restores_original_order() {
        let names: Vec<String> = (0..20).map(|i| format!("t{i}")).collect();
        let refs: Vec<&str> = names.iter().map(String::as_str).collect();
        let mut queue = queue_of(&refs, 5);

        assert!(queue.set_shuffle(true));
        assert_ne!(titles(&queue), names);
        assert_eq!(queue.current().unwrap().track.title, "t5");
        assert_eq!(queue.current_index(), Some(0));

        assert!(queue.set_shuffle(false));
        assert_eq!(titles(&queue), names);
        assert_eq!(queue.current_index(), Some(5));
    }

    #[test]
    fn test_reshuffle_produces_new_order() {
        let names: Vec<String> = (0..30).map(|i| format!("t{i}")).collect();
        let refs: Vec<&str> = names.iter().map(String::as_str).collect();
        let mut queue = queue_of(&refs, 0);

        queue.set_shuffle(true);
        let first = titles(&queue);
        queue.set_shuffle(false);
        queue.set_shuffle(true);
        assert_ne!(titles(&queue), first);
    }

    #[test]
    fn test_same_seed_same_shuffle() {
        let mut a = queue_of(&["a", "b", "c", "d", "e", "f"], 0);
        let mut b = queue_of(&["a", "b", "c", "d", "e", "f"], 0);
        a.set_shuffle(true);
        b.set_shuffle(true);
        assert_eq!(titles(&a), titles(&b));
    }

    #[test]
    fn test_repeat_all_wraps() {
        let mut queue = queue_of(&["A", "B", "C"], 2);
        queue.set_repeat(RepeatMode::All);

        assert_eq!(
            queue.advance(Direction::Next),
            AdvanceOutcome::Moved { index: 0 }
        );
        assert_eq!(
            queue.advance(Direction::Previous),
            AdvanceOutcome::Moved { index: 2 }
        );
    }

    #[test]
    fn test_repeat_one_restarts() {
        let mut queue = queue_of(&["A"], 0);
        queue.set_repeat(RepeatMode::One);

        assert_eq!(
            queue.advance(Direction::Next),
            AdvanceOutcome::Restart { index: 0 }
        );
        assert_eq!(
            queue.advance(Direction::Previous),
            AdvanceOutcome::Restart { index: 0 }
        );
        assert_eq!(queue.current_index(), Some(0));
    }

    #[test]
    fn test_repeat_off_stops_at_edges() {
        let mut queue = queue_of(&["A", "B"], 1);

        assert_eq!(
            queue.advance(Direction::Next),
            AdvanceOutcome::Boundary { index: Some(1) }
        );
        assert_eq!(queue.current_index(), Some(1));

        queue.jump_to(0).unwrap();
        assert_eq!(
            queue.advance(Direction::Previous),
            AdvanceOutcome::Boundary { index: Some(0) }
        );
    }

    #[test]
    fn test_advance_on_empty_queue() {
        let mut queue = QueueController::with_seed(1);
        assert_eq!(
            queue.advance(Direction::Next),
            AdvanceOutcome::Boundary { index: None }
        );
    }

    #[test]
    fn test_enqueue_without_current_then_next_starts_at_head() {
        let mut queue = QueueController::with_seed(1);
        queue.enqueue(items(&["A", "B"]));
        assert_eq!(queue.current_index(), None);
        assert_eq!(
            queue.advance(Direction::Next),
            AdvanceOutcome::Moved { index: 0 }
        );
    }

    #[test]
    fn test_set_queue_rejects_bad_start() {
        let mut queue = QueueController::with_seed(1);
        assert!(queue.set_queue(items(&["A"]), Some(1)).is_err());
        assert!(queue.is_empty());
    }

    #[test]
    fn test_remove_adjusts_cursor() {
        let mut queue = queue_of(&["A", "B", "C", "D"], 2);

        let removed = queue.remove(0).unwrap();
        assert!(!removed.was_current);
        assert_eq!(queue.current().unwrap().track.title, "C");

        let removed = queue.remove(1).unwrap();
        assert!(removed.was_current);
        assert_eq!(queue.current().unwrap().track.title, "D");

        let removed = queue.remove(1).unwrap();
        assert!(removed.was_current);
        assert_eq!(queue.current().unwrap().track.title, "B");

        queue.remove(0).unwrap();
        assert_eq!(queue.current_index(), None);
        assert!(queue.is_empty());
    }

    #[test]
    fn test_remove_while_shuffled_keeps_restorable_order() {
        let mut queue = queue_of(&["A", "B", "C", "D", "E"], 0);
        queue.set_shuffle(true);
        let victim = queue.item_at(3).unwrap().track.title.clone();
        queue.remove(3).unwrap();
        queue.set_shuffle(false);

        let expected: Vec<String> = ["A", "B", "C", "D", "E"]
            .iter()
            .filter(|t| **t != victim)
            .map(|t| t.to_string())
            .collect();
        assert_eq!(titles(&queue), expected);
    }

    #[test]
    fn test_move_item_tracks_current() {
        let mut queue = queue_of(&["A", "B", "C", "D"], 1);

        queue.move_item(1, 3).unwrap();
        assert_eq!(titles(&queue), vec!["A", "C", "D", "B"]);
        assert_eq!(queue.current_index(), Some(3));

        queue.move_item(0, 3).unwrap();
        assert_eq!(titles(&queue), vec!["C", "D", "B", "A"]);
        assert_eq!(queue.current_index(), Some(2));

        assert!(queue.move_item(0, 9).is_err());
    }

    #[test]
    fn test_stream_url_cached_on_items() {
        let mut queue = queue_of(&["A", "B"], 0);
        let id = queue.item_at(1).unwrap().track.id.clone();

        queue.set_stream_url(&id, "https://cdn.example/b.mp3");
        assert_eq!(
            queue.item_at(1).unwrap().stream_url.as_deref(),
            Some("https://cdn.example/b.mp3")
        );

        queue.clear_stream_url(&id);
        assert!(queue.item_at(1).unwrap().stream_url.is_none());
    }

    #[test]
    fn test_snapshot() {
        let mut queue = queue_of(&["A", "B"], 1);
        queue.set_repeat(RepeatMode::All);
        let snapshot = queue.snapshot();
        assert_eq!(snapshot.tracks.len(), 2);
        assert_eq!(snapshot.current().unwrap().title, "B");
        assert_eq!(snapshot.repeat, RepeatMode::All);
        assert!(!snapshot.shuffle);
    }
}
