//! Queue model
//!
//! Holds the three ordered collections the engine plays from:
//!
//! ```text
//! Original list (source order):   A  B  C  D
//! Playback order (permutation):   2  0  3  1      -> plays C A D B
//! Up next (override, front first): X  Y            -> plays before the order resumes
//! ```
//!
//! The current cursor is an anchor into the playback order. While an up-next
//! track plays (or after the playing track was removed from the list) the
//! anchor stays on the last ordered position and the current entry is
//! "detached" from it.

use crate::sequencer::{generate_order, next_index, previous_index};
use lyric_core::{PlaybackMode, TrackId, TrackRef};
use std::collections::VecDeque;

/// Default cap for [`PlaybackQueue::ordered_playback_list`]
pub const DEFAULT_ORDERED_LIST_LIMIT: usize = 100;

/// A position in the playback order, carrying both indices
///
/// `order_index` points into the playback order, `track_index` into the
/// original list. They are always computed together from the current order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueuePosition {
    order_index: usize,
    track_index: usize,
}

impl QueuePosition {
    /// Index into the playback order
    pub fn order_index(&self) -> usize {
        self.order_index
    }

    /// Index into the original list
    pub fn track_index(&self) -> usize {
        self.track_index
    }
}

/// Why the queue is asked for a successor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Advance {
    /// Track ran out (or crossfaded); honours repeat-one
    Auto,
    /// User pressed next
    User,
}

/// Where a next entry was taken from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PreparedOrigin {
    /// Successor in the playback order
    Ordered(QueuePosition),
    /// Front of the up-next queue (already removed from it)
    UpNext,
}

impl PreparedOrigin {
    fn same_kind(&self, other: &Self) -> bool {
        matches!(
            (self, other),
            (Self::Ordered(_), Self::Ordered(_)) | (Self::UpNext, Self::UpNext)
        )
    }
}

/// A resolved "what plays next"
#[derive(Debug, Clone)]
pub struct NextEntry {
    /// Track to play
    pub track: TrackRef,
    /// Where it came from
    pub origin: PreparedOrigin,
}

/// Result of locating a skip target
#[derive(Debug, Clone)]
pub enum SkipTarget {
    /// Target is now the front of the up-next queue
    UpNext,
    /// Target is in the original list; the cursor already moved to it
    Ordered(NextEntry),
}

/// Playback queue with original list, playback order and up-next override
#[derive(Debug, Clone, Default)]
pub struct PlaybackQueue {
    /// User-supplied list, source order
    original: Vec<TrackRef>,

    /// Permutation of `0..original.len()`
    order: Vec<usize>,

    /// Explicit override queue (front plays next)
    up_next: VecDeque<TrackRef>,

    /// Anchor in the playback order
    current: Option<QueuePosition>,

    /// Playing track is not the anchor (up-next track or removed from the list)
    detached: bool,

    /// Entry selected for the prepared node
    prepared: Option<NextEntry>,

    /// Mode the order was generated for
    mode: PlaybackMode,
}

impl PlaybackQueue {
    /// Create an empty queue for `mode`
    pub fn new(mode: PlaybackMode) -> Self {
        Self {
            mode,
            ..Self::default()
        }
    }

    // ===== Loading =====

    /// Replace the list and position the cursor on the start track
    ///
    /// Clears the up-next queue. Without a start track (or when it is not in
    /// the list) playback starts at order position 0. Returns the start
    /// entry, or `None` for an empty list.
    pub fn load(&mut self, tracks: Vec<TrackRef>, start: Option<TrackId>) -> Option<NextEntry> {
        self.clear();
        if tracks.is_empty() {
            return None;
        }

        self.order = generate_order(tracks.len(), self.mode);
        self.original = tracks;

        let start_position = start
            .and_then(|id| self.track_index_of(id))
            .and_then(|track_index| self.position_of_track(track_index))
            .or_else(|| self.position_at(0))?;

        self.current = Some(start_position);
        Some(NextEntry {
            track: self.track_at(start_position),
            origin: PreparedOrigin::Ordered(start_position),
        })
    }

    /// Drop all collections and cursors
    pub fn clear(&mut self) {
        self.original.clear();
        self.order.clear();
        self.up_next.clear();
        self.current = None;
        self.detached = false;
        self.prepared = None;
    }

    // ===== Up next =====

    /// Put `tracks` at the front of the up-next queue, in their given order
    ///
    /// Existing occurrences of the same tracks are moved rather than
    /// duplicated. Returns false for empty input.
    pub fn add_to_up_next(&mut self, tracks: &[TrackRef]) -> bool {
        if tracks.is_empty() {
            return false;
        }

        for track in tracks.iter().rev() {
            let id = track.id();
            self.up_next.retain(|queued| queued.id() != id);
            self.up_next.push_front(track.clone());
        }
        true
    }

    /// Remove a track from the up-next queue or the original list
    ///
    /// The up-next queue is searched first. Removing from the original list
    /// keeps the playback order dense and shifts the cursor with it. Returns
    /// whether anything was removed.
    pub fn remove_track(&mut self, id: TrackId) -> bool {
        if let Some(index) = self.up_next.iter().position(|t| t.id() == id) {
            self.up_next.remove(index);
            return true;
        }

        let Some(track_index) = self.track_index_of(id) else {
            return false;
        };
        let Some(removed_order_index) = self.order.iter().position(|&v| v == track_index) else {
            return false;
        };

        self.original.remove(track_index);
        self.order.remove(removed_order_index);
        for value in &mut self.order {
            if *value > track_index {
                *value -= 1;
            }
        }

        let len = self.order.len();
        self.current = match self.current {
            _ if len == 0 => None,
            None => None,
            Some(current) => {
                let order_index = if current.order_index > removed_order_index {
                    current.order_index - 1
                } else if current.order_index == removed_order_index {
                    // The playing track left the list; anchor on its predecessor
                    // so the successor stays the track that followed it
                    self.detached = true;
                    previous_index(removed_order_index, len)
                } else {
                    current.order_index
                };
                self.position_at(order_index)
            }
        };
        true
    }

    // ===== Mode =====

    /// Switch playback mode, regenerating the order when shuffle is entered or left
    ///
    /// The cursor follows the playing track into the new order. Returns
    /// whether the order was regenerated.
    pub fn set_mode(&mut self, mode: PlaybackMode) -> bool {
        let old = self.mode;
        self.mode = mode;

        if old == mode || !(old.is_shuffle() || mode.is_shuffle()) {
            return false;
        }

        let anchor_track = self.current.map(|p| p.track_index);
        self.order = generate_order(self.original.len(), mode);
        self.current = anchor_track.and_then(|t| self.position_of_track(t));
        true
    }

    // ===== Next / previous resolution =====

    /// What would play next, without changing anything
    ///
    /// The up-next front always wins over the playback order.
    pub fn peek_next(&self, advance: Advance) -> Option<NextEntry> {
        if let Some(front) = self.up_next.front() {
            return Some(NextEntry {
                track: front.clone(),
                origin: PreparedOrigin::UpNext,
            });
        }

        let position = self.ordered_successor(advance)?;
        Some(NextEntry {
            track: self.track_at(position),
            origin: PreparedOrigin::Ordered(position),
        })
    }

    /// Select the next entry and record it as prepared
    ///
    /// An up-next track is removed from the up-next queue at selection time.
    pub fn take_next(&mut self, advance: Advance) -> Option<NextEntry> {
        let entry = self.peek_next(advance)?;
        if entry.origin == PreparedOrigin::UpNext {
            self.up_next.pop_front();
        }
        self.prepared = Some(entry.clone());
        Some(entry)
    }

    /// Whether the prepared entry is also what a `advance` step would play
    pub fn prepared_matches(&self, advance: Advance) -> bool {
        match &self.prepared {
            None => false,
            Some(NextEntry {
                origin: PreparedOrigin::UpNext,
                ..
            }) => true,
            Some(NextEntry {
                origin: PreparedOrigin::Ordered(position),
                ..
            }) => self.ordered_successor(advance) == Some(*position),
        }
    }

    /// Move the cursor onto an entry that just became current
    pub fn commit_advance(&mut self, entry: &NextEntry) {
        match entry.origin {
            PreparedOrigin::Ordered(position) => {
                self.current = Some(position);
                self.detached = false;
            }
            PreparedOrigin::UpNext => {
                self.detached = true;
            }
        }
        self.prepared = None;
    }

    /// Entry a "previous" step lands on, without moving the cursor
    ///
    /// While a detached track plays, "back" is the anchor itself. Commit the
    /// entry with [`commit_advance`](Self::commit_advance) once its node is
    /// playing.
    pub fn peek_previous(&self) -> Option<NextEntry> {
        let current = self.current?;
        let order_index = if self.detached {
            current.order_index
        } else {
            previous_index(current.order_index, self.order.len())
        };
        let position = self.position_at(order_index)?;

        Some(NextEntry {
            track: self.track_at(position),
            origin: PreparedOrigin::Ordered(position),
        })
    }

    /// Locate a skip target
    ///
    /// In the up-next queue: everything before it is dropped. In the original
    /// list: the up-next queue is discarded; the returned entry is committed
    /// once its node is playing.
    pub fn skip_to(&mut self, id: TrackId) -> Option<SkipTarget> {
        if let Some(index) = self.up_next.iter().position(|t| t.id() == id) {
            self.up_next.drain(..index);
            return Some(SkipTarget::UpNext);
        }

        let position = self
            .track_index_of(id)
            .and_then(|track_index| self.position_of_track(track_index))?;

        self.up_next.clear();
        self.prepared = None;
        Some(SkipTarget::Ordered(NextEntry {
            track: self.track_at(position),
            origin: PreparedOrigin::Ordered(position),
        }))
    }

    // ===== Prepared entry bookkeeping =====

    /// Entry selected for the prepared node, if any
    pub fn prepared(&self) -> Option<&NextEntry> {
        self.prepared.as_ref()
    }

    /// Put an up-next prepared track back at the front of the up-next queue
    ///
    /// Called before a queue mutation so the mutation sees the track where it
    /// logically is. Pair with [`confirm_prepared`](Self::confirm_prepared).
    pub fn reclaim_prepared(&mut self) {
        if let Some(NextEntry {
            track,
            origin: PreparedOrigin::UpNext,
        }) = &self.prepared
        {
            let id = track.id();
            self.up_next.retain(|queued| queued.id() != id);
            self.up_next.push_front(track.clone());
        }
    }

    /// Re-check the prepared entry after a mutation
    ///
    /// Returns true when the prepared track is still what would play next
    /// (its position is refreshed). Returns false when it no longer is; the
    /// prepared entry is then dropped and the caller must discard its node.
    pub fn confirm_prepared(&mut self) -> bool {
        let Some(prepared) = self.prepared.take() else {
            return true;
        };

        match self.peek_next(Advance::Auto) {
            Some(expected)
                if expected.track.id() == prepared.track.id()
                    && expected.origin.same_kind(&prepared.origin) =>
            {
                if expected.origin == PreparedOrigin::UpNext {
                    self.up_next.pop_front();
                }
                self.prepared = Some(expected);
                true
            }
            _ => false,
        }
    }

    /// Forget the prepared entry, returning an up-next track to the queue
    pub fn release_prepared(&mut self) {
        self.reclaim_prepared();
        self.prepared = None;
    }

    // ===== Views =====

    /// Upcoming tracks of the playback order, for display
    ///
    /// Starts after the current cursor, wraps around and lists every other
    /// track of the list once, capped at `limit`. The view borrows the queue
    /// and can be restarted by cloning it before iterating.
    pub fn ordered_playback_list(&self, limit: usize) -> OrderedView<'_> {
        let len = self.order.len();
        let (start, available) = match self.current {
            None => (0, len),
            Some(current) if self.detached => (next_index(current.order_index, len), len),
            Some(current) => (next_index(current.order_index, len), len.saturating_sub(1)),
        };

        OrderedView {
            queue: self,
            start,
            yielded: 0,
            count: available.min(limit),
        }
    }

    /// The original list, source order
    pub fn original(&self) -> &[TrackRef] {
        &self.original
    }

    /// The playback order
    pub fn order(&self) -> &[usize] {
        &self.order
    }

    /// The up-next queue, front first
    pub fn up_next(&self) -> impl Iterator<Item = &TrackRef> {
        self.up_next.iter()
    }

    /// Number of tracks in the up-next queue
    pub fn up_next_len(&self) -> usize {
        self.up_next.len()
    }

    /// Current anchor in the playback order
    pub fn current_position(&self) -> Option<QueuePosition> {
        self.current
    }

    /// Order position immediately before the anchor (wrapping)
    pub fn previous_position(&self) -> Option<QueuePosition> {
        let current = self.current?;
        self.position_at(previous_index(current.order_index, self.order.len()))
    }

    /// Whether the playing track is detached from the anchor
    pub fn is_detached(&self) -> bool {
        self.detached
    }

    /// Mode the order was generated for
    pub fn mode(&self) -> PlaybackMode {
        self.mode
    }

    /// Whether both the list and the up-next queue are empty
    pub fn is_empty(&self) -> bool {
        self.original.is_empty() && self.up_next.is_empty()
    }

    // ===== Internal =====

    fn ordered_successor(&self, advance: Advance) -> Option<QueuePosition> {
        let len = self.order.len();
        if len == 0 {
            return None;
        }

        match self.current {
            None => self.position_at(0),
            Some(current)
                if advance == Advance::Auto
                    && self.mode == PlaybackMode::RepeatOne
                    && !self.detached =>
            {
                Some(current)
            }
            Some(current) => self.position_at(next_index(current.order_index, len)),
        }
    }

    fn position_at(&self, order_index: usize) -> Option<QueuePosition> {
        self.order.get(order_index).map(|&track_index| QueuePosition {
            order_index,
            track_index,
        })
    }

    fn position_of_track(&self, track_index: usize) -> Option<QueuePosition> {
        self.order
            .iter()
            .position(|&v| v == track_index)
            .map(|order_index| QueuePosition {
                order_index,
                track_index,
            })
    }

    fn track_index_of(&self, id: TrackId) -> Option<usize> {
        self.original.iter().position(|t| t.id() == id)
    }

    fn track_at(&self, position: QueuePosition) -> TrackRef {
        self.original[position.track_index].clone()
    }
}

/// Lazy, finite view over the upcoming part of the playback order
#[derive(Debug, Clone)]
pub struct OrderedView<'a> {
    queue: &'a PlaybackQueue,
    start: usize,
    yielded: usize,
    count: usize,
}

impl<'a> Iterator for OrderedView<'a> {
    type Item = &'a TrackRef;

    fn next(&mut self) -> Option<Self::Item> {
        if self.yielded >= self.count {
            return None;
        }
        let len = self.queue.order.len();
        let order_index = (self.start + self.yielded) % len;
        self.yielded += 1;
        Some(&self.queue.original[self.queue.order[order_index]])
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.count - self.yielded;
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for OrderedView<'_> {}
