//! Time-to-entry lookup for lyric lines and words
//!
//! This module provides [`TimingNavigator`], a cursor over a sorted sequence of
//! [`TimedEntry`] values that answers "which entries are active at position
//! `p`?" for a playback position in milliseconds.
//!
//! # Access Patterns
//!
//! Two patterns dominate real playback:
//!
//! 1. **Sequential playback**: positions arrive in non-decreasing order a few
//!    tens of milliseconds apart. The navigator caches the last matched index
//!    and checks it (and its successor) first, giving O(1) lookups.
//! 2. **Seeks**: arbitrary jumps forward or backward. The navigator falls back
//!    to a binary search over the entry bounds, O(log N).
//!
//! # Interval Semantics
//!
//! Every entry covers the closed interval `[begin, end]`. Two adjacent entries
//! where `A.end == B.begin` therefore *both* match at that exact instant:
//!
//! ```text
//!   E0 [0 ────── 1000]
//!   E1           [1000 ────── 2000]
//!                  ↑ position 1000 matches E0 and E1
//! ```
//!
//! # Overlap
//!
//! Entries are sorted by `begin` only, so several entries may contain the same
//! position (e.g. a backing-vocal line spanning the primary line). Queries that
//! report "every active entry" descend a segment tree of `end` maxima,
//! restricted to entries whose `begin` is at or before the position, and skip
//! every subtree that ends before it. A query costs O((k + 1) log N) for `k`
//! matches; an anchor with no overlapping neighbour is reported in O(1).
//!
//! # Input Contract
//!
//! The producer of the sequence guarantees entries sorted ascending by
//! `begin` with `begin < end`. The navigator does not re-validate this; query
//! results for malformed input are unspecified (but never unsafe).
//!
//! # Examples
//!
//! ```rust
//! use lyrix_common::lyric::RichLyricLine;
//! use lyrix_common::timing::TimingNavigator;
//!
//! let mut navigator = TimingNavigator::new(vec![
//!     RichLyricLine::new(0, 1000, "first"),
//!     RichLyricLine::new(1000, 2000, "second"),
//! ]);
//!
//! assert_eq!(navigator.collect_at(500).len(), 1);
//! assert_eq!(navigator.collect_at(1000).len(), 2); // shared boundary
//! assert!(navigator.first(2500).is_none());        // past the last entry
//! ```

use std::sync::Arc;

/// An object occupying the closed time interval `[begin, end]` (milliseconds)
pub trait TimedEntry {
    fn begin(&self) -> i64;

    fn end(&self) -> i64;

    /// Interval length; `end - begin` for normalized entries
    fn duration(&self) -> i64 {
        self.end() - self.begin()
    }

    /// Whether `position` falls inside `[begin, end]`
    fn contains(&self, position: i64) -> bool {
        self.begin() <= position && position <= self.end()
    }
}

impl<T: TimedEntry + ?Sized> TimedEntry for Arc<T> {
    fn begin(&self) -> i64 {
        (**self).begin()
    }

    fn end(&self) -> i64 {
        (**self).end()
    }

    fn duration(&self) -> i64 {
        (**self).duration()
    }
}

/// Cursor over a sorted, read-only sequence of timed entries
///
/// The entry array is shared (`Arc<[T]>`) and never mutated. The cursor fields
/// change on every query, so queries take `&mut self`: one navigator belongs
/// to one timeline driven from one thread.
///
/// **Design:**
/// - Entries sorted by `begin` ascending (caller's responsibility)
/// - `max_end_prefix[i]` = largest `end` among `entries[..=i]`, used for the
///   overall "past the end" check and to prove an anchor has no overlap
/// - `max_end_tree`: segment tree of `end` maxima; overlap queries descend
///   only into subtrees that can still reach the position, so one long entry
///   spanning the whole song does not turn every query into a linear walk
/// - Last matched index and last query position cached for the hot path
#[derive(Debug)]
pub struct TimingNavigator<T> {
    entries: Arc<[T]>,

    max_end_prefix: Vec<i64>,

    max_end_tree: MaxEndTree,

    /// Index matched by the previous query (None = miss or never queried)
    last_matched_index: Option<usize>,

    /// Position of the previous query (-1 = never queried)
    last_query_position: i64,
}

impl<T: TimedEntry> TimingNavigator<T> {
    /// Create a navigator over `entries`
    ///
    /// # Arguments
    /// * `entries` - Timed entries sorted ascending by `begin` (a `Vec<T>` or
    ///   an existing `Arc<[T]>` shared with other readers)
    pub fn new(entries: impl Into<Arc<[T]>>) -> Self {
        let entries = entries.into();
        let max_end_prefix = build_max_end_prefix(&entries);
        let max_end_tree = MaxEndTree::build(&entries);
        Self {
            entries,
            max_end_prefix,
            max_end_tree,
            last_matched_index: None,
            last_query_position: -1,
        }
    }

    /// Replace the underlying sequence and reset the cursor
    pub fn set_entries(&mut self, entries: impl Into<Arc<[T]>>) {
        self.entries = entries.into();
        self.max_end_prefix = build_max_end_prefix(&self.entries);
        self.max_end_tree = MaxEndTree::build(&self.entries);
        self.reset_cache();
    }

    /// Read-only view of the entries
    pub fn entries(&self) -> &[T] {
        &self.entries
    }

    /// Shared handle to the entry array
    pub fn shared_entries(&self) -> Arc<[T]> {
        Arc::clone(&self.entries)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Index matched by the most recent query, if it matched
    pub fn last_matched_index(&self) -> Option<usize> {
        self.last_matched_index
    }

    /// Position of the most recent query (-1 if none)
    pub fn last_query_position(&self) -> i64 {
        self.last_query_position
    }

    /// Forget the cursor so the next query takes the cold path
    pub fn reset_cache(&mut self) {
        self.last_matched_index = None;
        self.last_query_position = -1;
    }

    /// Return one entry containing `position` (the anchor), if any
    ///
    /// When several entries overlap at `position`, which of them is returned
    /// depends on the cursor state; use [`for_each_at`](Self::for_each_at) to
    /// see all of them.
    pub fn first(&mut self, position: i64) -> Option<&T> {
        let index = self.find_target_index(position)?;
        self.entries.get(index)
    }

    /// Invoke `action` for every entry whose `[begin, end]` contains `position`
    ///
    /// Entries are visited in sequence order.
    ///
    /// # Returns
    /// Number of entries visited
    pub fn for_each_at<F>(&mut self, position: i64, mut action: F) -> usize
    where
        F: FnMut(&T),
    {
        let Some(anchor) = self.find_target_index(position) else {
            return 0;
        };

        let entries = Arc::clone(&self.entries);
        self.resolve_overlapping(position, anchor, |index| action(&entries[index]))
    }

    /// Like [`for_each_at`](Self::for_each_at), falling back to the most recent
    /// entry that began before `position` when nothing contains it
    ///
    /// Used to keep the last sung line on screen during instrumental gaps.
    pub fn for_each_at_or_previous<F>(&mut self, position: i64, mut action: F) -> usize
    where
        F: FnMut(&T),
    {
        let count = self.for_each_at(position, &mut action);
        if count > 0 {
            return count;
        }

        match self.find_previous_entry(position) {
            Some(previous) => {
                action(previous);
                1
            }
            None => 0,
        }
    }

    /// Collect every entry containing `position`
    pub fn collect_at(&mut self, position: i64) -> Vec<&T> {
        let Some(anchor) = self.find_target_index(position) else {
            return Vec::new();
        };
        let mut indices = Vec::new();
        self.resolve_overlapping(position, anchor, |index| indices.push(index));
        indices.into_iter().map(|index| &self.entries[index]).collect()
    }

    /// Last entry whose `begin` is strictly before `position`
    ///
    /// Binary search, O(log N). Does not touch the cursor.
    pub fn find_previous_entry(&self, position: i64) -> Option<&T> {
        let count = self.entries.partition_point(|e| e.begin() < position);
        count.checked_sub(1).map(|i| &self.entries[i])
    }

    /// Locate an anchor index for `position` and cache the outcome
    ///
    /// **Algorithm:**
    /// 1. Reject positions outside `[entries[0].begin, max end]` (O(1))
    /// 2. Forward playback: re-check the cached entry, then its successor (O(1))
    /// 3. Otherwise binary search over the bounds (O(log N))
    /// 4. Cache the result, hit or miss
    pub fn find_target_index(&mut self, position: i64) -> Option<usize> {
        let index = self.lookup(position);
        self.last_matched_index = index;
        self.last_query_position = position;
        index
    }

    fn lookup(&self, position: i64) -> Option<usize> {
        let first = self.entries.first()?;
        let max_end = *self.max_end_prefix.last()?;
        if position < first.begin() || position > max_end {
            return None;
        }

        // HOT PATH: forward playback from a cached hit
        if let Some(last) = self.last_matched_index {
            if self.last_query_position <= position {
                if self.is_hit(last, position) {
                    return Some(last);
                }
                if self.is_hit(last + 1, position) {
                    return Some(last + 1);
                }
            }
        }

        // COLD PATH: seek, backward jump or cache miss
        self.binary_search(position)
            .or_else(|| self.scan_back(position))
    }

    fn binary_search(&self, position: i64) -> Option<usize> {
        let mut low = 0;
        let mut high = self.entries.len();
        while low < high {
            let mid = low + (high - low) / 2;
            let entry = &self.entries[mid];
            if position < entry.begin() {
                high = mid;
            } else if position > entry.end() {
                low = mid + 1;
            } else {
                return Some(mid);
            }
        }
        None
    }

    /// Fallback when bisection steps over a long entry that began earlier
    ///
    /// Finds the last entry with `begin <= position` that still reaches
    /// `position`, descending the max-end tree instead of walking entries.
    fn scan_back(&self, position: i64) -> Option<usize> {
        let upper = self.entries.partition_point(|e| e.begin() <= position);
        self.max_end_tree.rightmost_reaching(upper, position)
    }

    /// Visit every index containing `position`, given an anchor that does
    ///
    /// O(1) when the anchor is the only candidate, otherwise
    /// O((k + 1) log N) for `k` overlapping entries.
    fn resolve_overlapping<F>(&self, position: i64, anchor: usize, mut visit: F) -> usize
    where
        F: FnMut(usize),
    {
        let nothing_before = anchor == 0 || self.max_end_prefix[anchor - 1] < position;
        let nothing_after = self
            .entries
            .get(anchor + 1)
            .map_or(true, |next| next.begin() > position);
        if nothing_before && nothing_after {
            visit(anchor);
            return 1;
        }

        // Sortedness: entries at or past `upper` begin after position
        let upper = self.entries.partition_point(|e| e.begin() <= position);
        let mut count = 0;
        self.max_end_tree.for_each_reaching(upper, position, |index| {
            visit(index);
            count += 1;
        });
        count
    }

    fn is_hit(&self, index: usize, position: i64) -> bool {
        self.entries
            .get(index)
            .is_some_and(|entry| entry.contains(position))
    }
}

fn build_max_end_prefix<T: TimedEntry>(entries: &[T]) -> Vec<i64> {
    entries
        .iter()
        .scan(i64::MIN, |max_end, entry| {
            *max_end = (*max_end).max(entry.end());
            Some(*max_end)
        })
        .collect()
}

/// Segment tree over entry `end` values, indexed by entry position
///
/// Node 1 is the root; node `n` has children `2n` and `2n + 1`; leaves start
/// at `size`. Padding leaves hold `i64::MIN` so they never reach a position.
#[derive(Debug, Clone)]
struct MaxEndTree {
    size: usize,
    nodes: Vec<i64>,
}

impl MaxEndTree {
    fn build<T: TimedEntry>(entries: &[T]) -> Self {
        let size = entries.len().next_power_of_two();
        let mut nodes = vec![i64::MIN; 2 * size];
        for (i, entry) in entries.iter().enumerate() {
            nodes[size + i] = entry.end();
        }
        for node in (1..size).rev() {
            nodes[node] = nodes[2 * node].max(nodes[2 * node + 1]);
        }
        Self { size, nodes }
    }

    /// Visit, in ascending order, every index below `upper` whose end reaches `position`
    fn for_each_reaching<F>(&self, upper: usize, position: i64, mut visit: F)
    where
        F: FnMut(usize),
    {
        self.descend(1, 0, self.size, upper, position, &mut visit);
    }

    fn descend<F>(&self, node: usize, low: usize, high: usize, upper: usize, position: i64, visit: &mut F)
    where
        F: FnMut(usize),
    {
        if low >= upper || self.nodes[node] < position {
            return;
        }
        if high - low == 1 {
            visit(low);
            return;
        }
        let mid = low + (high - low) / 2;
        self.descend(2 * node, low, mid, upper, position, visit);
        self.descend(2 * node + 1, mid, high, upper, position, visit);
    }

    /// Largest index below `upper` whose end reaches `position`
    fn rightmost_reaching(&self, upper: usize, position: i64) -> Option<usize> {
        self.rightmost(1, 0, self.size, upper, position)
    }

    fn rightmost(&self, node: usize, low: usize, high: usize, upper: usize, position: i64) -> Option<usize> {
        if low >= upper || self.nodes[node] < position {
            return None;
        }
        if high - low == 1 {
            return Some(low);
        }
        let mid = low + (high - low) / 2;
        self.rightmost(2 * node + 1, mid, high, upper, position)
            .or_else(|| self.rightmost(2 * node, low, mid, upper, position))
    }
}

// ============================================================================
// Tests Module
// ============================================================================

#[cfg(test)]
#[path = "timing_tests.rs"]
mod tests;
