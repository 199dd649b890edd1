//! Unit tests for the timing navigator
//!
//! Covers the closed-interval boundary policy, fallback lookups, the cached
//! forward path, the cost of overlap queries under a long entry, and randomized
//! comparison against a linear scan.

use super::*;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

#[derive(Debug, Clone, PartialEq)]
struct Span {
    id: usize,
    begin: i64,
    end: i64,
}

impl TimedEntry for Span {
    fn begin(&self) -> i64 {
        self.begin
    }

    fn end(&self) -> i64 {
        self.end
    }
}

fn spans(bounds: &[(i64, i64)]) -> Vec<Span> {
    bounds
        .iter()
        .enumerate()
        .map(|(id, &(begin, end))| Span { id, begin, end })
        .collect()
}

fn ids_at(navigator: &mut TimingNavigator<Span>, position: i64) -> Vec<usize> {
    let mut ids = Vec::new();
    let count = navigator.for_each_at(position, |e| ids.push(e.id));
    assert_eq!(count, ids.len(), "returned count must match visits");
    ids
}

fn brute_force(entries: &[Span], position: i64) -> Vec<usize> {
    entries
        .iter()
        .filter(|e| e.begin <= position && position <= e.end)
        .map(|e| e.id)
        .collect()
}

/// Sorted random spans; long spans every so often create wide overlaps
fn random_spans(rng: &mut StdRng, count: usize) -> Vec<Span> {
    let mut begin = rng.gen_range(0..500);
    (0..count)
        .map(|id| {
            begin += rng.gen_range(0..400);
            let length = if rng.gen_bool(0.1) {
                rng.gen_range(1..8000)
            } else {
                rng.gen_range(1..900)
            };
            Span {
                id,
                begin,
                end: begin + length,
            }
        })
        .collect()
}

// ============================================================================
// Test Group 1: Boundary and Fallback Contracts
// ============================================================================

#[test]
fn test_shared_boundary_matches_both_entries() {
    let mut navigator = TimingNavigator::new(spans(&[(0, 1000), (1000, 2000)]));

    assert_eq!(ids_at(&mut navigator, 1000), vec![0, 1]);
    assert_eq!(ids_at(&mut navigator, 999), vec![0]);
    assert_eq!(ids_at(&mut navigator, 1001), vec![1]);
}

#[test]
fn test_shared_boundary_after_backward_seek() {
    let mut navigator = TimingNavigator::new(spans(&[(0, 1000), (1000, 2000)]));

    assert_eq!(ids_at(&mut navigator, 1500), vec![1]);
    assert_eq!(ids_at(&mut navigator, 1000), vec![0, 1]);
}

#[test]
fn test_gap_falls_back_to_previous_entry() {
    let mut navigator = TimingNavigator::new(spans(&[(0, 500), (700, 1000)]));

    assert!(ids_at(&mut navigator, 600).is_empty());

    let mut fallback = Vec::new();
    let count = navigator.for_each_at_or_previous(600, |e| fallback.push(e.id));
    assert_eq!(count, 1);
    assert_eq!(fallback, vec![0]);
}

#[test]
fn test_or_previous_prefers_real_matches() {
    let mut navigator = TimingNavigator::new(spans(&[(0, 500), (400, 1000)]));

    let mut visited = Vec::new();
    let count = navigator.for_each_at_or_previous(450, |e| visited.push(e.id));
    assert_eq!(count, 2);
    assert_eq!(visited, vec![0, 1]);
}

#[test]
fn test_or_previous_before_first_entry() {
    let mut navigator = TimingNavigator::new(spans(&[(100, 500)]));

    let count = navigator.for_each_at_or_previous(50, |_| panic!("nothing precedes 50"));
    assert_eq!(count, 0);
}

#[test]
fn test_or_previous_after_last_entry() {
    let mut navigator = TimingNavigator::new(spans(&[(0, 500), (600, 900)]));

    let mut visited = Vec::new();
    navigator.for_each_at_or_previous(5000, |e| visited.push(e.id));
    assert_eq!(visited, vec![1]);
}

#[test]
fn test_find_previous_entry() {
    let navigator = TimingNavigator::new(spans(&[(0, 500), (700, 1000), (1200, 1500)]));

    assert!(navigator.find_previous_entry(-1).is_none());
    assert!(navigator.find_previous_entry(0).is_none()); // strictly before
    assert_eq!(navigator.find_previous_entry(1).map(|e| e.id), Some(0));
    assert_eq!(navigator.find_previous_entry(700).map(|e| e.id), Some(0));
    assert_eq!(navigator.find_previous_entry(701).map(|e| e.id), Some(1));
    assert_eq!(navigator.find_previous_entry(99_999).map(|e| e.id), Some(2));
}

// ============================================================================
// Test Group 2: Out-of-Range and Empty Sequences
// ============================================================================

#[test]
fn test_empty_sequence() {
    let mut navigator: TimingNavigator<Span> = TimingNavigator::new(Vec::new());

    assert!(navigator.is_empty());
    assert!(navigator.first(0).is_none());
    assert_eq!(navigator.for_each_at(0, |_| {}), 0);
    assert_eq!(navigator.for_each_at_or_previous(0, |_| {}), 0);
    assert!(navigator.find_previous_entry(0).is_none());
}

#[test]
fn test_out_of_range_is_no_match() {
    let mut navigator = TimingNavigator::new(spans(&[(100, 200), (300, 400)]));

    assert!(navigator.first(99).is_none());
    assert!(navigator.first(401).is_none());
    assert!(navigator.first(-5).is_none());
    assert!(navigator.first(i64::MAX).is_none());
}

#[test]
fn test_miss_is_cached() {
    let mut navigator = TimingNavigator::new(spans(&[(100, 200)]));

    navigator.first(150);
    assert_eq!(navigator.last_matched_index(), Some(0));

    navigator.first(5000);
    assert_eq!(navigator.last_matched_index(), None);
    assert_eq!(navigator.last_query_position(), 5000);
}

// ============================================================================
// Test Group 3: Cursor (Hot Path) Behaviour
// ============================================================================

#[test]
fn test_sequential_advance_updates_cursor() {
    let mut navigator =
        TimingNavigator::new(spans(&[(0, 999), (1000, 1999), (2000, 2999), (3000, 3999)]));

    let mut seen = Vec::new();
    let mut position = 0;
    while position < 4000 {
        let id = navigator.first(position).map(|e| e.id);
        assert_eq!(id, Some((position / 1000) as usize));
        seen.push(navigator.last_matched_index());
        position += 40;
    }

    assert_eq!(navigator.last_query_position(), 3960);
    assert_eq!(seen.last().copied().flatten(), Some(3));
}

#[test]
fn test_backward_jump_without_reset() {
    let mut navigator = TimingNavigator::new(spans(&[(0, 999), (1000, 1999), (2000, 2999)]));

    assert_eq!(navigator.first(2500).map(|e| e.id), Some(2));
    assert_eq!(navigator.first(200).map(|e| e.id), Some(0));
    assert_eq!(navigator.first(1200).map(|e| e.id), Some(1));
}

#[test]
fn test_forward_skip_beyond_next_entry() {
    let mut navigator = TimingNavigator::new(spans(&[(0, 99), (100, 199), (200, 299), (300, 399)]));

    assert_eq!(navigator.first(50).map(|e| e.id), Some(0));
    assert_eq!(navigator.first(350).map(|e| e.id), Some(3));
}

#[test]
fn test_reset_cache() {
    let mut navigator = TimingNavigator::new(spans(&[(0, 100)]));

    navigator.first(50);
    navigator.reset_cache();
    assert_eq!(navigator.last_matched_index(), None);
    assert_eq!(navigator.last_query_position(), -1);
}

#[test]
fn test_set_entries_resets_cursor() {
    let mut navigator = TimingNavigator::new(spans(&[(0, 100), (100, 200)]));
    navigator.first(150);
    assert_eq!(navigator.last_matched_index(), Some(1));

    navigator.set_entries(spans(&[(5000, 6000)]));
    assert_eq!(navigator.last_matched_index(), None);
    assert_eq!(navigator.len(), 1);
    assert!(navigator.first(150).is_none());
    assert_eq!(navigator.first(5500).map(|e| e.id), Some(0));
}

#[test]
fn test_shared_entries_between_navigators() {
    let first = TimingNavigator::new(spans(&[(0, 100), (100, 200)]));
    let mut second = TimingNavigator::new(first.shared_entries());

    assert_eq!(second.first(150).map(|e| e.id), Some(1));
    assert_eq!(first.last_matched_index(), None);
}

// ============================================================================
// Test Group 4: Overlap Resolution
// ============================================================================

#[test]
fn test_overlay_line_spanning_primary() {
    // Primary lines with a secondary line covering both
    let mut navigator = TimingNavigator::new(spans(&[(0, 1000), (0, 2000), (1000, 2000)]));

    assert_eq!(ids_at(&mut navigator, 500), vec![0, 1]);
    assert_eq!(ids_at(&mut navigator, 1000), vec![0, 1, 2]);
    assert_eq!(ids_at(&mut navigator, 1500), vec![1, 2]);
}

#[test]
fn test_long_entry_hidden_from_bisection() {
    // Bisection probes index 1 and 2, both exclude 250, yet entry 0 contains it
    let mut navigator = TimingNavigator::new(spans(&[(0, 5000), (100, 200), (300, 400)]));

    assert_eq!(ids_at(&mut navigator, 250), vec![0]);
    assert_eq!(navigator.first(250).map(|e| e.id), Some(0));
    assert_eq!(ids_at(&mut navigator, 350), vec![0, 2]);
}

#[test]
fn test_max_end_beyond_last_entry() {
    // Last entry ends before an earlier long entry does
    let mut navigator = TimingNavigator::new(spans(&[(0, 10_000), (100, 200)]));

    assert_eq!(ids_at(&mut navigator, 9_000), vec![0]);
}

#[test]
fn test_collect_at() {
    let mut navigator = TimingNavigator::new(spans(&[(0, 1000), (500, 1500)]));

    let ids: Vec<usize> = navigator.collect_at(750).iter().map(|e| e.id).collect();
    assert_eq!(ids, vec![0, 1]);
    assert!(navigator.collect_at(2000).is_empty());
}

// ============================================================================
// Test Group 5: Overlap Cost
// ============================================================================

thread_local! {
    static ENTRY_READS: std::cell::Cell<usize> = const { std::cell::Cell::new(0) };
}

/// Span that counts every `begin`/`end` read on the current thread
#[derive(Debug, Clone)]
struct CountedSpan(Span);

impl TimedEntry for CountedSpan {
    fn begin(&self) -> i64 {
        ENTRY_READS.with(|reads| reads.set(reads.get() + 1));
        self.0.begin
    }

    fn end(&self) -> i64 {
        ENTRY_READS.with(|reads| reads.set(reads.get() + 1));
        self.0.end
    }
}

fn take_entry_reads() -> usize {
    ENTRY_READS.with(|reads| reads.replace(0))
}

/// One backing track spanning 100k short lines
fn song_long_backing_track() -> Vec<CountedSpan> {
    const LINES: i64 = 100_000;
    let mut entries = vec![CountedSpan(Span {
        id: 0,
        begin: 0,
        end: LINES * 100 + 50,
    })];
    entries.extend((0..LINES).map(|i| {
        CountedSpan(Span {
            id: i as usize + 1,
            begin: i * 100,
            end: i * 100 + 50,
        })
    }));
    entries
}

fn counted_ids_at(navigator: &mut TimingNavigator<CountedSpan>, position: i64) -> Vec<usize> {
    let mut ids = Vec::new();
    navigator.for_each_at(position, |e| ids.push(e.0.id));
    ids
}

#[test]
fn test_long_overlap_does_not_scan_every_entry() {
    let mut navigator = TimingNavigator::new(song_long_backing_track());
    take_entry_reads();

    for i in (0..100_000_i64).step_by(13) {
        let ids = counted_ids_at(&mut navigator, i * 100 + 10);
        assert_eq!(ids, vec![0, i as usize + 1], "line {}", i);
        let reads = take_entry_reads();
        assert!(reads < 200, "line {} read {} entries", i, reads);
    }
}

#[test]
fn test_seek_into_gap_under_long_entry_is_bounded() {
    let mut navigator = TimingNavigator::new(song_long_backing_track());

    for i in [99_999_i64, 3, 50_000, 12, 77_777] {
        navigator.reset_cache();
        take_entry_reads();
        let ids = counted_ids_at(&mut navigator, i * 100 + 75);
        assert_eq!(ids, vec![0], "gap after line {}", i);
        let reads = take_entry_reads();
        assert!(reads < 200, "gap after line {} read {} entries", i, reads);
    }

    take_entry_reads();
    let all = navigator.collect_at(5_000_010);
    assert_eq!(all.len(), 2);
    assert!(take_entry_reads() < 200);
}

// ============================================================================
// Test Group 6: Randomized Comparison
// ============================================================================

#[test]
fn test_matches_brute_force_on_random_sequences() {
    let mut rng = StdRng::seed_from_u64(0x5EED_1EAF);

    for &count in &[1usize, 2, 3, 8, 33, 128, 500] {
        let entries = random_spans(&mut rng, count);
        let mut navigator = TimingNavigator::new(entries.clone());
        let max_end = entries.iter().map(|e| e.end).max().unwrap();

        let mut positions: Vec<i64> = entries
            .iter()
            .flat_map(|e| [e.begin, e.end, e.begin - 1, e.end + 1])
            .collect();
        while positions.len() < 10_000 {
            positions.push(rng.gen_range(-200..max_end + 200));
        }

        // Mix monotonic runs (hot path) with random order (cold path)
        let split = positions.len() / 2;
        positions[..split].sort_unstable();

        for &position in &positions {
            assert_eq!(
                ids_at(&mut navigator, position),
                brute_force(&entries, position),
                "count={} position={}",
                count,
                position
            );
        }
    }
}

#[test]
fn test_hot_path_equals_cold_path() {
    let mut rng = StdRng::seed_from_u64(42);
    let entries = random_spans(&mut rng, 300);
    let max_end = entries.iter().map(|e| e.end).max().unwrap();

    let mut hot = TimingNavigator::new(entries.clone());
    let mut cold = TimingNavigator::new(entries);

    let mut position = -50;
    while position <= max_end + 50 {
        cold.reset_cache();
        assert_eq!(
            ids_at(&mut hot, position),
            ids_at(&mut cold, position),
            "position={}",
            position
        );
        position += rng.gen_range(1..60);
    }
}

#[test]
fn test_or_previous_matches_brute_force() {
    let mut rng = StdRng::seed_from_u64(7);
    let entries = random_spans(&mut rng, 120);
    let max_end = entries.iter().map(|e| e.end).max().unwrap();
    let mut navigator = TimingNavigator::new(entries.clone());

    for _ in 0..2_000 {
        let position = rng.gen_range(-100..max_end + 100);

        let mut expected = brute_force(&entries, position);
        if expected.is_empty() {
            if let Some(previous) = entries.iter().rev().find(|e| e.begin < position) {
                expected.push(previous.id);
            }
        }

        let mut visited = Vec::new();
        navigator.for_each_at_or_previous(position, |e| visited.push(e.id));
        assert_eq!(visited, expected, "position={}", position);
    }
}
