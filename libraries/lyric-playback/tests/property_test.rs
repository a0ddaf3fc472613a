//! Property-based tests for the queue model, sequencer and gain law
//!
//! Uses proptest to drive the queue through random operation sequences and
//! check its invariants after every step.

use lyric_core::{LocalTrack, PlaybackMode, TrackId, TrackRef};
use lyric_playback::crossfade::{ease_in_out, gains_at};
use lyric_playback::queue::{Advance, PlaybackQueue, SkipTarget};
use lyric_playback::sequencer::{generate_order, is_permutation, next_index, previous_index};
use proptest::prelude::*;
use std::collections::HashSet;
use std::path::PathBuf;
use std::time::Duration;

// ===== Helpers =====

fn track(id: u64) -> TrackRef {
    LocalTrack::new(
        id,
        format!("Track {}", id),
        Duration::from_secs(180),
        PathBuf::from(format!("/music/{}.flac", id)),
    )
    .into_ref()
}

fn list(len: u64) -> Vec<TrackRef> {
    (1..=len).map(track).collect()
}

fn arbitrary_mode() -> impl Strategy<Value = PlaybackMode> {
    prop_oneof![
        Just(PlaybackMode::RepeatAll),
        Just(PlaybackMode::RepeatOne),
        Just(PlaybackMode::Shuffle),
    ]
}

#[derive(Debug, Clone)]
enum Op {
    Next(Advance),
    Previous,
    AddUpNext(Vec<u64>),
    Remove(u64),
    SetMode(PlaybackMode),
    SkipTo(u64),
}

// Ids 1..=30 may collide with the list, 100.. never do
fn arbitrary_id() -> impl Strategy<Value = u64> {
    prop_oneof![1u64..=30, 100u64..110]
}

fn arbitrary_op() -> impl Strategy<Value = Op> {
    prop_oneof![
        3 => prop_oneof![Just(Advance::User), Just(Advance::Auto)].prop_map(Op::Next),
        1 => Just(Op::Previous),
        2 => prop::collection::vec(arbitrary_id(), 1..4).prop_map(Op::AddUpNext),
        2 => arbitrary_id().prop_map(Op::Remove),
        1 => arbitrary_mode().prop_map(Op::SetMode),
        1 => arbitrary_id().prop_map(Op::SkipTo),
    ]
}

/// Apply `op` the way the engine does, committing whatever becomes current
fn apply(queue: &mut PlaybackQueue, op: &Op) {
    match op {
        Op::Next(advance) => {
            if let Some(entry) = queue.take_next(*advance) {
                queue.commit_advance(&entry);
            }
        }
        Op::Previous => {
            if let Some(entry) = queue.peek_previous() {
                queue.commit_advance(&entry);
            }
        }
        Op::AddUpNext(ids) => {
            let tracks: Vec<_> = ids.iter().copied().map(track).collect();
            queue.add_to_up_next(&tracks);
        }
        Op::Remove(id) => {
            queue.remove_track(TrackId::new(*id));
        }
        Op::SetMode(mode) => {
            queue.set_mode(*mode);
        }
        Op::SkipTo(id) => match queue.skip_to(TrackId::new(*id)) {
            Some(SkipTarget::UpNext) => {
                if let Some(entry) = queue.take_next(Advance::User) {
                    queue.commit_advance(&entry);
                }
            }
            Some(SkipTarget::Ordered(entry)) => queue.commit_advance(&entry),
            None => {}
        },
    }
}

fn check_invariants(queue: &PlaybackQueue) -> Result<(), TestCaseError> {
    let len = queue.original().len();
    prop_assert!(
        is_permutation(queue.order(), len),
        "order {:?} for {} tracks",
        queue.order(),
        len
    );

    match queue.current_position() {
        Some(position) => {
            prop_assert!(position.order_index() < len);
            prop_assert_eq!(
                queue.order()[position.order_index()],
                position.track_index()
            );
        }
        None => {
            prop_assert_eq!(len, 0);
        }
    }

    let mut seen = HashSet::new();
    for queued in queue.up_next() {
        prop_assert!(
            seen.insert(queued.id()),
            "duplicate {} in up next",
            queued.id()
        );
    }

    let listed = queue.ordered_playback_list(usize::MAX).len();
    let expected = if len == 0 || queue.is_detached() {
        len
    } else {
        len - 1
    };
    prop_assert_eq!(listed, expected);
    prop_assert!(queue.ordered_playback_list(3).len() <= 3);
    prop_assert!(queue.prepared().is_none());
    Ok(())
}

// ===== Property Tests =====

proptest! {
    /// Property: every generated order is a permutation
    #[test]
    fn generated_orders_are_permutations(len in 0usize..200, mode in arbitrary_mode()) {
        prop_assert!(is_permutation(&generate_order(len, mode), len));
    }

    /// Property: stepping back then forward returns to the same position
    #[test]
    fn index_steps_are_inverse(len in 1usize..500, seed in 0usize..500) {
        let index = seed % len;
        prop_assert_eq!(next_index(previous_index(index, len), len), index);
        prop_assert_eq!(previous_index(next_index(index, len), len), index);
        prop_assert!(next_index(index, len) < len);
    }

    /// Property: queue invariants hold across random operation sequences
    #[test]
    fn queue_invariants_hold(
        len in 1u64..20,
        mode in arbitrary_mode(),
        start in proptest::option::of(1u64..25),
        ops in prop::collection::vec(arbitrary_op(), 0..40)
    ) {
        let mut queue = PlaybackQueue::new(mode);
        let entry = queue.load(list(len), start.map(TrackId::new));
        prop_assert!(entry.is_some());
        check_invariants(&queue)?;

        for op in &ops {
            apply(&mut queue, op);
            check_invariants(&queue)?;
        }
    }

    /// Property: added tracks lead the up-next queue in the given order
    #[test]
    fn added_tracks_lead_up_next(
        existing in prop::collection::vec(100u64..140, 0..6),
        added in prop::collection::hash_set(100u64..140, 1..6)
    ) {
        let mut queue = PlaybackQueue::new(PlaybackMode::RepeatAll);
        queue.load(list(5), None);
        queue.add_to_up_next(&existing.iter().copied().map(track).collect::<Vec<_>>());

        let added: Vec<u64> = added.into_iter().collect();
        queue.add_to_up_next(&added.iter().copied().map(track).collect::<Vec<_>>());

        let up_next: Vec<u64> = queue.up_next().map(|t| t.id().get()).collect();
        prop_assert_eq!(&up_next[..added.len()], &added[..]);
    }

    /// Property: a mode change keeps the anchor on the same track and leaves up next alone
    #[test]
    fn mode_change_keeps_anchor_track(
        len in 1u64..30,
        start in 1u64..30,
        from in arbitrary_mode(),
        to in arbitrary_mode()
    ) {
        let mut queue = PlaybackQueue::new(from);
        queue.load(list(len), Some(TrackId::new(start)));
        queue.add_to_up_next(&[track(100), track(101)]);
        let anchor = queue.current_position().map(|p| p.track_index());

        queue.set_mode(to);

        prop_assert_eq!(queue.current_position().map(|p| p.track_index()), anchor);
        prop_assert_eq!(queue.up_next_len(), 2);
        prop_assert!(is_permutation(queue.order(), len as usize));
    }

    /// Property: fade gains always sum to one and the incoming gain never drops
    #[test]
    fn fade_gains_are_complementary(
        overlap_ms in 1u64..20_000,
        a_ms in 0u64..25_000,
        b_ms in 0u64..25_000
    ) {
        let overlap = Duration::from_millis(overlap_ms);
        let (early, late) = (a_ms.min(b_ms), a_ms.max(b_ms));
        let first = gains_at(Duration::from_millis(early), overlap);
        let second = gains_at(Duration::from_millis(late), overlap);

        prop_assert!((first.incoming + first.outgoing - 1.0).abs() < 1e-9);
        prop_assert!((0.0..=1.0).contains(&first.incoming));
        prop_assert!(second.incoming >= first.incoming);
    }

    /// Property: the ease curve is symmetric around its midpoint
    #[test]
    fn ease_is_symmetric(x in 0.0f64..=1.0) {
        prop_assert!((ease_in_out(x) + ease_in_out(1.0 - x) - 1.0).abs() < 1e-9);
    }
}
