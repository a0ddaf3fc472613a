//! Playback order generation
//!
//! A playback order is a permutation of `0..len` mapping play position to an
//! index in the original list. Sequential modes use the identity permutation,
//! shuffle uses a Fisher-Yates permutation.

use lyric_core::PlaybackMode;
use rand::seq::SliceRandom;
use rand::thread_rng;

/// Identity permutation `[0, 1, .., len)`
pub fn ascending_sequence(len: usize) -> Vec<usize> {
    (0..len).collect()
}

/// Uniformly random permutation of `0..len`
pub fn shuffled_sequence(len: usize) -> Vec<usize> {
    let mut order = ascending_sequence(len);
    order.shuffle(&mut thread_rng());
    order
}

/// Playback order for `mode`
pub fn generate_order(len: usize, mode: PlaybackMode) -> Vec<usize> {
    if mode.is_shuffle() {
        shuffled_sequence(len)
    } else {
        ascending_sequence(len)
    }
}

/// Position before `index`, wrapping to the end
///
/// Returns 0 for an empty collection.
#[inline]
pub fn previous_index(index: usize, len: usize) -> usize {
    if len == 0 {
        return 0;
    }
    (index % len + len - 1) % len
}

/// Position after `index`, wrapping to the start
///
/// Returns 0 for an empty collection.
#[inline]
pub fn next_index(index: usize, len: usize) -> usize {
    if len == 0 {
        return 0;
    }
    (index % len + 1) % len
}

/// Whether `order` is a permutation of `0..len`
pub fn is_permutation(order: &[usize], len: usize) -> bool {
    if order.len() != len {
        return false;
    }
    let mut seen = vec![false; len];
    for &value in order {
        if value >= len || seen[value] {
            return false;
        }
        seen[value] = true;
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ascending_is_identity() {
        assert_eq!(ascending_sequence(4), vec![0, 1, 2, 3]);
        assert!(ascending_sequence(0).is_empty());
    }

    #[test]
    fn shuffled_preserves_all_indices() {
        let order = shuffled_sequence(50);
        assert!(is_permutation(&order, 50));
    }

    #[test]
    fn shuffled_changes_order() {
        // Probability of identity for 20 elements is 1/20!, effectively zero
        let order = shuffled_sequence(20);
        assert_ne!(order, ascending_sequence(20));
    }

    #[test]
    fn shuffle_is_roughly_uniform_for_first_position() {
        let mut first_counts = [0usize; 4];
        for _ in 0..4000 {
            let order = shuffled_sequence(4);
            first_counts[order[0]] += 1;
        }

        // Expected 1000 each; a fair shuffle stays well inside this band
        for count in first_counts {
            assert!(
                (800..=1200).contains(&count),
                "first-position counts skewed: {:?}",
                first_counts
            );
        }
    }

    #[test]
    fn generate_order_follows_mode() {
        assert_eq!(
            generate_order(5, PlaybackMode::RepeatAll),
            ascending_sequence(5)
        );
        assert_eq!(
            generate_order(5, PlaybackMode::RepeatOne),
            ascending_sequence(5)
        );
        assert!(is_permutation(&generate_order(5, PlaybackMode::Shuffle), 5));
    }

    #[test]
    fn index_helpers_wrap() {
        assert_eq!(next_index(2, 3), 0);
        assert_eq!(previous_index(0, 3), 2);
        assert_eq!(next_index(0, 1), 0);
        assert_eq!(previous_index(0, 1), 0);
        assert_eq!(next_index(0, 0), 0);
        assert_eq!(previous_index(0, 0), 0);
    }

    #[test]
    fn is_permutation_detects_gaps_and_duplicates() {
        assert!(is_permutation(&[2, 0, 1], 3));
        assert!(!is_permutation(&[0, 0, 1], 3));
        assert!(!is_permutation(&[0, 1, 3], 3));
        assert!(!is_permutation(&[0, 1], 3));
    }
}
