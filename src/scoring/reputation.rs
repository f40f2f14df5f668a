//! Per-user reputation values: the vote-count weight, level progression and
//! the quorum-based accuracy ratio.

use std::ops::RangeInclusive;

use super::community::VoteTally;

/// Votes an article needs before its majority is trusted for accuracy checks.
pub const QUORUM: u32 = 5;
pub const POINTS_PER_LEVEL: u32 = 100;

/// `0.5 + min(votes * 0.05, 0.5)`: reaches 1.0 at 10 votes.
pub fn reputation_weight(vote_count: u32) -> f64 {
    0.5 + (f64::from(vote_count) * 0.05).min(0.5)
}

pub fn level_for_points(points: u32) -> u32 {
    (points / POINTS_PER_LEVEL + 1).max(1)
}

/// Points still needed for the next level.
pub fn points_to_next_level(points: u32) -> u32 {
    level_for_points(points) * POINTS_PER_LEVEL - points
}

/// Levels newly reached when moving from `old` to `new` (empty if none).
pub fn levels_crossed(old: u32, new: u32) -> RangeInclusive<u32> {
    (old + 1)..=new
}

/// `+1` when positives strictly outnumber negatives, otherwise `-1`.
pub fn majority_sign(tally: &VoteTally) -> i32 {
    if tally.positive > tally.negative {
        1
    } else {
        -1
    }
}

/// Fraction of a user's votes that agree with a quorate majority.
///
/// Each item pairs the user's vote with the current tally of the voted article.
/// Articles below quorum are left out of both numerator and denominator.
/// Returns `None` when no vote was eligible, so callers keep the previous value.
pub fn reputation_accuracy<I>(history: I) -> Option<f64>
where
    I: IntoIterator<Item = (i32, VoteTally)>,
{
    let mut considered = 0u32;
    let mut accurate = 0u32;
    for (vote, tally) in history {
        if tally.total < QUORUM {
            continue;
        }
        considered += 1;
        if vote == majority_sign(&tally) {
            accurate += 1;
        }
    }
    (considered > 0).then(|| f64::from(accurate) / f64::from(considered))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn level_progression() {
        assert_eq!(level_for_points(0), 1);
        assert_eq!(level_for_points(99), 1);
        assert_eq!(level_for_points(100), 2);
        assert_eq!(level_for_points(250), 3);
        assert_eq!(points_to_next_level(90), 10);
        assert_eq!(points_to_next_level(100), 100);
    }

    #[test]
    fn crossing_ranges() {
        assert_eq!(levels_crossed(1, 1).count(), 0);
        assert_eq!(levels_crossed(1, 3).collect::<Vec<_>>(), vec![2, 3]);
    }

    #[test]
    fn tie_counts_as_negative_majority() {
        assert_eq!(majority_sign(&VoteTally::new(3, 3)), -1);
        assert_eq!(majority_sign(&VoteTally::new(4, 3)), 1);
    }
}
