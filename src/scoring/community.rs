use serde::{Deserialize, Serialize};

use super::signal::NEUTRAL_SCORE;

/// Vote counts for one article, rebuilt from the full vote log on every read.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoteTally {
    pub positive: u32,
    pub negative: u32,
    pub total: u32,
}

impl VoteTally {
    pub fn new(positive: u32, negative: u32) -> Self {
        Self {
            positive,
            negative,
            total: positive + negative,
        }
    }

    /// Count `+1` and `-1` votes; anything else is ignored.
    pub fn from_votes<I: IntoIterator<Item = i32>>(votes: I) -> Self {
        let (mut pos, mut neg) = (0u32, 0u32);
        for v in votes {
            match v {
                1 => pos += 1,
                -1 => neg += 1,
                _ => {}
            }
        }
        Self::new(pos, neg)
    }
}

/// Share of positive votes, or the neutral prior when nobody voted.
pub fn community_score(tally: &VoteTally) -> f64 {
    if tally.total == 0 {
        return NEUTRAL_SCORE;
    }
    f64::from(tally.positive) / f64::from(tally.total)
}
