//! AI + community blend.
//!
//! Weights step up towards the community as votes accumulate. The combined
//! label uses a lower Green bar (0.7) than the AI-only label (0.75).

use serde::{Deserialize, Serialize};

use super::signal::{round2, TrustLabel};

pub const COMBINED_GREEN_MIN: f64 = 0.7;
pub const COMBINED_YELLOW_MIN: f64 = 0.4;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BlendWeights {
    pub ai: f64,
    pub community: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CombinedResult {
    pub combined_score: f64,
    pub combined_label: TrustLabel,
    pub weights: BlendWeights,
    pub vote_count: u32,
}

/// Step function of the vote count: 0 | 1–4 | 5–19 | 20+.
pub fn weights_for(vote_count: u32) -> BlendWeights {
    let (ai, community) = match vote_count {
        0 => (1.0, 0.0),
        1..=4 => (0.7, 0.3),
        5..=19 => (0.5, 0.5),
        _ => (0.3, 0.7),
    };
    BlendWeights { ai, community }
}

pub fn combined_label(score: f64) -> TrustLabel {
    if score >= COMBINED_GREEN_MIN {
        TrustLabel::Green
    } else if score >= COMBINED_YELLOW_MIN {
        TrustLabel::Yellow
    } else {
        TrustLabel::Red
    }
}

/// Blend both scores. The label is taken from the unrounded value; the score is reported to 2 decimals.
pub fn combine(ai_score: f64, community_score: f64, vote_count: u32) -> CombinedResult {
    let weights = weights_for(vote_count);
    let raw = (ai_score * weights.ai + community_score * weights.community).clamp(0.0, 1.0);
    CombinedResult {
        combined_score: round2(raw),
        combined_label: combined_label(raw),
        weights,
        vote_count,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn weights_always_sum_to_one() {
        for n in [0, 1, 3, 4, 5, 12, 19, 20, 500] {
            let w = weights_for(n);
            assert!((w.ai + w.community - 1.0).abs() < 1e-12, "n={n}");
        }
    }

    #[test]
    fn no_votes_is_pure_ai() {
        let r = combine(0.82, 0.5, 0);
        assert_eq!(r.combined_score, 0.82);
        assert_eq!(r.combined_label, TrustLabel::Green);
    }

    #[test]
    fn combined_green_bar_is_lower_than_ai_bar() {
        // 0.72 would be Yellow as an AI-only score.
        assert_eq!(combined_label(0.72), TrustLabel::Green);
        assert_eq!(combined_label(0.69), TrustLabel::Yellow);
        assert_eq!(combined_label(0.39), TrustLabel::Red);
    }
}
