//! Raw model signal → normalized trust score.
//!
//! A classifier reports the class it predicted plus its certainty in *that*
//! class. The certainty is not a probability of truthfulness, so the FAKE
//! branch mirrors the REAL branch around 0.5.

use serde::{Deserialize, Serialize};

/// Minimum trimmed length (in chars) before any model is consulted.
pub const MIN_TEXT_CHARS: usize = 10;

/// AI-only label cut-offs.
pub const AI_GREEN_MIN: f64 = 0.75;
pub const AI_YELLOW_MIN: f64 = 0.4;

pub const NEUTRAL_SCORE: f64 = 0.5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum PredictedClass {
    Real,
    Fake,
}

/// What a classifier hands back for one request.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RawModelSignal {
    pub predicted_class: PredictedClass,
    pub confidence: f64,
}

impl RawModelSignal {
    pub fn real(confidence: f64) -> Self {
        Self {
            predicted_class: PredictedClass::Real,
            confidence,
        }
    }

    pub fn fake(confidence: f64) -> Self {
        Self {
            predicted_class: PredictedClass::Fake,
            confidence,
        }
    }
}

/// Three-tier traffic light shared by AI and combined scores.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TrustLabel {
    Green,
    Yellow,
    Red,
}

impl TrustLabel {
    pub fn as_str(&self) -> &'static str {
        match self {
            TrustLabel::Green => "Green",
            TrustLabel::Yellow => "Yellow",
            TrustLabel::Red => "Red",
        }
    }

    /// Case-insensitive parse; also accepts a few colloquial synonyms models like to emit.
    pub fn parse_loose(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "green" | "reliable" | "credible" => Some(TrustLabel::Green),
            "yellow" | "uncertain" | "mixed" => Some(TrustLabel::Yellow),
            "red" | "fake" | "unreliable" => Some(TrustLabel::Red),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConfidenceTier {
    Low,
    Medium,
    High,
}

/// Cut-offs for the confidence tier. Loaded from `config/ai.json`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ConfidenceThresholds {
    pub high: f64,
    pub medium: f64,
}

impl Default for ConfidenceThresholds {
    fn default() -> Self {
        Self {
            high: 0.80,
            medium: 0.65,
        }
    }
}

impl ConfidenceThresholds {
    /// Out-of-range values fall back to defaults; an inverted pair is swapped.
    pub fn sanitized(mut self) -> Self {
        let d = Self::default();
        if !(0.0..=1.0).contains(&self.high) {
            self.high = d.high;
        }
        if !(0.0..=1.0).contains(&self.medium) {
            self.medium = d.medium;
        }
        if self.medium > self.high {
            std::mem::swap(&mut self.medium, &mut self.high);
        }
        self
    }

    pub fn tier(&self, confidence: f64) -> ConfidenceTier {
        if confidence >= self.high {
            ConfidenceTier::High
        } else if confidence >= self.medium {
            ConfidenceTier::Medium
        } else {
            ConfidenceTier::Low
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TrustScore {
    pub score: f64,
    pub label: TrustLabel,
    #[serde(rename = "confidence")]
    pub confidence_tier: ConfidenceTier,
}

impl TrustScore {
    /// `{0.5, Yellow, low}`: returned whenever there is nothing trustworthy to interpret.
    pub fn neutral() -> Self {
        Self {
            score: NEUTRAL_SCORE,
            label: TrustLabel::Yellow,
            confidence_tier: ConfidenceTier::Low,
        }
    }
}

/// True when the text is too short to be worth a model call.
pub fn is_too_short(text: &str) -> bool {
    text.trim().chars().count() < MIN_TEXT_CHARS
}

/// Map a signal to `[0,1]` where 1 means "real". Unrounded.
pub fn signal_score(signal: &RawModelSignal) -> f64 {
    let offset = signal.confidence - 0.5;
    let raw = match signal.predicted_class {
        PredictedClass::Real => NEUTRAL_SCORE + offset,
        PredictedClass::Fake => NEUTRAL_SCORE - offset,
    };
    raw.clamp(0.0, 1.0)
}

pub fn ai_label(score: f64) -> TrustLabel {
    if score >= AI_GREEN_MIN {
        TrustLabel::Green
    } else if score >= AI_YELLOW_MIN {
        TrustLabel::Yellow
    } else {
        TrustLabel::Red
    }
}

/// Interpret a classifier signal. `None` or a non-finite confidence yields the neutral score.
pub fn interpret_signal(
    signal: Option<&RawModelSignal>,
    thresholds: &ConfidenceThresholds,
) -> TrustScore {
    let Some(signal) = signal.filter(|s| s.confidence.is_finite()) else {
        return TrustScore::neutral();
    };

    let raw = signal_score(signal);
    TrustScore {
        score: round2(raw),
        label: ai_label(raw),
        confidence_tier: thresholds.tier(signal.confidence),
    }
}

#[inline]
pub(crate) fn round2(x: f64) -> f64 {
    (x * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_text_is_measured_after_trim() {
        assert!(is_too_short("   short   "));
        assert!(is_too_short(""));
        assert!(!is_too_short("exactly10!"));
        // multi-byte chars count once each
        assert!(!is_too_short("éééééééééé"));
    }

    #[test]
    fn non_finite_confidence_is_neutral() {
        let t = ConfidenceThresholds::default();
        let s = RawModelSignal::real(f64::NAN);
        assert_eq!(interpret_signal(Some(&s), &t), TrustScore::neutral());
        assert_eq!(interpret_signal(None, &t), TrustScore::neutral());
    }

    #[test]
    fn tiers_follow_configured_pair() {
        let t = ConfidenceThresholds::default();
        assert_eq!(t.tier(0.80), ConfidenceTier::High);
        assert_eq!(t.tier(0.79), ConfidenceTier::Medium);
        assert_eq!(t.tier(0.65), ConfidenceTier::Medium);
        assert_eq!(t.tier(0.64), ConfidenceTier::Low);

        let strict = ConfidenceThresholds {
            high: 0.85,
            medium: 0.65,
        };
        assert_eq!(strict.tier(0.82), ConfidenceTier::Medium);
    }

    #[test]
    fn sanitize_swaps_and_defaults() {
        let t = ConfidenceThresholds {
            high: 0.6,
            medium: 0.9,
        }
        .sanitized();
        assert_eq!((t.high, t.medium), (0.9, 0.6));

        let t = ConfidenceThresholds {
            high: 3.0,
            medium: -1.0,
        }
        .sanitized();
        assert_eq!(t, ConfidenceThresholds::default());
    }

    #[test]
    fn label_uses_unrounded_score() {
        let t = ConfidenceThresholds::default();

        let s = interpret_signal(Some(&RawModelSignal::fake(0.6001)), &t);
        assert_eq!(s.score, 0.4);
        assert_eq!(s.label, TrustLabel::Red);

        let s = interpret_signal(Some(&RawModelSignal::real(0.7451)), &t);
        assert_eq!(s.score, 0.75);
        assert_eq!(s.label, TrustLabel::Yellow);

        let s = interpret_signal(Some(&RawModelSignal::real(0.75)), &t);
        assert_eq!(s.label, TrustLabel::Green);
        let s = interpret_signal(Some(&RawModelSignal::fake(0.6)), &t);
        assert_eq!(s.label, TrustLabel::Yellow);
    }

    #[test]
    fn loose_label_parse() {
        assert_eq!(TrustLabel::parse_loose(" GREEN "), Some(TrustLabel::Green));
        assert_eq!(TrustLabel::parse_loose("red"), Some(TrustLabel::Red));
        assert_eq!(TrustLabel::parse_loose("purple"), None);
    }
}
