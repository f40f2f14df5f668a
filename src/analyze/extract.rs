//! Best-effort structured extraction from free-form generative output.
//!
//! Models are asked for `{score, label, explanation, main_topic}` JSON but
//! regularly wrap it in prose or markdown, truncate it, or skip JSON entirely.
//! `ExtractionChain` tries each strategy in order and stops at the first hit;
//! if none matches, the neutral score is returned. `run` never fails.

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;

use crate::scoring::signal::{ai_label, ConfidenceThresholds, TrustLabel, TrustScore, NEUTRAL_SCORE};

/// Fields a generative judgment may carry. At least one of `score`/`label` is set.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Judgment {
    pub score: Option<f64>,
    pub label: Option<TrustLabel>,
    pub explanation: Option<String>,
    pub main_topic: Option<String>,
}

impl Judgment {
    fn is_usable(&self) -> bool {
        self.score.is_some() || self.label.is_some()
    }
}

/// Normalized outcome of the chain.
#[derive(Debug, Clone, PartialEq)]
pub struct Extraction {
    pub trust: TrustScore,
    pub explanation: String,
    pub main_topic: Option<String>,
    /// Name of the strategy that matched, or `"fallback"`.
    pub stage: &'static str,
}

pub trait ExtractStrategy: Send + Sync {
    fn name(&self) -> &'static str;
    fn extract(&self, raw: &str) -> Option<Judgment>;
}

pub struct ExtractionChain {
    stages: Vec<Box<dyn ExtractStrategy>>,
}

impl Default for ExtractionChain {
    fn default() -> Self {
        Self::standard()
    }
}

impl ExtractionChain {
    /// direct JSON → fenced JSON → brace slice → field regex → keywords.
    pub fn standard() -> Self {
        Self {
            stages: vec![
                Box::new(DirectJson),
                Box::new(FencedJson),
                Box::new(BraceSlice),
                Box::new(FieldRegex),
                Box::new(KeywordSentiment),
            ],
        }
    }

    pub fn with_stages(stages: Vec<Box<dyn ExtractStrategy>>) -> Self {
        Self { stages }
    }

    pub fn run(&self, raw: &str, thresholds: &ConfidenceThresholds) -> Extraction {
        for stage in &self.stages {
            if let Some(j) = stage.extract(raw).filter(Judgment::is_usable) {
                return normalize(j, stage.name(), thresholds);
            }
        }
        Extraction {
            trust: TrustScore::neutral(),
            explanation: "Unable to interpret model output".to_string(),
            main_topic: None,
            stage: "fallback",
        }
    }
}

/// Turn a judgment into a trust score. A numeric score wins over the label;
/// the tier treats distance from 0.5 like a classifier's confidence.
pub fn normalize(j: Judgment, stage: &'static str, thresholds: &ConfidenceThresholds) -> Extraction {
    let raw = match (j.score, j.label) {
        (Some(s), _) => s.clamp(0.0, 1.0),
        (None, Some(TrustLabel::Green)) => 0.8,
        (None, Some(TrustLabel::Red)) => 0.2,
        (None, _) => NEUTRAL_SCORE,
    };
    let label = match (j.score, j.label) {
        (None, Some(l)) => l,
        _ => ai_label(raw),
    };
    let equivalent_confidence = raw.max(1.0 - raw);

    Extraction {
        trust: TrustScore {
            score: crate::scoring::signal::round2(raw),
            label,
            confidence_tier: thresholds.tier(equivalent_confidence),
        },
        explanation: j.explanation.unwrap_or_default().trim().to_string(),
        main_topic: j.main_topic.filter(|t| !t.trim().is_empty()),
        stage,
    }
}

// ------------------------------------------------------------
// Strategies
// ------------------------------------------------------------

pub struct DirectJson;

impl ExtractStrategy for DirectJson {
    fn name(&self) -> &'static str {
        "direct_json"
    }
    fn extract(&self, raw: &str) -> Option<Judgment> {
        parse_json_judgment(raw.trim())
    }
}

static FENCE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)```[A-Za-z]*\s*(.*?)```").expect("fence regex"));

pub struct FencedJson;

impl ExtractStrategy for FencedJson {
    fn name(&self) -> &'static str {
        "fenced_json"
    }
    fn extract(&self, raw: &str) -> Option<Judgment> {
        FENCE_RE
            .captures_iter(raw)
            .filter_map(|c| c.get(1))
            .find_map(|m| parse_json_judgment(m.as_str().trim()))
    }
}

pub struct BraceSlice;

impl ExtractStrategy for BraceSlice {
    fn name(&self) -> &'static str {
        "brace_slice"
    }
    fn extract(&self, raw: &str) -> Option<Judgment> {
        let start = raw.find('{')?;
        let end = raw.rfind('}')?;
        if end <= start {
            return None;
        }
        parse_json_judgment(&raw[start..=end])
    }
}

static SCORE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?i)"?score"?\s*[:=]\s*"?(\d+(?:\.\d+)?)"#).expect("score regex")
});
static LABEL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?i)"?label"?\s*[:=]\s*"?(green|yellow|red)\b"#).expect("label regex")
});
static EXPLANATION_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?is)"?explanation"?\s*[:=]\s*"((?:[^"\\]|\\.)*)"#).expect("explanation regex")
});
static TOPIC_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?i)"?main_topic"?\s*[:=]\s*"((?:[^"\\]|\\.)*)"#).expect("topic regex")
});

/// Picks individual fields out of broken JSON or `key: value` prose.
pub struct FieldRegex;

impl ExtractStrategy for FieldRegex {
    fn name(&self) -> &'static str {
        "field_regex"
    }
    fn extract(&self, raw: &str) -> Option<Judgment> {
        let score = SCORE_RE
            .captures(raw)
            .and_then(|c| c[1].parse::<f64>().ok())
            .and_then(normalize_score_value);
        let label = LABEL_RE
            .captures(raw)
            .and_then(|c| TrustLabel::parse_loose(&c[1]));
        let explanation = EXPLANATION_RE.captures(raw).map(|c| unescape(&c[1]));
        let main_topic = TOPIC_RE.captures(raw).map(|c| unescape(&c[1]));
        Some(Judgment {
            score,
            label,
            explanation,
            main_topic,
        })
    }
}

const POSITIVE_WORDS: &[&str] = &[
    "reliable", "credible", "accurate", "true", "verified", "trustworthy", "factual", "legitimate",
    "sourced", "consistent",
];
const NEGATIVE_WORDS: &[&str] = &[
    "fake", "false", "misleading", "unreliable", "disinformation", "misinformation", "fabricated",
    "unverified", "hoax", "sensational", "unsourced", "dubious",
];

/// Last resort for pure prose: weigh credibility vocabulary.
/// Negated positives ("not reliable") count as negative.
pub struct KeywordSentiment;

impl ExtractStrategy for KeywordSentiment {
    fn name(&self) -> &'static str {
        "keyword_sentiment"
    }
    fn extract(&self, raw: &str) -> Option<Judgment> {
        let tokens: Vec<String> = raw
            .split(|c: char| !c.is_alphanumeric())
            .filter(|t| !t.is_empty())
            .map(|t| t.to_ascii_lowercase())
            .collect();

        let (mut pos, mut neg) = (0i32, 0i32);
        for (i, tok) in tokens.iter().enumerate() {
            let negated = i > 0 && matches!(tokens[i - 1].as_str(), "not" | "no" | "never" | "hardly");
            if POSITIVE_WORDS.contains(&tok.as_str()) {
                if negated {
                    neg += 1;
                } else {
                    pos += 1;
                }
            } else if NEGATIVE_WORDS.contains(&tok.as_str()) {
                if negated {
                    pos += 1;
                } else {
                    neg += 1;
                }
            }
        }
        if pos + neg == 0 {
            return None;
        }

        let balance = f64::from(pos - neg) / f64::from(pos + neg);
        Some(Judgment {
            score: Some(NEUTRAL_SCORE + 0.3 * balance),
            label: None,
            explanation: Some(truncate_chars(raw.trim(), 600)),
            main_topic: None,
        })
    }
}

// ------------------------------------------------------------
// Helpers
// ------------------------------------------------------------

fn parse_json_judgment(s: &str) -> Option<Judgment> {
    let v: Value = serde_json::from_str(s).ok()?;
    judgment_from_value(&v)
}

fn judgment_from_value(v: &Value) -> Option<Judgment> {
    let obj = v.as_object()?;
    let score = obj
        .get("score")
        .and_then(|s| match s {
            Value::Number(n) => n.as_f64(),
            Value::String(t) => t.trim().parse::<f64>().ok(),
            _ => None,
        })
        .and_then(normalize_score_value);
    let label = obj
        .get("label")
        .and_then(Value::as_str)
        .and_then(TrustLabel::parse_loose);
    let text = |key: &str| obj.get(key).and_then(Value::as_str).map(str::to_string);

    let j = Judgment {
        score,
        label,
        explanation: text("explanation"),
        main_topic: text("main_topic"),
    };
    j.is_usable().then_some(j)
}

/// Accepts `0..=1` directly and `1..=100` as a percentage.
fn normalize_score_value(x: f64) -> Option<f64> {
    if !x.is_finite() || x < 0.0 {
        None
    } else if x <= 1.0 {
        Some(x)
    } else if x <= 100.0 {
        Some(x / 100.0)
    } else {
        None
    }
}

fn unescape(s: &str) -> String {
    serde_json::from_str::<String>(&format!("\"{s}\"")).unwrap_or_else(|_| s.to_string())
}

fn truncate_chars(s: &str, max: usize) -> String {
    s.chars().take(max).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalized_label_uses_unrounded_score() {
        let t = ConfidenceThresholds::default();
        let judged = |score| Judgment {
            score: Some(score),
            ..Judgment::default()
        };

        let out = normalize(judged(0.7451), "direct_json", &t);
        assert_eq!(out.trust.score, 0.75);
        assert_eq!(out.trust.label, TrustLabel::Yellow);

        let out = normalize(judged(0.3999), "direct_json", &t);
        assert_eq!(out.trust.score, 0.4);
        assert_eq!(out.trust.label, TrustLabel::Red);
    }

    #[test]
    fn percent_scores_are_scaled() {
        assert_eq!(normalize_score_value(85.0), Some(0.85));
        assert_eq!(normalize_score_value(0.3), Some(0.3));
        assert_eq!(normalize_score_value(250.0), None);
        assert_eq!(normalize_score_value(-0.1), None);
    }

    #[test]
    fn label_only_keeps_label() {
        let j = Judgment {
            label: Some(TrustLabel::Red),
            ..Default::default()
        };
        let out = normalize(j, "t", &ConfidenceThresholds::default());
        assert_eq!(out.trust.label, TrustLabel::Red);
        assert_eq!(out.trust.score, 0.2);
    }

    #[test]
    fn numeric_score_overrides_conflicting_label() {
        let j = Judgment {
            score: Some(0.9),
            label: Some(TrustLabel::Red),
            ..Default::default()
        };
        let out = normalize(j, "t", &ConfidenceThresholds::default());
        assert_eq!(out.trust.label, TrustLabel::Green);
    }

    #[test]
    fn unescape_handles_quotes() {
        assert_eq!(unescape(r#"says \"hi\""#), r#"says "hi""#);
    }
}
