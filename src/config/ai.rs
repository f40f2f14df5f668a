// src/config/ai.rs
use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::{fs, path::Path};
use tracing::{info, warn};

use crate::scoring::signal::ConfidenceThresholds;

pub const DEFAULT_AI_CONFIG_PATH: &str = "config/ai.json";
pub const ENV_AI_CONFIG_PATH: &str = "AI_CONFIG_PATH";
/// `AI_TEST_MODE=mock` swaps every provider for deterministic offline ones.
pub const ENV_AI_TEST_MODE: &str = "AI_TEST_MODE";

fn default_true() -> bool {
    true
}
fn default_daily_limit() -> u32 {
    200
}
fn default_high() -> f64 {
    ConfidenceThresholds::default().high
}
fn default_medium() -> f64 {
    ConfidenceThresholds::default().medium
}
fn default_cache_dir() -> String {
    "cache/ai".to_string()
}

/// Which model produces the trust score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScorerKind {
    /// Hugging Face text-classification (REAL/FAKE + confidence).
    #[default]
    Classifier,
    /// Generative model asked for a JSON verdict.
    Generative,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GeneratorKind {
    Gemini,
    #[serde(alias = "open_ai")]
    Openai,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AiConfig {
    pub enabled: bool,
    #[serde(default)]
    pub scorer: ScorerKind,
    /// Text generator for explanations (and for the generative scorer).
    #[serde(default)]
    pub generator: Option<GeneratorKind>,
    #[serde(default)]
    pub classifier_model: Option<String>,
    #[serde(default)]
    pub classifier_endpoint: Option<String>,
    #[serde(default)]
    pub generator_model: Option<String>,
    /// Ask the generator for an explanation of classifier results.
    #[serde(default = "default_true")]
    pub explain: bool,
    /// Real generator calls per day; cache hits are free.
    #[serde(default = "default_daily_limit")]
    pub daily_limit: u32,
    #[serde(default = "default_high")]
    pub confidence_high: f64,
    #[serde(default = "default_medium")]
    pub confidence_medium: f64,
    #[serde(default = "default_cache_dir")]
    pub cache_dir: String,
}

impl Default for AiConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            scorer: ScorerKind::default(),
            generator: None,
            classifier_model: None,
            classifier_endpoint: None,
            generator_model: None,
            explain: true,
            daily_limit: default_daily_limit(),
            confidence_high: default_high(),
            confidence_medium: default_medium(),
            cache_dir: default_cache_dir(),
        }
    }
}

impl AiConfig {
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let data = fs::read_to_string(path)
            .with_context(|| format!("reading AI config from {}", path.display()))?;
        let mut cfg: AiConfig = serde_json::from_str(&data)
            .with_context(|| format!("parsing AI config {}", path.display()))?;

        let t = cfg.thresholds();
        cfg.confidence_high = t.high;
        cfg.confidence_medium = t.medium;

        if cfg.scorer == ScorerKind::Generative && cfg.generator.is_none() {
            anyhow::bail!("scorer=generative requires a `generator` (gemini | openai)");
        }
        Ok(cfg)
    }

    /// Like `load_from_file`, but a missing or broken file means "AI disabled".
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Self {
        match Self::load_from_file(&path) {
            Ok(cfg) => {
                info!(
                    enabled = cfg.enabled,
                    scorer = ?cfg.scorer,
                    generator = ?cfg.generator,
                    "AI config loaded"
                );
                cfg
            }
            Err(e) => {
                warn!(error = %e, "AI config unavailable, AI disabled");
                Self::default()
            }
        }
    }

    pub fn thresholds(&self) -> ConfidenceThresholds {
        ConfidenceThresholds {
            high: self.confidence_high,
            medium: self.confidence_medium,
        }
        .sanitized()
    }

    pub fn test_mode() -> bool {
        std::env::var(ENV_AI_TEST_MODE).is_ok_and(|v| v == "mock")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn minimal_file_gets_defaults_and_sanitized_band() {
        let dir = tempfile::tempdir().unwrap();
        let p = dir.path().join("ai.json");
        fs::write(
            &p,
            r#"{"enabled":true,"confidence_high":0.6,"confidence_medium":0.9}"#,
        )
        .unwrap();

        let cfg = AiConfig::load_from_file(&p).unwrap();
        assert_eq!(cfg.scorer, ScorerKind::Classifier);
        assert_eq!(cfg.daily_limit, 200);
        assert_eq!((cfg.confidence_high, cfg.confidence_medium), (0.9, 0.6));
    }

    #[test]
    fn generative_without_generator_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let p = dir.path().join("ai.json");
        fs::write(&p, r#"{"enabled":true,"scorer":"generative"}"#).unwrap();
        assert!(AiConfig::load_from_file(&p).is_err());
    }

    #[test]
    fn missing_file_means_disabled() {
        let cfg = AiConfig::load_or_default("/definitely/not/here/ai.json");
        assert!(!cfg.enabled);
    }
}
