// src/analyze/mod.rs
//! Analysis pipeline entry: short-text gate → model inference → trust score →
//! optional explanation. `Analyzer::analyze_text` never fails; every error
//! path ends in the neutral score.

pub mod ai_adapter;
pub mod extract;
pub mod model;

use std::path::PathBuf;
use std::sync::Arc;

use metrics::counter;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::config::ai::{AiConfig, GeneratorKind, ScorerKind};
use crate::scoring::signal::{
    interpret_signal, is_too_short, ConfidenceThresholds, PredictedClass, RawModelSignal,
    TrustLabel, TrustScore,
};
use ai_adapter::{CachingGenerator, DynGenerator, GeminiProvider, MockGenerator, OpenAiProvider};
use extract::ExtractionChain;
use model::{
    DynModelClient, FixedSignalModel, GenerativeJudge, HuggingFaceClassifier, ModelOutput,
    UnavailableModel,
};

pub const SHORT_TEXT_EXPLANATION: &str = "Text too short for reliable analysis";
pub const EMPTY_OUTPUT_EXPLANATION: &str = "Analysis error";
pub const MODEL_ERROR_EXPLANATION: &str = "Error during AI analysis";

/// Provenance of an AI score.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ModelDetails {
    pub provider: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prediction: Option<PredictedClass>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model_confidence: Option<f64>,
    /// Extraction stage that produced a generative verdict.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub extraction: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Analysis {
    #[serde(flatten)]
    pub trust: TrustScore,
    pub explanation: String,
    /// `false` when the model boundary failed and the neutral score was substituted.
    pub api_available: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub main_topic: Option<String>,
    pub model_details: Option<ModelDetails>,
}

impl Analysis {
    fn neutral(explanation: &str, api_available: bool) -> Self {
        Self {
            trust: TrustScore::neutral(),
            explanation: explanation.to_string(),
            api_available,
            main_topic: None,
            model_details: None,
        }
    }
}

/// Produces the human-readable "why" for a classifier verdict.
pub struct Explainer {
    generator: DynGenerator,
}

impl Explainer {
    pub fn new(generator: DynGenerator) -> Self {
        Self { generator }
    }

    pub fn prompt(text: &str, label: TrustLabel) -> String {
        let ask = match label {
            TrustLabel::Green => "explain why it appears to be reliable information. Identify elements that reinforce its credibility (sources, structure, coherence).",
            TrustLabel::Red => "explain why it could be disinformation. Identify warning signs (unsourced claims, emotional language, inconsistencies).",
            TrustLabel::Yellow => "explain why its authenticity is difficult to determine. Identify ambiguous elements that need additional verification.",
        };
        format!("Analyze this text and {ask}\n\nText: \"{text}\"\n\nAnswer in 2-3 sentences.")
    }

    /// Empty string when the generator has nothing to say.
    pub async fn explain(&self, text: &str, label: TrustLabel) -> String {
        self.generator
            .generate(&Self::prompt(text, label))
            .await
            .unwrap_or_default()
    }
}

pub struct Analyzer {
    model: DynModelClient,
    explainer: Option<Explainer>,
    chain: ExtractionChain,
    thresholds: ConfidenceThresholds,
}

impl Analyzer {
    pub fn new(model: DynModelClient, thresholds: ConfidenceThresholds) -> Self {
        Self {
            model,
            explainer: None,
            chain: ExtractionChain::standard(),
            thresholds: thresholds.sanitized(),
        }
    }

    pub fn with_explainer(mut self, generator: DynGenerator) -> Self {
        self.explainer = Some(Explainer::new(generator));
        self
    }

    /// Wire providers according to config.
    ///
    /// * `AI_TEST_MODE=mock`: fixed REAL/0.9 classifier and a mock explainer.
    /// * `enabled=false`: unavailable model, so every analysis is neutral.
    /// * otherwise: Hugging Face classifier or generative judge, generators cached.
    pub fn from_config(cfg: &AiConfig) -> Self {
        let thresholds = cfg.thresholds();

        if AiConfig::test_mode() {
            let analyzer = Self::new(
                Arc::new(FixedSignalModel::new(RawModelSignal::real(0.9))),
                thresholds,
            );
            return if cfg.explain {
                analyzer.with_explainer(Arc::new(MockGenerator::new("Mock explanation.")))
            } else {
                analyzer
            };
        }

        if !cfg.enabled {
            return Self::new(Arc::new(UnavailableModel), thresholds);
        }

        let generator = cfg
            .generator
            .map(|kind| build_generator(kind, cfg));

        let model: DynModelClient = match (cfg.scorer, &generator) {
            (ScorerKind::Classifier, _) => Arc::new(HuggingFaceClassifier::new(
                cfg.classifier_endpoint.as_deref(),
                cfg.classifier_model.as_deref(),
            )),
            (ScorerKind::Generative, Some(g)) => Arc::new(GenerativeJudge::new(g.clone())),
            (ScorerKind::Generative, None) => Arc::new(UnavailableModel),
        };

        let mut analyzer = Self::new(model, thresholds);
        if cfg.explain && cfg.scorer == ScorerKind::Classifier {
            if let Some(g) = generator {
                analyzer = analyzer.with_explainer(g);
            }
        }
        analyzer
    }

    pub fn provider_name(&self) -> &'static str {
        self.model.provider_name()
    }

    pub fn thresholds(&self) -> ConfidenceThresholds {
        self.thresholds
    }

    pub async fn analyze_text(&self, text: &str) -> Analysis {
        if is_too_short(text) {
            counter!("factflow_analyses_total", "outcome" => "short_text").increment(1);
            return Analysis::neutral(SHORT_TEXT_EXPLANATION, true);
        }

        let output = match self.model.infer(text).await {
            Ok(out) => out,
            Err(e) => {
                warn!(provider = self.provider_name(), error = %e, "model call failed, using neutral score");
                counter!("factflow_analyses_total", "outcome" => "model_error").increment(1);
                return Analysis::neutral(MODEL_ERROR_EXPLANATION, false);
            }
        };

        let (analysis, outcome) = match output {
            ModelOutput::Classifier(None) => {
                (Analysis::neutral(EMPTY_OUTPUT_EXPLANATION, true), "no_output")
            }
            ModelOutput::Classifier(Some(signal)) => (self.from_signal(text, signal).await, "scored"),
            ModelOutput::Generative(raw) => (self.from_generative(&raw), "scored"),
        };

        counter!("factflow_analyses_total", "outcome" => outcome).increment(1);
        debug!(
            provider = self.provider_name(),
            score = analysis.trust.score,
            label = analysis.trust.label.as_str(),
            "text analyzed"
        );
        analysis
    }

    async fn from_signal(&self, text: &str, signal: RawModelSignal) -> Analysis {
        let trust = interpret_signal(Some(&signal), &self.thresholds);
        let explanation = match &self.explainer {
            Some(ex) => ex.explain(text, trust.label).await,
            None => String::new(),
        };
        Analysis {
            trust,
            explanation,
            api_available: true,
            main_topic: None,
            model_details: Some(ModelDetails {
                provider: self.provider_name().to_string(),
                prediction: Some(signal.predicted_class),
                model_confidence: Some((signal.confidence * 1000.0).round() / 1000.0),
                extraction: None,
            }),
        }
    }

    fn from_generative(&self, raw: &str) -> Analysis {
        let ex = self.chain.run(raw, &self.thresholds);
        if ex.stage != "direct_json" {
            debug!(stage = ex.stage, "generative output needed a lenient extraction stage");
        }
        Analysis {
            trust: ex.trust,
            explanation: ex.explanation,
            api_available: true,
            main_topic: ex.main_topic,
            model_details: Some(ModelDetails {
                provider: self.provider_name().to_string(),
                prediction: None,
                model_confidence: None,
                extraction: Some(ex.stage.to_string()),
            }),
        }
    }

    /// One-off smoke test of the configured model; logs, never fails.
    pub async fn quick_probe(&self) {
        let sample = "The city council approved the new public library budget on Tuesday, according to official minutes.";
        let out = self.analyze_text(sample).await;
        info!(
            provider = self.provider_name(),
            api_available = out.api_available,
            score = out.trust.score,
            "AI quick probe finished"
        );
    }
}

fn build_generator(kind: GeneratorKind, cfg: &AiConfig) -> DynGenerator {
    let dir = PathBuf::from(&cfg.cache_dir);
    let model = cfg.generator_model.as_deref();
    match kind {
        GeneratorKind::Gemini => Arc::new(CachingGenerator::new(
            GeminiProvider::new(model),
            dir,
            cfg.daily_limit,
        )),
        GeneratorKind::Openai => Arc::new(CachingGenerator::new(
            OpenAiProvider::new(model),
            dir,
            cfg.daily_limit,
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scoring::signal::ConfidenceTier;

    const TEXT: &str = "Officials confirmed the bridge will reopen next week after repairs.";

    fn analyzer(model: impl model::ModelClient + 'static) -> Analyzer {
        Analyzer::new(Arc::new(model), ConfidenceThresholds::default())
    }

    #[tokio::test]
    async fn model_failure_is_neutral_and_flagged() {
        let out = analyzer(UnavailableModel).analyze_text(TEXT).await;
        assert_eq!(out.trust, TrustScore::neutral());
        assert!(!out.api_available);
        assert_eq!(out.explanation, MODEL_ERROR_EXPLANATION);
    }

    #[tokio::test]
    async fn empty_classifier_output_is_neutral() {
        let model = FixedSignalModel { signal: None };
        let out = analyzer(model).analyze_text(TEXT).await;
        assert_eq!(out.trust, TrustScore::neutral());
        assert!(out.api_available);
        assert_eq!(out.explanation, EMPTY_OUTPUT_EXPLANATION);
    }

    #[tokio::test]
    async fn classifier_verdict_gets_explained() {
        let out = analyzer(FixedSignalModel::new(RawModelSignal::fake(0.7)))
            .with_explainer(Arc::new(MockGenerator::new("Unsourced claims.")))
            .analyze_text(TEXT)
            .await;
        assert_eq!(out.trust.score, 0.3);
        assert_eq!(out.trust.label, TrustLabel::Red);
        assert_eq!(out.trust.confidence_tier, ConfidenceTier::Medium);
        assert_eq!(out.explanation, "Unsourced claims.");
        let details = out.model_details.unwrap();
        assert_eq!(details.prediction, Some(PredictedClass::Fake));
    }

    #[tokio::test]
    async fn generative_verdict_goes_through_extraction() {
        let gen = MockGenerator::new(r#"```json
{"score": 0.9, "label": "Green", "explanation": "Cites the transport ministry.", "main_topic": "Infrastructure"}
```"#);
        let out = analyzer(GenerativeJudge::new(Arc::new(gen))).analyze_text(TEXT).await;
        assert_eq!(out.trust.score, 0.9);
        assert_eq!(out.trust.label, TrustLabel::Green);
        assert_eq!(out.main_topic.as_deref(), Some("Infrastructure"));
        assert_eq!(
            out.model_details.and_then(|d| d.extraction).as_deref(),
            Some("fenced_json")
        );
    }

    #[test]
    fn explainer_prompt_follows_label() {
        assert!(Explainer::prompt("x", TrustLabel::Red).contains("disinformation"));
        assert!(Explainer::prompt("x", TrustLabel::Green).contains("reliable"));
    }
}
