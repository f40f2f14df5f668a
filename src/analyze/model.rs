//! Model-inference boundary.
//!
//! A model either classifies (REAL/FAKE + confidence) or produces a free-form
//! generative judgment. Both shapes come back as [`ModelOutput`]; turning them
//! into a trust score is the analyzer's job.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::ai_adapter::DynGenerator;
use crate::scoring::signal::{PredictedClass, RawModelSignal};

pub const DEFAULT_CLASSIFIER_MODEL: &str = "jy46604790/Fake-News-Bert-Detect";
pub const DEFAULT_HF_ENDPOINT: &str = "https://router.huggingface.co/hf-inference/models";

#[derive(Debug, Clone, PartialEq)]
pub enum ModelOutput {
    /// `None` when the classifier answered with no labels at all.
    Classifier(Option<RawModelSignal>),
    Generative(String),
}

#[derive(Debug, Error)]
pub enum ModelError {
    #[error("model not configured")]
    NotConfigured,
    #[error("model request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("model returned HTTP {0}")]
    Status(u16),
    #[error("model returned malformed output: {0}")]
    Malformed(String),
    #[error("generator returned no text")]
    NoOutput,
}

pub type InferFuture<'a> = Pin<Box<dyn Future<Output = Result<ModelOutput, ModelError>> + Send + 'a>>;

pub trait ModelClient: Send + Sync {
    fn infer<'a>(&'a self, text: &'a str) -> InferFuture<'a>;
    fn provider_name(&self) -> &'static str;
}

pub type DynModelClient = Arc<dyn ModelClient>;

// ------------------------------------------------------------
// Hugging Face text-classification
// ------------------------------------------------------------

/// One `{label, score}` entry of a text-classification response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassLabel {
    pub label: String,
    pub score: f64,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum HfResponse {
    Nested(Vec<Vec<ClassLabel>>),
    Flat(Vec<ClassLabel>),
    Error { error: String },
}

pub struct HuggingFaceClassifier {
    http: reqwest::Client,
    token: String,
    url: String,
}

impl HuggingFaceClassifier {
    /// Token from `HF_API_TOKEN`; empty token means "not configured".
    pub fn new(endpoint: Option<&str>, model: Option<&str>) -> Self {
        let http = reqwest::Client::builder()
            .user_agent("factflow-backend/0.1")
            .connect_timeout(Duration::from_secs(4))
            .timeout(Duration::from_secs(30))
            .build()
            .unwrap_or_default();
        let url = format!(
            "{}/{}",
            endpoint.unwrap_or(DEFAULT_HF_ENDPOINT).trim_end_matches('/'),
            model.unwrap_or(DEFAULT_CLASSIFIER_MODEL)
        );
        Self {
            http,
            token: std::env::var("HF_API_TOKEN").unwrap_or_default(),
            url,
        }
    }

    async fn infer_impl(&self, text: &str) -> Result<ModelOutput, ModelError> {
        if self.token.is_empty() {
            return Err(ModelError::NotConfigured);
        }
        let resp = self
            .http
            .post(&self.url)
            .bearer_auth(&self.token)
            .json(&serde_json::json!({ "inputs": text, "parameters": { "truncation": true } }))
            .send()
            .await?;
        if !resp.status().is_success() {
            return Err(ModelError::Status(resp.status().as_u16()));
        }
        let labels = match resp.json::<HfResponse>().await? {
            HfResponse::Nested(rows) => rows.into_iter().next().unwrap_or_default(),
            HfResponse::Flat(row) => row,
            HfResponse::Error { error } => return Err(ModelError::Malformed(error)),
        };
        signal_from_labels(&labels).map(ModelOutput::Classifier)
    }
}

impl ModelClient for HuggingFaceClassifier {
    fn infer<'a>(&'a self, text: &'a str) -> InferFuture<'a> {
        Box::pin(self.infer_impl(text))
    }
    fn provider_name(&self) -> &'static str {
        "huggingface"
    }
}

/// Pick the top-scoring label. `LABEL_0` is fake news, `LABEL_1` real news.
/// An empty list is a valid "no opinion" answer.
pub fn signal_from_labels(labels: &[ClassLabel]) -> Result<Option<RawModelSignal>, ModelError> {
    let Some(top) = labels
        .iter()
        .filter(|l| l.score.is_finite())
        .max_by(|a, b| a.score.total_cmp(&b.score))
    else {
        return Ok(None);
    };
    let predicted_class = match top.label.to_ascii_uppercase().as_str() {
        "LABEL_1" | "REAL" | "TRUE" => PredictedClass::Real,
        "LABEL_0" | "FAKE" | "FALSE" => PredictedClass::Fake,
        other => return Err(ModelError::Malformed(format!("unknown label `{other}`"))),
    };
    Ok(Some(RawModelSignal {
        predicted_class,
        confidence: top.score,
    }))
}

// ------------------------------------------------------------
// Generative judge
// ------------------------------------------------------------

/// Asks a text generator for a JSON verdict; parsing happens downstream.
pub struct GenerativeJudge {
    generator: DynGenerator,
}

impl GenerativeJudge {
    pub fn new(generator: DynGenerator) -> Self {
        Self { generator }
    }
}

pub fn judge_prompt(text: &str) -> String {
    format!(
        r#"Assess the credibility of the text below. Reply with JSON only, shaped as
{{"score": <number 0-1, 1 = credible>, "label": "Green" | "Yellow" | "Red", "explanation": "<2-3 sentences>", "main_topic": "<a few words>"}}

Text: """{text}""""#
    )
}

impl ModelClient for GenerativeJudge {
    fn infer<'a>(&'a self, text: &'a str) -> InferFuture<'a> {
        Box::pin(async move {
            let prompt = judge_prompt(text);
            self.generator
                .generate(&prompt)
                .await
                .map(ModelOutput::Generative)
                .ok_or(ModelError::NoOutput)
        })
    }
    fn provider_name(&self) -> &'static str {
        self.generator.name()
    }
}

// ------------------------------------------------------------
// Offline clients
// ------------------------------------------------------------

/// Always answers with the same signal (`AI_TEST_MODE=mock`, tests).
#[derive(Debug, Clone)]
pub struct FixedSignalModel {
    pub signal: Option<RawModelSignal>,
}

impl FixedSignalModel {
    pub fn new(signal: RawModelSignal) -> Self {
        Self {
            signal: Some(signal),
        }
    }
}

impl ModelClient for FixedSignalModel {
    fn infer<'a>(&'a self, _text: &'a str) -> InferFuture<'a> {
        let out = self.signal;
        Box::pin(async move { Ok(ModelOutput::Classifier(out)) })
    }
    fn provider_name(&self) -> &'static str {
        "mock"
    }
}

/// Fails every call; used when AI is disabled so the neutral fallback applies.
pub struct UnavailableModel;

impl ModelClient for UnavailableModel {
    fn infer<'a>(&'a self, _text: &'a str) -> InferFuture<'a> {
        Box::pin(async { Err(ModelError::NotConfigured) })
    }
    fn provider_name(&self) -> &'static str {
        "disabled"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lbl(label: &str, score: f64) -> ClassLabel {
        ClassLabel {
            label: label.to_string(),
            score,
        }
    }

    #[test]
    fn top_label_wins() {
        let s = signal_from_labels(&[lbl("LABEL_0", 0.1), lbl("LABEL_1", 0.9)])
            .unwrap()
            .unwrap();
        assert_eq!(s.predicted_class, PredictedClass::Real);
        assert_eq!(s.confidence, 0.9);
    }

    #[test]
    fn empty_labels_are_no_opinion() {
        assert!(signal_from_labels(&[]).unwrap().is_none());
    }

    #[test]
    fn unknown_label_is_malformed() {
        let err = signal_from_labels(&[lbl("POSITIVE", 0.7)]).unwrap_err();
        assert!(matches!(err, ModelError::Malformed(_)));
    }

    #[test]
    fn nested_and_flat_responses_parse() {
        let nested: HfResponse =
            serde_json::from_str(r#"[[{"label":"LABEL_1","score":0.99}]]"#).unwrap();
        assert!(matches!(nested, HfResponse::Nested(_)));
        let flat: HfResponse = serde_json::from_str(r#"[{"label":"LABEL_0","score":0.8}]"#).unwrap();
        assert!(matches!(flat, HfResponse::Flat(_)));
        let err: HfResponse = serde_json::from_str(r#"{"error":"loading"}"#).unwrap();
        assert!(matches!(err, HfResponse::Error { .. }));
    }

    #[tokio::test]
    async fn judge_without_output_errors() {
        let judge = GenerativeJudge::new(Arc::new(crate::analyze::ai_adapter::DisabledGenerator));
        assert!(matches!(judge.infer("some text").await, Err(ModelError::NoOutput)));
    }
}
