//! Article analysis, voting and combined scores.

use axum::{
    extract::{Path, State},
    Json,
};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::AppState;
use crate::analyze::{Analysis, ModelDetails};
use crate::auth::AuthUser;
use crate::error::AppError;
use crate::rewards::VoteOutcome;
use crate::scoring::{combine, community_score, CombinedResult, TrustScore, VoteTally};
use crate::storage::{article_id_for, ArticleRecord, Store, VoteRecord};

#[derive(Debug, Deserialize)]
pub struct AnalyzeReq {
    pub text: String,
}

#[derive(Debug, Serialize)]
pub struct AnalyzeResp {
    pub article_id: String,
    #[serde(flatten)]
    pub trust: TrustScore,
    pub explanation: String,
    pub api_available: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub main_topic: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model_details: Option<ModelDetails>,
    /// `None` until someone votes.
    pub community_score: Option<f64>,
    pub positive_votes: u32,
    pub negative_votes: u32,
    pub total_votes: u32,
    /// `true` when the stored analysis was returned.
    pub cached: bool,
}

impl AnalyzeResp {
    fn fresh(article_id: String, a: Analysis) -> Self {
        Self {
            article_id,
            trust: a.trust,
            explanation: a.explanation,
            api_available: a.api_available,
            main_topic: a.main_topic,
            model_details: a.model_details,
            community_score: None,
            positive_votes: 0,
            negative_votes: 0,
            total_votes: 0,
            cached: false,
        }
    }

    fn stored(rec: ArticleRecord, tally: VoteTally) -> Self {
        Self {
            trust: rec.trust(),
            article_id: rec.article_id,
            explanation: rec.explanation,
            api_available: rec.api_available,
            main_topic: rec.main_topic,
            model_details: None,
            community_score: (tally.total > 0).then(|| community_score(&tally)),
            positive_votes: tally.positive,
            negative_votes: tally.negative,
            total_votes: tally.total,
            cached: true,
        }
    }
}

/// Vote tally, or an empty one if storage is unavailable.
async fn votes_or_empty(store: &dyn Store, article_id: &str) -> VoteTally {
    store.get_votes(article_id).await.unwrap_or_else(|e| {
        warn!(%article_id, error = %e, "vote lookup failed, assuming no votes");
        VoteTally::default()
    })
}

/// Known text returns the stored result; new text is analyzed and stored.
/// A stored result from a model outage is analyzed again and overwritten.
/// Storage problems never fail the request.
pub async fn analyze(State(state): State<AppState>, Json(body): Json<AnalyzeReq>) -> Json<AnalyzeResp> {
    let article_id = article_id_for(&body.text);

    match state.store.get_article(&article_id).await {
        Ok(Some(rec)) if rec.api_available => {
            info!(%article_id, "returning stored analysis");
            let tally = votes_or_empty(state.store.as_ref(), &article_id).await;
            return Json(AnalyzeResp::stored(rec, tally));
        }
        Ok(Some(_)) => info!(%article_id, "stored analysis came from an outage, retrying model"),
        Ok(None) => {}
        Err(e) => warn!(%article_id, error = %e, "article lookup failed, analyzing anyway"),
    }

    let analysis = state.analyzer.analyze_text(&body.text).await;
    let record = ArticleRecord::from_analysis(article_id.clone(), body.text, &analysis);
    if let Err(e) = state.store.save_article(record).await {
        warn!(%article_id, error = %e, "article not persisted");
    }
    info!(%article_id, score = analysis.trust.score, label = analysis.trust.label.as_str(), "new analysis");
    Json(AnalyzeResp::fresh(article_id, analysis))
}

#[derive(Debug, Deserialize)]
pub struct VoteReq {
    #[serde(default)]
    pub article_id: Option<String>,
    /// Alternative to `article_id`: the analyzed text itself.
    #[serde(default)]
    pub text: Option<String>,
    /// `1` credible, `-1` fake.
    pub vote: i32,
}

#[derive(Debug, Serialize)]
pub struct VoteResp {
    pub status: &'static str,
    pub article_id: String,
    pub message: String,
    #[serde(flatten)]
    pub outcome: VoteOutcome,
}

pub async fn vote(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Json(body): Json<VoteReq>,
) -> Result<Json<VoteResp>, AppError> {
    if body.vote != 1 && body.vote != -1 {
        return Err(AppError::BadRequest(
            "vote must be 1 (credible) or -1 (fake)".into(),
        ));
    }
    let article_id = body
        .article_id
        .filter(|id| !id.trim().is_empty())
        .or_else(|| body.text.as_deref().map(article_id_for))
        .ok_or_else(|| AppError::BadRequest("article_id or text is required".into()))?;

    if state.store.get_article(&article_id).await?.is_none() {
        return Err(AppError::NotFound("Article not found".into()));
    }

    let outcome = state
        .rewards
        .record_vote(
            state.store.as_ref(),
            VoteRecord::new(article_id.clone(), user.user_id.clone(), body.vote),
        )
        .await?;

    info!(%article_id, user_id = %user.user_id, vote = body.vote, "vote recorded");
    Ok(Json(VoteResp {
        status: "vote saved",
        message: format!("Vote saved and {} points awarded!", outcome.points_awarded),
        article_id,
        outcome,
    }))
}

pub async fn article_votes(
    State(state): State<AppState>,
    Path(article_id): Path<String>,
) -> Json<VoteTally> {
    Json(votes_or_empty(state.store.as_ref(), &article_id).await)
}

#[derive(Debug, Serialize)]
pub struct ArticleResp {
    pub article_id: String,
    pub ai_score: f64,
    pub ai_label: crate::scoring::TrustLabel,
    pub ai_confidence: crate::scoring::ConfidenceTier,
    pub community_score: f64,
    #[serde(flatten)]
    pub combined: CombinedResult,
    pub positive_votes: u32,
    pub negative_votes: u32,
    pub explanation: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub main_topic: Option<String>,
}

pub async fn article_with_scores(
    State(state): State<AppState>,
    Path(article_id): Path<String>,
) -> Result<Json<ArticleResp>, AppError> {
    let rec = state
        .store
        .get_article(&article_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Article not found".into()))?;

    let tally = votes_or_empty(state.store.as_ref(), &article_id).await;
    let community = community_score(&tally);
    let combined = combine(rec.ai_score, community, tally.total);

    Ok(Json(ArticleResp {
        article_id: rec.article_id,
        ai_score: rec.ai_score,
        ai_label: rec.ai_label,
        ai_confidence: rec.ai_confidence,
        community_score: community,
        combined,
        positive_votes: tally.positive,
        negative_votes: tally.negative,
        explanation: rec.explanation,
        main_topic: rec.main_topic,
    }))
}
