// src/api/mod.rs
//! HTTP surface: shared state and the router. Handlers live in `articles` and `users`.

pub mod articles;
pub mod users;

use std::sync::Arc;

use axum::{extract::FromRef, routing::get, routing::post, Json, Router};
use serde_json::{json, Value};
use tower_http::{cors::CorsLayer, services::ServeDir};
use tracing::info;

use crate::analyze::Analyzer;
use crate::auth::AuthKeys;
use crate::config::{AiConfig, AppConfig};
use crate::files::{PhotoStore, UPLOADS_ROUTE};
use crate::rewards::RewardLedger;
use crate::storage::{open_store, DynStore, MemoryStore};

#[derive(Clone)]
pub struct AppState {
    pub analyzer: Arc<Analyzer>,
    pub store: DynStore,
    pub auth: Arc<AuthKeys>,
    pub photos: Arc<PhotoStore>,
    pub rewards: Arc<RewardLedger>,
}

impl FromRef<AppState> for Arc<AuthKeys> {
    fn from_ref(state: &AppState) -> Self {
        state.auth.clone()
    }
}

impl AppState {
    pub fn new(analyzer: Analyzer, store: DynStore, cfg: &AppConfig) -> Self {
        Self {
            analyzer: Arc::new(analyzer),
            store,
            auth: Arc::new(AuthKeys::new(&cfg.jwt_secret, cfg.jwt_expiration_hours)),
            photos: Arc::new(PhotoStore::new(&cfg.upload_dir, cfg.public_base_url.clone())),
            rewards: Arc::new(RewardLedger::new()),
        }
    }

    /// Production wiring: AI config file, configured store, env settings.
    pub fn from_config(cfg: &AppConfig) -> anyhow::Result<Self> {
        let ai = AiConfig::load_or_default(&cfg.ai_config_path);
        let analyzer = Analyzer::from_config(&ai);
        let store = open_store(cfg)?;
        info!(
            store = store.backend_name(),
            model = analyzer.provider_name(),
            "application state ready"
        );
        Ok(Self::new(analyzer, store, cfg))
    }

    /// Default settings on the in-memory store.
    pub fn in_memory(analyzer: Analyzer) -> Self {
        Self::new(analyzer, Arc::new(MemoryStore::new()), &AppConfig::default())
    }
}

pub fn router(state: AppState) -> Router {
    let uploads = ServeDir::new(state.photos.root());

    Router::new()
        .route("/ping", get(ping))
        .route("/health", get(|| async { "ok" }))
        .route("/analyze", post(articles::analyze))
        .route("/vote", post(articles::vote))
        .route("/article/{article_id}", get(articles::article_with_scores))
        .route("/article/{article_id}/votes", get(articles::article_votes))
        .nest("/users", users::routes())
        .nest_service(UPLOADS_ROUTE, uploads)
        .layer(CorsLayer::very_permissive())
        .with_state(state)
}

async fn ping() -> Json<Value> {
    Json(json!({ "message": "pong" }))
}
