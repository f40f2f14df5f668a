// src/lib.rs
// Public library surface for the server binary and integration tests.

pub mod analyze;
pub mod api;
pub mod auth;
pub mod config;
pub mod error;
pub mod files;
pub mod metrics;
pub mod rewards;
pub mod scoring;
pub mod storage;

use axum::Router;
use tracing::info;

pub use crate::api::{router, AppState};
use crate::config::{AiConfig, AppConfig};

/// Full application from the environment: API routes plus `/metrics`.
pub fn app() -> anyhow::Result<Router> {
    let cfg = AppConfig::from_env();
    let state = AppState::from_config(&cfg)?;
    let metrics = crate::metrics::Metrics::init(state.store.backend_name())?;
    Ok(router(state).merge(metrics.router()))
}

/// One-off smoke test of the configured model. Logs the result and never
/// panics; errors only if the AI config cannot be read.
///
/// ```ignore
/// if let Err(e) = factflow_backend::run_ai_quick_probe().await {
///     tracing::warn!(error = ?e, "AI quick probe didn't run");
/// }
/// ```
pub async fn run_ai_quick_probe() -> anyhow::Result<()> {
    let cfg = AppConfig::from_env();
    let ai = AiConfig::load_from_file(&cfg.ai_config_path)?;
    analyze::Analyzer::from_config(&ai).quick_probe().await;
    info!(path = %cfg.ai_config_path.display(), "AI quick probe done");
    Ok(())
}
