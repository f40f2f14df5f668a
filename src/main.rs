//! FactFlow backend binary entrypoint.
//! Boots the Axum HTTP server on Shuttle with routes, shared state and metrics.

use shuttle_axum::ShuttleAxum;
use tracing::warn;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// `RUST_LOG` filter (default `factflow_backend=info,warn`); `LOG_FORMAT=json`
/// switches to JSON lines.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("factflow_backend=info,warn"));
    let json = std::env::var("LOG_FORMAT").is_ok_and(|v| v.eq_ignore_ascii_case("json"));

    let registry = tracing_subscriber::registry().with(filter);
    let installed = if json {
        registry.with(fmt::layer().json()).try_init()
    } else {
        registry.with(fmt::layer().compact()).try_init()
    };
    // The runtime may already have installed a global subscriber.
    if installed.is_err() {
        tracing::debug!("tracing subscriber already set");
    }
}

#[shuttle_runtime::main]
async fn axum() -> ShuttleAxum {
    // Load .env in local/dev; no-op in prod environments.
    let _ = dotenvy::dotenv();
    init_tracing();

    let router = factflow_backend::app()?;

    if std::env::var("AI_QUICK_PROBE").is_ok_and(|v| v == "1") {
        tokio::spawn(async {
            if let Err(e) = factflow_backend::run_ai_quick_probe().await {
                warn!(error = ?e, "AI quick probe didn't run");
            }
        });
    }

    Ok(router.into())
}
