use axum::{routing::get, Router};
use metrics::{describe_counter, gauge};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use once_cell::sync::OnceCell;

static METRICS: OnceCell<Metrics> = OnceCell::new();

pub struct Metrics {
    pub handle: PrometheusHandle,
}

impl Metrics {
    /// Install the Prometheus recorder (once per process) and publish which
    /// store backend is active.
    pub fn init(store_backend: &'static str) -> anyhow::Result<&'static Self> {
        let metrics = METRICS.get_or_try_init(|| -> anyhow::Result<Self> {
            let handle = PrometheusBuilder::new().install_recorder()?;
            describe_counter!(
                "factflow_analyses_total",
                "Text analyses by outcome (scored, short_text, model_error, no_output)"
            );
            Ok(Self { handle })
        })?;
        gauge!("factflow_store_info", "backend" => store_backend).set(1.0);
        Ok(metrics)
    }

    /// Returns a router exposing `/metrics` with the Prometheus exposition format.
    pub fn router(&self) -> Router {
        let handle = self.handle.clone();
        Router::new().route(
            "/metrics",
            get(move || {
                let h = handle.clone();
                async move { h.render() }
            }),
        )
    }
}
