// src/lib.rs
// Public library surface for integration tests and the Shuttle binary.

pub mod api;
pub mod cache;
pub mod config;
pub mod error;
pub mod metrics;
pub mod orchestrator;
pub mod pagespeed;
pub mod partition;
pub mod report;
pub mod scores;
pub mod submissions;
pub mod url_normalizer;

// ---- Re-exports for stable public API ----
pub use crate::api::{router, AppState};
pub use crate::config::ServiceConfig;
pub use crate::error::CheckError;
pub use crate::orchestrator::{CheckRequest, ScoreOrchestrator};
pub use crate::url_normalizer::normalize_url;

use axum::Router;
use tracing::info;

/// Full in-process app built from env/TOML config: check API plus `/metrics`
/// when `METRICS_ROUTES=1`.
pub async fn app() -> anyhow::Result<Router> {
    let cfg = ServiceConfig::load()?;
    app_with_config(&cfg)
}

pub fn app_with_config(cfg: &ServiceConfig) -> anyhow::Result<Router> {
    let orchestrator = ScoreOrchestrator::from_service_config(cfg)?;
    let mut router = api::router(AppState::new(orchestrator));

    if cfg.metrics_routes {
        let m = metrics::Metrics::init(cfg.detail_cache_ttl_ms)?;
        router = router.merge(m.router());
        info!(target: "check", "metrics route enabled at /metrics");
    }
    Ok(router)
}
