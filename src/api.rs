use std::sync::Arc;

use axum::{
    extract::{Query, State},
    http::HeaderValue,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tower_http::cors::CorsLayer;

use crate::orchestrator::{CheckRequest, ScoreOrchestrator};
use crate::scores::ScoreSet;

pub const X_CACHE: &str = "x-cache";

#[derive(Clone)]
pub struct AppState {
    pub orchestrator: Arc<ScoreOrchestrator>,
}

impl AppState {
    pub fn new(orchestrator: ScoreOrchestrator) -> Self {
        Self {
            orchestrator: Arc::new(orchestrator),
        }
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(|| async { "OK" }))
        .route("/api/check", get(check))
        .route("/api/check/both", get(check_both))
        .layer(CorsLayer::very_permissive())
        .with_state(state)
}

/// Raw query; every value is optional so validation errors stay ours.
#[derive(Debug, Default, Deserialize)]
struct CheckQuery {
    url: Option<String>,
    details: Option<String>,
    strategy: Option<String>,
    refresh: Option<String>,
}

#[derive(Serialize)]
struct SummaryResp<'a> {
    url: &'a str,
    scores: &'a ScoreSet,
}

async fn check(State(state): State<AppState>, Query(q): Query<CheckQuery>) -> Response {
    let req = CheckRequest::from_query(
        q.url.as_deref(),
        q.strategy.as_deref(),
        q.details.as_deref(),
        q.refresh.as_deref(),
    );
    let details = req.details;

    let (report, cache) = match state.orchestrator.check_with_status(req).await {
        Ok(v) => v,
        Err(e) => return e.into_response(),
    };

    // Summary mode answers with url + scores only.
    let mut resp = if details {
        Json(&report).into_response()
    } else {
        Json(SummaryResp {
            url: &report.url,
            scores: &report.scores,
        })
        .into_response()
    };
    resp.headers_mut()
        .insert(X_CACHE, HeaderValue::from_static(cache.as_str()));
    resp
}

async fn check_both(State(state): State<AppState>, Query(q): Query<CheckQuery>) -> Response {
    let details = q.details.as_deref() == Some("true");
    let refresh = q.refresh.as_deref() == Some("true");
    let url = q.url.unwrap_or_default();

    let outcome = state.orchestrator.check_both(&url, details, refresh).await;
    match outcome.into_report() {
        Ok(report) => Json(report).into_response(),
        Err(e) => e.into_response(),
    }
}
