// tests/pagespeed_upstream.rs
//
// End-to-end through the real reqwest client against a local stub upstream
// (axum on 127.0.0.1:0), so the outbound contract is checked without network.
//
// Covered:
// - outbound query: url, the four categories, default desktop strategy, key
// - score rounding from a real payload shape
// - upstream 503 → 500 generic message, body never echoed
// - detailed retry (two calls) vs summary (one call)
// - malformed 200 payload → 500

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use axum::{
    body::{self, Body},
    extract::{RawQuery, State},
    http::{Request, StatusCode},
    response::IntoResponse,
    routing,
    Router,
};
use serde_json::{json, Value as Json};
use tower::ServiceExt as _;

use maxmetrics::error::MSG_UPSTREAM_FAILED;
use maxmetrics::ServiceConfig;

const BODY_LIMIT: usize = 1024 * 1024;
const SECRET_BODY: &str = "backend-exploded-internal-trace";

#[derive(Clone, Default)]
struct Stub {
    queries: Arc<Mutex<Vec<String>>>,
    replies: Arc<Mutex<VecDeque<(StatusCode, String)>>>,
}

impl Stub {
    fn calls(&self) -> usize {
        self.queries.lock().unwrap().len()
    }
}

fn scenario_b_payload() -> String {
    json!({
        "lighthouseResult": {
            "categories": {
                "performance": {"id": "performance", "title": "Performance", "score": 0.873, "auditRefs": []},
                "seo": {"id": "seo", "title": "SEO", "score": 1, "auditRefs": []},
                "accessibility": {"id": "accessibility", "title": "Accessibility", "score": 0.602, "auditRefs": []},
                "best-practices": {"id": "best-practices", "title": "Best Practices", "score": 0, "auditRefs": []}
            },
            "audits": {}
        }
    })
    .to_string()
}

async fn run_pagespeed(State(stub): State<Stub>, RawQuery(q): RawQuery) -> impl IntoResponse {
    stub.queries.lock().unwrap().push(q.unwrap_or_default());
    let next = stub.replies.lock().unwrap().pop_front();
    next.unwrap_or((StatusCode::OK, scenario_b_payload()))
}

/// Start the stub and an app pointed at it.
async fn start(replies: Vec<(StatusCode, String)>) -> (Router, Stub) {
    let stub = Stub {
        replies: Arc::new(Mutex::new(replies.into())),
        ..Default::default()
    };
    let upstream = Router::new()
        .route("/runPagespeed", routing::get(run_pagespeed))
        .with_state(stub.clone());
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind stub");
    let addr = listener.local_addr().expect("stub addr");
    tokio::spawn(async move {
        let _ = axum::serve(listener, upstream).await;
    });

    let cfg = ServiceConfig {
        api_key: Some("test-key".into()),
        base_url: format!("http://{addr}"),
        detail_retry_delay_ms: 10,
        ..Default::default()
    };
    let app = maxmetrics::app_with_config(&cfg).expect("build app");
    (app, stub)
}

async fn get(app: &Router, uri: &str) -> (StatusCode, String) {
    let req = Request::builder()
        .uri(uri)
        .body(Body::empty())
        .expect("build GET");
    let resp = app.clone().oneshot(req).await.expect("oneshot");
    let status = resp.status();
    let bytes = body::to_bytes(resp.into_body(), BODY_LIMIT)
        .await
        .expect("read body");
    (status, String::from_utf8_lossy(&bytes).into_owned())
}

#[tokio::test]
async fn outbound_query_uses_desktop_and_all_categories() {
    let (app, stub) = start(vec![]).await;
    let (status, _) = get(&app, "/api/check?url=example.com").await;
    assert_eq!(status, StatusCode::OK);

    let q = stub.queries.lock().unwrap()[0].clone();
    assert!(q.contains("url=https%3A%2F%2Fexample.com"), "{q}");
    assert!(q.contains("strategy=desktop"), "{q}");
    assert!(q.contains("key=test-key"), "{q}");
    for cat in ["performance", "seo", "accessibility", "best-practices"] {
        assert!(q.contains(&format!("category={cat}")), "missing {cat} in {q}");
    }
}

#[tokio::test]
async fn scores_are_rounded_percentages() {
    let (app, _) = start(vec![]).await;
    let (status, body) = get(&app, "/api/check?url=example.com").await;
    assert_eq!(status, StatusCode::OK);
    let v: Json = serde_json::from_str(&body).expect("json");
    assert_eq!(
        v["scores"],
        json!({"performance": 87, "seo": 100, "accessibility": 60, "bestPractices": 0})
    );
}

#[tokio::test]
async fn upstream_503_maps_to_generic_500() {
    let (app, stub) = start(vec![(StatusCode::SERVICE_UNAVAILABLE, SECRET_BODY.to_string())]).await;
    let (status, body) = get(&app, "/api/check?url=example.com").await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    let v: Json = serde_json::from_str(&body).expect("json");
    assert_eq!(v["message"], MSG_UPSTREAM_FAILED);
    assert!(!body.contains(SECRET_BODY), "upstream body leaked: {body}");
    assert_eq!(stub.calls(), 1, "summary mode is never retried");
}

#[tokio::test]
async fn detailed_503_is_retried_once() {
    let (app, stub) = start(vec![(StatusCode::SERVICE_UNAVAILABLE, SECRET_BODY.to_string())]).await;
    let (status, body) = get(&app, "/api/check?url=example.com&details=true").await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(stub.calls(), 2);
}

#[tokio::test]
async fn payload_without_categories_is_upstream_error() {
    let (app, _) = start(vec![(StatusCode::OK, r#"{"kind":"pagespeedonline#result"}"#.into())]).await;
    let (status, body) = get(&app, "/api/check?url=example.com").await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(body.contains(MSG_UPSTREAM_FAILED));
}
