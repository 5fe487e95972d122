// tests/metrics.rs
use axum::body::{self, Body};
use axum::http::{Request, StatusCode};
use axum::Router;
use tower::ServiceExt;

use maxmetrics::ServiceConfig;

// Build full in-process app with the /metrics route enabled.
fn build_app() -> Router {
    let cfg = ServiceConfig {
        test_mode: true,
        metrics_routes: true,
        detail_cache_ttl_ms: 30_000,
        ..Default::default()
    };
    maxmetrics::app_with_config(&cfg).expect("app_with_config should build Router in tests")
}

async fn scrape(app: &Router) -> String {
    let resp = app
        .clone()
        .oneshot(Request::get("/metrics").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    // axum::body::to_bytes requires an explicit limit
    let body = body::to_bytes(resp.into_body(), 1_048_576).await.unwrap(); // 1 MiB
    String::from_utf8(body.to_vec()).unwrap()
}

fn counter_value(text: &str, name: &str) -> f64 {
    text.lines()
        .find(|l| l.starts_with(name) && !l.starts_with('#'))
        .and_then(|l| l.split_whitespace().last())
        .and_then(|v| v.parse().ok())
        .unwrap_or(0.0)
}

#[tokio::test]
async fn check_traffic_shows_up_in_exposition() {
    let app = build_app();
    let uri = "/api/check?url=example.com&details=true";

    for _ in 0..2 {
        let r = app
            .clone()
            .oneshot(Request::get(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(r.status(), StatusCode::OK);
    }

    let text = scrape(&app).await;
    for needle in [
        "checks_total",
        "check_cache_hits_total",
        "check_cache_misses_total",
        "detail_cache_ttl_ms",
    ] {
        assert!(
            text.contains(needle),
            "metrics exposition missing '{needle}'\n{text}"
        );
    }
    assert!(counter_value(&text, "check_cache_hits_total") >= 1.0);
    assert!(counter_value(&text, "checks_total") >= 2.0);
    assert_eq!(counter_value(&text, "detail_cache_ttl_ms"), 30_000.0);
}

#[tokio::test]
async fn metrics_route_absent_unless_enabled() {
    let cfg = ServiceConfig {
        test_mode: true,
        ..Default::default()
    };
    let app = maxmetrics::app_with_config(&cfg).expect("build app");
    let resp = app
        .oneshot(Request::get("/metrics").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}
