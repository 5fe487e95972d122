// src/pagespeed/client.rs
//! Audit API abstraction + the PageSpeed Insights v5 client.

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use metrics::{counter, histogram};
use tracing::{debug, warn};

use super::fixture::FixtureAuditApi;
use super::types::PageSpeedResponse;
use super::AuditRequest;
use crate::config::ServiceConfig;
use crate::error::CheckError;
use crate::scores::CATEGORY_KEYS;

const LOG_BODY_LIMIT: usize = 512;

/// Low-level upstream: performs exactly one audit call, no caching or retry.
/// The orchestrator layers those on top so tests can swap this seam out.
#[async_trait]
pub trait AuditApi: Send + Sync + 'static {
    async fn run_pagespeed(&self, req: AuditRequest) -> Result<PageSpeedResponse, CheckError>;
    fn name(&self) -> &'static str;
}

pub type DynAuditApi = Arc<dyn AuditApi>;

/// Factory mirroring the config:
/// * `PAGESPEED_TEST_MODE=mock` → deterministic fixture client;
/// * otherwise the real client (a missing key is reported per request).
pub fn build_audit_api(cfg: &ServiceConfig) -> anyhow::Result<DynAuditApi> {
    if cfg.test_mode {
        return Ok(Arc::new(FixtureAuditApi::default()));
    }
    let client = PageSpeedClient::new(cfg.base_url.clone(), cfg.api_key.clone())?;
    Ok(Arc::new(client))
}

pub struct PageSpeedClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl PageSpeedClient {
    pub fn new(base_url: String, api_key: Option<String>) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .user_agent("maxmetrics/0.1")
            .connect_timeout(Duration::from_secs(5))
            .build()?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.unwrap_or_default(),
        })
    }

    fn endpoint(&self) -> String {
        format!("{}/runPagespeed", self.base_url)
    }

    fn query(&self, req: &AuditRequest) -> Vec<(&'static str, String)> {
        let mut q = vec![("url", req.url.clone())];
        for key in CATEGORY_KEYS {
            q.push(("category", key.to_string()));
        }
        q.push(("strategy", req.strategy.as_str().to_string()));
        q.push(("key", self.api_key.clone()));
        q
    }
}

#[async_trait]
impl AuditApi for PageSpeedClient {
    async fn run_pagespeed(&self, req: AuditRequest) -> Result<PageSpeedResponse, CheckError> {
        if self.api_key.trim().is_empty() {
            return Err(CheckError::Configuration(
                "GOOGLE_PAGESPEED_API_KEY is not set".to_string(),
            ));
        }

        let started = Instant::now();
        let sent = self
            .http
            .get(self.endpoint())
            .query(&self.query(&req))
            .timeout(req.timeout)
            .send()
            .await;
        histogram!("upstream_duration_ms").record(started.elapsed().as_millis() as f64);

        let resp = sent.map_err(|e| {
            counter!("upstream_errors_total").increment(1);
            if e.is_timeout() {
                CheckError::Timeout(req.timeout)
            } else {
                warn!(target: "pagespeed", url = %req.url, strategy = %req.strategy, error = %e, "request failed");
                CheckError::upstream(e.to_string())
            }
        })?;

        let status = resp.status();
        if !status.is_success() {
            counter!("upstream_errors_total").increment(1);
            let body = resp.text().await.unwrap_or_default();
            let body = truncate_for_log(&body, LOG_BODY_LIMIT);
            warn!(
                target: "pagespeed",
                url = %req.url,
                strategy = %req.strategy,
                status = status.as_u16(),
                body = %body,
                "PageSpeed API returned an error status"
            );
            return Err(CheckError::upstream_status(status.as_u16(), body));
        }

        let bytes = resp.bytes().await.map_err(|e| {
            if e.is_timeout() {
                CheckError::Timeout(req.timeout)
            } else {
                CheckError::upstream(e.to_string())
            }
        })?;
        debug!(target: "pagespeed", url = %req.url, strategy = %req.strategy, bytes = bytes.len(), "payload received");
        PageSpeedResponse::from_slice(&bytes)
    }

    fn name(&self) -> &'static str {
        "pagespeed"
    }
}

/// Cut at a char boundary so multi-byte bodies never panic.
pub fn truncate_for_log(s: &str, max: usize) -> String {
    if s.len() <= max {
        return s.to_string();
    }
    let mut end = max;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}…", &s[..end])
}
