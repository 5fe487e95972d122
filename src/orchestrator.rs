// src/orchestrator.rs
//! Score request orchestration: validation, cache policy, retry, supersession
//! and the per-request lifecycle around a single `AuditApi` call.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use metrics::counter;
use serde::Serialize;
use tokio::task::AbortHandle;
use tracing::{debug, info, warn};

use crate::cache::{DynResultCache, RequestKey, TtlCache};
use crate::config::ServiceConfig;
use crate::error::{CheckError, MSG_URL_REQUIRED};
use crate::pagespeed::{build_audit_api, AuditRequest, DynAuditApi, PageSpeedResponse, Strategy};
use crate::report::{DualOutcome, ScoreReport};
use crate::scores::ScoreSet;
use crate::submissions::{record_in_background, DynSubmissionStore, InMemorySubmissions};
use crate::url_normalizer::{normalize_url, parse_canonical};

/// Finished entries are pruned once the in-flight table grows past this.
const INFLIGHT_PRUNE_AT: usize = 1024;

/// Normalized inputs of one check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckRequest {
    pub url: String,
    pub strategy: Strategy,
    pub details: bool,
    pub refresh: bool,
}

impl CheckRequest {
    pub fn new(url: impl Into<String>, strategy: Strategy) -> Self {
        Self {
            url: url.into(),
            strategy,
            details: false,
            refresh: false,
        }
    }

    pub fn detailed(mut self) -> Self {
        self.details = true;
        self
    }

    pub fn refreshed(mut self) -> Self {
        self.refresh = true;
        self
    }

    /// Raw query values as they arrive over HTTP. Flags are enabled only by
    /// the literal `true`; strategy only by the literal `mobile`.
    pub fn from_query(
        url: Option<&str>,
        strategy: Option<&str>,
        details: Option<&str>,
        refresh: Option<&str>,
    ) -> Self {
        Self {
            url: url.unwrap_or_default().to_string(),
            strategy: Strategy::parse_lenient(strategy),
            details: flag(details),
            refresh: flag(refresh),
        }
    }
}

fn flag(raw: Option<&str>) -> bool {
    raw == Some("true")
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheStatus {
    Hit,
    Miss,
}

impl CacheStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Hit => "HIT",
            Self::Miss => "MISS",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RequestState {
    Pending,
    Succeeded,
    Failed,
    Cancelled,
}

#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    pub summary_timeout: Duration,
    pub detail_timeout: Duration,
    pub retry_delay: Duration,
    /// When false every check fails with `Configuration` before any call.
    pub api_key_configured: bool,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self::from_service(&ServiceConfig::default())
    }
}

impl OrchestratorConfig {
    pub fn from_service(cfg: &ServiceConfig) -> Self {
        Self {
            summary_timeout: cfg.summary_timeout(),
            detail_timeout: cfg.detail_timeout(),
            retry_delay: cfg.detail_retry_delay(),
            // The fixture client needs no key.
            api_key_configured: cfg.has_api_key() || cfg.test_mode,
        }
    }

    fn timeout_for(&self, details: bool) -> Duration {
        if details {
            self.detail_timeout
        } else {
            self.summary_timeout
        }
    }
}

#[derive(Debug)]
struct InFlight {
    generation: u64,
    abort: Option<AbortHandle>,
    state: RequestState,
}

pub struct ScoreOrchestrator {
    api: DynAuditApi,
    cache: DynResultCache,
    submissions: DynSubmissionStore,
    cfg: OrchestratorConfig,
    inflight: Mutex<HashMap<RequestKey, InFlight>>,
    generations: AtomicU64,
}

impl ScoreOrchestrator {
    pub fn new(
        api: DynAuditApi,
        cache: DynResultCache,
        submissions: DynSubmissionStore,
        cfg: OrchestratorConfig,
    ) -> Self {
        Self {
            api,
            cache,
            submissions,
            cfg,
            inflight: Mutex::new(HashMap::new()),
            generations: AtomicU64::new(0),
        }
    }

    /// Production wiring: audit client per config, in-process TTL cache and
    /// bounded in-memory submission log.
    pub fn from_service_config(cfg: &ServiceConfig) -> anyhow::Result<Self> {
        let api = build_audit_api(cfg)?;
        let cache = Arc::new(TtlCache::new(cfg.detail_cache_ttl(), cfg.cache_capacity));
        let submissions = Arc::new(InMemorySubmissions::with_capacity(cfg.submissions_capacity));
        info!(
            target: "check",
            api = api.name(),
            cache_ttl_ms = cfg.detail_cache_ttl_ms,
            key_configured = cfg.has_api_key(),
            "score orchestrator ready"
        );
        Ok(Self::new(
            api,
            cache,
            submissions,
            OrchestratorConfig::from_service(cfg),
        ))
    }

    pub fn cache_ttl(&self) -> Duration {
        self.cache.ttl()
    }

    pub async fn check(&self, req: CheckRequest) -> Result<ScoreReport, CheckError> {
        self.check_with_status(req).await.map(|(report, _)| report)
    }

    /// Same as `check`, plus whether the report came from the cache.
    pub async fn check_with_status(
        &self,
        req: CheckRequest,
    ) -> Result<(ScoreReport, CacheStatus), CheckError> {
        let raw = req.url.trim();
        if raw.is_empty() {
            return Err(CheckError::InvalidInput(MSG_URL_REQUIRED.to_string()));
        }
        let url = normalize_url(raw);
        parse_canonical(&url)?;

        if !self.cfg.api_key_configured {
            warn!(target: "check", %url, "PageSpeed API key is not configured");
            return Err(CheckError::Configuration(
                "GOOGLE_PAGESPEED_API_KEY is not set".to_string(),
            ));
        }

        counter!("checks_total").increment(1);
        let key = RequestKey::new(url.clone(), req.strategy, req.details);

        // Summary results are cheap enough to always fetch fresh.
        if req.details && !req.refresh {
            if let Some(hit) = self.cache.get(&key).await {
                counter!("check_cache_hits_total").increment(1);
                debug!(target: "cache", %url, strategy = %req.strategy, "detail cache hit");
                return Ok((hit, CacheStatus::Hit));
            }
        }
        counter!("check_cache_misses_total").increment(1);

        let audit = AuditRequest {
            url: url.clone(),
            strategy: req.strategy,
            timeout: self.cfg.timeout_for(req.details),
        };
        let retry = req.details.then_some(self.cfg.retry_delay);
        let task = tokio::spawn(fetch(self.api.clone(), audit, retry));
        let generation = self.register(&key, task.abort_handle());
        let mut guard = AbortOnDrop {
            orchestrator: self,
            key: &key,
            generation,
            abort: task.abort_handle(),
            armed: true,
        };

        let outcome = match task.await {
            Ok(res) => res,
            Err(e) if e.is_cancelled() => Err(CheckError::Cancelled),
            Err(e) => Err(CheckError::upstream(format!("fetch task failed: {e}"))),
        };
        guard.armed = false;
        drop(guard);

        let outcome = if self.finish(&key, generation, &outcome) {
            outcome
        } else {
            // A newer request owns the key; its result is the one that counts.
            Err(CheckError::Cancelled)
        };

        let payload = match outcome {
            Ok(p) => p,
            Err(e) => {
                if e.is_cancellation_class() {
                    info!(target: "check", %url, strategy = %req.strategy, error = %e, "check did not complete");
                } else {
                    warn!(target: "check", %url, strategy = %req.strategy, error = %e, "check failed");
                }
                return Err(e);
            }
        };

        let report = build_report(url.clone(), req.strategy, req.details, payload);
        if req.details {
            self.cache.put(key, report.clone()).await;
        }
        record_in_background(self.submissions.clone(), url.clone());
        info!(
            target: "check",
            %url,
            strategy = %req.strategy,
            details = req.details,
            performance = report.scores.performance,
            "check succeeded"
        );
        Ok((report, CacheStatus::Miss))
    }

    /// Mobile and desktop concurrently. Each half keeps its own result.
    pub async fn check_both(&self, url: &str, details: bool, refresh: bool) -> DualOutcome {
        let make = |strategy| CheckRequest {
            url: url.to_string(),
            strategy,
            details,
            refresh,
        };
        let (mobile, desktop) = tokio::join!(
            self.check(make(Strategy::Mobile)),
            self.check(make(Strategy::Desktop))
        );
        DualOutcome { mobile, desktop }
    }

    /// State of the latest request seen for `key`.
    pub fn state(&self, key: &RequestKey) -> Option<RequestState> {
        self.lock_inflight().get(key).map(|f| f.state)
    }

    fn lock_inflight(&self) -> MutexGuard<'_, HashMap<RequestKey, InFlight>> {
        match self.inflight.lock() {
            Ok(g) => g,
            Err(poison) => poison.into_inner(),
        }
    }

    /// New generation for `key`; aborts whatever was still running for it.
    fn register(&self, key: &RequestKey, abort: AbortHandle) -> u64 {
        let generation = self.generations.fetch_add(1, Ordering::Relaxed) + 1;
        let mut map = self.lock_inflight();
        if map.len() >= INFLIGHT_PRUNE_AT {
            map.retain(|_, f| f.state == RequestState::Pending);
        }
        let previous = map.insert(
            key.clone(),
            InFlight {
                generation,
                abort: Some(abort),
                state: RequestState::Pending,
            },
        );
        if let Some(prev) = previous {
            if let Some(handle) = prev.abort {
                debug!(target: "check", url = %key.url, strategy = %key.strategy, superseded = prev.generation, "superseding in-flight check");
                handle.abort();
            }
        }
        generation
    }

    /// Caller went away before the fetch finished.
    fn abandon(&self, key: &RequestKey, generation: u64) {
        let mut map = self.lock_inflight();
        if let Some(entry) = map.get_mut(key) {
            if entry.generation == generation {
                entry.abort = None;
                entry.state = RequestState::Cancelled;
            }
        }
    }

    /// Record the terminal state. Returns false when `generation` was superseded.
    fn finish(
        &self,
        key: &RequestKey,
        generation: u64,
        outcome: &Result<PageSpeedResponse, CheckError>,
    ) -> bool {
        let mut map = self.lock_inflight();
        match map.get_mut(key) {
            Some(entry) if entry.generation == generation => {
                entry.abort = None;
                entry.state = match outcome {
                    Ok(_) => RequestState::Succeeded,
                    Err(CheckError::Cancelled) => RequestState::Cancelled,
                    Err(_) => RequestState::Failed,
                };
                true
            }
            _ => false,
        }
    }
}

/// Aborts the spawned fetch when the awaiting caller is dropped, e.g. on
/// client disconnect. Disarmed once the task has been joined.
struct AbortOnDrop<'a> {
    orchestrator: &'a ScoreOrchestrator,
    key: &'a RequestKey,
    generation: u64,
    abort: AbortHandle,
    armed: bool,
}

impl Drop for AbortOnDrop<'_> {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        self.abort.abort();
        self.orchestrator.abandon(self.key, self.generation);
        debug!(target: "check", url = %self.key.url, strategy = %self.key.strategy, "caller dropped, fetch aborted");
    }
}

fn build_report(
    url: String,
    strategy: Strategy,
    details: bool,
    payload: PageSpeedResponse,
) -> ScoreReport {
    let scores = ScoreSet::from_categories(&payload.lighthouse_result.categories);
    ScoreReport {
        url,
        scores,
        strategy,
        details: details.then(|| payload.into_details()),
    }
}

/// Runs inside the spawned task: one attempt, plus one more after `retry`
/// when the first failure is retryable.
async fn fetch(
    api: DynAuditApi,
    req: AuditRequest,
    retry: Option<Duration>,
) -> Result<PageSpeedResponse, CheckError> {
    match attempt(&api, req.clone()).await {
        Err(e) if e.is_retryable() => match retry {
            Some(delay) => {
                warn!(target: "check", url = %req.url, strategy = %req.strategy, error = %e, "retrying detailed check");
                tokio::time::sleep(delay).await;
                attempt(&api, req).await
            }
            None => Err(e),
        },
        other => other,
    }
}

async fn attempt(api: &DynAuditApi, req: AuditRequest) -> Result<PageSpeedResponse, CheckError> {
    let limit = req.timeout;
    match tokio::time::timeout(limit, api.run_pagespeed(req)).await {
        Ok(res) => res,
        Err(_) => {
            counter!("upstream_errors_total").increment(1);
            Err(CheckError::Timeout(limit))
        }
    }
}
