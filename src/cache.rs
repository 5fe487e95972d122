// src/cache.rs
//! Result cache for expensive detailed checks.
//!
//! Absolute TTL (no sliding refresh), whole-entry replacement, last successful
//! write for a key wins. Injected into the orchestrator as `Arc<dyn ResultCache>`
//! so tests and deployments can pick `NoopCache` or a shared backend.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use async_trait::async_trait;

use crate::pagespeed::Strategy;
use crate::report::ScoreReport;

/// Cache and in-flight bookkeeping key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RequestKey {
    pub url: String,
    pub strategy: Strategy,
    pub details: bool,
}

impl RequestKey {
    pub fn new(url: impl Into<String>, strategy: Strategy, details: bool) -> Self {
        Self {
            url: url.into(),
            strategy,
            details,
        }
    }
}

#[async_trait]
pub trait ResultCache: Send + Sync {
    async fn get(&self, key: &RequestKey) -> Option<ScoreReport>;
    async fn put(&self, key: RequestKey, value: ScoreReport);
    async fn invalidate(&self, key: &RequestKey);
    fn ttl(&self) -> Duration;
}

pub type DynResultCache = Arc<dyn ResultCache>;

/// Never stores anything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopCache;

#[async_trait]
impl ResultCache for NoopCache {
    async fn get(&self, _key: &RequestKey) -> Option<ScoreReport> {
        None
    }
    async fn put(&self, _key: RequestKey, _value: ScoreReport) {}
    async fn invalidate(&self, _key: &RequestKey) {}
    fn ttl(&self) -> Duration {
        Duration::ZERO
    }
}

#[derive(Debug)]
struct Entry {
    value: ScoreReport,
    expires_at: Instant,
}

/// In-process map with a hard cap; expired entries are purged lazily and on
/// every insert, then the entry closest to expiry goes first.
#[derive(Debug)]
pub struct TtlCache {
    inner: Mutex<HashMap<RequestKey, Entry>>,
    ttl: Duration,
    cap: usize,
}

impl TtlCache {
    pub fn new(ttl: Duration, cap: usize) -> Self {
        Self {
            inner: Mutex::new(HashMap::new()),
            ttl,
            cap: cap.max(1),
        }
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<RequestKey, Entry>> {
        match self.inner.lock() {
            Ok(g) => g,
            Err(poison) => poison.into_inner(),
        }
    }
}

#[async_trait]
impl ResultCache for TtlCache {
    async fn get(&self, key: &RequestKey) -> Option<ScoreReport> {
        let mut map = self.lock();
        let now = Instant::now();
        match map.get(key).map(|e| e.expires_at > now) {
            Some(true) => map.get(key).map(|e| e.value.clone()),
            Some(false) => {
                map.remove(key);
                None
            }
            None => None,
        }
    }

    async fn put(&self, key: RequestKey, value: ScoreReport) {
        if self.ttl.is_zero() {
            return;
        }
        let now = Instant::now();
        let mut map = self.lock();
        map.retain(|_, e| e.expires_at > now);
        if map.len() >= self.cap && !map.contains_key(&key) {
            if let Some(oldest) = map
                .iter()
                .min_by_key(|(_, e)| e.expires_at)
                .map(|(k, _)| k.clone())
            {
                map.remove(&oldest);
            }
        }
        map.insert(
            key,
            Entry {
                value,
                expires_at: now + self.ttl,
            },
        );
    }

    async fn invalidate(&self, key: &RequestKey) {
        self.lock().remove(key);
    }

    fn ttl(&self) -> Duration {
        self.ttl
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scores::ScoreSet;

    fn report(url: &str, perf: u8) -> ScoreReport {
        ScoreReport {
            url: url.into(),
            scores: ScoreSet {
                performance: perf,
                ..Default::default()
            },
            strategy: Strategy::Desktop,
            details: None,
        }
    }

    fn key(url: &str) -> RequestKey {
        RequestKey::new(url, Strategy::Desktop, true)
    }

    #[tokio::test]
    async fn hit_within_ttl_miss_after() {
        let cache = TtlCache::new(Duration::from_millis(40), 16);
        cache.put(key("https://a"), report("https://a", 10)).await;
        assert_eq!(cache.get(&key("https://a")).await.unwrap().scores.performance, 10);

        tokio::time::sleep(Duration::from_millis(200)).await;
        assert!(cache.get(&key("https://a")).await.is_none());
        assert!(cache.is_empty());
    }

    #[tokio::test]
    async fn last_write_wins_and_keys_are_distinct() {
        let cache = TtlCache::new(Duration::from_secs(60), 16);
        cache.put(key("https://a"), report("https://a", 10)).await;
        cache.put(key("https://a"), report("https://a", 20)).await;
        assert_eq!(cache.get(&key("https://a")).await.unwrap().scores.performance, 20);

        let mobile = RequestKey::new("https://a", Strategy::Mobile, true);
        let summary = RequestKey::new("https://a", Strategy::Desktop, false);
        assert!(cache.get(&mobile).await.is_none());
        assert!(cache.get(&summary).await.is_none());
    }

    #[tokio::test]
    async fn cap_evicts_closest_to_expiry() {
        let cache = TtlCache::new(Duration::from_secs(60), 2);
        cache.put(key("https://a"), report("https://a", 1)).await;
        tokio::time::sleep(Duration::from_millis(5)).await;
        cache.put(key("https://b"), report("https://b", 2)).await;
        tokio::time::sleep(Duration::from_millis(5)).await;
        cache.put(key("https://c"), report("https://c", 3)).await;

        assert_eq!(cache.len(), 2);
        assert!(cache.get(&key("https://a")).await.is_none());
        assert!(cache.get(&key("https://c")).await.is_some());
    }

    #[tokio::test]
    async fn invalidate_and_noop() {
        let cache = TtlCache::new(Duration::from_secs(60), 4);
        cache.put(key("https://a"), report("https://a", 1)).await;
        cache.invalidate(&key("https://a")).await;
        assert!(cache.get(&key("https://a")).await.is_none());

        let noop = NoopCache;
        noop.put(key("https://a"), report("https://a", 1)).await;
        assert!(noop.get(&key("https://a")).await.is_none());
        assert_eq!(noop.ttl(), Duration::ZERO);
    }
}
