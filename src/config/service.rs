// src/config/service.rs
use anyhow::{anyhow, Context};
use serde::Deserialize;
use std::{env, fs, path::Path, path::PathBuf, time::Duration};

pub const DEFAULT_CONFIG_PATH: &str = "config/maxmetrics.toml";
pub const ENV_CONFIG_PATH: &str = "MAXMETRICS_CONFIG_PATH";
pub const ENV_API_KEY: &str = "GOOGLE_PAGESPEED_API_KEY";

const ENV_BASE_URL: &str = "PAGESPEED_BASE_URL";
const ENV_SUMMARY_TIMEOUT_MS: &str = "PAGESPEED_SUMMARY_TIMEOUT_MS";
const ENV_DETAIL_TIMEOUT_MS: &str = "PAGESPEED_DETAIL_TIMEOUT_MS";
const ENV_CACHE_TTL_MS: &str = "DETAIL_CACHE_TTL_MS";
const ENV_RETRY_DELAY_MS: &str = "DETAIL_RETRY_DELAY_MS";
const ENV_TEST_MODE: &str = "PAGESPEED_TEST_MODE";
const ENV_METRICS_ROUTES: &str = "METRICS_ROUTES";

fn default_base_url() -> String {
    "https://www.googleapis.com/pagespeedonline/v5".to_string()
}
fn default_summary_timeout_ms() -> u64 {
    60_000
}
fn default_detail_timeout_ms() -> u64 {
    90_000
}
fn default_cache_ttl_ms() -> u64 {
    300_000
}
fn default_retry_delay_ms() -> u64 {
    1_000
}
fn default_cache_capacity() -> usize {
    256
}
fn default_submissions_capacity() -> usize {
    2_000
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServiceConfig {
    /// Only ever read from `GOOGLE_PAGESPEED_API_KEY`, never from the file.
    #[serde(skip)]
    pub api_key: Option<String>,
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_summary_timeout_ms")]
    pub summary_timeout_ms: u64,
    /// Detailed analysis is upstream-expensive, so it gets a longer bound.
    #[serde(default = "default_detail_timeout_ms")]
    pub detail_timeout_ms: u64,
    #[serde(default = "default_cache_ttl_ms")]
    pub detail_cache_ttl_ms: u64,
    #[serde(default = "default_retry_delay_ms")]
    pub detail_retry_delay_ms: u64,
    #[serde(default = "default_cache_capacity")]
    pub cache_capacity: usize,
    #[serde(default = "default_submissions_capacity")]
    pub submissions_capacity: usize,
    /// "mock" in `PAGESPEED_TEST_MODE` swaps in the fixture client.
    #[serde(default)]
    pub test_mode: bool,
    #[serde(default)]
    pub metrics_routes: bool,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: default_base_url(),
            summary_timeout_ms: default_summary_timeout_ms(),
            detail_timeout_ms: default_detail_timeout_ms(),
            detail_cache_ttl_ms: default_cache_ttl_ms(),
            detail_retry_delay_ms: default_retry_delay_ms(),
            cache_capacity: default_cache_capacity(),
            submissions_capacity: default_submissions_capacity(),
            test_mode: false,
            metrics_routes: false,
        }
    }
}

impl ServiceConfig {
    /// Resolve config:
    /// 1) $MAXMETRICS_CONFIG_PATH (must exist)
    /// 2) config/maxmetrics.toml if present
    /// 3) built-in defaults
    ///
    /// Environment overrides are applied last in every case.
    pub fn load() -> anyhow::Result<Self> {
        let mut cfg = if let Ok(p) = env::var(ENV_CONFIG_PATH) {
            let pb = PathBuf::from(p);
            if !pb.exists() {
                return Err(anyhow!("{ENV_CONFIG_PATH} points to non-existent path"));
            }
            Self::load_from_file(&pb)?
        } else {
            let default_p = PathBuf::from(DEFAULT_CONFIG_PATH);
            if default_p.exists() {
                Self::load_from_file(&default_p)?
            } else {
                Self::default()
            }
        };
        cfg.apply_env();
        Ok(cfg)
    }

    pub fn load_from_file(path: &Path) -> anyhow::Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("reading service config from {}", path.display()))?;
        Self::from_toml_str(&content)
            .with_context(|| format!("parsing service config at {}", path.display()))
    }

    pub fn from_toml_str(s: &str) -> anyhow::Result<Self> {
        let mut cfg: ServiceConfig = toml::from_str(s)?;
        cfg.sanitize();
        Ok(cfg)
    }

    /// Env wins over file values. Unparseable numbers keep the previous value.
    pub fn apply_env(&mut self) {
        self.api_key = env::var(ENV_API_KEY)
            .ok()
            .map(|k| k.trim().to_string())
            .filter(|k| !k.is_empty());
        if let Ok(v) = env::var(ENV_BASE_URL) {
            if !v.trim().is_empty() {
                self.base_url = v.trim().to_string();
            }
        }
        override_u64(&mut self.summary_timeout_ms, ENV_SUMMARY_TIMEOUT_MS);
        override_u64(&mut self.detail_timeout_ms, ENV_DETAIL_TIMEOUT_MS);
        override_u64(&mut self.detail_cache_ttl_ms, ENV_CACHE_TTL_MS);
        override_u64(&mut self.detail_retry_delay_ms, ENV_RETRY_DELAY_MS);
        if let Ok(v) = env::var(ENV_TEST_MODE) {
            self.test_mode = v.trim().eq_ignore_ascii_case("mock");
        }
        if let Ok(v) = env::var(ENV_METRICS_ROUTES) {
            self.metrics_routes = v.trim() == "1";
        }
        self.sanitize();
    }

    fn sanitize(&mut self) {
        if self.summary_timeout_ms == 0 {
            self.summary_timeout_ms = default_summary_timeout_ms();
        }
        if self.detail_timeout_ms == 0 {
            self.detail_timeout_ms = default_detail_timeout_ms();
        }
        if self.cache_capacity == 0 {
            self.cache_capacity = default_cache_capacity();
        }
        if self.submissions_capacity == 0 {
            self.submissions_capacity = default_submissions_capacity();
        }
    }

    pub fn has_api_key(&self) -> bool {
        self.api_key.is_some()
    }

    pub fn summary_timeout(&self) -> Duration {
        Duration::from_millis(self.summary_timeout_ms)
    }

    pub fn detail_timeout(&self) -> Duration {
        Duration::from_millis(self.detail_timeout_ms)
    }

    pub fn detail_cache_ttl(&self) -> Duration {
        Duration::from_millis(self.detail_cache_ttl_ms)
    }

    pub fn detail_retry_delay(&self) -> Duration {
        Duration::from_millis(self.detail_retry_delay_ms)
    }
}

fn override_u64(slot: &mut u64, key: &str) {
    if let Some(v) = env::var(key).ok().and_then(|s| s.trim().parse::<u64>().ok()) {
        *slot = v;
    }
}
