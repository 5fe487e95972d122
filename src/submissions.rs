// src/submissions.rs
//! Record of checked URLs, handed to the persistence collaborator.
//! Recording is fire-and-forget: it never fails or delays a check.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use metrics::counter;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UrlSubmission {
    pub url: String,
    pub submitted_at: DateTime<Utc>,
}

impl UrlSubmission {
    pub fn now(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            submitted_at: Utc::now(),
        }
    }
}

#[async_trait]
pub trait SubmissionStore: Send + Sync + 'static {
    async fn create_url_submission(&self, submission: UrlSubmission) -> anyhow::Result<()>;
}

pub type DynSubmissionStore = Arc<dyn SubmissionStore>;

/// Spawn the write and return immediately. Errors are logged and counted.
pub fn record_in_background(store: DynSubmissionStore, url: String) {
    tokio::spawn(async move {
        match store.create_url_submission(UrlSubmission::now(url.clone())).await {
            Ok(()) => debug!(target: "submissions", %url, "url submission recorded"),
            Err(e) => {
                counter!("submissions_failed_total").increment(1);
                warn!(target: "submissions", %url, error = %e, "failed to record url submission");
            }
        }
    });
}

/// Bounded in-memory store; the oldest entries drop off once `cap` is reached.
#[derive(Debug)]
pub struct InMemorySubmissions {
    inner: Mutex<Vec<UrlSubmission>>,
    cap: usize,
}

impl InMemorySubmissions {
    pub fn with_capacity(cap: usize) -> Self {
        Self {
            inner: Mutex::new(Vec::with_capacity(cap.min(10_000))),
            cap: cap.clamp(1, 10_000),
        }
    }

    pub fn snapshot_last_n(&self, n: usize) -> Vec<UrlSubmission> {
        let v = self.inner.lock().unwrap_or_else(|p| p.into_inner());
        let start = v.len().saturating_sub(n);
        v[start..].to_vec()
    }
}

#[async_trait]
impl SubmissionStore for InMemorySubmissions {
    async fn create_url_submission(&self, submission: UrlSubmission) -> anyhow::Result<()> {
        let mut v = self.inner.lock().unwrap_or_else(|p| p.into_inner());
        v.push(submission);
        if v.len() > self.cap {
            let excess = v.len() - self.cap;
            v.drain(0..excess);
        }
        Ok(())
    }
}
