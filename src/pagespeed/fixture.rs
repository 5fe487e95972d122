// src/pagespeed/fixture.rs
//! Deterministic stand-in for PageSpeed, selected with `PAGESPEED_TEST_MODE=mock`.
//! Lets the site and its tests run without an API key or network.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use async_trait::async_trait;
use serde_json::json;

use super::client::AuditApi;
use super::types::PageSpeedResponse;
use super::{AuditRequest, Strategy};
use crate::error::CheckError;

#[derive(Debug, Clone, Default)]
pub struct FixtureAuditApi;

impl FixtureAuditApi {
    /// Same url + strategy always yields the same payload; mobile scores lower.
    pub fn payload_for(url: &str, strategy: Strategy) -> PageSpeedResponse {
        let mut hasher = DefaultHasher::new();
        url.hash(&mut hasher);
        let h = hasher.finish();
        let penalty = match strategy {
            Strategy::Mobile => 0.15,
            Strategy::Desktop => 0.0,
        };
        let frac = |shift: u32| {
            let base = 0.5 + ((h >> shift) % 50) as f64 / 100.0;
            ((base - penalty) * 100.0).round() / 100.0
        };

        let body = json!({
            "lighthouseResult": {
                "categories": {
                    "performance": {
                        "id": "performance",
                        "title": "Performance",
                        "description": "",
                        "score": frac(0),
                        "auditRefs": [
                            {"id": "render-blocking-resources", "weight": 0, "group": "load-opportunities"},
                            {"id": "mainthread-work-breakdown", "weight": 0, "group": "diagnostics"},
                            {"id": "first-contentful-paint", "weight": 10, "group": "metrics"}
                        ]
                    },
                    "seo": {"id": "seo", "title": "SEO", "description": "", "score": frac(8), "auditRefs": [
                        {"id": "document-title", "weight": 1}
                    ]},
                    "accessibility": {"id": "accessibility", "title": "Accessibility", "description": "", "score": frac(16), "auditRefs": []},
                    "best-practices": {"id": "best-practices", "title": "Best Practices", "description": "", "score": frac(24), "auditRefs": []}
                },
                "audits": {
                    "render-blocking-resources": {
                        "id": "render-blocking-resources",
                        "title": "Eliminate render-blocking resources",
                        "description": "",
                        "score": 0.4,
                        "displayValue": "Potential savings of 350 ms",
                        "details": {"type": "opportunity", "items": [
                            {"url": format!("{url}/styles.css"), "totalBytes": 18000, "wastedMs": 350}
                        ]}
                    },
                    "mainthread-work-breakdown": {
                        "id": "mainthread-work-breakdown",
                        "title": "Minimize main-thread work",
                        "description": "",
                        "score": 0.5,
                        "displayValue": "2.4 s",
                        "details": {"type": "table", "items": []}
                    },
                    "first-contentful-paint": {
                        "id": "first-contentful-paint",
                        "title": "First Contentful Paint",
                        "description": "",
                        "score": 0.98,
                        "displayValue": "0.8 s"
                    },
                    "document-title": {
                        "id": "document-title",
                        "title": "Document has a `<title>` element",
                        "description": "",
                        "score": 1
                    }
                }
            }
        });
        // The literal above always matches the schema.
        serde_json::from_value(body).unwrap_or_default()
    }
}

#[async_trait]
impl AuditApi for FixtureAuditApi {
    async fn run_pagespeed(&self, req: AuditRequest) -> Result<PageSpeedResponse, CheckError> {
        Ok(Self::payload_for(&req.url, req.strategy))
    }

    fn name(&self) -> &'static str {
        "fixture"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scores::ScoreSet;

    #[test]
    fn fixture_is_deterministic_and_mobile_is_lower() {
        let a = FixtureAuditApi::payload_for("https://example.com", Strategy::Desktop);
        let b = FixtureAuditApi::payload_for("https://example.com", Strategy::Desktop);
        assert_eq!(a, b);

        let m = FixtureAuditApi::payload_for("https://example.com", Strategy::Mobile);
        let ds = ScoreSet::from_categories(&a.lighthouse_result.categories);
        let ms = ScoreSet::from_categories(&m.lighthouse_result.categories);
        assert!(ms.performance < ds.performance);
        assert!(ds.performance >= 50 && ds.performance <= 99);
        assert_eq!(a.lighthouse_result.audits.len(), 4);
    }
}
