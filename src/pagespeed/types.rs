// src/pagespeed/types.rs
//! Typed view of the PageSpeed Insights v5 response.
//!
//! Only the fields the service reasons about are named; everything else the
//! upstream sends on categories, audits and detail items is kept in `extra` so the
//! detailed report can pass the payload through unchanged.

use std::collections::BTreeMap;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

use crate::error::CheckError;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageSpeedResponse {
    pub lighthouse_result: LighthouseResult,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub loading_experience: Option<Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LighthouseResult {
    pub categories: BTreeMap<String, Category>,
    #[serde(default)]
    pub audits: BTreeMap<String, Audit>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Category {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub score: Option<f64>,
    #[serde(default)]
    pub audit_refs: Vec<AuditRef>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AuditRef {
    pub id: String,
    #[serde(default)]
    pub weight: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Audit {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: String,
    /// `null` for informative / not-applicable audits.
    #[serde(default)]
    pub score: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_value: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<AuditDetails>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AuditDetails {
    #[serde(
        default,
        deserialize_with = "lenient_items",
        skip_serializing_if = "Option::is_none"
    )]
    pub items: Option<Vec<AuditItem>>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditItem {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wasted_bytes: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wasted_ms: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_bytes: Option<f64>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// The detailed half of a report: categories and audits as received.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DetailPayload {
    pub categories: BTreeMap<String, Category>,
    pub audits: BTreeMap<String, Audit>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub loading_experience: Option<Value>,
}

impl PageSpeedResponse {
    /// Boundary parse: anything without `lighthouseResult.categories` is an
    /// upstream error, not a half-empty report.
    pub fn from_slice(bytes: &[u8]) -> Result<Self, CheckError> {
        serde_json::from_slice(bytes)
            .map_err(|e| CheckError::upstream(format!("malformed PageSpeed payload: {e}")))
    }

    pub fn into_details(self) -> DetailPayload {
        DetailPayload {
            categories: self.lighthouse_result.categories,
            audits: self.lighthouse_result.audits,
            loading_experience: self.loading_experience,
        }
    }
}

impl Audit {
    /// True when at least one detail item reports positive `wastedMs`.
    pub fn has_time_savings(&self) -> bool {
        self.details
            .as_ref()
            .and_then(|d| d.items.as_ref())
            .map(|items| {
                items
                    .iter()
                    .any(|it| it.wasted_ms.is_some_and(|ms| ms > 0.0))
            })
            .unwrap_or(false)
    }
}

/// Detail `items` come in many shapes across audit types. Items that are not
/// objects are dropped instead of failing the whole payload.
fn lenient_items<'de, D>(deserializer: D) -> Result<Option<Vec<AuditItem>>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<Value> = Option::deserialize(deserializer)?;
    let Some(Value::Array(values)) = raw else {
        return Ok(None);
    };
    let items = values
        .into_iter()
        .filter_map(|v| serde_json::from_value::<AuditItem>(v).ok())
        .collect();
    Ok(Some(items))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_minimal_payload_and_keeps_unknown_fields() {
        let body = json!({
            "lighthouseResult": {
                "categories": {
                    "performance": {
                        "id": "performance",
                        "title": "Performance",
                        "score": 0.5,
                        "manualDescription": "kept",
                        "auditRefs": [{"id": "unused-javascript", "weight": 0, "group": "load-opportunities"}]
                    }
                },
                "audits": {
                    "unused-javascript": {
                        "id": "unused-javascript",
                        "title": "Reduce unused JavaScript",
                        "score": 0.3,
                        "numericValue": 450.5,
                        "details": {
                            "type": "opportunity",
                            "items": [{"url": "https://a/x.js", "wastedMs": 120, "wastedPercent": 40}]
                        }
                    }
                }
            },
            "loadingExperience": {"id": "https://example.com"}
        });
        let bytes = serde_json::to_vec(&body).unwrap();
        let parsed = PageSpeedResponse::from_slice(&bytes).unwrap();

        let perf = &parsed.lighthouse_result.categories["performance"];
        assert_eq!(perf.extra["manualDescription"], "kept");
        assert_eq!(perf.audit_refs[0].group.as_deref(), Some("load-opportunities"));

        let audit = &parsed.lighthouse_result.audits["unused-javascript"];
        assert!(audit.has_time_savings());
        assert_eq!(audit.extra["numericValue"], 450.5);

        let round = serde_json::to_value(parsed.into_details()).unwrap();
        assert_eq!(
            round["audits"]["unused-javascript"]["details"]["items"][0]["wastedPercent"],
            40
        );
        assert_eq!(round["loadingExperience"]["id"], "https://example.com");
    }

    #[test]
    fn missing_lighthouse_result_is_upstream_error() {
        let err = PageSpeedResponse::from_slice(br#"{"error":{"code":500}}"#).unwrap_err();
        assert!(matches!(err, CheckError::Upstream { status: None, .. }));
        assert!(PageSpeedResponse::from_slice(b"not json").is_err());
    }

    #[test]
    fn null_scores_and_odd_items_are_tolerated() {
        let body = json!({
            "lighthouseResult": {
                "categories": {"seo": {"score": null}},
                "audits": {
                    "a": {"score": null, "details": {"items": [1, "x", {"wastedMs": 0}]}},
                    "b": {"score": 1, "details": {"items": "not-a-list"}}
                }
            }
        });
        let parsed = PageSpeedResponse::from_slice(&serde_json::to_vec(&body).unwrap()).unwrap();
        let audits = &parsed.lighthouse_result.audits;
        assert_eq!(audits["a"].details.as_ref().unwrap().items.as_ref().unwrap().len(), 1);
        assert!(!audits["a"].has_time_savings());
        assert!(audits["b"].details.as_ref().unwrap().items.is_none());
        assert_eq!(parsed.lighthouse_result.categories["seo"].score, None);
    }
}
