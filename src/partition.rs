// src/partition.rs
//! Splits a category's audits into the three display buckets.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::pagespeed::{Audit, Category, DetailPayload};

/// Scores at or above this pass.
pub const PASS_THRESHOLD: f64 = 0.9;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AuditBucket {
    Opportunities,
    Diagnostics,
    Passed,
}

/// Audits per bucket, each list in `auditRefs` order.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct AuditPartition<'a> {
    pub opportunities: Vec<&'a Audit>,
    pub diagnostics: Vec<&'a Audit>,
    pub passed: Vec<&'a Audit>,
}

impl AuditPartition<'_> {
    pub fn len(&self) -> usize {
        self.opportunities.len() + self.diagnostics.len() + self.passed.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Bucket for a single audit. `null` scores count as failing.
pub fn classify(audit: &Audit) -> AuditBucket {
    match audit.score {
        Some(s) if s >= PASS_THRESHOLD => AuditBucket::Passed,
        _ if audit.has_time_savings() => AuditBucket::Opportunities,
        _ => AuditBucket::Diagnostics,
    }
}

/// Refs missing from `audits` are skipped.
pub fn partition_audits<'a>(
    category: &Category,
    audits: &'a BTreeMap<String, Audit>,
) -> AuditPartition<'a> {
    let mut out = AuditPartition::default();
    for r in &category.audit_refs {
        let Some(audit) = audits.get(&r.id) else {
            continue;
        };
        match classify(audit) {
            AuditBucket::Opportunities => out.opportunities.push(audit),
            AuditBucket::Diagnostics => out.diagnostics.push(audit),
            AuditBucket::Passed => out.passed.push(audit),
        }
    }
    out
}

/// Every category of a detailed report, keyed like `details.categories`.
pub fn partition_all(details: &DetailPayload) -> BTreeMap<&str, AuditPartition<'_>> {
    details
        .categories
        .iter()
        .map(|(key, cat)| (key.as_str(), partition_audits(cat, &details.audits)))
        .collect()
}
