// src/scores.rs
//! Category scores: 0–1 upstream fractions turned into 0–100 integers, plus the
//! traffic-light status used to decide whether to offer expert help.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::pagespeed::types::Category;

pub const KEY_PERFORMANCE: &str = "performance";
pub const KEY_SEO: &str = "seo";
pub const KEY_ACCESSIBILITY: &str = "accessibility";
pub const KEY_BEST_PRACTICES: &str = "best-practices";

/// All four categories, in the order the audit API is asked for them.
pub const CATEGORY_KEYS: [&str; 4] = [
    KEY_PERFORMANCE,
    KEY_SEO,
    KEY_ACCESSIBILITY,
    KEY_BEST_PRACTICES,
];

pub const GOOD_THRESHOLD: u8 = 80;
pub const FAIR_THRESHOLD: u8 = 60;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoreSet {
    pub performance: u8,
    pub seo: u8,
    pub accessibility: u8,
    pub best_practices: u8,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScoreStatus {
    Good,
    Fair,
    Poor,
}

impl ScoreStatus {
    pub fn of(score: u8) -> Self {
        if score >= GOOD_THRESHOLD {
            Self::Good
        } else if score >= FAIR_THRESHOLD {
            Self::Fair
        } else {
            Self::Poor
        }
    }
}

/// `round(raw * 100)`; `None` counts as 0. Out-of-contract values are clamped
/// into [0,1] first so the result always fits [0,100].
pub fn to_percent(raw: Option<f64>) -> u8 {
    let s = raw.filter(|v| v.is_finite()).unwrap_or(0.0).clamp(0.0, 1.0);
    (s * 100.0).round() as u8
}

impl ScoreSet {
    /// Missing categories count as 0.
    pub fn from_categories(categories: &BTreeMap<String, Category>) -> Self {
        let pct = |key: &str| to_percent(categories.get(key).and_then(|c| c.score));
        Self {
            performance: pct(KEY_PERFORMANCE),
            seo: pct(KEY_SEO),
            accessibility: pct(KEY_ACCESSIBILITY),
            best_practices: pct(KEY_BEST_PRACTICES),
        }
    }

    pub fn as_array(&self) -> [(&'static str, u8); 4] {
        [
            (KEY_PERFORMANCE, self.performance),
            (KEY_SEO, self.seo),
            (KEY_ACCESSIBILITY, self.accessibility),
            (KEY_BEST_PRACTICES, self.best_practices),
        ]
    }

    pub fn worst(&self) -> u8 {
        self.as_array().iter().map(|(_, v)| *v).min().unwrap_or(0)
    }

    /// Lead capture is offered when any category is below "good".
    pub fn needs_help(&self) -> bool {
        ScoreStatus::of(self.worst()) != ScoreStatus::Good
    }
}
