// src/report.rs
//! Report shapes returned by the orchestrator and serialized by the API.

use serde::{Deserialize, Serialize};

use crate::error::CheckError;
use crate::pagespeed::{DetailPayload, Strategy};
use crate::scores::ScoreSet;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoreReport {
    pub url: String,
    pub scores: ScoreSet,
    pub strategy: Strategy,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<DetailPayload>,
}

/// Outcome of a dual (mobile + desktop) check. Each half is independent; only
/// `DualState::BothSucceeded` counts as success.
#[derive(Debug)]
pub struct DualOutcome {
    pub mobile: Result<ScoreReport, CheckError>,
    pub desktop: Result<ScoreReport, CheckError>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DualState {
    BothSucceeded,
    MobileFailed,
    DesktopFailed,
    BothFailed,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DualReport {
    pub url: String,
    pub mobile: ScoreReport,
    pub desktop: ScoreReport,
    pub needs_help: bool,
}

impl DualOutcome {
    pub fn state(&self) -> DualState {
        match (self.mobile.is_ok(), self.desktop.is_ok()) {
            (true, true) => DualState::BothSucceeded,
            (false, true) => DualState::MobileFailed,
            (true, false) => DualState::DesktopFailed,
            (false, false) => DualState::BothFailed,
        }
    }

    /// Combined view. A single failing strategy fails the whole report; the other
    /// strategy is never substituted. Mobile's error wins when both failed.
    pub fn into_report(self) -> Result<DualReport, CheckError> {
        let mobile = self.mobile?;
        let desktop = self.desktop?;
        let needs_help = mobile.scores.needs_help() || desktop.scores.needs_help();
        Ok(DualReport {
            url: desktop.url.clone(),
            mobile,
            desktop,
            needs_help,
        })
    }
}
