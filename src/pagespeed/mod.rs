// src/pagespeed/mod.rs
//! PageSpeed Insights boundary: typed payload, the `AuditApi` seam, the real
//! reqwest client and a fixture client for local runs.

pub mod client;
pub mod fixture;
pub mod types;

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

pub use client::{build_audit_api, AuditApi, DynAuditApi, PageSpeedClient};
pub use fixture::FixtureAuditApi;
pub use types::{Audit, AuditRef, Category, DetailPayload, PageSpeedResponse};

/// Device profile the audit simulates.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Strategy {
    Mobile,
    #[default]
    Desktop,
}

impl Strategy {
    /// Only the literal `mobile` selects mobile; anything else, including
    /// `None`, is desktop.
    pub fn parse_lenient(raw: Option<&str>) -> Self {
        match raw {
            Some("mobile") => Self::Mobile,
            _ => Self::Desktop,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Mobile => "mobile",
            Self::Desktop => "desktop",
        }
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One outbound audit call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuditRequest {
    pub url: String,
    pub strategy: Strategy,
    pub timeout: Duration,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strategy_defaults_to_desktop() {
        assert_eq!(Strategy::parse_lenient(Some("mobile")), Strategy::Mobile);
        assert_eq!(Strategy::parse_lenient(Some("desktop")), Strategy::Desktop);
        assert_eq!(Strategy::parse_lenient(Some("Mobile")), Strategy::Desktop);
        assert_eq!(Strategy::parse_lenient(Some("tablet")), Strategy::Desktop);
        assert_eq!(Strategy::parse_lenient(None), Strategy::Desktop);
    }
}
