// src/error.rs
//! Error taxonomy for score checks and its HTTP mapping.

use std::time::Duration;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

pub const MSG_URL_REQUIRED: &str = "URL parameter is required";
pub const MSG_INVALID_URL: &str = "Invalid URL format";
pub const MSG_UPSTREAM_FAILED: &str =
    "Failed to check website performance. Please try again later.";
pub const MSG_NOT_CONFIGURED: &str = "Service is not configured. Please contact the site owner.";
pub const MSG_SUPERSEDED: &str = "Request was superseded by a newer check.";

#[derive(Debug, Clone, thiserror::Error)]
pub enum CheckError {
    /// Missing or malformed `url` input. The message is safe to show.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Operator-side problem, e.g. no PageSpeed API key.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Non-success status, transport failure or malformed body from PageSpeed.
    /// `detail` is for logs only.
    #[error("upstream error (status {status:?}): {detail}")]
    Upstream { status: Option<u16>, detail: String },

    #[error("upstream call timed out after {0:?}")]
    Timeout(Duration),

    /// A newer request for the same key aborted this one.
    #[error("request cancelled")]
    Cancelled,
}

impl CheckError {
    pub fn upstream_status(status: u16, detail: impl Into<String>) -> Self {
        Self::Upstream {
            status: Some(status),
            detail: detail.into(),
        }
    }

    pub fn upstream(detail: impl Into<String>) -> Self {
        Self::Upstream {
            status: None,
            detail: detail.into(),
        }
    }

    /// Timeouts, transport failures and upstream 5xx may succeed on a second try.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Timeout(_) => true,
            Self::Upstream { status: None, .. } => true,
            Self::Upstream {
                status: Some(code), ..
            } => *code >= 500,
            _ => false,
        }
    }

    /// Timeout and cancellation are expected outcomes, not crashes.
    pub fn is_cancellation_class(&self) -> bool {
        matches!(self, Self::Timeout(_) | Self::Cancelled)
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidInput(_) => StatusCode::BAD_REQUEST,
            Self::Cancelled => StatusCode::CONFLICT,
            Self::Configuration(_) | Self::Upstream { .. } | Self::Timeout(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// User-facing message. Never includes upstream bodies.
    pub fn public_message(&self) -> String {
        match self {
            Self::InvalidInput(msg) => msg.clone(),
            Self::Configuration(_) => MSG_NOT_CONFIGURED.to_string(),
            Self::Upstream { .. } | Self::Timeout(_) => MSG_UPSTREAM_FAILED.to_string(),
            Self::Cancelled => MSG_SUPERSEDED.to_string(),
        }
    }
}

impl IntoResponse for CheckError {
    fn into_response(self) -> Response {
        let body = Json(json!({ "message": self.public_message() }));
        (self.status_code(), body).into_response()
    }
}
