// src/url_normalizer.rs
//! Turns free-text user input into one canonical absolute URL.
//!
//! The canonical form is always `https://`, has a lower-cased host and no trailing
//! slash. It doubles as the cache/lookup key for a check, so `normalize_url` is
//! idempotent and never fails: unparseable input degrades to a best-effort
//! `https://<host-ish>` string instead.

use once_cell::sync::Lazy;
use regex::Regex;
use url::Url;

use crate::error::{CheckError, MSG_INVALID_URL};

const HTTPS: &str = "https://";
const HTTP: &str = "http://";

/// Bare domain such as `kerit.com.ru` (labels of 1-63 chars, no leading/trailing `-`).
static DOMAIN_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[a-zA-Z0-9]([a-zA-Z0-9-]{0,61}[a-zA-Z0-9])?(\.[a-zA-Z0-9]([a-zA-Z0-9-]{0,61}[a-zA-Z0-9])?)*$")
        .expect("domain regex")
});

/// Canonicalize user input. See module docs for the guarantees.
pub fn normalize_url(input: &str) -> String {
    let trimmed = input.trim();
    let without_slash = trimmed.trim_end_matches('/');
    let secure = format!("{HTTPS}{}", strip_scheme(without_slash));

    match Url::parse(&secure) {
        // The parser already lower-cases hosts of special schemes like https.
        Ok(mut parsed) => {
            if parsed.path().is_empty() || parsed.path() == "/" {
                parsed.set_path("");
            }
            let serialized = parsed.to_string();
            match serialized.strip_suffix('/') {
                Some(s) => s.to_string(),
                None => serialized,
            }
        }
        Err(_) => fallback(trimmed),
    }
}

/// Strict companion of [`normalize_url`] used at the request boundary: the
/// canonical string must parse as an absolute URL with a host.
pub fn parse_canonical(canonical: &str) -> Result<Url, CheckError> {
    let invalid = || CheckError::InvalidInput(MSG_INVALID_URL.to_string());
    let parsed = Url::parse(canonical).map_err(|_| invalid())?;
    match parsed.host_str() {
        Some(h) if !h.is_empty() => Ok(parsed),
        _ => Err(invalid()),
    }
}

/// Validation for the `website` field of the lead-capture contact form that is
/// offered when a report needs help. Not used by `/api/check`, which accepts any
/// input `normalize_url` can turn into a URL with a host.
///
/// Accepts either an `http(s)://` URL that parses, or a bare domain name with
/// at least one valid label.
pub fn is_valid_website(input: &str) -> bool {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return false;
    }
    if has_prefix_ci(trimmed, HTTP) || has_prefix_ci(trimmed, HTTPS) {
        return Url::parse(trimmed).is_ok();
    }
    DOMAIN_RE.is_match(trimmed)
}

/// Parse failed: drop any scheme, keep everything before the first `/`.
fn fallback(trimmed: &str) -> String {
    let rest = strip_scheme(trimmed);
    let host_part = rest.split('/').next().unwrap_or_default();
    format!("{HTTPS}{host_part}")
}

/// Removes a leading `http://` or `https://` (any case). Other schemes are kept
/// as part of the string, so `ftp://x` becomes `https://ftp://x` and then falls
/// through to the fallback path.
fn strip_scheme(s: &str) -> &str {
    if has_prefix_ci(s, HTTPS) {
        &s[HTTPS.len()..]
    } else if has_prefix_ci(s, HTTP) {
        &s[HTTP.len()..]
    } else {
        s
    }
}

fn has_prefix_ci(s: &str, prefix: &str) -> bool {
    s.len() >= prefix.len()
        && s.is_char_boundary(prefix.len())
        && s[..prefix.len()].eq_ignore_ascii_case(prefix)
}
