//! Credential extraction.
//!
//! Pure helpers that turn whatever a page sends to Supabase (a request URL,
//! an `apikey`/`authorization` header, an `accept-profile` header) into the
//! pieces of a [`Connection`](crate::types::Connection).
//!
//! None of these functions fail loudly: anything that cannot be decoded is
//! reported as absent.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use regex::Regex;
use serde_json::Value;
use std::sync::LazyLock;
use tracing::trace;

/// Hosted Supabase domain.
pub const VENDOR_DOMAIN: &str = "supabase.co";

/// Schema used when none is supplied.
pub const DEFAULT_SCHEMA: &str = "public";

static PROJECT_HOST: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^([^.]+)\.supabase\.co$").expect("static regex")
});

/// Trim the raw key and strip a leading `Bearer ` prefix.
///
/// Returns `None` when nothing is left.
pub fn sanitize_api_key(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    let stripped = trimmed.strip_prefix("Bearer ").unwrap_or(trimmed).trim();
    if stripped.is_empty() {
        None
    } else {
        Some(stripped.to_string())
    }
}

/// Project id from a `https://<ref>.supabase.co/...` URL.
pub fn extract_project_id_from_url(url: &str) -> Option<String> {
    let parsed = url::Url::parse(url).ok()?;
    let host = parsed.host_str()?;
    PROJECT_HOST
        .captures(host)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}

/// Whether the URL points at a hosted Supabase project.
pub fn is_supabase_url(url: &str) -> bool {
    extract_project_id_from_url(url).is_some()
}

/// Decode the JWT payload of an API key and pull out the project ref.
///
/// Preference order: `ref`, first `:` segment of `sub`, first path segment
/// of `iss`.
pub fn decode_project_ref_from_token(api_key: &str) -> Option<String> {
    let payload = decode_token_payload(api_key)?;

    if let Some(reference) = payload.get("ref").and_then(Value::as_str) {
        if !reference.is_empty() {
            return Some(reference.to_string());
        }
    }

    if let Some(sub) = payload.get("sub").and_then(Value::as_str) {
        if let Some(first) = sub.split(':').next().filter(|s| !s.is_empty()) {
            return Some(first.to_string());
        }
    }

    if let Some(iss) = payload.get("iss").and_then(Value::as_str) {
        if let Some(segment) = iss.split('/').nth(3).filter(|s| !s.is_empty()) {
            return Some(segment.to_string());
        }
    }

    None
}

/// Decode the middle segment of a three-part token as JSON.
pub fn decode_token_payload(token: &str) -> Option<Value> {
    let parts: Vec<&str> = token.trim().split('.').collect();
    if parts.len() != 3 {
        return None;
    }

    let mut segment: String = parts[1]
        .chars()
        .map(|c| match c {
            '-' => '+',
            '_' => '/',
            other => other,
        })
        .collect();
    while segment.len() % 4 != 0 {
        segment.push('=');
    }

    let bytes = match STANDARD.decode(segment.as_bytes()) {
        Ok(bytes) => bytes,
        Err(e) => {
            trace!("Token payload is not base64: {}", e);
            return None;
        }
    };

    match serde_json::from_slice::<Value>(&bytes) {
        Ok(value) if value.is_object() => Some(value),
        Ok(_) => None,
        Err(e) => {
            trace!("Token payload is not JSON: {}", e);
            None
        }
    }
}

/// URL-derived id wins; the token is the fallback.
pub fn determine_project_id(url: &str, api_key: &str) -> Option<String> {
    extract_project_id_from_url(url).or_else(|| decode_project_ref_from_token(api_key))
}

/// Trimmed schema name, `public` when blank.
pub fn normalize_schema(schema: Option<&str>) -> String {
    match schema.map(str::trim) {
        Some(s) if !s.is_empty() => s.to_string(),
        _ => DEFAULT_SCHEMA.to_string(),
    }
}

/// Host part of a URL, lowercased.
pub fn url_host(url: &str) -> Option<String> {
    url::Url::parse(url)
        .ok()
        .and_then(|u| u.host_str().map(|h| h.to_ascii_lowercase()))
}

/// REST base URL for a hosted project.
pub fn build_base_url(project_id: &str) -> String {
    let clean = project_id.trim();
    if clean.is_empty() {
        return String::new();
    }
    format!("https://{}.{}/rest/v1", clean, VENDOR_DOMAIN)
}
