//! DevTools capture.
//!
//! Keeps a bounded, newest-first list of requests made to Supabase hosts and
//! turns a chosen entry into a `captured-request` payload for the background
//! service. HAR 1.2 files feed the same filter so captures from any browser
//! can be replayed.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, VecDeque};

use crate::credentials::{VENDOR_DOMAIN, determine_project_id, normalize_schema, sanitize_api_key, url_host};
use crate::error::{Error, Result};
use crate::types::{Connection, TabId};

/// Most recent requests kept per session.
pub const MAX_CAPTURED_REQUESTS: usize = 50;

/// Headers worth showing next to a captured request.
pub const INTERESTING_HEADERS: &[&str] = &["authorization", "apikey", "api-key", "x-client-info", "x-apikey"];

/// Headers that may carry the API key, in preference order.
const API_KEY_HEADERS: &[&str] = &["apikey", "x-apikey", "api-key"];

/// Headers that may carry the schema profile, in preference order.
const PROFILE_HEADERS: &[&str] = &["accept-profile", "content-profile"];

/// Whether requests to this URL are captured.
pub fn should_capture(url: &str) -> bool {
    url_host(url).is_some_and(|host| host.contains(&format!(".{}", VENDOR_DOMAIN)))
}

// ─────────────────────────────────────────────────────────────────────────────
// Headers
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeaderEntry {
    #[serde(alias = "Name", default)]
    pub name: String,
    #[serde(alias = "Value", default)]
    pub value: String,
}

/// Headers as an ordered list plus a lowercase-keyed map.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NormalizedHeaders {
    pub list: Vec<HeaderEntry>,
    pub map: BTreeMap<String, String>,
}

/// Drop nameless headers and index the rest by lowercase name.
/// Later duplicates win in the map.
pub fn normalize_headers(headers: &[HeaderEntry]) -> NormalizedHeaders {
    let mut normalized = NormalizedHeaders::default();
    for header in headers.iter().filter(|h| !h.name.is_empty()) {
        normalized
            .map
            .insert(header.name.to_ascii_lowercase(), header.value.clone());
        normalized.list.push(header.clone());
    }
    normalized
}

// ─────────────────────────────────────────────────────────────────────────────
// HAR Input
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct HarFile {
    log: HarLog,
}

#[derive(Debug, Deserialize)]
struct HarLog {
    #[serde(default)]
    entries: Vec<HarEntry>,
}

/// One network request as DevTools reports it.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HarEntry {
    #[serde(default)]
    pub started_date_time: Option<String>,
    #[serde(default)]
    pub time: Option<f64>,
    #[serde(default)]
    pub request: HarRequest,
    #[serde(default)]
    pub response: Option<HarResponse>,
    #[serde(default, rename = "_initiator", alias = "initiator")]
    pub initiator: Option<HarInitiator>,
    #[serde(default, rename = "_requestId", alias = "requestId")]
    pub request_id: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct HarRequest {
    #[serde(default)]
    pub method: Option<String>,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub headers: Vec<HeaderEntry>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HarResponse {
    #[serde(default)]
    pub status: u16,
    #[serde(default)]
    pub status_text: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct HarInitiator {
    #[serde(rename = "type", default)]
    pub kind: Option<String>,
}

/// Parse the entries of a HAR 1.2 document.
pub fn parse_har(json: &str) -> Result<Vec<HarEntry>> {
    let har: HarFile = serde_json::from_str(json)?;
    Ok(har.log.entries)
}

// ─────────────────────────────────────────────────────────────────────────────
// Capture Log
// ─────────────────────────────────────────────────────────────────────────────

/// A request shown in the capture list.
#[derive(Debug, Clone, PartialEq)]
pub struct CaptureEntry {
    pub id: String,
    pub method: String,
    pub url: String,
    pub status: u16,
    pub status_text: String,
    pub started_date_time: String,
    pub time: f64,
    pub initiator: String,
    pub headers: Vec<HeaderEntry>,
    pub header_map: BTreeMap<String, String>,
    pub request_id: Option<String>,
    pub tab_id: Option<TabId>,
}

impl CaptureEntry {
    /// Build an entry for the inspected tab. Missing ids fall back to a
    /// fresh UUID.
    pub fn from_har(entry: &HarEntry, tab_id: Option<TabId>) -> Self {
        let headers = normalize_headers(&entry.request.headers);
        let request_id = entry.request_id.clone().filter(|id| !id.is_empty());
        let response = entry.response.clone().unwrap_or_default();
        Self {
            id: request_id
                .clone()
                .unwrap_or_else(|| uuid::Uuid::new_v4().to_string()),
            method: entry
                .request
                .method
                .clone()
                .filter(|m| !m.is_empty())
                .unwrap_or_else(|| "GET".to_string()),
            url: entry.request.url.clone(),
            status: response.status,
            status_text: response.status_text,
            started_date_time: entry
                .started_date_time
                .clone()
                .unwrap_or_else(|| chrono::Utc::now().to_rfc3339()),
            time: entry.time.unwrap_or(0.0),
            initiator: entry
                .initiator
                .as_ref()
                .and_then(|i| i.kind.clone())
                .unwrap_or_else(|| "unknown".to_string()),
            headers: headers.list,
            header_map: headers.map,
            request_id,
            tab_id,
        }
    }

    /// Auth-related headers, in request order.
    pub fn interesting_headers(&self) -> impl Iterator<Item = &HeaderEntry> {
        self.headers
            .iter()
            .filter(|h| INTERESTING_HEADERS.contains(&h.name.to_ascii_lowercase().as_str()))
    }

    /// `"<status> <text>"`, or a placeholder when there was no response.
    pub fn status_summary(&self) -> String {
        if self.status == 0 {
            "No response status".to_string()
        } else {
            format!("{} {}", self.status, self.status_text).trim().to_string()
        }
    }

    pub fn to_payload(&self) -> CapturedRequest {
        CapturedRequest {
            url: self.url.clone(),
            method: self.method.clone(),
            status: self.status,
            status_text: self.status_text.clone(),
            headers: self.headers.clone(),
            header_map: self.header_map.clone(),
            initiator: self.initiator.clone(),
            tab_id: self.tab_id,
            request_id: self.request_id.clone(),
        }
    }
}

/// Bounded newest-first list of captured requests.
#[derive(Debug, Clone)]
pub struct CaptureLog {
    entries: VecDeque<CaptureEntry>,
    capacity: usize,
}

impl Default for CaptureLog {
    fn default() -> Self {
        Self::new(MAX_CAPTURED_REQUESTS)
    }
}

impl CaptureLog {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Record a finished request. Returns whether it passed the filter.
    pub fn record(&mut self, entry: &HarEntry, tab_id: Option<TabId>) -> bool {
        if !should_capture(&entry.request.url) {
            return false;
        }
        self.entries.push_front(CaptureEntry::from_har(entry, tab_id));
        self.entries.truncate(self.capacity);
        true
    }

    pub fn entries(&self) -> impl Iterator<Item = &CaptureEntry> {
        self.entries.iter()
    }

    pub fn get(&self, id: &str) -> Option<&CaptureEntry> {
        self.entries.iter().find(|e| e.id == id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn status_line(&self) -> String {
        match self.entries.len() {
            0 => "Requests will appear as the inspected page talks to Supabase.".to_string(),
            1 => "1 request captured for this DevTools session.".to_string(),
            n => format!("{} requests captured for this DevTools session.", n),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Captured Request Payload
// ─────────────────────────────────────────────────────────────────────────────

/// Payload of the `captured-request` runtime message.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CapturedRequest {
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub method: String,
    #[serde(default)]
    pub status: u16,
    #[serde(default)]
    pub status_text: String,
    #[serde(default)]
    pub headers: Vec<HeaderEntry>,
    #[serde(default)]
    pub header_map: BTreeMap<String, String>,
    #[serde(default)]
    pub initiator: String,
    #[serde(default)]
    pub tab_id: Option<TabId>,
    #[serde(default)]
    pub request_id: Option<String>,
}

impl CapturedRequest {
    /// Lowercase header lookup, using the list when the map is empty.
    pub fn header(&self, name: &str) -> Option<&str> {
        if let Some(value) = self.header_map.get(name) {
            return Some(value.as_str());
        }
        self.headers
            .iter()
            .rev()
            .find(|h| h.name.eq_ignore_ascii_case(name))
            .map(|h| h.value.as_str())
    }

    fn first_header(&self, names: &[&str]) -> Option<&str> {
        names
            .iter()
            .filter_map(|name| self.header(name))
            .find(|value| !value.trim().is_empty())
    }

    /// Credentials carried by the request.
    ///
    /// The key comes from `apikey`-style headers, else `authorization`; the
    /// bearer from `authorization` when present.
    pub fn to_connection(&self) -> Result<Connection> {
        let authorization = self.header("authorization").and_then(sanitize_api_key);
        let api_key = self
            .first_header(API_KEY_HEADERS)
            .and_then(sanitize_api_key)
            .or_else(|| authorization.clone())
            .ok_or_else(|| Error::InvalidConnection("No API key header found in captured request.".into()))?;

        let project_id = determine_project_id(&self.url, &api_key).ok_or_else(|| {
            Error::InvalidConnection("Could not determine project ID from captured request.".into())
        })?;

        let schema = normalize_schema(self.first_header(PROFILE_HEADERS));
        Ok(Connection::new(
            project_id,
            api_key,
            Some(&schema),
            authorization.as_deref(),
        ))
    }
}
