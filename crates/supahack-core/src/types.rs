//! Shared types for supahack-core.
//!
//! These types are persisted in the connection store and exchanged between
//! the background service, the side panel and the DevTools panel.

use serde::{Deserialize, Serialize};

use crate::credentials::{normalize_schema, sanitize_api_key, DEFAULT_SCHEMA};

/// Browser tab identifier.
pub type TabId = i64;

/// Current wall-clock time in milliseconds since the Unix epoch.
pub fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// Mask a secret for logging, keeping only the last four characters.
pub fn mask_secret(secret: &str) -> String {
    let chars: Vec<char> = secret.chars().collect();
    if chars.len() <= 4 {
        return "****".to_string();
    }
    let tail: String = chars[chars.len() - 4..].iter().collect();
    format!("****{}", tail)
}

// ─────────────────────────────────────────────────────────────────────────────
// Storage Keys
// ─────────────────────────────────────────────────────────────────────────────

/// Keys used in the connection store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StorageKey {
    Connection,
    ConnectionMeta,
    CurrentTable,
    Theme,
}

impl StorageKey {
    pub const ALL: [StorageKey; 4] = [
        StorageKey::Connection,
        StorageKey::ConnectionMeta,
        StorageKey::CurrentTable,
        StorageKey::Theme,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            StorageKey::Connection => "connection",
            StorageKey::ConnectionMeta => "connection_meta",
            StorageKey::CurrentTable => "current_table",
            StorageKey::Theme => "theme",
        }
    }
}

impl std::fmt::Display for StorageKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Connection
// ─────────────────────────────────────────────────────────────────────────────

/// The active credential set for one Supabase project.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Connection {
    #[serde(default)]
    pub project_id: String,
    #[serde(default = "default_schema")]
    pub schema: String,
    #[serde(default)]
    pub api_key: String,
    #[serde(default)]
    pub bearer: String,
}

fn default_schema() -> String {
    DEFAULT_SCHEMA.to_string()
}

impl Connection {
    pub fn new(
        project_id: impl Into<String>,
        api_key: impl Into<String>,
        schema: Option<&str>,
        bearer: Option<&str>,
    ) -> Self {
        Self {
            project_id: project_id.into(),
            schema: schema.unwrap_or(DEFAULT_SCHEMA).to_string(),
            api_key: api_key.into(),
            bearer: bearer.unwrap_or_default().to_string(),
        }
        .normalized()
    }

    /// Trim every field, strip a `Bearer ` prefix from the keys, default the
    /// schema and fall back to the API key for the bearer token.
    pub fn normalized(&self) -> Self {
        let api_key = sanitize_api_key(&self.api_key).unwrap_or_default();
        let bearer = sanitize_api_key(&self.bearer).unwrap_or_else(|| api_key.clone());
        Self {
            project_id: self.project_id.trim().to_string(),
            schema: normalize_schema(Some(&self.schema)),
            api_key,
            bearer,
        }
    }

    /// A connection is usable iff both project id and API key are non-empty
    /// after sanitization.
    pub fn is_usable(&self) -> bool {
        let normalized = self.normalized();
        !normalized.project_id.is_empty() && !normalized.api_key.is_empty()
    }

    /// True when the detected triple matches this connection.
    pub fn matches(&self, project_id: &str, api_key: &str, schema: &str) -> bool {
        let normalized = self.normalized();
        normalized.project_id == project_id
            && normalized.api_key == api_key
            && normalized.schema == schema
    }

    /// Bearer token to send, falling back to the API key.
    pub fn effective_bearer(&self) -> &str {
        let bearer = self.bearer.trim();
        if bearer.is_empty() {
            self.api_key.trim()
        } else {
            bearer
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Connection Meta
// ─────────────────────────────────────────────────────────────────────────────

/// Which component wrote the persisted connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MetaSource {
    Detector,
    Devtools,
    Sidepanel,
}

impl MetaSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            MetaSource::Detector => "detector",
            MetaSource::Devtools => "devtools",
            MetaSource::Sidepanel => "sidepanel",
        }
    }
}

impl std::fmt::Display for MetaSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Provenance record for the last write to the connection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionMeta {
    pub source: MetaSource,
    pub updated_at: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tab_id: Option<TabId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cleared: Option<bool>,
}

impl ConnectionMeta {
    pub fn new(source: MetaSource, tab_id: Option<TabId>) -> Self {
        Self {
            source,
            updated_at: now_millis(),
            tab_id,
            cleared: None,
        }
    }

    /// Whether this meta was written by the detector for the given tab.
    pub fn is_detector_for(&self, tab_id: TabId) -> bool {
        self.source == MetaSource::Detector && self.tab_id == Some(tab_id)
    }

    pub fn is_cleared(&self) -> bool {
        self.cleared.unwrap_or(false)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Theme
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    #[default]
    Dark,
    Light,
}

impl Theme {
    /// Anything other than `"light"` reads as dark.
    pub fn parse(value: &str) -> Self {
        if value.trim() == "light" {
            Theme::Light
        } else {
            Theme::Dark
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Theme::Dark => "dark",
            Theme::Light => "light",
        }
    }

    pub fn toggled(&self) -> Self {
        match self {
            Theme::Dark => Theme::Light,
            Theme::Light => Theme::Dark,
        }
    }
}

impl std::fmt::Display for Theme {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Message Responses
// ─────────────────────────────────────────────────────────────────────────────

/// Structured `{ok, reason?}` result returned across component boundaries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageResponse {
    pub ok: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl MessageResponse {
    pub fn ok() -> Self {
        Self { ok: true, reason: None }
    }

    pub fn fail(reason: impl Into<String>) -> Self {
        Self {
            ok: false,
            reason: Some(reason.into()),
        }
    }
}
