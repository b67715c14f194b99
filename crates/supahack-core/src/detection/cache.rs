//! Detection cache.
//!
//! Remembers the last credential triple seen per tab so repeated requests to
//! the same endpoint do not rewrite the store. Never persisted.

use std::collections::HashMap;
use std::sync::Mutex;

use crate::types::TabId;

/// Bucket used when the originating tab is unknown.
pub const GLOBAL_KEY: &str = "global";

/// Cache key for a detection: `tab:<id>` for a valid tab, else `global`.
pub fn cache_key(tab_id: Option<TabId>) -> String {
    match tab_id {
        Some(id) if id >= 0 => format!("tab:{}", id),
        _ => GLOBAL_KEY.to_string(),
    }
}

/// Last credentials observed for one key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DetectionCacheEntry {
    pub project_id: String,
    pub api_key: String,
    pub schema: String,
    pub timestamp: i64,
    /// Host of the page the detection came from, when known.
    pub page_host: Option<String>,
    /// Host the detected request was sent to.
    pub target_host: Option<String>,
}

impl DetectionCacheEntry {
    pub fn same_credentials(&self, project_id: &str, api_key: &str, schema: &str) -> bool {
        self.project_id == project_id && self.api_key == api_key && self.schema == schema
    }
}

#[derive(Debug, Default)]
pub struct DetectionCache {
    entries: Mutex<HashMap<String, DetectionCacheEntry>>,
}

impl DetectionCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<DetectionCacheEntry> {
        self.lock().get(key).cloned()
    }

    /// True when the key already holds exactly these credentials.
    pub fn is_duplicate(&self, key: &str, project_id: &str, api_key: &str, schema: &str) -> bool {
        self.lock()
            .get(key)
            .is_some_and(|entry| entry.same_credentials(project_id, api_key, schema))
    }

    pub fn insert(&self, key: String, entry: DetectionCacheEntry) {
        self.lock().insert(key, entry);
    }

    pub fn remove(&self, key: &str) -> Option<DetectionCacheEntry> {
        self.lock().remove(key)
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, DetectionCacheEntry>> {
        // The map holds plain data; a panic elsewhere cannot leave it half-written
        self.entries.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(project_id: &str) -> DetectionCacheEntry {
        DetectionCacheEntry {
            project_id: project_id.into(),
            api_key: "key".into(),
            schema: "public".into(),
            timestamp: 1,
            page_host: None,
            target_host: None,
        }
    }

    #[test]
    fn test_cache_key() {
        assert_eq!(cache_key(Some(12)), "tab:12");
        assert_eq!(cache_key(Some(0)), "tab:0");
        assert_eq!(cache_key(Some(-1)), "global");
        assert_eq!(cache_key(None), "global");
    }

    #[test]
    fn test_duplicate_detection() {
        let cache = DetectionCache::new();
        assert!(!cache.is_duplicate("tab:1", "abc", "key", "public"));

        cache.insert("tab:1".into(), entry("abc"));
        assert!(cache.is_duplicate("tab:1", "abc", "key", "public"));
        assert!(!cache.is_duplicate("tab:1", "abc", "key", "api"));
        assert!(!cache.is_duplicate("tab:2", "abc", "key", "public"));

        cache.insert("tab:1".into(), entry("xyz"));
        assert!(!cache.is_duplicate("tab:1", "abc", "key", "public"));
        assert_eq!(cache.len(), 1);

        assert!(cache.remove("tab:1").is_some());
        assert!(cache.is_empty());
    }
}
