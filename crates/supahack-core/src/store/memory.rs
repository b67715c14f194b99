//! In-memory store, the equivalent of the extension's `storage.local` area
//! for a single process.

use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use tokio::sync::{broadcast, RwLock};
use tracing::trace;

use super::{KeyValueStore, StorageChange, StorageChanges, CHANGE_CHANNEL_CAPACITY};
use crate::error::Result;

#[derive(Debug, Default)]
struct Inner {
    values: HashMap<String, Value>,
    write_counts: HashMap<String, usize>,
}

/// Process-local key-value store.
#[derive(Debug)]
pub struct MemoryStore {
    inner: RwLock<Inner>,
    changes: broadcast::Sender<StorageChanges>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        let (changes, _) = broadcast::channel(CHANGE_CHANNEL_CAPACITY);
        Self {
            inner: RwLock::new(Inner::default()),
            changes,
        }
    }

    /// Number of `set` calls that wrote the given key.
    pub async fn write_count(&self, key: &str) -> usize {
        self.inner
            .read()
            .await
            .write_counts
            .get(key)
            .copied()
            .unwrap_or(0)
    }

    /// Snapshot of every stored key.
    pub async fn snapshot(&self) -> HashMap<String, Value> {
        self.inner.read().await.values.clone()
    }
}

#[async_trait]
impl KeyValueStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<Value>> {
        Ok(self.inner.read().await.values.get(key).cloned())
    }

    async fn set(&self, entries: Vec<(String, Value)>) -> Result<()> {
        if entries.is_empty() {
            return Ok(());
        }

        let mut batch = StorageChanges::new();
        {
            let mut inner = self.inner.write().await;
            for (key, value) in entries {
                let old_value = inner.values.insert(key.clone(), value.clone());
                *inner.write_counts.entry(key.clone()).or_insert(0) += 1;
                batch.insert(
                    key,
                    StorageChange {
                        old_value,
                        new_value: Some(value),
                    },
                );
            }
        }

        trace!("Store set: {:?}", batch.keys().collect::<Vec<_>>());
        // No subscribers is not an error
        let _ = self.changes.send(batch);
        Ok(())
    }

    async fn remove(&self, keys: &[&str]) -> Result<()> {
        let mut batch = StorageChanges::new();
        {
            let mut inner = self.inner.write().await;
            for key in keys {
                if let Some(old_value) = inner.values.remove(*key) {
                    batch.insert(
                        key.to_string(),
                        StorageChange {
                            old_value: Some(old_value),
                            new_value: None,
                        },
                    );
                }
            }
        }

        if !batch.is_empty() {
            let _ = self.changes.send(batch);
        }
        Ok(())
    }

    fn subscribe(&self) -> broadcast::Receiver<StorageChanges> {
        self.changes.subscribe()
    }
}
