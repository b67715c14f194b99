//! Connection store.
//!
//! A flat, asynchronous key-value store holding JSON values. Writes of
//! several keys in one [`KeyValueStore::set`] call are applied atomically
//! and announced as a single [`StorageChanges`] batch to every subscriber.
//!
//! Typed access to the well-known keys lives in [`ConnectionStoreExt`].

mod memory;
#[cfg(feature = "db")]
mod sqlite;

pub use memory::MemoryStore;
#[cfg(feature = "db")]
pub use sqlite::SqliteStore;

use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use tokio::sync::broadcast;

use crate::error::Result;
use crate::types::{Connection, ConnectionMeta, StorageKey, Theme};

/// Capacity of the change-notification channel.
pub(crate) const CHANGE_CHANNEL_CAPACITY: usize = 64;

/// Old and new value of one key.
#[derive(Debug, Clone, PartialEq)]
pub struct StorageChange {
    pub old_value: Option<Value>,
    pub new_value: Option<Value>,
}

/// One batch of changes, keyed by storage key.
pub type StorageChanges = HashMap<String, StorageChange>;

/// Asynchronous key-value store with change notifications.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Read one key.
    async fn get(&self, key: &str) -> Result<Option<Value>>;

    /// Write all entries as a single atomic update.
    async fn set(&self, entries: Vec<(String, Value)>) -> Result<()>;

    /// Remove keys. Missing keys are ignored.
    async fn remove(&self, keys: &[&str]) -> Result<()>;

    /// Subscribe to change batches.
    fn subscribe(&self) -> broadcast::Receiver<StorageChanges>;
}

/// Typed helpers for the keys SupaHack persists.
#[async_trait]
pub trait ConnectionStoreExt: KeyValueStore {
    /// Persisted connection. A stored `null` reads as `None`.
    async fn load_connection(&self) -> Result<Option<Connection>> {
        match self.get(StorageKey::Connection.as_str()).await? {
            None | Some(Value::Null) => Ok(None),
            Some(value) => Ok(Some(serde_json::from_value(value)?)),
        }
    }

    async fn load_meta(&self) -> Result<Option<ConnectionMeta>> {
        match self.get(StorageKey::ConnectionMeta.as_str()).await? {
            None | Some(Value::Null) => Ok(None),
            Some(value) => Ok(Some(serde_json::from_value(value)?)),
        }
    }

    /// Write connection (or `null`) and meta in one update.
    async fn save_connection(
        &self,
        connection: Option<&Connection>,
        meta: &ConnectionMeta,
    ) -> Result<()> {
        let connection = match connection {
            Some(c) => serde_json::to_value(c)?,
            None => Value::Null,
        };
        self.set(vec![
            (StorageKey::Connection.as_str().to_string(), connection),
            (
                StorageKey::ConnectionMeta.as_str().to_string(),
                serde_json::to_value(meta)?,
            ),
        ])
        .await
    }

    async fn save_meta(&self, meta: &ConnectionMeta) -> Result<()> {
        self.set(vec![(
            StorageKey::ConnectionMeta.as_str().to_string(),
            serde_json::to_value(meta)?,
        )])
        .await
    }

    async fn load_current_table(&self) -> Result<Option<String>> {
        Ok(self
            .get(StorageKey::CurrentTable.as_str())
            .await?
            .and_then(|v| v.as_str().map(String::from))
            .filter(|s| !s.is_empty()))
    }

    async fn save_current_table(&self, table: Option<&str>) -> Result<()> {
        match table {
            Some(t) => {
                self.set(vec![(
                    StorageKey::CurrentTable.as_str().to_string(),
                    Value::String(t.to_string()),
                )])
                .await
            }
            None => self.remove(&[StorageKey::CurrentTable.as_str()]).await,
        }
    }

    async fn load_theme(&self) -> Result<Option<Theme>> {
        Ok(self
            .get(StorageKey::Theme.as_str())
            .await?
            .and_then(|v| v.as_str().map(Theme::parse)))
    }

    async fn save_theme(&self, theme: Theme) -> Result<()> {
        self.set(vec![(
            StorageKey::Theme.as_str().to_string(),
            Value::String(theme.as_str().to_string()),
        )])
        .await
    }

    /// Drop the connection, its meta and the selected table.
    async fn clear_connection(&self) -> Result<()> {
        self.remove(&[
            StorageKey::Connection.as_str(),
            StorageKey::CurrentTable.as_str(),
            StorageKey::ConnectionMeta.as_str(),
        ])
        .await
    }
}

impl<T: KeyValueStore + ?Sized> ConnectionStoreExt for T {}

/// Decode the connection carried by a change, if any.
pub fn connection_from_change(change: &StorageChange) -> Option<Connection> {
    change
        .new_value
        .as_ref()
        .filter(|v| !v.is_null())
        .and_then(|v| serde_json::from_value(v.clone()).ok())
}
