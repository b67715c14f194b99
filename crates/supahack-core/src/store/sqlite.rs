//! SQLite-backed store used by the CLI so credentials survive between runs.
//!
//! Values are stored as JSON text in a single `kv_store` table.

use async_trait::async_trait;
use rusqlite::{params, Connection, OptionalExtension};
use serde_json::Value;
use std::path::Path;
use std::sync::Mutex;
use tokio::sync::broadcast;
use tracing::debug;

use super::{KeyValueStore, StorageChange, StorageChanges, CHANGE_CHANNEL_CAPACITY};
use crate::error::{Error, Result};
use crate::types::now_millis;

const SCHEMA: &str = "CREATE TABLE IF NOT EXISTS kv_store (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL,
    updated_at INTEGER NOT NULL
)";

/// Store wrapper around a SQLite connection.
///
/// Thread-safe via internal Mutex. All operations acquire the lock.
pub struct SqliteStore {
    conn: Mutex<Connection>,
    changes: broadcast::Sender<StorageChanges>,
}

impl SqliteStore {
    /// Open (or create) the store at a path
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)?;
        debug!("Opened store at {:?}", path);
        Self::with_connection(conn)
    }

    /// In-memory database, mostly for tests
    pub fn open_in_memory() -> Result<Self> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> Result<Self> {
        conn.execute_batch(SCHEMA)?;
        let (changes, _) = broadcast::channel(CHANGE_CHANNEL_CAPACITY);
        Ok(Self {
            conn: Mutex::new(conn),
            changes,
        })
    }

    /// Check database connectivity
    pub fn ping(&self) -> Result<()> {
        let conn = self.conn.lock().map_err(|_| Error::LockPoisoned)?;
        conn.execute_batch("SELECT 1")?;
        Ok(())
    }

    fn read(conn: &Connection, key: &str) -> Result<Option<Value>> {
        let raw: Option<String> = conn
            .query_row(
                "SELECT value FROM kv_store WHERE key = ?1",
                params![key],
                |row| row.get(0),
            )
            .optional()?;
        match raw {
            Some(text) => Ok(Some(serde_json::from_str(&text)?)),
            None => Ok(None),
        }
    }
}

#[async_trait]
impl KeyValueStore for SqliteStore {
    async fn get(&self, key: &str) -> Result<Option<Value>> {
        let conn = self.conn.lock().map_err(|_| Error::LockPoisoned)?;
        Self::read(&conn, key)
    }

    async fn set(&self, entries: Vec<(String, Value)>) -> Result<()> {
        if entries.is_empty() {
            return Ok(());
        }

        let batch = {
            let mut conn = self.conn.lock().map_err(|_| Error::LockPoisoned)?;
            let tx = conn.transaction()?;
            let mut batch = StorageChanges::new();
            let now = now_millis();
            for (key, value) in entries {
                let old_value = Self::read(&tx, &key)?;
                tx.execute(
                    "INSERT INTO kv_store (key, value, updated_at) VALUES (?1, ?2, ?3)
                     ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
                    params![key, serde_json::to_string(&value)?, now],
                )?;
                batch.insert(
                    key,
                    StorageChange {
                        old_value,
                        new_value: Some(value),
                    },
                );
            }
            tx.commit()?;
            batch
        };

        let _ = self.changes.send(batch);
        Ok(())
    }

    async fn remove(&self, keys: &[&str]) -> Result<()> {
        let batch = {
            let mut conn = self.conn.lock().map_err(|_| Error::LockPoisoned)?;
            let tx = conn.transaction()?;
            let mut batch = StorageChanges::new();
            for key in keys {
                if let Some(old_value) = Self::read(&tx, key)? {
                    tx.execute("DELETE FROM kv_store WHERE key = ?1", params![key])?;
                    batch.insert(
                        key.to_string(),
                        StorageChange {
                            old_value: Some(old_value),
                            new_value: None,
                        },
                    );
                }
            }
            tx.commit()?;
            batch
        };

        if !batch.is_empty() {
            let _ = self.changes.send(batch);
        }
        Ok(())
    }

    fn subscribe(&self) -> broadcast::Receiver<StorageChanges> {
        self.changes.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::ConnectionStoreExt;
    use crate::types::{Connection as SupabaseConnection, ConnectionMeta, MetaSource};
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_values_survive_reopen() {
        let temp = tempdir().expect("Failed to create temp dir");
        let path = temp.path().join("nested").join("store.db");

        let conn = SupabaseConnection::new("abc", "key", Some("api"), None);
        {
            let store = SqliteStore::open(&path).expect("Failed to open store");
            store
                .save_connection(Some(&conn), &ConnectionMeta::new(MetaSource::Sidepanel, None))
                .await
                .unwrap();
            store.save_current_table(Some("orders")).await.unwrap();
        }

        let store = SqliteStore::open(&path).expect("Failed to reopen store");
        assert_eq!(store.load_connection().await.unwrap(), Some(conn));
        assert_eq!(store.load_current_table().await.unwrap().as_deref(), Some("orders"));
        assert_eq!(
            store.load_meta().await.unwrap().map(|m| m.source),
            Some(MetaSource::Sidepanel)
        );
    }

    #[tokio::test]
    async fn test_changes_report_old_values() {
        let store = SqliteStore::open_in_memory().unwrap();
        let mut rx = store.subscribe();

        store
            .set(vec![("theme".into(), Value::String("dark".into()))])
            .await
            .unwrap();
        store
            .set(vec![("theme".into(), Value::String("light".into()))])
            .await
            .unwrap();
        store.remove(&["theme"]).await.unwrap();

        let first = rx.try_recv().unwrap();
        assert_eq!(first["theme"].old_value, None);
        let second = rx.try_recv().unwrap();
        assert_eq!(second["theme"].old_value, Some(Value::String("dark".into())));
        let third = rx.try_recv().unwrap();
        assert_eq!(third["theme"].new_value, None);
        assert!(store.ping().is_ok());
    }
}
