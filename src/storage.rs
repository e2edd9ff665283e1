//! String-keyed persistence used for preferences and session history.

use std::{collections::HashMap, sync::Mutex};

use anyhow::{anyhow, Result};
use async_trait::async_trait;

use crate::db::Database;

/// Key holding the last map viewport.
pub const VIEWPORT_KEY: &str = "map_viewport_v1";
/// Key holding the serialized three-slot session history.
pub const SESSION_SLOTS_KEY: &str = "session_slots_v1";

#[async_trait]
pub trait KeyValueStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>>;
    async fn set(&self, key: &str, value: &str) -> Result<()>;
    async fn remove(&self, key: &str) -> Result<()>;
}

#[async_trait]
impl KeyValueStore for Database {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        self.kv_get(key).await
    }

    async fn set(&self, key: &str, value: &str) -> Result<()> {
        self.kv_set(key, value).await
    }

    async fn remove(&self, key: &str) -> Result<()> {
        self.kv_remove(key).await
    }
}

/// Process-local store; nothing survives a restart.
#[derive(Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl KeyValueStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        let entries = self.entries.lock().map_err(|e| anyhow!("lock poisoned: {e}"))?;
        Ok(entries.get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str) -> Result<()> {
        let mut entries = self.entries.lock().map_err(|e| anyhow!("lock poisoned: {e}"))?;
        entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<()> {
        let mut entries = self.entries.lock().map_err(|e| anyhow!("lock poisoned: {e}"))?;
        entries.remove(key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn memory_store_round_trip() {
        let store = MemoryStore::new();
        store.set(VIEWPORT_KEY, "{}").await.unwrap();
        assert_eq!(store.get(VIEWPORT_KEY).await.unwrap().as_deref(), Some("{}"));
        store.remove(VIEWPORT_KEY).await.unwrap();
        assert!(store.get(VIEWPORT_KEY).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn database_implements_store() {
        let dir = tempfile::tempdir().unwrap();
        let db = Database::new(dir.path().join("store.sqlite3")).unwrap();
        let store: &dyn KeyValueStore = &db;
        store.set(SESSION_SLOTS_KEY, "[]").await.unwrap();
        assert_eq!(store.get(SESSION_SLOTS_KEY).await.unwrap().as_deref(), Some("[]"));
    }
}
