//! Memory/cache collaborator: structured paper text keyed by paper id.
//!
//! A cache hit lets the agent skip the fetch and structuring steps for a
//! paper it has already analyzed in an earlier run.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use rusqlite::{Connection, OptionalExtension, params};
use tracing::debug;

use crate::error::AgentError;

const COLLABORATOR: &str = "memory";

/// Key-value store for structured paper text.
#[async_trait]
pub trait MemoryStore: Send + Sync {
    /// Returns the cached text for `id`, if any.
    async fn get(&self, id: &str) -> Result<Option<String>, AgentError>;

    /// Stores `text` under `id`, replacing any previous value.
    async fn put(&self, id: &str, text: &str) -> Result<(), AgentError>;
}

fn poisoned<T>(_: T) -> AgentError {
    AgentError::external(COLLABORATOR, "store lock poisoned")
}

/// SQLite-backed [`MemoryStore`].
///
/// `rusqlite::Connection` is not `Sync`, so calls run on the blocking pool
/// behind a mutex.
#[derive(Debug, Clone)]
pub struct SqliteMemory {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteMemory {
    /// Opens (or creates) the store at `path`.
    pub fn open(path: &Path) -> Result<Self, AgentError> {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent).map_err(|e| AgentError::external(COLLABORATOR, e))?;
        }
        let conn = Connection::open(path).map_err(|e| AgentError::external(COLLABORATOR, e))?;
        Self::init(conn)
    }

    /// Opens a private in-memory database.
    pub fn open_in_memory() -> Result<Self, AgentError> {
        let conn = Connection::open_in_memory().map_err(|e| AgentError::external(COLLABORATOR, e))?;
        Self::init(conn)
    }

    /// Default location under the user's cache directory.
    #[must_use]
    pub fn default_path() -> Option<PathBuf> {
        dirs::cache_dir().map(|d| d.join("library-index").join("memory.db"))
    }

    fn init(conn: Connection) -> Result<Self, AgentError> {
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS memories (
                id TEXT PRIMARY KEY,
                content TEXT NOT NULL,
                updated_at TEXT NOT NULL DEFAULT (datetime('now'))
            );",
        )
        .map_err(|e| AgentError::external(COLLABORATOR, e))?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    async fn with_conn<T, F>(&self, f: F) -> Result<T, AgentError>
    where
        T: Send + 'static,
        F: FnOnce(&Connection) -> rusqlite::Result<T> + Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let guard = conn.lock().map_err(poisoned)?;
            f(&guard).map_err(|e| AgentError::external(COLLABORATOR, e))
        })
        .await
        .map_err(|e| AgentError::Orchestration {
            message: format!("Task join failed: {e}"),
        })?
    }
}

#[async_trait]
impl MemoryStore for SqliteMemory {
    async fn get(&self, id: &str) -> Result<Option<String>, AgentError> {
        let id = id.to_string();
        self.with_conn(move |conn| {
            conn.query_row(
                "SELECT content FROM memories WHERE id = ?1",
                params![id],
                |row| row.get(0),
            )
            .optional()
        })
        .await
    }

    async fn put(&self, id: &str, text: &str) -> Result<(), AgentError> {
        debug!(id, bytes = text.len(), "caching structured text");
        let (id, text) = (id.to_string(), text.to_string());
        self.with_conn(move |conn| {
            conn.execute(
                "INSERT INTO memories (id, content) VALUES (?1, ?2)
                 ON CONFLICT(id) DO UPDATE SET content = excluded.content,
                                               updated_at = datetime('now')",
                params![id, text],
            )
            .map(|_| ())
        })
        .await
    }
}

/// Process-local [`MemoryStore`].
#[derive(Debug, Default)]
pub struct InMemoryStore {
    entries: Mutex<HashMap<String, String>>,
}

impl InMemoryStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of cached entries.
    pub fn len(&self) -> usize {
        self.entries.lock().map_or(0, |e| e.len())
    }

    /// Returns `true` if nothing is cached.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl MemoryStore for InMemoryStore {
    async fn get(&self, id: &str) -> Result<Option<String>, AgentError> {
        Ok(self.entries.lock().map_err(poisoned)?.get(id).cloned())
    }

    async fn put(&self, id: &str, text: &str) -> Result<(), AgentError> {
        self.entries
            .lock()
            .map_err(poisoned)?
            .insert(id.to_string(), text.to_string());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_sqlite_roundtrip_and_overwrite() {
        let store = SqliteMemory::open_in_memory().unwrap_or_else(|_| unreachable!());
        assert_eq!(store.get("p1").await.unwrap_or_else(|_| unreachable!()), None);

        store.put("p1", "first").await.unwrap_or_else(|_| unreachable!());
        store.put("p1", "second").await.unwrap_or_else(|_| unreachable!());

        let value = store.get("p1").await.unwrap_or_else(|_| unreachable!());
        assert_eq!(value.as_deref(), Some("second"));
    }

    #[tokio::test]
    async fn test_sqlite_persists_to_file() {
        let dir = tempfile::tempdir().unwrap_or_else(|_| unreachable!());
        let path = dir.path().join("nested").join("memory.db");

        {
            let store = SqliteMemory::open(&path).unwrap_or_else(|_| unreachable!());
            store.put("p2", "cached").await.unwrap_or_else(|_| unreachable!());
        }

        let reopened = SqliteMemory::open(&path).unwrap_or_else(|_| unreachable!());
        let value = reopened.get("p2").await.unwrap_or_else(|_| unreachable!());
        assert_eq!(value.as_deref(), Some("cached"));
    }

    #[tokio::test]
    async fn test_in_memory_store() {
        let store = InMemoryStore::new();
        assert!(store.is_empty());
        store.put("a", "x").await.unwrap_or_else(|_| unreachable!());
        assert_eq!(store.len(), 1);
        let value = store.get("a").await.unwrap_or_else(|_| unreachable!());
        assert_eq!(value.as_deref(), Some("x"));
    }
}
