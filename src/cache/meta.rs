//! Synchronous key-value tier backed by SQLite.

use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use rusqlite::{params, Connection, OptionalExtension};

use super::StoreError;

/// Small synchronous key-value store.
///
/// Holds a handful of serialized values under fixed keys: the cached-song
/// collection, the favorites set, the last-visit date. Values are opaque
/// strings; callers bring their own serialization.
pub trait KvStore: Send + Sync {
  fn get(&self, key: &str) -> Result<Option<String>, StoreError>;
  fn set(&self, key: &str, value: &str) -> Result<(), StoreError>;
  fn remove(&self, key: &str) -> Result<(), StoreError>;
}

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS app_kv (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL,
    updated_at TEXT NOT NULL DEFAULT (datetime('now'))
);
"#;

/// SQLite-backed implementation of the synchronous tier.
pub struct SqliteKv {
  conn: Mutex<Connection>,
}

impl SqliteKv {
  /// Open (or create) the store at the given path.
  pub fn open(path: &Path) -> Result<Self, StoreError> {
    if let Some(parent) = path.parent() {
      std::fs::create_dir_all(parent)?;
    }
    Self::from_conn(Connection::open(path)?)
  }

  /// In-memory store, handy for tests.
  #[cfg(test)]
  pub fn open_in_memory() -> Result<Self, StoreError> {
    Self::from_conn(Connection::open_in_memory()?)
  }

  fn from_conn(conn: Connection) -> Result<Self, StoreError> {
    conn.execute_batch(SCHEMA)?;
    Ok(Self {
      conn: Mutex::new(conn),
    })
  }

  fn lock(&self) -> Result<MutexGuard<'_, Connection>, StoreError> {
    self
      .conn
      .lock()
      .map_err(|e| StoreError::Unavailable(format!("lock poisoned: {}", e)))
  }
}

impl KvStore for SqliteKv {
  fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
    let conn = self.lock()?;
    let value = conn
      .prepare_cached("SELECT value FROM app_kv WHERE key = ?")?
      .query_row(params![key], |row| row.get(0))
      .optional()?;
    Ok(value)
  }

  fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
    let conn = self.lock()?;
    conn
      .prepare_cached(
        "INSERT OR REPLACE INTO app_kv (key, value, updated_at)
         VALUES (?, ?, datetime('now'))",
      )?
      .execute(params![key, value])?;
    Ok(())
  }

  fn remove(&self, key: &str) -> Result<(), StoreError> {
    let conn = self.lock()?;
    conn
      .prepare_cached("DELETE FROM app_kv WHERE key = ?")?
      .execute(params![key])?;
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_roundtrip() {
    let kv = SqliteKv::open_in_memory().unwrap();
    assert_eq!(kv.get("missing").unwrap(), None);

    kv.set("k", "v1").unwrap();
    assert_eq!(kv.get("k").unwrap().as_deref(), Some("v1"));

    kv.set("k", "v2").unwrap();
    assert_eq!(kv.get("k").unwrap().as_deref(), Some("v2"));

    kv.remove("k").unwrap();
    assert_eq!(kv.get("k").unwrap(), None);
  }

  #[test]
  fn test_keys_are_independent() {
    let kv = SqliteKv::open_in_memory().unwrap();
    kv.set("a", "1").unwrap();
    kv.set("b", "2").unwrap();
    kv.remove("a").unwrap();
    assert_eq!(kv.get("b").unwrap().as_deref(), Some("2"));
  }
}
