//! SQLite-backed cache store.
//!
//! All namespaces share one database; the namespace is the first column of
//! the primary key. Handles clone the connection handle, so a store and its
//! open namespaces stay consistent with each other.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use super::traits::{CacheHandle, CacheStore, StoreError};
use super::{CacheKey, CachedResponse};
use crate::http::Response;

pub struct SqliteStore {
  conn: Arc<Mutex<Connection>>,
}

impl SqliteStore {
  /// Open the store at the default location.
  pub fn open() -> Result<Self, StoreError> {
    Self::open_at(&Self::default_path()?)
  }

  /// Open the store at an explicit path, creating parent directories.
  pub fn open_at(path: &Path) -> Result<Self, StoreError> {
    if let Some(parent) = path.parent() {
      std::fs::create_dir_all(parent)
        .map_err(|e| StoreError::Unavailable(format!("failed to create cache directory: {}", e)))?;
    }

    let conn = Connection::open(path).map_err(|e| {
      StoreError::Unavailable(format!("failed to open cache database at {}: {}", path.display(), e))
    })?;

    let store = Self {
      conn: Arc::new(Mutex::new(conn)),
    };
    store.run_migrations()?;

    Ok(store)
  }

  fn default_path() -> Result<PathBuf, StoreError> {
    let data_dir = dirs::data_dir()
      .or_else(|| dirs::home_dir().map(|p| p.join(".local/share")))
      .ok_or_else(|| StoreError::Unavailable("could not determine data directory".to_string()))?;

    Ok(data_dir.join("offramp").join("cache.db"))
  }

  fn run_migrations(&self) -> Result<(), StoreError> {
    let conn = lock(&self.conn)?;

    conn
      .execute_batch(CACHE_SCHEMA)
      .map_err(|e| StoreError::Backend(format!("failed to run cache migrations: {}", e)))?;

    Ok(())
  }
}

/// Schema for the shared response cache.
const CACHE_SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS namespaces (
    name TEXT PRIMARY KEY,
    created_at TEXT NOT NULL DEFAULT (datetime('now'))
);

-- Whole responses, keyed by namespace + hashed (method, URL).
-- The request column keeps the readable form for inspection.
CREATE TABLE IF NOT EXISTS responses (
    namespace TEXT NOT NULL,
    key_hash TEXT NOT NULL,
    request TEXT NOT NULL,
    status INTEGER NOT NULL,
    headers TEXT NOT NULL,
    body BLOB NOT NULL,
    cached_at TEXT NOT NULL DEFAULT (datetime('now')),
    PRIMARY KEY (namespace, key_hash)
);

CREATE INDEX IF NOT EXISTS idx_responses_namespace ON responses(namespace);
"#;

fn lock(conn: &Mutex<Connection>) -> Result<std::sync::MutexGuard<'_, Connection>, StoreError> {
  conn
    .lock()
    .map_err(|e| StoreError::Backend(format!("lock poisoned: {}", e)))
}

#[async_trait]
impl CacheStore for SqliteStore {
  async fn open(&self, namespace: &str) -> Result<Arc<dyn CacheHandle>, StoreError> {
    let conn = lock(&self.conn)?;
    conn
      .execute(
        "INSERT OR IGNORE INTO namespaces (name) VALUES (?)",
        params![namespace],
      )
      .map_err(|e| StoreError::Backend(format!("failed to create namespace: {}", e)))?;
    drop(conn);

    Ok(Arc::new(SqliteHandle {
      namespace: namespace.to_string(),
      conn: Arc::clone(&self.conn),
    }))
  }

  async fn list_namespaces(&self) -> Result<Vec<String>, StoreError> {
    let conn = lock(&self.conn)?;
    let mut stmt = conn
      .prepare("SELECT name FROM namespaces ORDER BY name")
      .map_err(|e| StoreError::Backend(format!("failed to prepare query: {}", e)))?;

    let names = stmt
      .query_map([], |row| row.get(0))
      .map_err(|e| StoreError::Backend(format!("failed to list namespaces: {}", e)))?
      .filter_map(|r| r.ok())
      .collect();

    Ok(names)
  }

  async fn delete_namespace(&self, namespace: &str) -> Result<(), StoreError> {
    let conn = lock(&self.conn)?;
    conn
      .execute("DELETE FROM responses WHERE namespace = ?", params![namespace])
      .map_err(|e| StoreError::Backend(format!("failed to delete namespace entries: {}", e)))?;
    conn
      .execute("DELETE FROM namespaces WHERE name = ?", params![namespace])
      .map_err(|e| StoreError::Backend(format!("failed to delete namespace: {}", e)))?;
    Ok(())
  }
}

struct SqliteHandle {
  namespace: String,
  conn: Arc<Mutex<Connection>>,
}

#[async_trait]
impl CacheHandle for SqliteHandle {
  async fn get(&self, key: &CacheKey) -> Result<Option<CachedResponse>, StoreError> {
    let conn = lock(&self.conn)?;
    let mut stmt = conn
      .prepare(
        "SELECT status, headers, body, cached_at FROM responses
         WHERE namespace = ? AND key_hash = ?",
      )
      .map_err(|e| StoreError::Backend(format!("failed to prepare query: {}", e)))?;

    let row: Option<(u16, String, Vec<u8>, String)> = stmt
      .query_row(params![self.namespace, key.storage_key()], |row| {
        Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?))
      })
      .ok();

    match row {
      Some((status, headers_json, body, cached_at_str)) => {
        let headers: HashMap<String, String> = serde_json::from_str(&headers_json)
          .map_err(|e| StoreError::Backend(format!("failed to deserialize headers: {}", e)))?;
        let cached_at = parse_datetime(&cached_at_str)?;
        Ok(Some(CachedResponse {
          response: Response {
            status,
            headers,
            body,
          },
          cached_at,
        }))
      }
      None => Ok(None),
    }
  }

  async fn put(&self, key: &CacheKey, response: &Response) -> Result<(), StoreError> {
    let headers = serde_json::to_string(&response.headers)
      .map_err(|e| StoreError::Backend(format!("failed to serialize headers: {}", e)))?;

    let conn = lock(&self.conn)?;
    // A handle may outlive deletion of its namespace; writing recreates it.
    conn
      .execute(
        "INSERT OR IGNORE INTO namespaces (name) VALUES (?)",
        params![self.namespace],
      )
      .map_err(|e| StoreError::Backend(format!("failed to create namespace: {}", e)))?;
    conn
      .execute(
        "INSERT OR REPLACE INTO responses (namespace, key_hash, request, status, headers, body, cached_at)
         VALUES (?, ?, ?, ?, ?, ?, datetime('now'))",
        params![
          self.namespace,
          key.storage_key(),
          key.describe(),
          response.status,
          headers,
          response.body
        ],
      )
      .map_err(|e| StoreError::Backend(format!("failed to store response: {}", e)))?;

    Ok(())
  }

  fn namespace(&self) -> &str {
    &self.namespace
  }
}

/// Parse a datetime string from SQLite format.
fn parse_datetime(s: &str) -> Result<DateTime<Utc>, StoreError> {
  // SQLite stores as "YYYY-MM-DD HH:MM:SS"
  chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S")
    .map(|dt| dt.and_utc())
    .map_err(|e| StoreError::Backend(format!("failed to parse datetime '{}': {}", s, e)))
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::http::Method;

  fn temp_store() -> (tempfile::TempDir, SqliteStore) {
    let dir = tempfile::tempdir().unwrap();
    let store = SqliteStore::open_at(&dir.path().join("cache.db")).unwrap();
    (dir, store)
  }

  #[tokio::test]
  async fn test_put_then_get_round_trips_headers_and_body() {
    let (_dir, store) = temp_store();
    let handle = store.open("offramp-data-v1").await.unwrap();
    let key = CacheKey::new(Method::Get, "/api/content/trending");
    let response = Response::new(200)
      .with_header("content-type", "application/json")
      .with_body(br#"{"items":[]}"#.to_vec());

    handle.put(&key, &response).await.unwrap();
    let cached = handle.get(&key).await.unwrap().unwrap();
    assert_eq!(cached.response, response);
  }

  #[tokio::test]
  async fn test_namespaces_are_isolated() {
    let (_dir, store) = temp_store();
    let data = store.open("offramp-data-v1").await.unwrap();
    let media = store.open("offramp-media-v1").await.unwrap();
    let key = CacheKey::new(Method::Get, "/shared-url");

    data.put(&key, &Response::new(200).with_text("data")).await.unwrap();
    assert!(media.get(&key).await.unwrap().is_none());

    media.put(&key, &Response::new(200).with_text("media")).await.unwrap();
    assert_eq!(data.get(&key).await.unwrap().unwrap().response.text(), "data");
  }

  #[tokio::test]
  async fn test_entries_survive_reopening_the_store() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("cache.db");
    let key = CacheKey::new(Method::Get, "/offline.html");

    {
      let store = SqliteStore::open_at(&path).unwrap();
      let handle = store.open("offramp-primary-v1").await.unwrap();
      handle.put(&key, &Response::new(200).with_text("offline page")).await.unwrap();
    }

    let store = SqliteStore::open_at(&path).unwrap();
    assert_eq!(store.list_namespaces().await.unwrap(), vec!["offramp-primary-v1"]);
    let handle = store.open("offramp-primary-v1").await.unwrap();
    let cached = handle.get(&key).await.unwrap().unwrap();
    assert_eq!(cached.response.text(), "offline page");
  }

  #[tokio::test]
  async fn test_delete_namespace_removes_name_and_entries() {
    let (_dir, store) = temp_store();
    let old = store.open("offramp-data-v0").await.unwrap();
    let key = CacheKey::new(Method::Get, "/api/titles");
    old.put(&key, &Response::new(200)).await.unwrap();
    store.open("offramp-data-v1").await.unwrap();

    store.delete_namespace("offramp-data-v0").await.unwrap();

    assert_eq!(store.list_namespaces().await.unwrap(), vec!["offramp-data-v1"]);
    assert!(old.get(&key).await.unwrap().is_none());
  }

  #[tokio::test]
  async fn test_put_after_delete_recreates_the_namespace() {
    let (_dir, store) = temp_store();
    let handle = store.open("offramp-data-v1").await.unwrap();
    let key = CacheKey::new(Method::Get, "/api/titles");
    store.delete_namespace("offramp-data-v1").await.unwrap();

    handle.put(&key, &Response::new(200).with_text("back")).await.unwrap();

    assert_eq!(store.list_namespaces().await.unwrap(), vec!["offramp-data-v1"]);
    assert_eq!(handle.get(&key).await.unwrap().unwrap().response.text(), "back");
  }

  #[tokio::test]
  async fn test_put_replaces_the_previous_entry() {
    let (_dir, store) = temp_store();
    let handle = store.open("offramp-media-v1").await.unwrap();
    let key = CacheKey::new(Method::Get, "https://images.unsplash.com/x.jpg");

    handle.put(&key, &Response::new(200).with_body(vec![1, 2, 3])).await.unwrap();
    handle.put(&key, &Response::new(200).with_body(vec![9, 9])).await.unwrap();

    let cached = handle.get(&key).await.unwrap().unwrap();
    assert_eq!(cached.response.body, vec![9, 9]);
  }
}
