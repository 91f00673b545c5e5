//! SQLite-backed pending-write queue.
//!
//! `AUTOINCREMENT` guarantees ids grow monotonically and are never reused,
//! which `clear_through` depends on.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use super::{PendingQueue, PendingWrite, QueueError, SyncKind};

pub struct SqliteQueue {
  conn: Mutex<Connection>,
}

impl SqliteQueue {
  /// Open the queue at the default location.
  pub fn open() -> Result<Self, QueueError> {
    Self::open_at(&Self::default_path()?)
  }

  /// Open the queue at an explicit path, creating parent directories.
  pub fn open_at(path: &Path) -> Result<Self, QueueError> {
    if let Some(parent) = path.parent() {
      std::fs::create_dir_all(parent)
        .map_err(|e| QueueError::Unavailable(format!("failed to create queue directory: {}", e)))?;
    }

    let conn = Connection::open(path).map_err(|e| {
      QueueError::Unavailable(format!("failed to open queue database at {}: {}", path.display(), e))
    })?;

    let queue = Self {
      conn: Mutex::new(conn),
    };
    queue.run_migrations()?;

    Ok(queue)
  }

  fn default_path() -> Result<PathBuf, QueueError> {
    let data_dir = dirs::data_dir()
      .or_else(|| dirs::home_dir().map(|p| p.join(".local/share")))
      .ok_or_else(|| QueueError::Unavailable("could not determine data directory".to_string()))?;

    Ok(data_dir.join("offramp").join("queue.db"))
  }

  fn run_migrations(&self) -> Result<(), QueueError> {
    let conn = lock(&self.conn)?;

    conn
      .execute_batch(QUEUE_SCHEMA)
      .map_err(|e| QueueError::Backend(format!("failed to run queue migrations: {}", e)))?;

    Ok(())
  }
}

/// Schema for the pending-write queue.
const QUEUE_SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS pending_writes (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    kind TEXT NOT NULL,
    payload TEXT NOT NULL,
    enqueued_at TEXT NOT NULL DEFAULT (datetime('now'))
);

CREATE INDEX IF NOT EXISTS idx_pending_writes_kind ON pending_writes(kind, id);
"#;

fn lock(conn: &Mutex<Connection>) -> Result<std::sync::MutexGuard<'_, Connection>, QueueError> {
  conn
    .lock()
    .map_err(|e| QueueError::Backend(format!("lock poisoned: {}", e)))
}

#[async_trait]
impl PendingQueue for SqliteQueue {
  async fn enqueue(&self, kind: SyncKind, payload: serde_json::Value) -> Result<i64, QueueError> {
    let payload = serde_json::to_string(&payload)
      .map_err(|e| QueueError::Backend(format!("failed to serialize payload: {}", e)))?;

    let conn = lock(&self.conn)?;
    conn
      .execute(
        "INSERT INTO pending_writes (kind, payload) VALUES (?, ?)",
        params![kind.tag(), payload],
      )
      .map_err(|e| QueueError::Backend(format!("failed to enqueue record: {}", e)))?;

    Ok(conn.last_insert_rowid())
  }

  async fn drain(&self, kind: SyncKind) -> Result<Vec<PendingWrite>, QueueError> {
    let conn = lock(&self.conn)?;
    let mut stmt = conn
      .prepare(
        "SELECT id, payload, enqueued_at FROM pending_writes
         WHERE kind = ? ORDER BY id",
      )
      .map_err(|e| QueueError::Backend(format!("failed to prepare query: {}", e)))?;

    let rows: Vec<(i64, String, String)> = stmt
      .query_map(params![kind.tag()], |row| {
        Ok((row.get(0)?, row.get(1)?, row.get(2)?))
      })
      .map_err(|e| QueueError::Backend(format!("failed to read queue: {}", e)))?
      .filter_map(|r| r.ok())
      .collect();

    let mut records = Vec::with_capacity(rows.len());
    for (id, payload_json, enqueued_at_str) in rows {
      let payload = serde_json::from_str(&payload_json)
        .map_err(|e| QueueError::Backend(format!("failed to deserialize payload: {}", e)))?;
      records.push(PendingWrite {
        id,
        kind,
        payload,
        enqueued_at: parse_datetime(&enqueued_at_str)?,
      });
    }

    Ok(records)
  }

  async fn clear_through(&self, kind: SyncKind, last_id: i64) -> Result<usize, QueueError> {
    let conn = lock(&self.conn)?;
    let removed = conn
      .execute(
        "DELETE FROM pending_writes WHERE kind = ? AND id <= ?",
        params![kind.tag(), last_id],
      )
      .map_err(|e| QueueError::Backend(format!("failed to clear queue: {}", e)))?;

    Ok(removed)
  }
}

/// Parse a datetime string from SQLite format.
fn parse_datetime(s: &str) -> Result<DateTime<Utc>, QueueError> {
  // SQLite stores as "YYYY-MM-DD HH:MM:SS"
  chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S")
    .map(|dt| dt.and_utc())
    .map_err(|e| QueueError::Backend(format!("failed to parse datetime '{}': {}", s, e)))
}
