//! Durable queue of mutations deferred while offline.
//!
//! Records are appended by the producing side of the application and only
//! leave the queue through [`PendingQueue::clear_through`] once the batch
//! containing them has been committed. Ids are monotonic per queue; that is
//! what keeps a drain's read-then-clear exact when producers append
//! concurrently.

mod memory;
mod sqlite;

pub use memory::MemoryQueue;
pub use sqlite::SqliteQueue;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::fmt;
use thiserror::Error;

/// The closed set of mutation kinds the application defers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SyncKind {
  WatchHistory,
  ListChange,
}

impl SyncKind {
  pub const ALL: [SyncKind; 2] = [SyncKind::WatchHistory, SyncKind::ListChange];

  /// Wire tag used by host connectivity events and stored records.
  pub fn tag(&self) -> &'static str {
    match self {
      SyncKind::WatchHistory => "watch-history",
      SyncKind::ListChange => "list-change",
    }
  }

  /// Parse a host-supplied tag. Unknown tags return `None`; the caller
  /// decides whether that is worth logging.
  pub fn from_tag(tag: &str) -> Option<SyncKind> {
    Self::ALL.into_iter().find(|kind| kind.tag() == tag)
  }
}

impl fmt::Display for SyncKind {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.tag())
  }
}

/// One deferred mutation awaiting commit.
#[derive(Debug, Clone, PartialEq)]
pub struct PendingWrite {
  pub id: i64,
  pub kind: SyncKind,
  pub payload: serde_json::Value,
  pub enqueued_at: DateTime<Utc>,
}

#[derive(Debug, Error)]
pub enum QueueError {
  #[error("pending-write queue unavailable: {0}")]
  Unavailable(String),
  #[error("pending-write queue error: {0}")]
  Backend(String),
}

/// Storage for deferred writes, one logical lane per [`SyncKind`].
#[async_trait]
pub trait PendingQueue: Send + Sync {
  /// Append a record and return its id.
  async fn enqueue(&self, kind: SyncKind, payload: serde_json::Value) -> Result<i64, QueueError>;

  /// Snapshot every queued record of one kind, in id order. Non-destructive.
  async fn drain(&self, kind: SyncKind) -> Result<Vec<PendingWrite>, QueueError>;

  /// Delete records of `kind` with id <= `last_id`. Returns how many were
  /// removed. Records appended after the drain snapshot have higher ids and
  /// are untouched.
  async fn clear_through(&self, kind: SyncKind, last_id: i64) -> Result<usize, QueueError>;
}
