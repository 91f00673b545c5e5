//! In-memory pending-write queue.

use async_trait::async_trait;
use chrono::Utc;
use std::sync::Mutex;

use super::{PendingQueue, PendingWrite, QueueError, SyncKind};

pub struct MemoryQueue {
  inner: Mutex<Inner>,
}

struct Inner {
  next_id: i64,
  records: Vec<PendingWrite>,
}

impl MemoryQueue {
  pub fn new() -> Self {
    Self {
      inner: Mutex::new(Inner {
        next_id: 1,
        records: Vec::new(),
      }),
    }
  }
}

impl Default for MemoryQueue {
  fn default() -> Self {
    Self::new()
  }
}

fn lock(inner: &Mutex<Inner>) -> Result<std::sync::MutexGuard<'_, Inner>, QueueError> {
  inner
    .lock()
    .map_err(|e| QueueError::Backend(format!("lock poisoned: {}", e)))
}

#[async_trait]
impl PendingQueue for MemoryQueue {
  async fn enqueue(&self, kind: SyncKind, payload: serde_json::Value) -> Result<i64, QueueError> {
    let mut inner = lock(&self.inner)?;
    let id = inner.next_id;
    inner.next_id += 1;
    inner.records.push(PendingWrite {
      id,
      kind,
      payload,
      enqueued_at: Utc::now(),
    });
    Ok(id)
  }

  async fn drain(&self, kind: SyncKind) -> Result<Vec<PendingWrite>, QueueError> {
    let inner = lock(&self.inner)?;
    // Records are appended in id order, so the filtered view already is.
    Ok(
      inner
        .records
        .iter()
        .filter(|record| record.kind == kind)
        .cloned()
        .collect(),
    )
  }

  async fn clear_through(&self, kind: SyncKind, last_id: i64) -> Result<usize, QueueError> {
    let mut inner = lock(&self.inner)?;
    let before = inner.records.len();
    inner
      .records
      .retain(|record| record.kind != kind || record.id > last_id);
    Ok(before - inner.records.len())
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use serde_json::json;

  #[tokio::test]
  async fn test_enqueue_assigns_increasing_ids() {
    let queue = MemoryQueue::new();
    let first = queue.enqueue(SyncKind::WatchHistory, json!({"t": 1})).await.unwrap();
    let second = queue.enqueue(SyncKind::WatchHistory, json!({"t": 2})).await.unwrap();
    assert!(second > first);
  }

  #[tokio::test]
  async fn test_drain_returns_only_the_requested_kind_in_order() {
    let queue = MemoryQueue::new();
    queue.enqueue(SyncKind::WatchHistory, json!({"t": 1})).await.unwrap();
    queue.enqueue(SyncKind::ListChange, json!({"add": "dune"})).await.unwrap();
    queue.enqueue(SyncKind::WatchHistory, json!({"t": 2})).await.unwrap();

    let batch = queue.drain(SyncKind::WatchHistory).await.unwrap();
    assert_eq!(batch.len(), 2);
    assert!(batch.windows(2).all(|pair| pair[0].id < pair[1].id));
    assert!(batch.iter().all(|record| record.kind == SyncKind::WatchHistory));
  }

  #[tokio::test]
  async fn test_drain_does_not_consume() {
    let queue = MemoryQueue::new();
    queue.enqueue(SyncKind::ListChange, json!({"add": "dune"})).await.unwrap();

    assert_eq!(queue.drain(SyncKind::ListChange).await.unwrap().len(), 1);
    assert_eq!(queue.drain(SyncKind::ListChange).await.unwrap().len(), 1);
  }

  #[tokio::test]
  async fn test_clear_through_spares_later_appends() {
    let queue = MemoryQueue::new();
    queue.enqueue(SyncKind::WatchHistory, json!({"t": 1})).await.unwrap();
    queue.enqueue(SyncKind::WatchHistory, json!({"t": 2})).await.unwrap();

    let snapshot = queue.drain(SyncKind::WatchHistory).await.unwrap();
    let last_id = snapshot.last().unwrap().id;

    // A record arriving between drain and clear must survive.
    queue.enqueue(SyncKind::WatchHistory, json!({"t": 3})).await.unwrap();

    let cleared = queue.clear_through(SyncKind::WatchHistory, last_id).await.unwrap();
    assert_eq!(cleared, 2);

    let remaining = queue.drain(SyncKind::WatchHistory).await.unwrap();
    assert_eq!(remaining.len(), 1);
    assert_eq!(remaining[0].payload, json!({"t": 3}));
  }

  #[tokio::test]
  async fn test_clear_through_leaves_other_kinds_alone() {
    let queue = MemoryQueue::new();
    queue.enqueue(SyncKind::WatchHistory, json!({"t": 1})).await.unwrap();
    let list_id = queue.enqueue(SyncKind::ListChange, json!({"add": "dune"})).await.unwrap();

    queue.clear_through(SyncKind::WatchHistory, list_id).await.unwrap();
    assert_eq!(queue.drain(SyncKind::ListChange).await.unwrap().len(), 1);
  }
}
