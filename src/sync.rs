//! Drains deferred writes to the network when the host signals that
//! connectivity returned.
//!
//! Delivery is at-least-once: records are cleared only after the commit for
//! the whole batch succeeded, so a failure between commit and clear means the
//! next drain sends them again. Nothing here retries on its own; the cadence
//! is entirely the host's trigger frequency.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, error, info, warn};

use crate::config::SyncConfig;
use crate::http::Request;
use crate::net::{Fetch, FetchError};
use crate::queue::{PendingQueue, PendingWrite, SyncKind};

/// Where a drain attempt ended up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DrainOutcome {
  /// Nothing queued; no network call was made.
  Empty,
  /// The batch was committed and cleared from the queue.
  Committed(usize),
  /// The commit failed; every record stays queued for the next trigger.
  Retained(usize),
  /// Another drain for this kind is in flight; nothing was touched.
  AlreadyDraining,
  /// The queue could not be read; nothing was touched.
  Unavailable,
}

/// Per-kind counters for host observability.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncStats {
  pub drains: u64,
  pub committed_records: u64,
  pub retained_drains: u64,
}

#[derive(Default)]
struct Lane {
  draining: AtomicBool,
  drains: AtomicU64,
  committed_records: AtomicU64,
  retained_drains: AtomicU64,
}

/// Why a commit did not land.
#[derive(Debug, Error)]
enum CommitFailure {
  #[error("commit rejected with status {0}")]
  Rejected(u16),
  #[error(transparent)]
  Network(#[from] FetchError),
}

pub struct SyncCoordinator {
  queue: Arc<dyn PendingQueue>,
  fetch: Arc<dyn Fetch>,
  config: SyncConfig,
  lanes: [Lane; 2],
}

impl SyncCoordinator {
  pub fn new(queue: Arc<dyn PendingQueue>, fetch: Arc<dyn Fetch>, config: SyncConfig) -> Self {
    Self {
      queue,
      fetch,
      config,
      lanes: Default::default(),
    }
  }

  fn lane(&self, kind: SyncKind) -> &Lane {
    match kind {
      SyncKind::WatchHistory => &self.lanes[0],
      SyncKind::ListChange => &self.lanes[1],
    }
  }

  /// Host boundary: map a connectivity-restored tag onto a drain. Unknown
  /// tags are logged and ignored.
  pub async fn on_trigger(&self, tag: &str) -> Option<DrainOutcome> {
    match SyncKind::from_tag(tag) {
      Some(kind) => Some(self.on_connectivity_restored(kind).await),
      None => {
        warn!(tag, "ignoring connectivity trigger with unknown tag");
        None
      }
    }
  }

  /// Drain every queued record of `kind` and commit them as one batch.
  pub async fn on_connectivity_restored(&self, kind: SyncKind) -> DrainOutcome {
    let lane = self.lane(kind);
    if lane.draining.swap(true, Ordering::AcqRel) {
      debug!(kind = %kind, "drain already in flight");
      return DrainOutcome::AlreadyDraining;
    }
    let _guard = DrainGuard(&lane.draining);
    lane.drains.fetch_add(1, Ordering::Relaxed);

    let batch = match self.queue.drain(kind).await {
      Ok(batch) => batch,
      Err(err) => {
        warn!(kind = %kind, error = %err, "queue unreadable, will retry on next trigger");
        return DrainOutcome::Unavailable;
      }
    };
    if batch.is_empty() {
      debug!(kind = %kind, "queue empty, skipping commit");
      return DrainOutcome::Empty;
    }

    let queued = batch.len();
    match self.commit(kind, &batch).await {
      Ok(()) => {
        let last_id = batch[queued - 1].id;
        match self.queue.clear_through(kind, last_id).await {
          Ok(cleared) => {
            info!(kind = %kind, committed = queued, cleared, "batch committed and cleared");
          }
          Err(err) => {
            // The records will be sent again on the next trigger; at-least-once
            // delivery tolerates the duplicate.
            error!(kind = %kind, error = %err, "batch committed but clearing the queue failed");
          }
        }
        lane.committed_records.fetch_add(queued as u64, Ordering::Relaxed);
        DrainOutcome::Committed(queued)
      }
      Err(failure) => {
        lane.retained_drains.fetch_add(1, Ordering::Relaxed);
        warn!(kind = %kind, queued, reason = %failure, "commit failed, batch retained");
        DrainOutcome::Retained(queued)
      }
    }
  }

  /// One POST carrying the whole batch as a JSON array, in queue order.
  async fn commit(&self, kind: SyncKind, batch: &[PendingWrite]) -> Result<(), CommitFailure> {
    let payloads: Vec<serde_json::Value> =
      batch.iter().map(|record| record.payload.clone()).collect();
    let request = Request::post(self.config.endpoint(kind))
      .with_json_body(&serde_json::Value::Array(payloads));

    match self.fetch.fetch(&request).await {
      Ok(response) if response.is_success() => Ok(()),
      Ok(response) => Err(CommitFailure::Rejected(response.status)),
      Err(err) => Err(err.into()),
    }
  }

  pub fn stats(&self, kind: SyncKind) -> SyncStats {
    let lane = self.lane(kind);
    SyncStats {
      drains: lane.drains.load(Ordering::Relaxed),
      committed_records: lane.committed_records.load(Ordering::Relaxed),
      retained_drains: lane.retained_drains.load(Ordering::Relaxed),
    }
  }
}

/// Clears the draining flag when a drain exits by any path.
struct DrainGuard<'a>(&'a AtomicBool);

impl Drop for DrainGuard<'_> {
  fn drop(&mut self) {
    self.0.store(false, Ordering::Release);
  }
}
