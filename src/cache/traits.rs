//! Store traits for the namespaced response cache.

use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;

use super::{CacheKey, CachedResponse};
use crate::http::Response;

#[derive(Debug, Error)]
pub enum StoreError {
  /// The backing store cannot be reached at all.
  #[error("cache store unavailable: {0}")]
  Unavailable(String),
  /// The store responded but the operation failed.
  #[error("cache store error: {0}")]
  Backend(String),
}

/// A collection of named response caches.
///
/// Namespaces are created on first open and live until deleted. Two handles
/// to the same name observe each other's writes; handles to different names
/// never do.
#[async_trait]
pub trait CacheStore: Send + Sync {
  /// Open a namespace, creating it if needed.
  async fn open(&self, namespace: &str) -> Result<Arc<dyn CacheHandle>, StoreError>;

  /// Names of every namespace currently in the store.
  async fn list_namespaces(&self) -> Result<Vec<String>, StoreError>;

  /// Drop a namespace and everything stored under it.
  async fn delete_namespace(&self, namespace: &str) -> Result<(), StoreError>;
}

/// Handle to one namespace of a [`CacheStore`].
#[async_trait]
pub trait CacheHandle: Send + Sync {
  async fn get(&self, key: &CacheKey) -> Result<Option<CachedResponse>, StoreError>;

  /// Store a response under `key`, replacing any previous entry whole.
  async fn put(&self, key: &CacheKey, response: &Response) -> Result<(), StoreError>;

  fn namespace(&self) -> &str;
}
