//! In-memory cache store, used in tests and anywhere persistence is not
//! wanted.

use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use super::traits::{CacheHandle, CacheStore, StoreError};
use super::{CacheKey, CachedResponse};
use crate::http::Response;

type Namespaces = HashMap<String, HashMap<String, CachedResponse>>;

pub struct MemoryStore {
  namespaces: Arc<Mutex<Namespaces>>,
}

impl MemoryStore {
  pub fn new() -> Self {
    Self {
      namespaces: Arc::new(Mutex::new(HashMap::new())),
    }
  }
}

impl Default for MemoryStore {
  fn default() -> Self {
    Self::new()
  }
}

fn lock(namespaces: &Mutex<Namespaces>) -> Result<std::sync::MutexGuard<'_, Namespaces>, StoreError> {
  namespaces
    .lock()
    .map_err(|e| StoreError::Backend(format!("lock poisoned: {}", e)))
}

#[async_trait]
impl CacheStore for MemoryStore {
  async fn open(&self, namespace: &str) -> Result<Arc<dyn CacheHandle>, StoreError> {
    lock(&self.namespaces)?.entry(namespace.to_string()).or_default();
    Ok(Arc::new(MemoryHandle {
      namespace: namespace.to_string(),
      namespaces: Arc::clone(&self.namespaces),
    }))
  }

  async fn list_namespaces(&self) -> Result<Vec<String>, StoreError> {
    let mut names: Vec<String> = lock(&self.namespaces)?.keys().cloned().collect();
    names.sort();
    Ok(names)
  }

  async fn delete_namespace(&self, namespace: &str) -> Result<(), StoreError> {
    lock(&self.namespaces)?.remove(namespace);
    Ok(())
  }
}

struct MemoryHandle {
  namespace: String,
  namespaces: Arc<Mutex<Namespaces>>,
}

#[async_trait]
impl CacheHandle for MemoryHandle {
  async fn get(&self, key: &CacheKey) -> Result<Option<CachedResponse>, StoreError> {
    let namespaces = lock(&self.namespaces)?;
    Ok(
      namespaces
        .get(&self.namespace)
        .and_then(|entries| entries.get(&key.storage_key()))
        .cloned(),
    )
  }

  async fn put(&self, key: &CacheKey, response: &Response) -> Result<(), StoreError> {
    let mut namespaces = lock(&self.namespaces)?;
    // A handle may outlive deletion of its namespace; writing recreates it.
    let entries = namespaces.entry(self.namespace.clone()).or_default();
    entries.insert(
      key.storage_key(),
      CachedResponse {
        response: response.clone(),
        cached_at: Utc::now(),
      },
    );
    Ok(())
  }

  fn namespace(&self) -> &str {
    &self.namespace
  }
}
