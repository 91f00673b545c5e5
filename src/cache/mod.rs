//! Namespaced response cache backing the gateway's strategies.
//!
//! The cache is split into three fixed partitions, each stored under a name
//! that carries a generation tag (`offramp-data-v1`). Entries are whole
//! responses keyed by (method, URL); a write replaces the previous entry, and
//! nothing ever expires on its own. Invalidation is wholesale: bump the
//! generation and let activation prune the old names.

mod memory;
mod sqlite;
mod traits;

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;
pub use traits::{CacheHandle, CacheStore, StoreError};

use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};
use std::fmt;

use crate::http::{Method, Request, Response};

/// The three fixed cache partitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Namespace {
  /// App shell, navigations and anything unclassified.
  Primary,
  /// API data queries.
  Data,
  /// Images and other media assets.
  Media,
}

impl Namespace {
  pub const ALL: [Namespace; 3] = [Namespace::Primary, Namespace::Data, Namespace::Media];

  fn stem(&self) -> &'static str {
    match self {
      Namespace::Primary => "primary",
      Namespace::Data => "data",
      Namespace::Media => "media",
    }
  }

  /// Store name for this partition under a generation tag.
  pub fn name(&self, generation: &str) -> String {
    format!("offramp-{}-{}", self.stem(), generation)
  }

  /// The authoritative namespace set for one generation. Anything else in the
  /// store is a leftover from an earlier generation.
  pub fn expected(generation: &str) -> Vec<String> {
    Self::ALL.iter().map(|ns| ns.name(generation)).collect()
  }
}

impl fmt::Display for Namespace {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.stem())
  }
}

/// Cache identity of a request: method plus URL, exactly as issued.
///
/// Query strings are part of the identity; two URLs differing only in query
/// are distinct entries.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
  method: Method,
  url: String,
}

impl CacheKey {
  pub fn new(method: Method, url: impl Into<String>) -> Self {
    Self {
      method,
      url: url.into(),
    }
  }

  pub fn of(request: &Request) -> Self {
    Self::new(request.method, request.url.clone())
  }

  pub fn method(&self) -> Method {
    self.method
  }

  pub fn url(&self) -> &str {
    &self.url
  }

  /// Stable hash used as the storage key.
  pub fn storage_key(&self) -> String {
    let mut hasher = Sha256::new();
    hasher.update(self.describe().as_bytes());
    hex::encode(hasher.finalize())
  }

  /// Readable form, stored alongside the hash and used in logs.
  pub fn describe(&self) -> String {
    self.to_string()
  }
}

impl fmt::Display for CacheKey {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{} {}", self.method, self.url)
  }
}

/// A stored response plus the time it entered the cache.
///
/// The timestamp is observational only; entries are served regardless of age.
#[derive(Debug, Clone, PartialEq)]
pub struct CachedResponse {
  pub response: Response,
  pub cached_at: DateTime<Utc>,
}
