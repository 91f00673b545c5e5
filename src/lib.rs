//! Offline-first request gateway.
//!
//! `offramp` sits between an application and the network. Every outbound
//! request is classified by URL shape and served with the caching strategy
//! its category prescribes:
//!
//! - data queries: serve stale, refresh in the background
//! - media assets: cache-first, seeded placeholder when unreachable
//! - everything else: cache-first, then network, then the offline page
//!
//! Mutations performed while offline are queued as pending writes; the
//! [`SyncCoordinator`] drains and commits them in batches when the host
//! signals that connectivity returned.
//!
//! ```no_run
//! use std::sync::Arc;
//! use offramp::{Config, Gateway, HttpFetcher, Request, SqliteStore};
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let config = Config::load(None)?;
//! let store = Arc::new(SqliteStore::open()?);
//! let fetch = Arc::new(HttpFetcher::new(&config.network)?);
//!
//! let gateway = Gateway::open(store, fetch, &config).await?;
//! gateway.activate().await?;
//!
//! let response = gateway.handle(&Request::get("/api/content/trending")).await?;
//! println!("{}", response.status);
//! # Ok(())
//! # }
//! ```

pub mod cache;
pub mod classify;
pub mod config;
pub mod gateway;
pub mod http;
pub mod net;
pub mod queue;
pub mod sync;
pub mod test;

pub use cache::{
  CacheHandle, CacheKey, CacheStore, CachedResponse, MemoryStore, Namespace, SqliteStore,
  StoreError,
};
pub use classify::{Category, Classifier};
pub use config::{Config, ConfigError};
pub use gateway::{Gateway, GatewayError};
pub use http::{Method, Request, RequestMode, Response};
pub use net::{Fetch, FetchError, HttpFetcher};
pub use queue::{MemoryQueue, PendingQueue, PendingWrite, QueueError, SqliteQueue, SyncKind};
pub use sync::{DrainOutcome, SyncCoordinator, SyncStats};
