//! The strategy engine: classifies each intercepted request and serves it
//! with the caching strategy its category prescribes.
//!
//! Every request gets an answer. Network failures turn into synthesized
//! fallbacks or pre-seeded entries; the only errors a caller can see are a
//! store failure during fallback lookup and a media fetch failing with no
//! seeded placeholder.

use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, warn};

use crate::cache::{CacheHandle, CacheKey, CacheStore, CachedResponse, Namespace, StoreError};
use crate::classify::{Category, Classifier};
use crate::config::Config;
use crate::http::{Method, Request, Response};
use crate::net::{Fetch, FetchError};

#[derive(Debug, Error)]
pub enum GatewayError {
  #[error(transparent)]
  Store(#[from] StoreError),
  #[error(transparent)]
  Network(#[from] FetchError),
}

/// Serves intercepted requests from three fixed cache namespaces, falling
/// back to the network and then to synthesized responses.
pub struct Gateway {
  classifier: Classifier,
  fetch: Arc<dyn Fetch>,
  store: Arc<dyn CacheStore>,
  primary: Arc<dyn CacheHandle>,
  data: Arc<dyn CacheHandle>,
  media: Arc<dyn CacheHandle>,
  placeholder_key: CacheKey,
  offline_page_key: CacheKey,
  generation: String,
}

impl Gateway {
  /// Open the three namespaces for the configured generation and assemble
  /// the engine.
  pub async fn open(
    store: Arc<dyn CacheStore>,
    fetch: Arc<dyn Fetch>,
    config: &Config,
  ) -> Result<Self, StoreError> {
    let generation = config.cache.generation.clone();
    let primary = store.open(&Namespace::Primary.name(&generation)).await?;
    let data = store.open(&Namespace::Data.name(&generation)).await?;
    let media = store.open(&Namespace::Media.name(&generation)).await?;

    Ok(Self {
      classifier: Classifier::new(&config.classifier),
      fetch,
      store,
      primary,
      data,
      media,
      placeholder_key: CacheKey::new(Method::Get, &config.cache.placeholder_url),
      offline_page_key: CacheKey::new(Method::Get, &config.cache.offline_page_url),
      generation,
    })
  }

  /// Serve one intercepted request.
  pub async fn handle(&self, request: &Request) -> Result<Response, GatewayError> {
    match self.classifier.classify(request) {
      Category::DataQuery => self.serve_data_query(request).await,
      Category::MediaAsset => self.serve_media_asset(request).await,
      Category::Generic => self.serve_generic(request).await,
    }
  }

  /// Stale-while-revalidate: a cached entry is returned immediately and
  /// refreshed by a detached task; only a cold cache waits on the network.
  async fn serve_data_query(&self, request: &Request) -> Result<Response, GatewayError> {
    let key = CacheKey::of(request);

    if let Some(cached) = self.lookup(&self.data, &key).await {
      debug!(request = %key, "data query served from cache, refreshing in background");
      self.spawn_refresh(request.clone());
      return Ok(cached.response);
    }

    match self.fetch.fetch(request).await {
      Ok(response) => {
        if request.method.is_get() && response.is_success() {
          self.store_response(&self.data, &key, &response).await;
        }
        Ok(response)
      }
      Err(err) => {
        warn!(request = %key, error = %err, "data query unreachable, synthesizing offline body");
        Ok(offline_json())
      }
    }
  }

  /// Cache-first: media is served without freshness checks and fetched at
  /// most once while reachable.
  async fn serve_media_asset(&self, request: &Request) -> Result<Response, GatewayError> {
    let key = CacheKey::of(request);

    if let Some(cached) = self.lookup(&self.media, &key).await {
      return Ok(cached.response);
    }

    match self.fetch.fetch(request).await {
      Ok(response) => {
        if request.method.is_get() && response.is_success() {
          self.store_response(&self.media, &key, &response).await;
        }
        Ok(response)
      }
      Err(err) => {
        warn!(request = %key, error = %err, "media unreachable, trying placeholder");
        match self.match_any(&self.placeholder_key).await? {
          Some(cached) => Ok(cached.response),
          // Nothing left to serve; the caller sees the network failure.
          None => Err(err.into()),
        }
      }
    }
  }

  /// Cache-first across every namespace, then network, then the offline page
  /// for navigations or a plain 503.
  async fn serve_generic(&self, request: &Request) -> Result<Response, GatewayError> {
    let key = CacheKey::of(request);

    let cached = match self.match_any(&key).await {
      Ok(found) => found,
      Err(err) => {
        warn!(request = %key, error = %err, "cache read failed, treating as miss");
        None
      }
    };
    if let Some(cached) = cached {
      return Ok(cached.response);
    }

    match self.fetch.fetch(request).await {
      Ok(response) => {
        if request.method.is_get() && response.is_success() {
          self.store_response(&self.primary, &key, &response).await;
        }
        Ok(response)
      }
      Err(err) => {
        if request.is_navigation() {
          if let Some(page) = self.match_any(&self.offline_page_key).await? {
            warn!(request = %key, "navigation while offline, serving offline page");
            return Ok(page.response);
          }
        }
        warn!(request = %key, error = %err, "request unreachable, synthesizing 503");
        Ok(offline_text())
      }
    }
  }

  /// The authoritative namespace set for the running generation.
  pub fn namespaces(&self) -> Vec<String> {
    Namespace::expected(&self.generation)
  }

  /// Delete every namespace whose name is not in the current generation's
  /// set, and return the surviving set.
  pub async fn activate(&self) -> Result<Vec<String>, StoreError> {
    let expected = self.namespaces();
    for name in self.store.list_namespaces().await? {
      if !expected.contains(&name) {
        debug!(namespace = %name, "pruning stale cache generation");
        self.store.delete_namespace(&name).await?;
      }
    }
    Ok(expected)
  }

  /// Detach a refresh for an entry that was just served stale. The task owns
  /// its failure handling; the serving flow never observes it.
  fn spawn_refresh(&self, request: Request) {
    let fetch = Arc::clone(&self.fetch);
    let data = Arc::clone(&self.data);
    tokio::spawn(async move {
      let key = CacheKey::of(&request);
      match fetch.fetch(&request).await {
        Ok(response) if response.is_success() => {
          if let Err(err) = data.put(&key, &response).await {
            warn!(request = %key, error = %err, "background refresh could not be stored");
          }
        }
        Ok(response) => {
          debug!(request = %key, status = response.status, "background refresh non-success, keeping cached entry");
        }
        Err(err) => {
          debug!(request = %key, error = %err, "background refresh failed, keeping cached entry");
        }
      }
    });
  }

  /// Cache read on the serving path; a failure degrades to a miss.
  async fn lookup(&self, handle: &Arc<dyn CacheHandle>, key: &CacheKey) -> Option<CachedResponse> {
    match handle.get(key).await {
      Ok(found) => found,
      Err(err) => {
        warn!(namespace = handle.namespace(), request = %key, error = %err, "cache read failed, treating as miss");
        None
      }
    }
  }

  /// Cache write on the serving path; a failure is logged, never fatal.
  async fn store_response(&self, handle: &Arc<dyn CacheHandle>, key: &CacheKey, response: &Response) {
    if let Err(err) = handle.put(key, response).await {
      warn!(namespace = handle.namespace(), request = %key, error = %err, "cache write failed");
    }
  }

  /// Namespace-agnostic lookup, consulting each partition in a fixed order.
  async fn match_any(&self, key: &CacheKey) -> Result<Option<CachedResponse>, StoreError> {
    for handle in [&self.primary, &self.data, &self.media] {
      if let Some(cached) = handle.get(key).await? {
        return Ok(Some(cached));
      }
    }
    Ok(None)
  }
}

/// Synthesized body for an unreachable data query.
fn offline_json() -> Response {
  Response::new(503).with_json(&serde_json::json!({
    "error": "Offline",
    "message": "You are currently offline",
  }))
}

/// Synthesized fallback for anything else unreachable.
fn offline_text() -> Response {
  Response::new(503).with_text("Offline")
}
