#[cfg(test)]
pub mod utils {
  use std::collections::VecDeque;
  use std::sync::{Arc, Mutex};

  use async_trait::async_trait;
  use tokio::sync::Semaphore;

  use crate::http::{Request, Response};
  use crate::net::{Fetch, FetchError};

  /// Install a fmt subscriber for tests that want to see gateway logs.
  /// Safe to call repeatedly.
  pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
      .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
      .with_test_writer()
      .try_init();
  }

  /// Scripted [`Fetch`] implementation.
  ///
  /// Responses are served front-to-back; once the script runs out every call
  /// fails with a network error, so an unscripted fetcher behaves like a
  /// machine that is offline. Every request is recorded for assertions, and
  /// an optional gate makes calls block until the test releases them.
  pub struct FakeFetch {
    script: Mutex<VecDeque<Result<Response, FetchError>>>,
    requests: Mutex<Vec<Request>>,
    gate: Option<Arc<Semaphore>>,
  }

  impl FakeFetch {
    /// A fetcher with nothing scripted: every call fails as offline.
    pub fn offline() -> Self {
      Self::scripted(Vec::new())
    }

    pub fn with_responses(responses: Vec<Response>) -> Self {
      Self::scripted(responses.into_iter().map(Ok).collect())
    }

    pub fn scripted(script: Vec<Result<Response, FetchError>>) -> Self {
      Self {
        script: Mutex::new(script.into()),
        requests: Mutex::new(Vec::new()),
        gate: None,
      }
    }

    /// A gated fetcher: each call records its request, then waits for one
    /// permit on the returned semaphore before answering.
    pub fn gated(responses: Vec<Response>) -> (Self, Arc<Semaphore>) {
      let gate = Arc::new(Semaphore::new(0));
      let fetch = Self {
        script: Mutex::new(responses.into_iter().map(Ok).collect()),
        requests: Mutex::new(Vec::new()),
        gate: Some(Arc::clone(&gate)),
      };
      (fetch, gate)
    }

    pub fn calls(&self) -> usize {
      self.requests.lock().unwrap().len()
    }

    pub fn requests(&self) -> Vec<Request> {
      self.requests.lock().unwrap().clone()
    }

    pub fn last_request(&self) -> Option<Request> {
      self.requests.lock().unwrap().last().cloned()
    }
  }

  #[async_trait]
  impl Fetch for FakeFetch {
    async fn fetch(&self, request: &Request) -> Result<Response, FetchError> {
      self.requests.lock().unwrap().push(request.clone());
      if let Some(gate) = &self.gate {
        let permit = gate.acquire().await.unwrap();
        permit.forget();
      }
      match self.script.lock().unwrap().pop_front() {
        Some(result) => result,
        None => Err(FetchError::Network("scripted fetcher is offline".to_string())),
      }
    }
  }
}
