//! Network access behind the [`Fetch`] seam.
//!
//! The strategies only ever see this trait; tests substitute a scripted
//! fetcher, production wires in [`HttpFetcher`].

use async_trait::async_trait;
use std::collections::HashMap;
use std::time::Duration;
use thiserror::Error;
use url::Url;

use crate::config::NetworkConfig;
use crate::http::{Method, Request, Response};

#[derive(Debug, Clone, Error)]
pub enum FetchError {
  /// Connectivity, DNS or timeout failure. The strategies convert this into
  /// their fallback; it carries no response.
  #[error("network unreachable: {0}")]
  Network(String),
  /// The request URL cannot be turned into something fetchable.
  #[error("cannot resolve request URL {url}: {source}")]
  InvalidUrl {
    url: String,
    source: url::ParseError,
  },
}

/// The one place the gateway touches the network.
///
/// A non-2xx response is still `Ok`; the caller decides what a status means.
#[async_trait]
pub trait Fetch: Send + Sync {
  async fn fetch(&self, request: &Request) -> Result<Response, FetchError>;
}

/// reqwest-backed fetcher. Relative request URLs resolve against the
/// configured base origin.
pub struct HttpFetcher {
  client: reqwest::Client,
  base: Option<Url>,
}

impl HttpFetcher {
  pub fn new(config: &NetworkConfig) -> Result<Self, FetchError> {
    let client = reqwest::Client::builder()
      .timeout(Duration::from_secs(config.timeout_secs))
      .build()
      .map_err(|e| FetchError::Network(format!("failed to build HTTP client: {}", e)))?;

    let base = match &config.base_url {
      Some(raw) => Some(Url::parse(raw).map_err(|source| FetchError::InvalidUrl {
        url: raw.clone(),
        source,
      })?),
      None => None,
    };

    Ok(Self { client, base })
  }

  fn resolve(&self, raw: &str) -> Result<Url, FetchError> {
    if let Ok(url) = Url::parse(raw) {
      return Ok(url);
    }
    match &self.base {
      Some(base) => base.join(raw).map_err(|source| FetchError::InvalidUrl {
        url: raw.to_string(),
        source,
      }),
      None => Err(FetchError::InvalidUrl {
        url: raw.to_string(),
        source: url::ParseError::RelativeUrlWithoutBase,
      }),
    }
  }
}

fn reqwest_method(method: Method) -> reqwest::Method {
  match method {
    Method::Get => reqwest::Method::GET,
    Method::Post => reqwest::Method::POST,
    Method::Put => reqwest::Method::PUT,
    Method::Patch => reqwest::Method::PATCH,
    Method::Delete => reqwest::Method::DELETE,
  }
}

#[async_trait]
impl Fetch for HttpFetcher {
  async fn fetch(&self, request: &Request) -> Result<Response, FetchError> {
    let url = self.resolve(&request.url)?;

    let mut builder = self.client.request(reqwest_method(request.method), url);
    for (name, value) in &request.headers {
      builder = builder.header(name, value);
    }
    if let Some(body) = &request.body {
      builder = builder.body(body.clone());
    }

    let response = builder
      .send()
      .await
      .map_err(|e| FetchError::Network(e.to_string()))?;

    let status = response.status().as_u16();
    let headers =
      response
        .headers()
        .iter()
        .fold(HashMap::new(), |mut headers, (name, value)| {
          if let Ok(value) = value.to_str() {
            headers.insert(name.as_str().to_string(), value.to_string());
          }
          headers
        });
    let body = response
      .bytes()
      .await
      .map_err(|e| FetchError::Network(e.to_string()))?
      .to_vec();

    Ok(Response {
      status,
      headers,
      body,
    })
  }
}
