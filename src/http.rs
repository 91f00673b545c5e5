//! Request and response model for the gateway.
//!
//! Requests carry their URL as written by the caller, which may be
//! origin-relative (`/api/titles`) or absolute. The shape helpers here parse
//! just enough of the URL for classification; full resolution happens at the
//! network seam.

use std::collections::HashMap;
use std::fmt;

use url::Url;

/// HTTP methods the gateway routes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
  Get,
  Post,
  Put,
  Patch,
  Delete,
}

impl Method {
  pub fn as_str(&self) -> &'static str {
    match self {
      Method::Get => "GET",
      Method::Post => "POST",
      Method::Put => "PUT",
      Method::Patch => "PATCH",
      Method::Delete => "DELETE",
    }
  }

  pub fn is_get(&self) -> bool {
    matches!(self, Method::Get)
  }
}

impl fmt::Display for Method {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

/// Whether a request is a full-page navigation or a subresource fetch.
///
/// Navigations get the offline page as their terminal fallback; everything
/// else degrades to a plain 503.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum RequestMode {
  #[default]
  Resource,
  Navigate,
}

/// An outbound request intercepted by the gateway.
#[derive(Debug, Clone)]
pub struct Request {
  pub method: Method,
  pub url: String,
  pub headers: HashMap<String, String>,
  pub body: Option<Vec<u8>>,
  pub mode: RequestMode,
}

impl Request {
  pub fn new(method: Method, url: impl Into<String>) -> Self {
    Self {
      method,
      url: url.into(),
      headers: HashMap::new(),
      body: None,
      mode: RequestMode::Resource,
    }
  }

  pub fn get(url: impl Into<String>) -> Self {
    Self::new(Method::Get, url)
  }

  pub fn post(url: impl Into<String>) -> Self {
    Self::new(Method::Post, url)
  }

  pub fn with_mode(mut self, mode: RequestMode) -> Self {
    self.mode = mode;
    self
  }

  /// Header names are folded to lowercase so lookups stay case-insensitive.
  pub fn with_header(mut self, name: &str, value: &str) -> Self {
    self.headers.insert(name.to_lowercase(), value.to_string());
    self
  }

  pub fn with_body(mut self, body: Vec<u8>) -> Self {
    self.body = Some(body);
    self
  }

  pub fn with_json_body(self, value: &serde_json::Value) -> Self {
    // Serializing a Value cannot fail.
    let body = serde_json::to_vec(value).expect("serializing a JSON value");
    self
      .with_header("content-type", "application/json")
      .with_body(body)
  }

  pub fn is_navigation(&self) -> bool {
    self.mode == RequestMode::Navigate
  }

  /// Path portion of the URL, without scheme, host, query or fragment.
  pub fn path(&self) -> &str {
    // The query may itself carry an absolute URL; trim it before scanning
    // for a scheme.
    let path_end = self
      .url
      .find(|c| c == '?' || c == '#')
      .unwrap_or(self.url.len());
    let without_query = &self.url[..path_end];
    match without_query.find("://") {
      Some(scheme_end) => {
        let rest = &without_query[scheme_end + 3..];
        match rest.find('/') {
          Some(path_start) => &rest[path_start..],
          None => "/",
        }
      }
      None => without_query,
    }
  }

  /// Normalized `scheme://host[:port]` for absolute URLs, `None` for
  /// origin-relative ones.
  pub fn origin(&self) -> Option<String> {
    let parsed = Url::parse(&self.url).ok()?;
    match parsed.origin() {
      origin @ url::Origin::Tuple(..) => Some(origin.ascii_serialization()),
      url::Origin::Opaque(_) => None,
    }
  }

  /// Lowercased extension of the final path segment, if it has one.
  pub fn extension(&self) -> Option<String> {
    let file = self.path().rsplit('/').next()?;
    match file.rsplit_once('.') {
      Some((_, ext)) if !ext.is_empty() => Some(ext.to_ascii_lowercase()),
      _ => None,
    }
  }
}

/// A response as handed back to the caller or stored in a cache.
#[derive(Debug, Clone, PartialEq)]
pub struct Response {
  pub status: u16,
  pub headers: HashMap<String, String>,
  pub body: Vec<u8>,
}

impl Response {
  pub fn new(status: u16) -> Self {
    Self {
      status,
      headers: HashMap::new(),
      body: Vec::new(),
    }
  }

  pub fn with_header(mut self, name: &str, value: &str) -> Self {
    self.headers.insert(name.to_lowercase(), value.to_string());
    self
  }

  pub fn with_body(mut self, body: Vec<u8>) -> Self {
    self.body = body;
    self
  }

  pub fn with_text(self, text: &str) -> Self {
    self
      .with_header("content-type", "text/plain")
      .with_body(text.as_bytes().to_vec())
  }

  pub fn with_json(self, value: &serde_json::Value) -> Self {
    // Serializing a Value cannot fail.
    let body = serde_json::to_vec(value).expect("serializing a JSON value");
    self
      .with_header("content-type", "application/json")
      .with_body(body)
  }

  pub fn is_success(&self) -> bool {
    (200..=299).contains(&self.status)
  }

  pub fn header(&self, name: &str) -> Option<&str> {
    self.headers.get(&name.to_lowercase()).map(String::as_str)
  }

  pub fn text(&self) -> String {
    String::from_utf8_lossy(&self.body).into_owned()
  }

  pub fn json(&self) -> Result<serde_json::Value, serde_json::Error> {
    serde_json::from_slice(&self.body)
  }
}
