//! Classifies intercepted requests by URL shape alone.
//!
//! Classification never looks at headers, bodies or past traffic, so the
//! same request always lands in the same category. Rule order is fixed: API
//! path prefixes win over media origins, which win over image extensions.

use std::collections::BTreeSet;

use crate::config::ClassifierConfig;
use crate::http::Request;

/// Semantic category of an intercepted request, driving strategy dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Category {
  /// API-shaped traffic, served stale-while-revalidate.
  DataQuery,
  /// Image and media assets, served cache-first.
  MediaAsset,
  /// Everything else, served cache-first with an offline-page fallback.
  Generic,
}

/// Compiled classification rules.
#[derive(Debug, Clone)]
pub struct Classifier {
  api_prefixes: Vec<String>,
  media_origins: BTreeSet<String>,
  image_extensions: BTreeSet<String>,
}

impl Classifier {
  pub fn new(config: &ClassifierConfig) -> Self {
    Self {
      api_prefixes: config.api_prefixes.clone(),
      media_origins: config.media_origins.clone(),
      image_extensions: config.image_extensions.clone(),
    }
  }

  pub fn classify(&self, request: &Request) -> Category {
    let path = request.path();
    if self.api_prefixes.iter().any(|prefix| path.starts_with(prefix.as_str())) {
      return Category::DataQuery;
    }
    if let Some(origin) = request.origin() {
      if self.media_origins.contains(&origin) {
        return Category::MediaAsset;
      }
    }
    if let Some(extension) = request.extension() {
      if self.image_extensions.contains(&extension) {
        return Category::MediaAsset;
      }
    }
    Category::Generic
  }
}
