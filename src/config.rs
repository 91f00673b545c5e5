use serde::Deserialize;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::queue::SyncKind;

#[derive(Debug, Error)]
pub enum ConfigError {
  #[error("config file not found: {0}")]
  NotFound(PathBuf),
  #[error("failed to read config file {path}: {source}")]
  Io {
    path: PathBuf,
    source: std::io::Error,
  },
  #[error("failed to parse config file {path}: {source}")]
  Parse {
    path: PathBuf,
    source: serde_yaml::Error,
  },
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
  #[serde(default)]
  pub classifier: ClassifierConfig,
  #[serde(default)]
  pub cache: CacheConfig,
  #[serde(default)]
  pub sync: SyncConfig,
  #[serde(default)]
  pub network: NetworkConfig,
}

/// Allow-lists driving request classification.
#[derive(Debug, Clone, Deserialize)]
pub struct ClassifierConfig {
  /// Path prefixes treated as API data queries.
  #[serde(default = "default_api_prefixes")]
  pub api_prefixes: Vec<String>,
  /// Origins whose traffic counts as media regardless of extension
  /// (case-insensitive).
  #[serde(default = "default_media_origins", deserialize_with = "deserialize_lowercase_set")]
  pub media_origins: BTreeSet<String>,
  /// File extensions treated as images (case-insensitive).
  #[serde(default = "default_image_extensions", deserialize_with = "deserialize_lowercase_set")]
  pub image_extensions: BTreeSet<String>,
}

impl Default for ClassifierConfig {
  fn default() -> Self {
    Self {
      api_prefixes: default_api_prefixes(),
      media_origins: default_media_origins(),
      image_extensions: default_image_extensions(),
    }
  }
}

fn default_api_prefixes() -> Vec<String> {
  vec!["/api/".to_string()]
}

fn default_media_origins() -> BTreeSet<String> {
  ["https://images.unsplash.com", "https://image.tmdb.org"]
    .into_iter()
    .map(String::from)
    .collect()
}

fn default_image_extensions() -> BTreeSet<String> {
  ["jpg", "jpeg", "png", "gif", "webp", "svg"]
    .into_iter()
    .map(String::from)
    .collect()
}

fn deserialize_lowercase_set<'de, D>(deserializer: D) -> Result<BTreeSet<String>, D::Error>
where
  D: serde::Deserializer<'de>,
{
  let v: Vec<String> = Vec::deserialize(deserializer)?;
  Ok(v.into_iter().map(|s| s.to_lowercase()).collect())
}

/// Cache naming and fallback entry points.
#[derive(Debug, Clone, Deserialize)]
pub struct CacheConfig {
  /// Generation tag baked into every namespace name. Bump it to invalidate
  /// all caches on the next activation.
  #[serde(default = "default_generation")]
  pub generation: String,
  /// URL under which the seeded placeholder image is stored.
  #[serde(default = "default_placeholder_url")]
  pub placeholder_url: String,
  /// URL under which the seeded offline page is stored.
  #[serde(default = "default_offline_page_url")]
  pub offline_page_url: String,
}

impl Default for CacheConfig {
  fn default() -> Self {
    Self {
      generation: default_generation(),
      placeholder_url: default_placeholder_url(),
      offline_page_url: default_offline_page_url(),
    }
  }
}

fn default_generation() -> String {
  "v1".to_string()
}

fn default_placeholder_url() -> String {
  "/placeholder.png".to_string()
}

fn default_offline_page_url() -> String {
  "/offline.html".to_string()
}

/// Commit endpoints for the deferred-write queue.
#[derive(Debug, Clone, Deserialize)]
pub struct SyncConfig {
  #[serde(default = "default_watch_history_endpoint")]
  pub watch_history_endpoint: String,
  #[serde(default = "default_list_change_endpoint")]
  pub list_change_endpoint: String,
}

impl SyncConfig {
  pub fn endpoint(&self, kind: SyncKind) -> &str {
    match kind {
      SyncKind::WatchHistory => &self.watch_history_endpoint,
      SyncKind::ListChange => &self.list_change_endpoint,
    }
  }
}

impl Default for SyncConfig {
  fn default() -> Self {
    Self {
      watch_history_endpoint: default_watch_history_endpoint(),
      list_change_endpoint: default_list_change_endpoint(),
    }
  }
}

fn default_watch_history_endpoint() -> String {
  "/api/sync/watch-history".to_string()
}

fn default_list_change_endpoint() -> String {
  "/api/sync/list-change".to_string()
}

#[derive(Debug, Clone, Deserialize)]
pub struct NetworkConfig {
  /// Base origin that relative request URLs resolve against.
  pub base_url: Option<String>,
  #[serde(default = "default_timeout_secs")]
  pub timeout_secs: u64,
}

impl Default for NetworkConfig {
  fn default() -> Self {
    Self {
      base_url: None,
      timeout_secs: default_timeout_secs(),
    }
  }
}

fn default_timeout_secs() -> u64 {
  30
}

impl Config {
  /// Load configuration from file.
  ///
  /// Search order:
  /// 1. Explicit path if provided
  /// 2. ./offramp.yaml (current directory)
  /// 3. $XDG_CONFIG_HOME/offramp/config.yaml
  /// 4. ~/.config/offramp/config.yaml
  ///
  /// Every section has defaults, so a missing file (when no explicit path was
  /// given) yields the default configuration.
  pub fn load(explicit_path: Option<&Path>) -> Result<Self, ConfigError> {
    let path = if let Some(p) = explicit_path {
      if p.exists() {
        Some(p.to_path_buf())
      } else {
        return Err(ConfigError::NotFound(p.to_path_buf()));
      }
    } else {
      Self::find_config_file()
    };

    match path {
      Some(p) => Self::load_from_path(&p),
      None => Ok(Self::default()),
    }
  }

  fn find_config_file() -> Option<PathBuf> {
    // Check current directory
    let local = PathBuf::from("offramp.yaml");
    if local.exists() {
      return Some(local);
    }

    // Check XDG config directory
    if let Some(config_dir) = dirs::config_dir() {
      let xdg_path = config_dir.join("offramp").join("config.yaml");
      if xdg_path.exists() {
        return Some(xdg_path);
      }
    }

    None
  }

  fn load_from_path(path: &Path) -> Result<Self, ConfigError> {
    let contents = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
      path: path.to_path_buf(),
      source: e,
    })?;

    let config: Config = serde_yaml::from_str(&contents).map_err(|e| ConfigError::Parse {
      path: path.to_path_buf(),
      source: e,
    })?;

    Ok(config)
  }
}
