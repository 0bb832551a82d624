use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

/// Configuration for the disk asset cache.
///
/// All fields have sensible defaults, so an embedding application can load
/// this from a YAML/JSON config file and override only what it needs.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AssetCacheConfig {
  /// Cache root directory (default: `<platform cache dir>/gymfeed/images`)
  pub root_dir: Option<PathBuf>,
  /// Per-item download size ceiling in bytes (default: 5 MB)
  pub max_item_bytes: u64,
  /// Aggregate on-disk budget in bytes (default: 100 MB)
  pub disk_budget_bytes: u64,
  /// Maximum number of decoded images held in memory (default: 100)
  pub memory_max_items: usize,
  /// Maximum decoded byte cost held in memory (default: 64 MB)
  pub memory_max_bytes: u64,
  /// Age after which a cached asset is treated as absent (default: 7 days)
  pub ttl_days: u32,
  /// Download retries after the first failed attempt (default: 3)
  pub download_retries: u32,
  /// Base interval for exponential retry backoff (default: 1 s)
  pub backoff_base_secs: u64,
}

impl Default for AssetCacheConfig {
  fn default() -> Self {
    Self {
      root_dir: None,
      max_item_bytes: 5 * 1024 * 1024,
      disk_budget_bytes: 100 * 1024 * 1024,
      memory_max_items: 100,
      memory_max_bytes: 64 * 1024 * 1024,
      ttl_days: 7,
      download_retries: 3,
      backoff_base_secs: 1,
    }
  }
}

impl AssetCacheConfig {
  /// Resolve the cache root, falling back to the platform cache directory.
  pub fn resolve_root(&self) -> std::io::Result<PathBuf> {
    if let Some(root) = &self.root_dir {
      return Ok(root.clone());
    }

    dirs::cache_dir()
      .or_else(|| dirs::home_dir().map(|p| p.join(".cache")))
      .map(|p| p.join("gymfeed").join("images"))
      .ok_or_else(|| std::io::Error::other("could not determine a cache directory"))
  }

  pub fn ttl(&self) -> chrono::Duration {
    chrono::Duration::days(i64::from(self.ttl_days))
  }

  pub fn backoff_base(&self) -> Duration {
    Duration::from_secs(self.backoff_base_secs)
  }
}
