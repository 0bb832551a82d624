//! Error types for the disk asset cache.

use thiserror::Error;

use crate::remote::DownloadError;

/// Errors surfaced by `fetch_and_cache`.
///
/// `get` never fails; a broken entry is treated as a miss and repaired
/// internally. Callers receiving any of these are expected to render a
/// placeholder and decide whether to retry.
#[derive(Debug, Error)]
pub enum AssetError {
  /// Download still failing after the configured retries.
  #[error("download failed for {url}: {source}")]
  DownloadFailed {
    url: String,
    #[source]
    source: DownloadError,
  },

  /// Payload exceeded the per-item size ceiling; nothing was written.
  #[error("image of {size} bytes exceeds the per-item limit of {limit} bytes")]
  ImageTooLarge { size: u64, limit: u64 },

  /// Payload did not decode to an image with positive dimensions.
  #[error("payload is not a valid image")]
  InvalidImage,

  /// Disk I/O failure while persisting the asset or its metadata.
  #[error("asset cache I/O error: {0}")]
  Io(#[from] std::io::Error),
}
