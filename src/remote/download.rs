//! Byte downloads for the asset cache.

use std::future::Future;
use std::time::Duration;

use thiserror::Error;
use tracing::debug;
use url::Url;

/// Default request timeout for asset downloads.
const DOWNLOAD_TIMEOUT: Duration = Duration::from_secs(30);

/// Errors from a single download attempt.
#[derive(Debug, Error)]
pub enum DownloadError {
  #[error("invalid asset url '{0}'")]
  BadUrl(String),

  #[error("asset not found at {0}")]
  NotFound(String),

  #[error("http error fetching {url}: {message}")]
  Http { url: String, message: String },

  #[error("timed out fetching {0}")]
  Timeout(String),
}

/// Fetches raw bytes from a URL.
///
/// The asset cache makes no other assumption about the transport, which keeps
/// tests free to substitute an in-memory implementation.
pub trait Downloader: Send + Sync {
  fn download(&self, url: &str) -> impl Future<Output = Result<Vec<u8>, DownloadError>> + Send;
}

/// Production downloader backed by reqwest.
#[derive(Clone)]
pub struct ReqwestDownloader {
  client: reqwest::Client,
}

impl ReqwestDownloader {
  pub fn new() -> Result<Self, DownloadError> {
    Self::with_timeout(DOWNLOAD_TIMEOUT)
  }

  pub fn with_timeout(timeout: Duration) -> Result<Self, DownloadError> {
    let client = reqwest::Client::builder()
      .timeout(timeout)
      .build()
      .map_err(|e| DownloadError::Http {
        url: String::new(),
        message: format!("failed to build http client: {}", e),
      })?;

    Ok(Self { client })
  }
}

impl Downloader for ReqwestDownloader {
  async fn download(&self, url: &str) -> Result<Vec<u8>, DownloadError> {
    // Validate up front so a malformed URL is not reported as a network error
    let parsed = Url::parse(url).map_err(|_| DownloadError::BadUrl(url.to_string()))?;

    debug!(url, "downloading asset");

    let response = self.client.get(parsed).send().await.map_err(|e| {
      if e.is_timeout() {
        DownloadError::Timeout(url.to_string())
      } else {
        DownloadError::Http {
          url: url.to_string(),
          message: e.to_string(),
        }
      }
    })?;

    if response.status() == reqwest::StatusCode::NOT_FOUND {
      return Err(DownloadError::NotFound(url.to_string()));
    }

    let response = response.error_for_status().map_err(|e| DownloadError::Http {
      url: url.to_string(),
      message: e.to_string(),
    })?;

    let bytes = response.bytes().await.map_err(|e| {
      if e.is_timeout() {
        DownloadError::Timeout(url.to_string())
      } else {
        DownloadError::Http {
          url: url.to_string(),
          message: e.to_string(),
        }
      }
    })?;

    Ok(bytes.to_vec())
  }
}
