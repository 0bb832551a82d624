//! Two-tier disk asset cache with deduplicated, retrying downloads.

use std::collections::HashSet;
use std::fs;
use std::io::{self, Cursor};
use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::Utc;
use image::{DynamicImage, ImageFormat};
use tracing::{debug, warn};

use crate::config::AssetCacheConfig;
use crate::remote::Downloader;

use super::error::AssetError;
use super::memory::MemoryImageCache;
use super::metadata::{asset_path, AssetMetadata, MetadataIndex};

/// Mutable cache state, serialized under one lock.
///
/// Every mutation point (the decoded-image table, the metadata index, the
/// in-flight marker set, eviction) goes through this struct; downloads and
/// backoff sleeps happen outside the lock.
struct CacheState {
  index: MetadataIndex,
  memory: MemoryImageCache,
  in_flight: HashSet<String>,
  // Access-time updates not yet written to disk
  pending_touches: u32,
}

/// Access-time updates are batched; the index is rewritten only after this
/// many unpersisted touches, or on the next mutation. Startup reconciliation
/// tolerates the stale `last_accessed_at` a crash can leave behind.
const TOUCH_FLUSH_THRESHOLD: u32 = 16;

/// Disk-backed cache of downloaded images.
///
/// Each asset lives as an encoded file under the cache root with a metadata
/// row (download time, size, last access) in a persisted index; decoded
/// images are additionally held in a bounded memory tier. Assets expire after
/// a TTL, and the disk footprint is kept under a budget by evicting the
/// least-recently-accessed entries.
///
/// `get` is read-only and never fails; `fetch_and_cache` runs the download
/// pipeline and guarantees at most one concurrent download per asset id.
/// Clones share the same underlying cache.
pub struct AssetCache<D> {
  inner: Arc<Inner<D>>,
}

struct Inner<D> {
  downloader: D,
  root: PathBuf,
  max_item_bytes: u64,
  disk_budget_bytes: u64,
  ttl: chrono::Duration,
  download_retries: u32,
  backoff_base: std::time::Duration,
  state: Mutex<CacheState>,
}

impl<D: Downloader> AssetCache<D> {
  /// Open (or create) the cache rooted at the configured directory, loading
  /// the metadata index and reconciling it with the files actually present.
  pub fn new(config: AssetCacheConfig, downloader: D) -> Result<Self, AssetError> {
    let root = config.resolve_root()?;
    fs::create_dir_all(&root)?;

    let index = MetadataIndex::load_or_rebuild(&root)?;
    debug!(root = %root.display(), entries = index.len(), "asset cache opened");

    Ok(Self {
      inner: Arc::new(Inner {
        downloader,
        root,
        max_item_bytes: config.max_item_bytes,
        disk_budget_bytes: config.disk_budget_bytes,
        ttl: config.ttl(),
        download_retries: config.download_retries,
        backoff_base: config.backoff_base(),
        state: Mutex::new(CacheState {
          index,
          memory: MemoryImageCache::new(config.memory_max_items, config.memory_max_bytes),
          in_flight: HashSet::new(),
          pending_touches: 0,
        }),
      }),
    })
  }

  /// Read-only lookup. Expired entries are invalidated and reported as
  /// absent; otherwise the memory tier is tried first, then the disk tier
  /// (decoding and promoting to memory on the way back). A miss returns
  /// `None` and callers are expected to trigger [`Self::fetch_and_cache`].
  pub fn get(&self, id: &str) -> Option<Arc<DynamicImage>> {
    self.inner.get(id)
  }

  /// Remove one asset from memory, index, and disk. Idempotent.
  pub fn invalidate(&self, id: &str) {
    self.inner.invalidate(id)
  }

  /// Invalidate every asset older than the TTL. Returns the number removed.
  ///
  /// Intended to run once at startup; re-running periodically is harmless.
  pub fn invalidate_expired(&self) -> usize {
    self.inner.invalidate_expired()
  }

  /// Drop all in-memory state and recreate the on-disk directory empty.
  pub fn clear(&self) -> Result<(), AssetError> {
    self.inner.clear()
  }

  /// Aggregate size of tracked files, for diagnostics.
  pub fn disk_usage_bytes(&self) -> u64 {
    self.inner.lock().index.total_bytes()
  }

  /// Number of tracked assets, for diagnostics.
  pub fn asset_count(&self) -> usize {
    self.inner.lock().index.len()
  }
}

impl<D: Downloader + 'static> AssetCache<D> {
  /// Download an asset and commit it to both tiers.
  ///
  /// Idempotent: if the asset is already decoded in memory, or a download for
  /// the same id is already in flight, this returns success without starting
  /// a second download. The pipeline itself runs as a detached task, so a
  /// caller that abandons the future cannot strand the in-flight marker other
  /// callers depend on.
  pub async fn fetch_and_cache(&self, id: &str, url: &str) -> Result<(), AssetError> {
    {
      let mut state = self.inner.lock();
      if state.memory.contains(id) {
        return Ok(());
      }
      if !state.in_flight.insert(id.to_string()) {
        debug!(id, "download already in flight");
        return Ok(());
      }
    }

    let inner = Arc::clone(&self.inner);
    let id = id.to_string();
    let url = url.to_string();

    let task = tokio::spawn(async move {
      let result = inner.download_and_store(&id, &url).await;
      inner.lock().in_flight.remove(&id);
      result
    });

    task.await.map_err(|e| AssetError::Io(io::Error::other(e)))?
  }
}

impl<D> Clone for AssetCache<D> {
  fn clone(&self) -> Self {
    Self {
      inner: Arc::clone(&self.inner),
    }
  }
}

impl<D: Downloader> Inner<D> {
  fn get(&self, id: &str) -> Option<Arc<DynamicImage>> {
    let mut state = self.lock();

    let expired = match state.index.get(id) {
      Some(meta) => Utc::now() - meta.downloaded_at > self.ttl,
      None => false,
    };
    if expired {
      debug!(id, "cached asset past ttl, invalidating");
      self.remove_locked(&mut state, id);
      self.persist_best_effort(&mut state);
      return None;
    }

    if let Some(image) = state.memory.get(id) {
      // A memory hit still counts as an access for disk LRU purposes
      self.note_touch(&mut state, id);
      return Some(image);
    }

    // Disk tier: a file without a metadata row (or vice versa) is a miss
    if state.index.get(id).is_none() {
      return None;
    }

    let path = asset_path(&self.root, id);
    let bytes = match fs::read(&path) {
      Ok(bytes) => bytes,
      Err(_) => {
        // The file vanished behind our back; drop the orphaned row
        state.index.remove(id);
        self.persist_best_effort(&mut state);
        return None;
      }
    };

    let image = match image::load_from_memory(&bytes) {
      Ok(image) => Arc::new(image),
      Err(e) => {
        warn!(id, error = %e, "cached file failed to decode, invalidating");
        self.remove_locked(&mut state, id);
        self.persist_best_effort(&mut state);
        return None;
      }
    };

    state.memory.insert(id, Arc::clone(&image));
    self.note_touch(&mut state, id);
    Some(image)
  }

  fn invalidate(&self, id: &str) {
    let mut state = self.lock();
    let present = state.memory.contains(id) || state.index.get(id).is_some();
    self.remove_locked(&mut state, id);
    if present {
      self.persist_best_effort(&mut state);
    }
  }

  fn invalidate_expired(&self) -> usize {
    let mut state = self.lock();
    let expired = state.index.expired_ids(self.ttl, Utc::now());
    for id in &expired {
      self.remove_locked(&mut state, id);
    }
    if !expired.is_empty() {
      debug!(count = expired.len(), "expired assets invalidated");
      self.persist_best_effort(&mut state);
    }
    expired.len()
  }

  fn clear(&self) -> Result<(), AssetError> {
    let mut state = self.lock();
    state.memory.clear();
    state.index = MetadataIndex::default();
    state.pending_touches = 0;

    if self.root.exists() {
      fs::remove_dir_all(&self.root)?;
    }
    fs::create_dir_all(&self.root)?;
    state.index.persist(&self.root)?;
    Ok(())
  }

  fn lock(&self) -> MutexGuard<'_, CacheState> {
    self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
  }

  /// Record an access for LRU purposes. The in-memory index is always
  /// updated; the disk write is deferred until enough touches accumulate, so
  /// the hottest read path does not rewrite the index file on every hit.
  fn note_touch(&self, state: &mut CacheState, id: &str) {
    state.index.touch(id, Utc::now());
    state.pending_touches += 1;
    if state.pending_touches >= TOUCH_FLUSH_THRESHOLD {
      self.persist_best_effort(state);
    }
  }

  fn persist_best_effort(&self, state: &mut CacheState) {
    state.pending_touches = 0;
    if let Err(e) = state.index.persist(&self.root) {
      warn!(error = %e, "failed to persist asset metadata index");
    }
  }

  fn remove_locked(&self, state: &mut CacheState, id: &str) {
    state.memory.remove(id);
    state.index.remove(id);
    if let Err(e) = fs::remove_file(asset_path(&self.root, id)) {
      if e.kind() != io::ErrorKind::NotFound {
        warn!(id, error = %e, "failed to delete cached asset file");
      }
    }
  }

  async fn download_with_retry(&self, url: &str) -> Result<Vec<u8>, AssetError> {
    let mut delay = self.backoff_base;
    let mut failures = 0;

    loop {
      match self.downloader.download(url).await {
        Ok(bytes) => return Ok(bytes),
        Err(source) => {
          failures += 1;
          if failures > self.download_retries {
            return Err(AssetError::DownloadFailed {
              url: url.to_string(),
              source,
            });
          }
          warn!(url, attempt = failures, delay_secs = delay.as_secs(), "download failed, retrying");
          tokio::time::sleep(delay).await;
          delay *= 2;
        }
      }
    }
  }

  /// Validate, encode, and commit a downloaded payload.
  async fn download_and_store(&self, id: &str, url: &str) -> Result<(), AssetError> {
    let bytes = self.download_with_retry(url).await?;

    let size = bytes.len() as u64;
    if size > self.max_item_bytes {
      return Err(AssetError::ImageTooLarge {
        size,
        limit: self.max_item_bytes,
      });
    }

    let decoded = image::load_from_memory(&bytes).map_err(|_| AssetError::InvalidImage)?;
    if decoded.width() == 0 || decoded.height() == 0 {
      return Err(AssetError::InvalidImage);
    }

    // Persisted format is PNG regardless of what the server returned
    let mut encoded = Vec::new();
    decoded
      .write_to(&mut Cursor::new(&mut encoded), ImageFormat::Png)
      .map_err(|_| AssetError::InvalidImage)?;
    let encoded_len = encoded.len() as u64;

    let mut state = self.lock();

    for victim in state.index.plan_evictions(id, encoded_len, self.disk_budget_bytes) {
      debug!(id = %victim, "evicting asset to reclaim disk space");
      self.remove_locked(&mut state, &victim);
    }

    // The file goes down before the metadata row so a failed write cannot
    // leave the index pointing at nothing
    fs::write(asset_path(&self.root, id), &encoded)?;

    let now = Utc::now();
    state.memory.insert(id, Arc::new(decoded));
    state.index.insert(
      id,
      AssetMetadata {
        downloaded_at: now,
        file_size_bytes: encoded_len,
        last_accessed_at: now,
      },
    );
    state.pending_touches = 0;
    state.index.persist(&self.root)?;

    debug!(id, bytes = encoded_len, "asset cached");
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  use std::sync::atomic::{AtomicUsize, Ordering};

  use tempfile::TempDir;
  use tokio::sync::Semaphore;

  use crate::remote::DownloadError;

  use super::super::metadata::INDEX_FILE;

  /// Programmable downloader shared across clones.
  #[derive(Clone)]
  struct MockDownloader {
    inner: Arc<MockDownloaderState>,
  }

  struct MockDownloaderState {
    payload: Vec<u8>,
    calls: AtomicUsize,
    failures_remaining: AtomicUsize,
    gate: Option<Arc<Semaphore>>,
  }

  impl MockDownloader {
    fn serving(payload: Vec<u8>) -> Self {
      Self {
        inner: Arc::new(MockDownloaderState {
          payload,
          calls: AtomicUsize::new(0),
          failures_remaining: AtomicUsize::new(0),
          gate: None,
        }),
      }
    }

    fn failing_first(payload: Vec<u8>, failures: usize) -> Self {
      let this = Self::serving(payload);
      this.inner.failures_remaining.store(failures, Ordering::SeqCst);
      this
    }

    fn gated(payload: Vec<u8>, gate: Arc<Semaphore>) -> Self {
      Self {
        inner: Arc::new(MockDownloaderState {
          payload,
          calls: AtomicUsize::new(0),
          failures_remaining: AtomicUsize::new(0),
          gate: Some(gate),
        }),
      }
    }

    fn calls(&self) -> usize {
      self.inner.calls.load(Ordering::SeqCst)
    }
  }

  impl Downloader for MockDownloader {
    async fn download(&self, url: &str) -> Result<Vec<u8>, DownloadError> {
      self.inner.calls.fetch_add(1, Ordering::SeqCst);

      if let Some(gate) = &self.inner.gate {
        gate.acquire().await.unwrap().forget();
      }

      let remaining = self.inner.failures_remaining.load(Ordering::SeqCst);
      if remaining > 0 {
        self.inner.failures_remaining.store(remaining - 1, Ordering::SeqCst);
        return Err(DownloadError::Http {
          url: url.to_string(),
          message: "503".to_string(),
        });
      }

      Ok(self.inner.payload.clone())
    }
  }

  fn png_bytes(side: u32) -> Vec<u8> {
    let img = image::RgbaImage::from_pixel(side, side, image::Rgba([40, 80, 120, 255]));
    let mut out = Vec::new();
    DynamicImage::ImageRgba8(img)
      .write_to(&mut Cursor::new(&mut out), ImageFormat::Png)
      .unwrap();
    out
  }

  fn config_for(dir: &TempDir) -> AssetCacheConfig {
    AssetCacheConfig {
      root_dir: Some(dir.path().to_path_buf()),
      ..AssetCacheConfig::default()
    }
  }

  fn cache_with(dir: &TempDir, downloader: MockDownloader) -> AssetCache<MockDownloader> {
    AssetCache::new(config_for(dir), downloader).unwrap()
  }

  #[tokio::test]
  async fn test_fetch_then_get() {
    let dir = TempDir::new().unwrap();
    let cache = cache_with(&dir, MockDownloader::serving(png_bytes(4)));

    cache.fetch_and_cache("a", "https://cdn.example/a.png").await.unwrap();

    let image = cache.get("a").expect("asset cached");
    assert_eq!((image.width(), image.height()), (4, 4));
    assert!(asset_path(dir.path(), "a").exists());
    assert_eq!(cache.asset_count(), 1);
    assert!(cache.disk_usage_bytes() > 0);
  }

  #[tokio::test]
  async fn test_repeat_fetch_is_noop() {
    let dir = TempDir::new().unwrap();
    let downloader = MockDownloader::serving(png_bytes(4));
    let cache = cache_with(&dir, downloader.clone());

    cache.fetch_and_cache("a", "https://cdn.example/a.png").await.unwrap();
    cache.fetch_and_cache("a", "https://cdn.example/a.png").await.unwrap();

    assert_eq!(downloader.calls(), 1);
  }

  #[tokio::test]
  async fn test_concurrent_fetch_single_download() {
    let dir = TempDir::new().unwrap();
    let gate = Arc::new(Semaphore::new(0));
    let downloader = MockDownloader::gated(png_bytes(4), Arc::clone(&gate));
    let cache = cache_with(&dir, downloader.clone());

    let racing = cache.clone();
    let first = tokio::spawn(async move {
      racing.fetch_and_cache("a", "https://cdn.example/a.png").await
    });

    // Let the first caller claim the in-flight marker and block on the gate
    tokio::time::sleep(std::time::Duration::from_millis(20)).await;

    // Second caller observes the marker and succeeds without downloading
    cache.fetch_and_cache("a", "https://cdn.example/a.png").await.unwrap();
    assert_eq!(downloader.calls(), 1);

    gate.add_permits(1);
    first.await.unwrap().unwrap();

    assert_eq!(downloader.calls(), 1);
    assert!(cache.get("a").is_some());
  }

  #[tokio::test(start_paused = true)]
  async fn test_transient_failures_retried() {
    let dir = TempDir::new().unwrap();
    let downloader = MockDownloader::failing_first(png_bytes(4), 2);
    let cache = cache_with(&dir, downloader.clone());

    cache.fetch_and_cache("a", "https://cdn.example/a.png").await.unwrap();

    assert_eq!(downloader.calls(), 3);
    assert!(cache.get("a").is_some());
  }

  #[tokio::test(start_paused = true)]
  async fn test_retries_exhausted_surfaces_download_failed() {
    let dir = TempDir::new().unwrap();
    let downloader = MockDownloader::failing_first(png_bytes(4), usize::MAX);
    let cache = cache_with(&dir, downloader.clone());

    let err = cache
      .fetch_and_cache("a", "https://cdn.example/a.png")
      .await
      .unwrap_err();

    assert!(matches!(err, AssetError::DownloadFailed { .. }));
    // Initial attempt plus three retries
    assert_eq!(downloader.calls(), 4);

    // The in-flight marker was released; a later fetch can succeed
    let recovered = cache_with(&dir, MockDownloader::serving(png_bytes(4)));
    recovered.fetch_and_cache("a", "https://cdn.example/a.png").await.unwrap();
  }

  #[tokio::test]
  async fn test_oversized_payload_rejected_without_side_effects() {
    let dir = TempDir::new().unwrap();
    let config = AssetCacheConfig {
      root_dir: Some(dir.path().to_path_buf()),
      max_item_bytes: 1024,
      ..AssetCacheConfig::default()
    };
    let cache = AssetCache::new(config, MockDownloader::serving(vec![0u8; 4096])).unwrap();

    let err = cache
      .fetch_and_cache("big", "https://cdn.example/big.png")
      .await
      .unwrap_err();

    assert!(matches!(err, AssetError::ImageTooLarge { size: 4096, .. }));
    assert!(!asset_path(dir.path(), "big").exists());
    assert_eq!(cache.asset_count(), 0);
  }

  #[tokio::test]
  async fn test_undecodable_payload_rejected() {
    let dir = TempDir::new().unwrap();
    let cache = cache_with(&dir, MockDownloader::serving(b"not an image".to_vec()));

    let err = cache
      .fetch_and_cache("junk", "https://cdn.example/junk.png")
      .await
      .unwrap_err();

    assert!(matches!(err, AssetError::InvalidImage));
    assert!(!asset_path(dir.path(), "junk").exists());
  }

  #[tokio::test]
  async fn test_expired_asset_absent_even_though_file_exists() {
    let dir = TempDir::new().unwrap();
    let cache = cache_with(&dir, MockDownloader::serving(png_bytes(4)));
    cache.fetch_and_cache("a", "https://cdn.example/a.png").await.unwrap();
    drop(cache);

    // Age the metadata row past the ttl
    let mut index = MetadataIndex::load_or_rebuild(dir.path()).unwrap();
    let mut meta = index.get("a").unwrap().clone();
    meta.downloaded_at = Utc::now() - chrono::Duration::days(8);
    index.insert("a", meta);
    index.persist(dir.path()).unwrap();

    let reopened = cache_with(&dir, MockDownloader::serving(png_bytes(4)));
    assert!(asset_path(dir.path(), "a").exists());
    assert!(reopened.get("a").is_none());

    // The expired entry was invalidated on access
    assert!(!asset_path(dir.path(), "a").exists());
    assert_eq!(reopened.asset_count(), 0);
  }

  #[tokio::test]
  async fn test_invalidate_expired_sweep() {
    let dir = TempDir::new().unwrap();
    let cache = cache_with(&dir, MockDownloader::serving(png_bytes(4)));
    cache.fetch_and_cache("old", "https://cdn.example/old.png").await.unwrap();
    cache.fetch_and_cache("fresh", "https://cdn.example/fresh.png").await.unwrap();
    drop(cache);

    let mut index = MetadataIndex::load_or_rebuild(dir.path()).unwrap();
    let mut meta = index.get("old").unwrap().clone();
    meta.downloaded_at = Utc::now() - chrono::Duration::days(30);
    index.insert("old", meta);
    index.persist(dir.path()).unwrap();

    let reopened = cache_with(&dir, MockDownloader::serving(png_bytes(4)));
    assert_eq!(reopened.invalidate_expired(), 1);
    assert!(reopened.get("old").is_none());
    assert!(reopened.get("fresh").is_some());
  }

  #[tokio::test]
  async fn test_disk_eviction_prefers_least_recently_accessed() {
    // Learn the encoded size of one asset, then budget for exactly two
    let probe_dir = TempDir::new().unwrap();
    let probe = cache_with(&probe_dir, MockDownloader::serving(png_bytes(16)));
    probe.fetch_and_cache("p", "https://cdn.example/p.png").await.unwrap();
    let item_size = probe.disk_usage_bytes();

    let dir = TempDir::new().unwrap();
    let config = AssetCacheConfig {
      root_dir: Some(dir.path().to_path_buf()),
      disk_budget_bytes: 2 * item_size,
      ..AssetCacheConfig::default()
    };
    let cache = AssetCache::new(config, MockDownloader::serving(png_bytes(16))).unwrap();

    cache.fetch_and_cache("a", "https://cdn.example/a.png").await.unwrap();
    cache.fetch_and_cache("b", "https://cdn.example/b.png").await.unwrap();

    // Refresh a so b becomes the eviction candidate
    cache.get("a").unwrap();

    cache.fetch_and_cache("c", "https://cdn.example/c.png").await.unwrap();

    assert!(cache.get("b").is_none(), "least-recently-accessed entry evicted");
    assert!(cache.get("a").is_some());
    assert!(cache.get("c").is_some());
    assert!(cache.disk_usage_bytes() <= 2 * item_size);
  }

  #[tokio::test]
  async fn test_index_rebuilt_after_deletion() {
    let dir = TempDir::new().unwrap();
    let cache = cache_with(&dir, MockDownloader::serving(png_bytes(8)));
    cache.fetch_and_cache("a", "https://cdn.example/a.png").await.unwrap();
    let size_before = cache.disk_usage_bytes();
    drop(cache);

    fs::remove_file(dir.path().join(INDEX_FILE)).unwrap();

    let reopened = cache_with(&dir, MockDownloader::serving(png_bytes(8)));
    assert_eq!(reopened.asset_count(), 1);
    assert_eq!(reopened.disk_usage_bytes(), size_before);
    assert!(reopened.get("a").is_some(), "no asset lost to index loss");
  }

  #[tokio::test]
  async fn test_untracked_file_adopted_on_open() {
    let dir = TempDir::new().unwrap();
    let cache = cache_with(&dir, MockDownloader::serving(png_bytes(8)));
    cache.fetch_and_cache("a", "https://cdn.example/a.png").await.unwrap();
    let tracked = cache.disk_usage_bytes();
    drop(cache);

    // Simulate a crash between the file write and the index write
    fs::copy(asset_path(dir.path(), "a"), asset_path(dir.path(), "b")).unwrap();

    let reopened = cache_with(&dir, MockDownloader::serving(png_bytes(8)));
    assert_eq!(reopened.asset_count(), 2, "untracked file adopted");
    assert_eq!(reopened.disk_usage_bytes(), 2 * tracked, "adopted bytes count against the budget");
    assert!(reopened.get("b").is_some());
  }

  #[tokio::test]
  async fn test_touches_flushed_in_batches_not_per_get() {
    let dir = TempDir::new().unwrap();
    let cache = cache_with(&dir, MockDownloader::serving(png_bytes(4)));
    cache.fetch_and_cache("a", "https://cdn.example/a.png").await.unwrap();

    let index_path = dir.path().join(INDEX_FILE);
    fs::remove_file(&index_path).unwrap();

    for _ in 0..TOUCH_FLUSH_THRESHOLD - 1 {
      cache.get("a").unwrap();
    }
    assert!(!index_path.exists(), "a memory hit must not rewrite the index");

    cache.get("a").unwrap();
    assert!(index_path.exists(), "accumulated touches are flushed");
  }

  #[tokio::test]
  async fn test_missing_file_is_a_miss_and_heals_the_index() {
    let dir = TempDir::new().unwrap();
    let cache = cache_with(&dir, MockDownloader::serving(png_bytes(8)));
    cache.fetch_and_cache("a", "https://cdn.example/a.png").await.unwrap();
    drop(cache);

    fs::remove_file(asset_path(dir.path(), "a")).unwrap();

    // Reopen so the memory tier is cold and the disk tier must be consulted
    let reopened = cache_with(&dir, MockDownloader::serving(png_bytes(8)));
    assert!(reopened.get("a").is_none());
    assert_eq!(reopened.asset_count(), 0, "orphaned metadata row dropped");
  }

  #[tokio::test]
  async fn test_get_promotes_disk_entry_to_memory() {
    let dir = TempDir::new().unwrap();
    let cache = cache_with(&dir, MockDownloader::serving(png_bytes(4)));
    cache.fetch_and_cache("a", "https://cdn.example/a.png").await.unwrap();
    drop(cache);

    let reopened = cache_with(&dir, MockDownloader::serving(png_bytes(4)));
    let image = reopened.get("a").expect("decoded from disk");
    assert_eq!(image.width(), 4);
  }

  #[tokio::test]
  async fn test_invalidate_and_clear() {
    let dir = TempDir::new().unwrap();
    let cache = cache_with(&dir, MockDownloader::serving(png_bytes(4)));
    cache.fetch_and_cache("a", "https://cdn.example/a.png").await.unwrap();
    cache.fetch_and_cache("b", "https://cdn.example/b.png").await.unwrap();

    cache.invalidate("a");
    cache.invalidate("a");
    assert!(cache.get("a").is_none());
    assert_eq!(cache.asset_count(), 1);

    cache.clear().unwrap();
    assert_eq!(cache.asset_count(), 0);
    assert!(cache.get("b").is_none());
    assert!(!asset_path(dir.path(), "b").exists());
  }
}
