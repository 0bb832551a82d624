//! Bounded in-memory table of decoded images.
//!
//! The memory tier is capped both by item count and by decoded byte cost
//! (width x height x 4). Eviction is explicit LRU so limits and ordering are
//! deterministic, rather than delegated to an opaque platform cache. This
//! struct is not internally synchronized; the owning [`super::AssetCache`]
//! serializes access under its state lock.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use image::DynamicImage;
use tracing::debug;

struct MemoryEntry {
  image: Arc<DynamicImage>,
  cost: u64,
  last_accessed: Instant,
}

/// Decoded byte cost of an image (RGBA).
fn image_cost(image: &DynamicImage) -> u64 {
  u64::from(image.width()) * u64::from(image.height()) * 4
}

pub struct MemoryImageCache {
  entries: HashMap<String, MemoryEntry>,
  max_items: usize,
  max_bytes: u64,
  current_bytes: u64,
}

impl MemoryImageCache {
  pub fn new(max_items: usize, max_bytes: u64) -> Self {
    Self {
      entries: HashMap::new(),
      max_items,
      max_bytes,
      current_bytes: 0,
    }
  }

  /// Get a decoded image, refreshing its access time.
  pub fn get(&mut self, id: &str) -> Option<Arc<DynamicImage>> {
    let entry = self.entries.get_mut(id)?;
    entry.last_accessed = Instant::now();
    Some(Arc::clone(&entry.image))
  }

  pub fn contains(&self, id: &str) -> bool {
    self.entries.contains_key(id)
  }

  /// Insert a decoded image, evicting least-recently-accessed entries until
  /// both budgets are respected. The entry just inserted carries the freshest
  /// access time, so it is the last candidate and survives even when it alone
  /// exceeds the byte budget.
  pub fn insert(&mut self, id: &str, image: Arc<DynamicImage>) {
    self.remove(id);

    let cost = image_cost(&image);
    self.entries.insert(
      id.to_string(),
      MemoryEntry {
        image,
        cost,
        last_accessed: Instant::now(),
      },
    );
    self.current_bytes += cost;

    while self.entries.len() > 1
      && (self.entries.len() > self.max_items || self.current_bytes > self.max_bytes)
    {
      self.evict_lru();
    }
  }

  pub fn remove(&mut self, id: &str) {
    if let Some(entry) = self.entries.remove(id) {
      self.current_bytes -= entry.cost;
    }
  }

  pub fn clear(&mut self) {
    self.entries.clear();
    self.current_bytes = 0;
  }

  #[cfg(test)]
  pub fn len(&self) -> usize {
    self.entries.len()
  }

  fn evict_lru(&mut self) {
    let victim = self
      .entries
      .iter()
      .min_by_key(|(_, e)| e.last_accessed)
      .map(|(id, _)| id.clone());

    if let Some(id) = victim {
      debug!(id, "evicting decoded image from memory");
      self.remove(&id);
    }
  }
}
