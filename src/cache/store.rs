//! Generic in-memory cache primitive.

use std::collections::HashMap;
use std::sync::Mutex;

use chrono::{DateTime, Utc};

/// A single cached value with its insertion time.
#[derive(Debug, Clone)]
struct Entry<V> {
  value: V,
  inserted_at: DateTime<Utc>,
}

/// A mutex-guarded key/value store.
///
/// This is the primitive under both the entity caches and the query-result
/// cache. Operations are O(1) and hold the lock only for the map access, so a
/// single mutex is enough for concurrent callers. No expiry happens at this
/// layer; the owning component decides what "too old" means, if anything.
pub struct MemoryStore<V> {
  entries: Mutex<HashMap<String, Entry<V>>>,
}

impl<V: Clone> MemoryStore<V> {
  pub fn new() -> Self {
    Self {
      entries: Mutex::new(HashMap::new()),
    }
  }

  /// Get the value and insertion time for a key, if present.
  pub fn get(&self, key: &str) -> Option<(V, DateTime<Utc>)> {
    let entries = self.lock();
    entries.get(key).map(|e| (e.value.clone(), e.inserted_at))
  }

  /// Unconditional overwrite.
  pub fn set(&self, key: &str, value: V) {
    let mut entries = self.lock();
    entries.insert(
      key.to_string(),
      Entry {
        value,
        inserted_at: Utc::now(),
      },
    );
  }

  /// Unconditional delete; absent keys are not an error.
  pub fn remove(&self, key: &str) {
    let mut entries = self.lock();
    entries.remove(key);
  }

  /// Drop every entry. Used for broad invalidation.
  pub fn remove_all(&self) {
    let mut entries = self.lock();
    entries.clear();
  }

  /// Number of live entries, for diagnostics.
  pub fn count(&self) -> usize {
    self.lock().len()
  }

  /// Remove every entry the predicate selects.
  pub fn retain<F>(&self, mut keep: F)
  where
    F: FnMut(&str, &V) -> bool,
  {
    let mut entries = self.lock();
    entries.retain(|k, e| keep(k, &e.value));
  }

  // A poisoned lock leaves the map structurally sound; recover the guard
  // instead of surfacing an error from a cache lookup.
  fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, Entry<V>>> {
    self.entries.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
  }
}

impl<V: Clone> Default for MemoryStore<V> {
  fn default() -> Self {
    Self::new()
  }
}
