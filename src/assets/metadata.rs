//! Persistent metadata index for the disk asset cache.
//!
//! Every encoded file on disk has a matching row here and vice versa; a
//! missing half on either side is treated as a miss and repaired lazily. The
//! index is serialized to `index.json` in the cache root. When that file is
//! missing or unreadable the index is rebuilt from a directory scan, using
//! file length and modification time as best-effort metadata, so index
//! corruption never loses already-downloaded bytes.

use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// File name of the serialized index inside the cache root.
pub const INDEX_FILE: &str = "index.json";

/// Extension of encoded asset files.
const ASSET_EXT: &str = "png";

/// Metadata row for a single cached asset.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssetMetadata {
  pub downloaded_at: DateTime<Utc>,
  pub file_size_bytes: u64,
  pub last_accessed_at: DateTime<Utc>,
}

/// Serialized mapping from asset id to metadata.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct MetadataIndex {
  entries: HashMap<String, AssetMetadata>,
}

/// Path of the encoded file for an asset id.
///
/// Ids are hex-encoded into the file stem so arbitrary id strings map to safe
/// file names and the id can be recovered during reconciliation.
pub fn asset_path(root: &Path, id: &str) -> PathBuf {
  root.join(format!("{}.{}", hex::encode(id), ASSET_EXT))
}

/// Recover the asset id from an encoded file path, if it is one of ours.
fn id_from_path(path: &Path) -> Option<String> {
  if path.extension()?.to_str()? != ASSET_EXT {
    return None;
  }
  let stem = path.file_stem()?.to_str()?;
  let bytes = hex::decode(stem).ok()?;
  String::from_utf8(bytes).ok()
}

impl MetadataIndex {
  /// Load the index from the cache root, rebuilding it from a directory scan
  /// when the file is missing or unreadable.
  ///
  /// A readable index is still reconciled against the directory in both
  /// directions: rows without files are dropped, and files without rows are
  /// adopted with synthesized metadata. Untracked bytes would otherwise be
  /// invisible to the budget accounting and exempt from eviction.
  pub fn load_or_rebuild(root: &Path) -> io::Result<Self> {
    let path = root.join(INDEX_FILE);

    match fs::read(&path) {
      Ok(bytes) => match serde_json::from_slice::<Self>(&bytes) {
        Ok(mut index) => {
          if index.reconcile_with_disk(root)? {
            index.persist(root)?;
          }
          Ok(index)
        }
        Err(e) => {
          warn!(path = %path.display(), error = %e, "unreadable metadata index, rebuilding");
          let index = Self::rebuild_from_disk(root)?;
          index.persist(root)?;
          Ok(index)
        }
      },
      Err(e) if e.kind() == io::ErrorKind::NotFound => {
        let index = Self::rebuild_from_disk(root)?;
        if !index.is_empty() {
          debug!(entries = index.len(), "metadata index rebuilt from disk scan");
          index.persist(root)?;
        }
        Ok(index)
      }
      Err(e) => Err(e),
    }
  }

  /// Synthesize metadata rows from the encoded files actually present.
  fn rebuild_from_disk(root: &Path) -> io::Result<Self> {
    let mut entries = HashMap::new();

    if !root.exists() {
      return Ok(Self { entries });
    }

    for dir_entry in fs::read_dir(root)? {
      let dir_entry = dir_entry?;
      let path = dir_entry.path();
      let Some(id) = id_from_path(&path) else {
        continue;
      };
      let Ok(meta) = dir_entry.metadata() else {
        continue;
      };

      // File mtime is the best available stand-in for the download time
      let downloaded_at = meta
        .modified()
        .map(DateTime::<Utc>::from)
        .unwrap_or_else(|_| Utc::now());

      entries.insert(
        id,
        AssetMetadata {
          downloaded_at,
          file_size_bytes: meta.len(),
          last_accessed_at: downloaded_at,
        },
      );
    }

    Ok(Self { entries })
  }

  /// Bring the index and the directory into agreement: drop rows whose file
  /// is gone and adopt files that have no row (a crash between the file write
  /// and the index write leaves exactly that). Returns whether anything
  /// changed.
  fn reconcile_with_disk(&mut self, root: &Path) -> io::Result<bool> {
    let on_disk = Self::rebuild_from_disk(root)?;

    let before = self.entries.len();
    self.entries.retain(|id, _| on_disk.entries.contains_key(id));
    let dropped = before - self.entries.len();

    let mut adopted = 0;
    for (id, metadata) in on_disk.entries {
      if !self.entries.contains_key(&id) {
        self.entries.insert(id, metadata);
        adopted += 1;
      }
    }

    if dropped > 0 || adopted > 0 {
      debug!(dropped, adopted, "metadata index reconciled with disk contents");
    }
    Ok(dropped > 0 || adopted > 0)
  }

  /// Persist the index. Writes to a sidecar file and renames, so a failed
  /// write cannot leave a truncated index behind.
  pub fn persist(&self, root: &Path) -> io::Result<()> {
    let path = root.join(INDEX_FILE);
    let tmp = root.join(format!("{}.tmp", INDEX_FILE));

    let bytes = serde_json::to_vec(self).map_err(io::Error::other)?;
    fs::write(&tmp, bytes)?;
    fs::rename(&tmp, &path)
  }

  pub fn get(&self, id: &str) -> Option<&AssetMetadata> {
    self.entries.get(id)
  }

  pub fn insert(&mut self, id: &str, metadata: AssetMetadata) {
    self.entries.insert(id.to_string(), metadata);
  }

  pub fn remove(&mut self, id: &str) -> Option<AssetMetadata> {
    self.entries.remove(id)
  }

  /// Update `last_accessed_at` for an id that is known to exist.
  pub fn touch(&mut self, id: &str, now: DateTime<Utc>) {
    if let Some(metadata) = self.entries.get_mut(id) {
      metadata.last_accessed_at = now;
    }
  }

  /// Aggregate size of all tracked files.
  pub fn total_bytes(&self) -> u64 {
    self.entries.values().map(|m| m.file_size_bytes).sum()
  }

  pub fn len(&self) -> usize {
    self.entries.len()
  }

  pub fn is_empty(&self) -> bool {
    self.entries.is_empty()
  }

  /// Ids whose age since `downloaded_at` exceeds the TTL.
  pub fn expired_ids(&self, ttl: Duration, now: DateTime<Utc>) -> Vec<String> {
    self
      .entries
      .iter()
      .filter(|(_, m)| now - m.downloaded_at > ttl)
      .map(|(id, _)| id.clone())
      .collect()
  }

  /// Choose eviction victims so an incoming item of `incoming_bytes` fits the
  /// budget, least-recently-accessed first.
  ///
  /// An existing row for `incoming_id` is about to be replaced, so it neither
  /// counts against the budget nor qualifies as a victim. When even a full
  /// eviction cannot make the item fit, every other entry is returned and the
  /// caller admits the new item anyway; fresh data wins over stale retained
  /// data.
  pub fn plan_evictions(
    &self,
    incoming_id: &str,
    incoming_bytes: u64,
    budget_bytes: u64,
  ) -> Vec<String> {
    let replaced = self
      .entries
      .get(incoming_id)
      .map(|m| m.file_size_bytes)
      .unwrap_or(0);
    let mut remaining = self.total_bytes() - replaced;
    if remaining + incoming_bytes <= budget_bytes {
      return Vec::new();
    }

    let mut by_age: Vec<(&String, &AssetMetadata)> = self
      .entries
      .iter()
      .filter(|(id, _)| id.as_str() != incoming_id)
      .collect();
    by_age.sort_by_key(|(_, m)| m.last_accessed_at);

    let mut victims = Vec::new();
    for (id, metadata) in by_age {
      if remaining + incoming_bytes <= budget_bytes {
        break;
      }
      remaining -= metadata.file_size_bytes;
      victims.push(id.clone());
    }

    victims
  }
}
