//! Disk-backed binary asset (image) cache.
//!
//! Independent of the repository cache: any component holding an asset id and
//! a source URL can use it. Downloads are deduplicated per id, payloads are
//! size- and validity-checked, the disk footprint is kept under a budget via
//! LRU eviction, and entries expire after a TTL. The on-disk store plus its
//! metadata index survive restarts and self-heal if the index is lost.

mod cache;
mod error;
mod memory;
mod metadata;

pub use cache::AssetCache;
pub use error::AssetError;
pub use metadata::{AssetMetadata, MetadataIndex};
