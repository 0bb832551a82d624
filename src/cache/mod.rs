//! Read-through/write-invalidate caching for the events repository.
//!
//! This module provides the in-memory half of the caching layer:
//! - Entities are cached individually by id
//! - Query results are cached as ordered id lists and re-resolved through the
//!   entity caches on every read
//! - Mutations invalidate precisely where possible, broadly where not

mod key;
mod repository;
mod store;

pub use key::{EventQuery, QueryKey, QueryScope};
pub use repository::{CachedEventRepository, QueryEntry};
pub use store::MemoryStore;
