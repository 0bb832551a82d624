//! Client-side caching layer for the GymFeed events backend.
//!
//! Two cooperating subsystems:
//! - [`cache`] decorates a remote [`remote::EventRepository`] with
//!   read-through entity and query-result caching and write-invalidation.
//! - [`assets`] is a two-tier (memory + disk) cache for event images fetched
//!   by URL, with size limits, LRU eviction, TTL expiry, and retrying
//!   downloads.
//!
//! Both are plain constructed values with no global state; the application's
//! composition point owns one of each for the life of the process.

pub mod assets;
pub mod cache;
pub mod config;
pub mod model;
pub mod remote;

pub use assets::{AssetCache, AssetError};
pub use cache::CachedEventRepository;
pub use config::AssetCacheConfig;
pub use remote::{EventRepository, ReqwestDownloader};
