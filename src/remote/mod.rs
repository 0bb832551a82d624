//! Contracts for the remote backend.
//!
//! The backend itself is opaque to the caching layer: the repository trait is
//! the full surface the cache decorates, and the downloader trait is the only
//! thing the asset cache knows about the network.

pub mod download;
pub mod repository;

pub use download::{DownloadError, Downloader, ReqwestDownloader};
pub use repository::EventRepository;
