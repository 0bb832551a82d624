//! Domain types shared between the remote client and the caching layer.

use serde::{Deserialize, Serialize};

/// A geographic point used for location-aware search.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
  pub lat: f64,
  pub lon: f64,
}

/// A gym that hosts events.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Gym {
  pub id: String,
  pub name: String,
  pub location: Option<GeoPoint>,
}

/// An event hosted at a gym.
///
/// The hosting gym is embedded in full so list responses are self-contained;
/// the cache layer fans it out into its own entity cache.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
  pub id: String,
  pub title: String,
  pub description: Option<String>,
  pub gym: Gym,
  /// User id of the event creator
  pub owner_id: String,
  pub image_url: Option<String>,
  /// Attached media URLs (photos, videos)
  pub media: Vec<String>,
  /// Last modification timestamp (ISO 8601)
  pub updated: String,
}

/// Payload for creating a new event; the backend assigns the id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewEvent {
  pub title: String,
  pub description: Option<String>,
  pub gym_id: String,
  pub owner_id: String,
  pub image_url: Option<String>,
}
