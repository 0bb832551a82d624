//! Cache key construction for queries.

use sha2::{Digest, Sha256};

use crate::model::GeoPoint;

/// Trait for types that can be used as query cache keys.
pub trait QueryKey {
  /// Stable, fixed-length key derived from the logical query input.
  fn cache_hash(&self) -> String;

  /// Human-readable description for logging.
  fn description(&self) -> String;
}

/// Invalidation scope of a cached query result.
///
/// Stored alongside each query-result entry so mutations can remove exactly
/// the entries they can attribute, and treat the rest conservatively.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueryScope {
  /// Result set is defined by a hosting gym
  Gym(String),
  /// Result set is defined by the creating user
  Owner(String),
  /// Result set is defined by the requesting user's favorites
  Favorites(String),
  /// Result set may contain any event (fetch-all, free-text search)
  Global,
}

/// Query key types for the events backend.
#[derive(Clone, Debug)]
pub enum EventQuery {
  /// All visible events
  All,
  /// Events hosted at a gym
  ByGym { gym_id: String },
  /// Events created by a user
  ByOwner { owner_id: String },
  /// Events a user marked as favorite
  Favorites { user_id: String },
  /// Free-text search, optionally location-biased
  Search {
    text: String,
    near: Option<GeoPoint>,
  },
}

impl EventQuery {
  /// The invalidation scope this query belongs to.
  pub fn scope(&self) -> QueryScope {
    match self {
      Self::All => QueryScope::Global,
      Self::ByGym { gym_id } => QueryScope::Gym(gym_id.clone()),
      Self::ByOwner { owner_id } => QueryScope::Owner(owner_id.clone()),
      Self::Favorites { user_id } => QueryScope::Favorites(user_id.clone()),
      Self::Search { .. } => QueryScope::Global,
    }
  }
}

impl QueryKey for EventQuery {
  fn cache_hash(&self) -> String {
    let input = match self {
      Self::All => "events_all".to_string(),
      Self::ByGym { gym_id } => format!("events_by_gym:{}", gym_id),
      Self::ByOwner { owner_id } => format!("events_by_owner:{}", owner_id),
      Self::Favorites { user_id } => format!("events_favorites:{}", user_id),
      Self::Search { text, near } => {
        // The key must encode whether a location was supplied; two searches
        // with the same text but different location bias are distinct queries.
        format!(
          "events_search:{}:{}",
          normalize_text(text),
          near.as_ref().map(|p| normalize_location(*p)).unwrap_or_default()
        )
      }
    };

    // SHA256 hash for stable, fixed-length keys
    let mut hasher = Sha256::new();
    hasher.update(input.as_bytes());
    hex::encode(hasher.finalize())
  }

  fn description(&self) -> String {
    match self {
      Self::All => "all events".to_string(),
      Self::ByGym { gym_id } => format!("events at gym {}", gym_id),
      Self::ByOwner { owner_id } => format!("events by user {}", owner_id),
      Self::Favorites { user_id } => format!("favorites of user {}", user_id),
      Self::Search { text, near } => {
        if near.is_some() {
          format!("search '{}' near caller", text)
        } else {
          format!("search '{}'", text)
        }
      }
    }
  }
}

/// Normalize search text for consistent hashing.
/// Trims whitespace and lowercases for case-insensitive matching.
fn normalize_text(text: &str) -> String {
  text.trim().to_lowercase()
}

/// Render a location at fixed precision so float formatting cannot split
/// logically equal queries into distinct keys.
fn normalize_location(point: GeoPoint) -> String {
  format!("{:.4},{:.4}", point.lat, point.lon)
}
