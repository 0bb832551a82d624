//! Repository contract for the events backend.

use std::future::Future;

use color_eyre::Result;

use crate::model::{Event, GeoPoint, NewEvent};

/// Source-of-truth repository for events.
///
/// Implementations talk to the real backend. The caching decorator wraps any
/// implementor and never interprets or retries its errors; whatever an
/// implementation returns propagates unchanged to the caller.
pub trait EventRepository: Send + Sync {
  /// Fetch every event visible to the client.
  fn fetch_all(&self) -> impl Future<Output = Result<Vec<Event>>> + Send;

  /// Fetch events hosted at a specific gym.
  fn fetch_by_gym(&self, gym_id: &str) -> impl Future<Output = Result<Vec<Event>>> + Send;

  /// Fetch events created by a specific user.
  fn fetch_by_owner(&self, owner_id: &str) -> impl Future<Output = Result<Vec<Event>>> + Send;

  /// Fetch the events a user has marked as favorites.
  fn fetch_favorites(&self, user_id: &str) -> impl Future<Output = Result<Vec<Event>>> + Send;

  /// Free-text search, optionally biased to a location.
  fn search(
    &self,
    text: &str,
    near: Option<GeoPoint>,
  ) -> impl Future<Output = Result<Vec<Event>>> + Send;

  /// Fetch a single event by id.
  fn get_by_id(&self, id: &str) -> impl Future<Output = Result<Event>> + Send;

  /// Create an event; the backend assigns the id and returns the stored entity.
  fn create(&self, event: NewEvent) -> impl Future<Output = Result<Event>> + Send;

  /// Replace an event and return the stored entity.
  fn update(&self, event: Event) -> impl Future<Output = Result<Event>> + Send;

  /// Replace only the media list of an event.
  fn update_media(
    &self,
    id: &str,
    media: Vec<String>,
  ) -> impl Future<Output = Result<()>> + Send;

  /// Delete an event by id.
  fn delete(&self, id: &str) -> impl Future<Output = Result<()>> + Send;
}
