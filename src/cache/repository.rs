//! Caching decorator over an [`EventRepository`].
//!
//! Wraps any repository implementation and serves repeated reads from memory:
//! individual entities are cached by id, and each parameterized query caches
//! only the ordered id list of its result. A query is a hit only when every id
//! in its list still resolves against the entity cache; otherwise the whole
//! query is treated as a miss and refetched, so callers never see a silently
//! shortened list.
//!
//! Mutations go to the wrapped source first and then invalidate. Since a
//! created or updated event can change the membership of any cached query,
//! those operations flush the query cache wholesale; correctness is preferred
//! over precision here.

use color_eyre::Result;
use tracing::debug;

use crate::cache::key::{EventQuery, QueryKey, QueryScope};
use crate::cache::store::MemoryStore;
use crate::model::{Event, GeoPoint, Gym, NewEvent};
use crate::remote::EventRepository;

/// A cached query result: the ordered ids plus the invalidation scope the
/// query belongs to.
#[derive(Debug, Clone)]
pub struct QueryEntry {
  pub ids: Vec<String>,
  pub scope: QueryScope,
}

/// Repository decorator with per-entity and per-query caching.
pub struct CachedEventRepository<R> {
  inner: R,
  events: MemoryStore<Event>,
  gyms: MemoryStore<Gym>,
  queries: MemoryStore<QueryEntry>,
}

impl<R: EventRepository> CachedEventRepository<R> {
  pub fn new(inner: R) -> Self {
    Self {
      inner,
      events: MemoryStore::new(),
      gyms: MemoryStore::new(),
      queries: MemoryStore::new(),
    }
  }

  /// Look up a cached gym by id. Gyms are populated as a side effect of event
  /// reads (every event embeds its hosting gym) and never fetched directly.
  pub fn cached_gym(&self, gym_id: &str) -> Option<Gym> {
    self.gyms.get(gym_id).map(|(gym, _)| gym)
  }

  /// Number of cached entities and query results, for diagnostics.
  pub fn cache_counts(&self) -> (usize, usize, usize) {
    (self.events.count(), self.gyms.count(), self.queries.count())
  }

  /// Drop every cached query result whose membership could include events at
  /// the given gym. Gym-scoped entries are removed by inspection; fetch-all
  /// and search results cannot be attributed precisely, so they are removed
  /// conservatively. Lists scoped to other gyms or other users are untouched.
  pub fn invalidate_gym_queries(&self, gym_id: &str) {
    let scope = QueryScope::Gym(gym_id.to_string());
    self
      .queries
      .retain(|_, entry| entry.scope != scope && entry.scope != QueryScope::Global);
  }

  /// Drop every cached query result scoped to a requesting user (their own
  /// events and their favorites), plus the conservatively-attributed global
  /// entries.
  pub fn invalidate_user_queries(&self, user_id: &str) {
    let owner = QueryScope::Owner(user_id.to_string());
    let favorites = QueryScope::Favorites(user_id.to_string());
    self.queries.retain(|_, entry| {
      entry.scope != owner && entry.scope != favorites && entry.scope != QueryScope::Global
    });
  }

  /// Serve a list query from cache, or fall back to the source and populate
  /// both caches on the way back.
  async fn fetch_list<F, Fut>(&self, query: EventQuery, fetcher: F) -> Result<Vec<Event>>
  where
    F: FnOnce() -> Fut,
    Fut: std::future::Future<Output = Result<Vec<Event>>>,
  {
    let key = query.cache_hash();

    if let Some((entry, _)) = self.queries.get(&key) {
      if let Some(events) = self.resolve_ids(&entry.ids) {
        debug!(query = %query.description(), "query cache hit");
        return Ok(events);
      }
      // Some id no longer resolves; a partial list must never be returned,
      // so the whole entry is a miss.
      debug!(query = %query.description(), "stale query entry, refetching");
      self.queries.remove(&key);
    }

    let events = fetcher().await?;
    self.populate(&events);
    self.queries.set(
      &key,
      QueryEntry {
        ids: events.iter().map(|e| e.id.clone()).collect(),
        scope: query.scope(),
      },
    );

    Ok(events)
  }

  /// Resolve every id against the entity cache, in order. Any failure makes
  /// the whole resolution fail.
  fn resolve_ids(&self, ids: &[String]) -> Option<Vec<Event>> {
    ids
      .iter()
      .map(|id| self.events.get(id).map(|(event, _)| event))
      .collect()
  }

  /// Write entities into the entity caches, fanning out embedded gyms into
  /// their own cache so later point reads of a gym hit without a fetch.
  fn populate(&self, events: &[Event]) {
    for event in events {
      self.gyms.set(&event.gym.id, event.gym.clone());
      self.events.set(&event.id, event.clone());
    }
  }
}

impl<R: EventRepository> EventRepository for CachedEventRepository<R> {
  async fn fetch_all(&self) -> Result<Vec<Event>> {
    self
      .fetch_list(EventQuery::All, || self.inner.fetch_all())
      .await
  }

  async fn fetch_by_gym(&self, gym_id: &str) -> Result<Vec<Event>> {
    let query = EventQuery::ByGym {
      gym_id: gym_id.to_string(),
    };
    self
      .fetch_list(query, || self.inner.fetch_by_gym(gym_id))
      .await
  }

  async fn fetch_by_owner(&self, owner_id: &str) -> Result<Vec<Event>> {
    let query = EventQuery::ByOwner {
      owner_id: owner_id.to_string(),
    };
    self
      .fetch_list(query, || self.inner.fetch_by_owner(owner_id))
      .await
  }

  async fn fetch_favorites(&self, user_id: &str) -> Result<Vec<Event>> {
    let query = EventQuery::Favorites {
      user_id: user_id.to_string(),
    };
    self
      .fetch_list(query, || self.inner.fetch_favorites(user_id))
      .await
  }

  async fn search(&self, text: &str, near: Option<GeoPoint>) -> Result<Vec<Event>> {
    let query = EventQuery::Search {
      text: text.to_string(),
      near,
    };
    self
      .fetch_list(query, || self.inner.search(text, near))
      .await
  }

  async fn get_by_id(&self, id: &str) -> Result<Event> {
    if let Some((event, _)) = self.events.get(id) {
      debug!(id, "entity cache hit");
      return Ok(event);
    }

    let event = self.inner.get_by_id(id).await?;
    self.populate(std::slice::from_ref(&event));
    Ok(event)
  }

  async fn create(&self, event: NewEvent) -> Result<Event> {
    let created = self.inner.create(event).await?;

    // The new event can satisfy any cached query, so targeted invalidation
    // is unsound here.
    self.populate(std::slice::from_ref(&created));
    self.queries.remove_all();
    debug!(id = %created.id, "created event, query cache flushed");

    Ok(created)
  }

  async fn update(&self, event: Event) -> Result<Event> {
    let updated = self.inner.update(event).await?;

    // An update can change which queries the event matches.
    self.populate(std::slice::from_ref(&updated));
    self.queries.remove_all();
    debug!(id = %updated.id, "updated event, query cache flushed");

    Ok(updated)
  }

  async fn update_media(&self, id: &str, media: Vec<String>) -> Result<()> {
    self.inner.update_media(id, media).await?;

    // Media membership does not affect any query's id list; dropping the one
    // entity forces a fresh fetch on its next read.
    self.events.remove(id);
    Ok(())
  }

  async fn delete(&self, id: &str) -> Result<()> {
    self.inner.delete(id).await?;

    self.events.remove(id);
    self.queries.remove_all();
    debug!(id, "deleted event, query cache flushed");

    Ok(())
  }
}
