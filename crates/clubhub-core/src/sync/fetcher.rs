//! Authenticated list fetching.
//!
//! A fetch reads the credential at call time, issues one GET, normalizes the
//! body into a list, and commits it to the view and the session cache. A
//! fetch that has been superseded (a newer fetch of the same view started,
//! or the view was unmounted) commits nothing.

use std::sync::Arc;

use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

use crate::api::{decode_list, split_named_lists, ApiError, Backend};
use crate::auth::{Credential, TokenStore};
use crate::cache::{CacheKey, SessionCache};
use crate::models::{Club, ClubCategory};

use super::view::CollectionView;

#[derive(Debug, Clone, PartialEq)]
pub enum FetchOutcome<T> {
    /// The result became the view's state.
    Committed(Vec<T>),
    /// A newer fetch or an unmount made this result irrelevant.
    Discarded,
}

impl<T> FetchOutcome<T> {
    pub fn committed(self) -> Option<Vec<T>> {
        match self {
            FetchOutcome::Committed(items) => Some(items),
            FetchOutcome::Discarded => None,
        }
    }
}

#[derive(Clone)]
pub struct CollectionFetcher {
    backend: Arc<dyn Backend>,
    tokens: Arc<TokenStore>,
    cache: Arc<SessionCache>,
}

impl CollectionFetcher {
    pub fn new(backend: Arc<dyn Backend>, tokens: Arc<TokenStore>, cache: Arc<SessionCache>) -> Self {
        Self {
            backend,
            tokens,
            cache,
        }
    }

    pub(crate) fn backend(&self) -> &Arc<dyn Backend> {
        &self.backend
    }

    pub(crate) fn cache(&self) -> &Arc<SessionCache> {
        &self.cache
    }

    /// Current credential, or a local rejection when signed out.
    pub(crate) fn credential(&self) -> Result<Credential, ApiError> {
        self.tokens.get().ok_or(ApiError::MissingCredential)
    }

    /// A 401 means the stored credential is dead; drop it so later calls
    /// fail locally instead of hitting the backend again.
    pub(crate) fn note_failure(&self, err: &ApiError) {
        if matches!(err, ApiError::Unauthorized) && self.tokens.is_set() {
            warn!("Backend rejected credential, clearing it");
            self.tokens.clear();
        }
    }

    /// Fetch a view's collection from the network.
    pub async fn fetch_collection<T>(&self, view: &CollectionView<T>) -> Result<FetchOutcome<T>, ApiError>
    where
        T: DeserializeOwned + Serialize + Clone,
    {
        // A signed-out call must not supersede fetches already in flight.
        let credential = self.credential()?;
        let ticket = view.begin();
        let epoch = self.cache.epoch(view.key());

        let value = match self
            .backend
            .get_json(view.endpoint(), Some(credential.as_str()))
            .await
        {
            Ok(value) => value,
            Err(e) => {
                self.note_failure(&e);
                if !view.is_current(ticket) {
                    return Ok(FetchOutcome::Discarded);
                }
                warn!(cache = %view.key(), error = %e, "Fetch failed");
                return Err(e);
            }
        };

        if !view.is_current(ticket) {
            debug!(cache = %view.key(), "Discarding superseded fetch");
            return Ok(FetchOutcome::Discarded);
        }

        let items: Vec<T> = decode_list(value, view.shape())?;
        if !view.commit(ticket, items.clone()) {
            debug!(cache = %view.key(), "Discarding superseded fetch");
            return Ok(FetchOutcome::Discarded);
        }

        if let Err(e) = self.cache.set_if_current(view.key(), epoch, &items) {
            warn!(cache = %view.key(), error = %e, "Failed to cache collection");
        }
        debug!(cache = %view.key(), count = items.len(), "Collection committed");
        Ok(FetchOutcome::Committed(items))
    }

    /// Serve from the session cache when present, otherwise fetch.
    pub async fn load<T>(&self, view: &CollectionView<T>) -> Result<FetchOutcome<T>, ApiError>
    where
        T: DeserializeOwned + Serialize + Clone,
    {
        if let Some(cached) = self.cache.get::<Vec<T>>(view.key()) {
            let ticket = view.begin();
            if view.commit(ticket, cached.data.clone()) {
                debug!(cache = %view.key(), age = %cached.age_display(), "Served from session cache");
                return Ok(FetchOutcome::Committed(cached.data));
            }
            return Ok(FetchOutcome::Discarded);
        }
        self.fetch_collection(view).await
    }

    /// Fetch the club directory, which groups clubs under named fields
    /// (`{ "academics": [...], "sports": [...] }`), and cache it under `key`.
    pub async fn fetch_categories(&self, key: &CacheKey, endpoint: &str) -> Result<Vec<ClubCategory>, ApiError> {
        let epoch = self.cache.epoch(key);
        let credential = self.credential()?;

        let value = self
            .backend
            .get_json(endpoint, Some(credential.as_str()))
            .await
            .map_err(|e| {
                self.note_failure(&e);
                e
            })?;

        let categories = split_named_lists(value)?
            .into_iter()
            .map(|(name, items)| {
                let clubs = items
                    .into_iter()
                    .map(serde_json::from_value::<Club>)
                    .collect::<Result<Vec<_>, _>>()
                    .map_err(|e| {
                        ApiError::InvalidResponse(format!("Failed to decode clubs in '{}': {}", name, e))
                    })?;
                Ok(ClubCategory { name, clubs })
            })
            .collect::<Result<Vec<_>, ApiError>>()?;

        if let Err(e) = self.cache.set_if_current(key, epoch, &categories) {
            warn!(cache = %key, error = %e, "Failed to cache club directory");
        }
        Ok(categories)
    }

    /// Fetch a single object (profile, dashboard counters). Not cached.
    pub async fn fetch_object<T: DeserializeOwned>(&self, endpoint: &str, field: Option<&str>) -> Result<T, ApiError> {
        let credential = self.credential()?;
        let value = self
            .backend
            .get_json(endpoint, Some(credential.as_str()))
            .await
            .map_err(|e| {
                self.note_failure(&e);
                e
            })?;
        decode_object(value, field)
    }
}

/// Decode an object that may be bare, wrapped in `data`, or under `field`.
pub(crate) fn decode_object<T: DeserializeOwned>(value: Value, field: Option<&str>) -> Result<T, ApiError> {
    let inner = match value {
        Value::Object(mut map) => {
            let named = field.and_then(|f| map.remove(f));
            match named {
                Some(v) => v,
                None => match map.remove("data") {
                    Some(v @ Value::Object(_)) => v,
                    Some(other) => {
                        map.insert("data".to_string(), other);
                        Value::Object(map)
                    }
                    None => Value::Object(map),
                },
            }
        }
        other => other,
    };
    serde_json::from_value(inner).map_err(|e| ApiError::InvalidResponse(format!("Failed to decode response: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use serde_json::json;

    use crate::auth::MemorySlot;
    use crate::models::Membership;
    use crate::testing::{FakeBackend, FAKE_TOKEN};

    fn fetcher_with(backend: Arc<FakeBackend>) -> (CollectionFetcher, Arc<TokenStore>, Arc<SessionCache>) {
        let tokens = Arc::new(TokenStore::open(Arc::new(MemorySlot::with_value(FAKE_TOKEN))));
        let cache = Arc::new(SessionCache::new());
        (
            CollectionFetcher::new(backend, tokens.clone(), cache.clone()),
            tokens,
            cache,
        )
    }

    #[tokio::test(start_paused = true)]
    async fn test_later_fetch_wins_over_slower_earlier_fetch() {
        let backend = Arc::new(FakeBackend::seeded());
        backend.script_get("clubs/mine", Duration::from_millis(300), json!({"clubs": [{"id": 1, "name": "Old"}]}));
        backend.script_get("clubs/mine", Duration::from_millis(100), json!({"clubs": [{"id": 2, "name": "New"}]}));
        let (fetcher, _, cache) = fetcher_with(backend);
        let view = Arc::new(CollectionView::<Club>::your_clubs());

        let first = {
            let (f, v) = (fetcher.clone(), view.clone());
            tokio::spawn(async move { f.fetch_collection(&v).await })
        };
        tokio::time::sleep(Duration::from_millis(10)).await;
        let second = {
            let (f, v) = (fetcher.clone(), view.clone());
            tokio::spawn(async move { f.fetch_collection(&v).await })
        };

        let second = second.await.unwrap().unwrap();
        let first = first.await.unwrap().unwrap();

        assert_eq!(first, FetchOutcome::Discarded);
        assert_eq!(second.committed().unwrap()[0].id, 2);
        assert_eq!(view.items().unwrap()[0].name, "New");
        let cached = cache.get::<Vec<Club>>(&CacheKey::your_clubs()).unwrap();
        assert_eq!(cached.data[0].id, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_unmounted_view_never_commits() {
        let backend = Arc::new(FakeBackend::seeded());
        backend.script_get("clubs/pending", Duration::from_millis(200), json!([]));
        let (fetcher, _, cache) = fetcher_with(backend);
        let view = Arc::new(CollectionView::<Club>::pending_clubs());

        let task = {
            let (f, v) = (fetcher.clone(), view.clone());
            tokio::spawn(async move { f.fetch_collection(&v).await })
        };
        tokio::time::sleep(Duration::from_millis(50)).await;
        view.unmount();

        assert_eq!(task.await.unwrap().unwrap(), FetchOutcome::Discarded);
        assert!(view.items().is_none());
        assert!(!cache.contains(&CacheKey::pending_clubs()));
    }

    #[tokio::test]
    async fn test_cleared_credential_fails_locally() {
        let backend = Arc::new(FakeBackend::seeded());
        let (fetcher, tokens, _) = fetcher_with(backend.clone());
        tokens.clear();

        let view = CollectionView::<Club>::your_clubs();
        let err = fetcher.fetch_collection(&view).await.unwrap_err();
        assert!(matches!(err, ApiError::MissingCredential));
        assert_eq!(backend.request_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_signed_out_fetch_leaves_in_flight_fetch_alone() {
        let backend = Arc::new(FakeBackend::seeded());
        backend.script_get("clubs/mine", Duration::from_millis(200), json!({"clubs": [{"id": 7, "name": "Go"}]}));
        let (fetcher, tokens, _) = fetcher_with(backend);
        let view = Arc::new(CollectionView::<Club>::your_clubs());

        let in_flight = {
            let (f, v) = (fetcher.clone(), view.clone());
            tokio::spawn(async move { f.fetch_collection(&v).await })
        };
        tokio::time::sleep(Duration::from_millis(10)).await;
        tokens.clear();

        let err = fetcher.fetch_collection(&view).await.unwrap_err();
        assert!(matches!(err, ApiError::MissingCredential));

        let outcome = in_flight.await.unwrap().unwrap();
        assert_eq!(outcome.committed().unwrap()[0].id, 7);
        assert_eq!(view.items().unwrap()[0].name, "Go");
    }

    #[tokio::test]
    async fn test_unauthorized_response_clears_credential() {
        let backend = Arc::new(FakeBackend::seeded());
        let (fetcher, tokens, _) = fetcher_with(backend.clone());
        tokens.set("expired");

        let view = CollectionView::<Club>::your_clubs();
        let err = fetcher.fetch_collection(&view).await.unwrap_err();
        assert_eq!(err.status(), Some(401));
        assert!(!tokens.is_set());

        // next call never leaves the process
        assert!(matches!(fetcher.fetch_collection(&view).await, Err(ApiError::MissingCredential)));
        assert_eq!(backend.request_count(), 1);
    }

    #[tokio::test]
    async fn test_empty_list_is_committed_and_cached() {
        let backend = Arc::new(FakeBackend::seeded());
        let (fetcher, _, cache) = fetcher_with(backend);
        let view = CollectionView::<Club>::pending_clubs();

        let outcome = fetcher.fetch_collection(&view).await.unwrap();
        assert_eq!(outcome, FetchOutcome::Committed(vec![]));
        assert_eq!(view.items(), Some(vec![]));
        assert!(cache.contains(&CacheKey::pending_clubs()));
    }

    #[tokio::test]
    async fn test_load_prefers_cache() {
        let backend = Arc::new(FakeBackend::seeded());
        let (fetcher, _, cache) = fetcher_with(backend.clone());
        cache
            .set(&CacheKey::your_clubs(), &vec![json!({"id": 99, "name": "Cached"})])
            .unwrap();

        let view = CollectionView::<Club>::your_clubs();
        let items = fetcher.load(&view).await.unwrap().committed().unwrap();
        assert_eq!(items[0].id, 99);
        assert_eq!(backend.request_count(), 0);
    }

    #[tokio::test]
    async fn test_error_status_is_reported() {
        let backend = Arc::new(FakeBackend::seeded());
        let (fetcher, _, cache) = fetcher_with(backend);
        let view = CollectionView::<Membership>::club_requests(404);

        let err = fetcher.fetch_collection(&view).await.unwrap_err();
        assert_eq!(err.status(), Some(404));
        assert!(view.items().is_none());
        assert!(!cache.contains(view.key()));
    }

    #[tokio::test]
    async fn test_category_object_is_split_per_field() {
        let backend = Arc::new(FakeBackend::seeded());
        backend.script_get(
            "clubs",
            Duration::ZERO,
            json!({
                "academics": [{"id": 1, "name": "Math Circle"}, {"id": 2, "name": "Debate"}],
                "sports": [{"id": 3, "name": "Ultimate"}],
                "arts": [],
                "total": 3
            }),
        );
        let (fetcher, _, cache) = fetcher_with(backend);

        let categories = fetcher.fetch_categories(&CacheKey::other_clubs(), "clubs").await.unwrap();
        let summary: Vec<(&str, usize)> = categories.iter().map(|c| (c.name.as_str(), c.clubs.len())).collect();
        assert_eq!(summary, vec![("academics", 2), ("arts", 0), ("sports", 1)]);
        assert!(cache.contains(&CacheKey::other_clubs()));
    }

    #[tokio::test]
    async fn test_flat_directory_in_data_wrapper() {
        let backend = Arc::new(FakeBackend::seeded());
        backend.script_get(
            "clubs",
            Duration::ZERO,
            json!({"data": [{"id": 1, "name": "Chess"}, {"id": 2, "name": "Debate"}]}),
        );
        let (fetcher, _, cache) = fetcher_with(backend);

        let categories = fetcher.fetch_categories(&CacheKey::other_clubs(), "clubs").await.unwrap();
        assert_eq!(categories.len(), 1);
        assert_eq!(categories[0].display_name(), "All Clubs");
        assert_eq!(categories[0].clubs.len(), 2);
        let cached = cache.get::<Vec<ClubCategory>>(&CacheKey::other_clubs()).unwrap();
        assert_eq!(cached.data[0].clubs.len(), 2);
    }

    #[test]
    fn test_decode_object_shapes() {
        #[derive(serde::Deserialize)]
        struct Thing {
            id: i64,
        }
        assert_eq!(decode_object::<Thing>(json!({"id": 1}), None).unwrap().id, 1);
        assert_eq!(decode_object::<Thing>(json!({"data": {"id": 2}}), None).unwrap().id, 2);
        assert_eq!(decode_object::<Thing>(json!({"user": {"id": 3}}), Some("user")).unwrap().id, 3);
    }
}
