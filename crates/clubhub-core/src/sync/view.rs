use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use async_trait::async_trait;
use parking_lot::Mutex;
use serde::{de::DeserializeOwned, Serialize};

use crate::api::{ApiError, ListShape};
use crate::cache::CacheKey;
use crate::models::{
    AttendanceRecord, Announcement, Club, ClubEvent, Membership, Task, User,
};

use super::fetcher::CollectionFetcher;

/// Proof that a fetch was started; only the latest one may commit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FetchTicket(u64);

/// In-memory state of one mounted list view.
///
/// `items` is `None` until the first commit, which keeps "not fetched yet"
/// distinct from an empty list. Starting a fetch supersedes every earlier
/// in-flight fetch of the same view; unmounting supersedes all of them.
pub struct CollectionView<T> {
    key: CacheKey,
    endpoint: String,
    shape: ListShape,
    items: Mutex<Option<Vec<T>>>,
    latest: AtomicU64,
    mounted: AtomicBool,
}

impl<T: Clone> CollectionView<T> {
    pub fn new(key: CacheKey, endpoint: impl Into<String>, shape: ListShape) -> Self {
        Self {
            key,
            endpoint: endpoint.into(),
            shape,
            items: Mutex::new(None),
            latest: AtomicU64::new(0),
            mounted: AtomicBool::new(true),
        }
    }

    pub fn key(&self) -> &CacheKey {
        &self.key
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn shape(&self) -> &ListShape {
        &self.shape
    }

    /// Last committed items, `None` if nothing was committed yet.
    pub fn items(&self) -> Option<Vec<T>> {
        self.items.lock().clone()
    }

    pub fn is_loaded(&self) -> bool {
        self.items.lock().is_some()
    }

    pub fn is_mounted(&self) -> bool {
        self.mounted.load(Ordering::Acquire)
    }

    /// Stop accepting results; every in-flight fetch is discarded.
    pub fn unmount(&self) {
        self.mounted.store(false, Ordering::Release);
        self.latest.fetch_add(1, Ordering::AcqRel);
    }

    pub(crate) fn begin(&self) -> FetchTicket {
        FetchTicket(self.latest.fetch_add(1, Ordering::AcqRel) + 1)
    }

    pub(crate) fn is_current(&self, ticket: FetchTicket) -> bool {
        self.is_mounted() && self.latest.load(Ordering::Acquire) == ticket.0
    }

    /// Store `items` if `ticket` is still the latest fetch. The check and the
    /// write happen under the same lock.
    pub(crate) fn commit(&self, ticket: FetchTicket, items: Vec<T>) -> bool {
        let mut slot = self.items.lock();
        if !self.is_current(ticket) {
            return false;
        }
        *slot = Some(items);
        true
    }
}

impl CollectionView<Club> {
    /// Clubs the user is an approved member of.
    pub fn your_clubs() -> Self {
        Self::new(CacheKey::your_clubs(), "clubs/mine", ListShape::Field("clubs"))
    }

    /// Clubs the user has a pending join request for.
    pub fn pending_clubs() -> Self {
        Self::new(CacheKey::pending_clubs(), "clubs/pending", ListShape::Field("clubs"))
    }
}

impl CollectionView<Membership> {
    /// Pending applicants of a club (officer view).
    pub fn club_requests(club_id: i64) -> Self {
        Self::new(
            CacheKey::club_requests(club_id),
            format!("clubs/{}/requests", club_id),
            ListShape::Field("requests"),
        )
    }

    pub fn club_members(club_id: i64) -> Self {
        Self::new(
            CacheKey::club_members(club_id),
            format!("clubs/{}/members", club_id),
            ListShape::Field("members"),
        )
    }
}

impl CollectionView<ClubEvent> {
    pub fn club_events(club_id: i64) -> Self {
        Self::new(
            CacheKey::club_events(club_id),
            format!("clubs/{}/events", club_id),
            ListShape::Field("events"),
        )
    }
}

impl CollectionView<Task> {
    pub fn club_tasks(club_id: i64) -> Self {
        Self::new(
            CacheKey::club_tasks(club_id),
            format!("clubs/{}/tasks", club_id),
            ListShape::Field("tasks"),
        )
    }
}

impl CollectionView<AttendanceRecord> {
    pub fn event_attendance(event_id: i64) -> Self {
        Self::new(
            CacheKey::event_attendance(event_id),
            format!("events/{}/attendance", event_id),
            ListShape::Field("attendance"),
        )
    }
}

impl CollectionView<Announcement> {
    pub fn club_announcements(club_id: i64) -> Self {
        Self::new(
            CacheKey::club_announcements(club_id),
            format!("clubs/{}/announcements", club_id),
            ListShape::Field("announcements"),
        )
    }
}

impl CollectionView<User> {
    pub fn admin_users() -> Self {
        Self::new(CacheKey::admin_users(), "admin/users", ListShape::Field("users"))
    }
}

/// A mounted view the mutator can ask to reload.
#[async_trait]
pub trait Refresh: Send + Sync {
    fn key(&self) -> &CacheKey;
    fn is_mounted(&self) -> bool;
    async fn refresh(&self, fetcher: &CollectionFetcher) -> Result<(), ApiError>;
}

#[async_trait]
impl<T> Refresh for CollectionView<T>
where
    T: DeserializeOwned + Serialize + Clone + Send + Sync + 'static,
{
    fn key(&self) -> &CacheKey {
        CollectionView::key(self)
    }

    fn is_mounted(&self) -> bool {
        CollectionView::is_mounted(self)
    }

    async fn refresh(&self, fetcher: &CollectionFetcher) -> Result<(), ApiError> {
        fetcher.fetch_collection(self).await.map(|_| ())
    }
}

/// Currently mounted views, by weak reference. Dropping the last `Arc` of a
/// view deregisters it.
#[derive(Default)]
pub struct ViewRegistry {
    views: Mutex<Vec<Weak<dyn Refresh>>>,
}

impl ViewRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Track `view`, dropping entries for views that are gone or unmounted.
    pub fn register(&self, view: Arc<dyn Refresh>) {
        let mut views = self.views.lock();
        prune(&mut views);
        views.push(Arc::downgrade(&view));
    }

    /// Live, mounted views bound to any of `keys`. Prunes dead entries.
    pub fn mounted_for(&self, keys: &[CacheKey]) -> Vec<Arc<dyn Refresh>> {
        let mut views = self.views.lock();
        prune(&mut views);
        views
            .iter()
            .filter_map(Weak::upgrade)
            .filter(|v| keys.contains(v.key()))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.views
            .lock()
            .iter()
            .filter(|weak| weak.strong_count() > 0)
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[cfg(test)]
    fn tracked(&self) -> usize {
        self.views.lock().len()
    }
}

fn prune(views: &mut Vec<Weak<dyn Refresh>>) {
    views.retain(|weak| weak.upgrade().map(|v| v.is_mounted()).unwrap_or(false));
}
