use std::collections::HashMap;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

/// Fixed name of a cached collection.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CacheKey(String);

impl CacheKey {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn your_clubs() -> Self {
        Self::new("your_clubs")
    }

    pub fn other_clubs() -> Self {
        Self::new("other_clubs")
    }

    pub fn pending_clubs() -> Self {
        Self::new("pending_clubs")
    }

    pub fn club_requests(club_id: i64) -> Self {
        Self(format!("club_requests:{}", club_id))
    }

    pub fn club_members(club_id: i64) -> Self {
        Self(format!("club_members:{}", club_id))
    }

    pub fn club_events(club_id: i64) -> Self {
        Self(format!("club_events:{}", club_id))
    }

    pub fn club_tasks(club_id: i64) -> Self {
        Self(format!("club_tasks:{}", club_id))
    }

    pub fn club_announcements(club_id: i64) -> Self {
        Self(format!("club_announcements:{}", club_id))
    }

    pub fn event_attendance(event_id: i64) -> Self {
        Self(format!("event_attendance:{}", event_id))
    }

    pub fn admin_users() -> Self {
        Self::new("admin_users")
    }
}

impl std::fmt::Display for CacheKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CachedData<T> {
    pub data: T,
    pub cached_at: DateTime<Utc>,
}

impl<T> CachedData<T> {
    pub fn new(data: T) -> Self {
        Self {
            data,
            cached_at: Utc::now(),
        }
    }

    pub fn age_minutes(&self) -> i64 {
        (Utc::now() - self.cached_at).num_minutes()
    }

    pub fn age_display(&self) -> String {
        let minutes = self.age_minutes();
        if minutes < 1 {
            // Handles clock skew too
            "just now".to_string()
        } else if minutes < 60 {
            format!("{}m ago", minutes)
        } else if minutes < 1440 {
            format!("{}h ago", minutes / 60)
        } else {
            format!("{}d ago", minutes / 1440)
        }
    }
}

/// Position of a key in its invalidation history.
///
/// Captured before a fetch starts; the fetch may only write back if no
/// invalidation of that key happened in between.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Epoch(u64);

#[derive(Default)]
struct Slot {
    entry: Option<CachedData<Value>>,
    epoch: u64,
}

/// Page-lifetime store of previously fetched collections.
///
/// Entries never expire on their own; they are removed by [`invalidate`]
/// and dropped with the cache. Payloads are stored as JSON values so one
/// cache can hold collections of every record type.
///
/// [`invalidate`]: SessionCache::invalidate
#[derive(Default)]
pub struct SessionCache {
    slots: Mutex<HashMap<CacheKey, Slot>>,
}

impl SessionCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Typed read. `None` means "never fetched or invalidated"; an entry that
    /// no longer decodes as `T` is treated the same.
    pub fn get<T: DeserializeOwned>(&self, key: &CacheKey) -> Option<CachedData<T>> {
        let slots = self.slots.lock();
        let cached = slots.get(key)?.entry.as_ref()?;
        match serde_json::from_value(cached.data.clone()) {
            Ok(data) => Some(CachedData {
                data,
                cached_at: cached.cached_at,
            }),
            Err(e) => {
                debug!(cache = %key, error = %e, "Cached entry does not decode");
                None
            }
        }
    }

    pub fn contains(&self, key: &CacheKey) -> bool {
        self.slots
            .lock()
            .get(key)
            .map(|slot| slot.entry.is_some())
            .unwrap_or(false)
    }

    /// Unconditional write.
    pub fn set<T: Serialize>(&self, key: &CacheKey, data: &T) -> Result<(), serde_json::Error> {
        let value = serde_json::to_value(data)?;
        let mut slots = self.slots.lock();
        slots.entry(key.clone()).or_default().entry = Some(CachedData::new(value));
        Ok(())
    }

    /// Current epoch of `key`, to be passed to [`set_if_current`].
    ///
    /// [`set_if_current`]: SessionCache::set_if_current
    pub fn epoch(&self, key: &CacheKey) -> Epoch {
        Epoch(self.slots.lock().get(key).map(|s| s.epoch).unwrap_or(0))
    }

    /// Write only if `key` has not been invalidated since `epoch` was taken.
    /// Returns whether the write happened.
    pub fn set_if_current<T: Serialize>(
        &self,
        key: &CacheKey,
        epoch: Epoch,
        data: &T,
    ) -> Result<bool, serde_json::Error> {
        let value = serde_json::to_value(data)?;
        let mut slots = self.slots.lock();
        let slot = slots.entry(key.clone()).or_default();
        if slot.epoch != epoch.0 {
            debug!(cache = %key, "Skipping write from a fetch that predates invalidation");
            return Ok(false);
        }
        slot.entry = Some(CachedData::new(value));
        Ok(true)
    }

    /// Remove `key` so the next read goes to the network.
    pub fn invalidate(&self, key: &CacheKey) {
        let mut slots = self.slots.lock();
        let slot = slots.entry(key.clone()).or_default();
        slot.entry = None;
        slot.epoch += 1;
        debug!(cache = %key, epoch = slot.epoch, "Invalidated");
    }

    pub fn invalidate_all<'a>(&self, keys: impl IntoIterator<Item = &'a CacheKey>) {
        for key in keys {
            self.invalidate(key);
        }
    }

    /// Drop every entry (logout).
    pub fn clear(&self) {
        let mut slots = self.slots.lock();
        for slot in slots.values_mut() {
            slot.entry = None;
            slot.epoch += 1;
        }
    }

    /// Ages of the cached keys, for status display.
    pub fn ages(&self) -> Vec<(CacheKey, String)> {
        let slots = self.slots.lock();
        let mut ages: Vec<_> = slots
            .iter()
            .filter_map(|(key, slot)| slot.entry.as_ref().map(|e| (key.clone(), e.age_display())))
            .collect();
        ages.sort();
        ages
    }
}
