//! Keyed query cache: `key → (value, fetched_at, stale)` with manual
//! invalidation. The cache is a disposable projection of the remote store;
//! anything in it can be thrown away and fetched again.

use std::any::Any;
use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use tokio::time::Instant;
use tracing::debug;
use uuid::Uuid;

use whisper_types::models::{CategoryFilter, SortMode};

use crate::config::DEFAULT_STALE_TIME;
use crate::error::ClientError;

/// Identifies one cached query by the semantic parameters that shape it.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum QueryKey {
    Whispers {
        category: CategoryFilter,
        sort: SortMode,
        search: String,
    },
    Whisper(Uuid),
    Comments(Uuid),
    Profile(Uuid),
    SearchHistory(Uuid),
}

impl QueryKey {
    /// The search term is trimmed so that `"cats "` and `"cats"` share an entry.
    pub fn whispers(category: CategoryFilter, sort: SortMode, search: &str) -> Self {
        Self::Whispers {
            category,
            sort,
            search: search.trim().to_string(),
        }
    }
}

/// A group of keys selected for invalidation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryScope {
    /// Every whisper list regardless of filter, sort or search.
    AllWhisperLists,
    Whisper(Uuid),
    Comments(Uuid),
    Profile,
    SearchHistory,
    Everything,
}

impl QueryScope {
    pub fn matches(&self, key: &QueryKey) -> bool {
        match (self, key) {
            (Self::Everything, _) => true,
            (Self::AllWhisperLists, QueryKey::Whispers { .. }) => true,
            (Self::Whisper(a), QueryKey::Whisper(b)) => a == b,
            (Self::Comments(a), QueryKey::Comments(b)) => a == b,
            (Self::Profile, QueryKey::Profile(_)) => true,
            (Self::SearchHistory, QueryKey::SearchHistory(_)) => true,
            _ => false,
        }
    }
}

/// A value read from the cache along with whether it may be served as is.
#[derive(Debug)]
pub struct Cached<T> {
    pub value: Arc<T>,
    pub fresh: bool,
}

struct Entry {
    value: Arc<dyn Any + Send + Sync>,
    fetched_at: Instant,
    stale: bool,
}

#[derive(Default)]
struct Inner {
    entries: HashMap<QueryKey, Entry>,
    /// Bumped by every invalidation so fetches that started before it store
    /// their result as already stale.
    generation: u64,
    /// Bumped only by `clear`. A fetch that straddles a clear belongs to a
    /// previous viewer and is never stored.
    epoch: u64,
}

#[derive(Clone)]
pub struct QueryCache {
    inner: Arc<Mutex<Inner>>,
    stale_time: Duration,
}

impl Default for QueryCache {
    fn default() -> Self {
        Self::new(DEFAULT_STALE_TIME)
    }
}

impl QueryCache {
    pub fn new(stale_time: Duration) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Inner::default())),
            stale_time,
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        // A panic while holding the lock cannot leave the map half-written
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Reads an entry without fetching. `None` when absent or when the
    /// stored value has a different type.
    pub fn peek<T: Send + Sync + 'static>(&self, key: &QueryKey) -> Option<Cached<T>> {
        let inner = self.lock();
        let entry = inner.entries.get(key)?;
        let value = Arc::clone(&entry.value).downcast::<T>().ok()?;
        let fresh = !entry.stale && entry.fetched_at.elapsed() < self.stale_time;
        Some(Cached { value, fresh })
    }

    pub fn store<T: Send + Sync + 'static>(&self, key: QueryKey, value: T) -> Arc<T> {
        let value = Arc::new(value);
        self.lock().entries.insert(
            key,
            Entry {
                value: Arc::clone(&value) as Arc<dyn Any + Send + Sync>,
                fetched_at: Instant::now(),
                stale: false,
            },
        );
        value
    }

    /// Serves a fresh cached value, otherwise runs `fetch` and stores its result.
    pub async fn fetch<T, F, Fut>(&self, key: QueryKey, fetch: F) -> Result<Arc<T>, ClientError>
    where
        T: Send + Sync + 'static,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, ClientError>>,
    {
        if let Some(cached) = self.peek::<T>(&key) {
            if cached.fresh {
                return Ok(cached.value);
            }
        }
        self.refresh(key, fetch).await
    }

    /// Always runs `fetch`. Errors leave any previous entry in place.
    pub async fn refresh<T, F, Fut>(&self, key: QueryKey, fetch: F) -> Result<Arc<T>, ClientError>
    where
        T: Send + Sync + 'static,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, ClientError>>,
    {
        let epoch = self.epoch();
        self.refresh_in(epoch, key, fetch).await
    }

    /// Current clear count. Callers that set up a fetch ahead of running it
    /// take this first and pass it to `refresh_in`.
    pub fn epoch(&self) -> u64 {
        self.lock().epoch
    }

    /// Like `refresh`, but the result is only stored if no `clear` happened
    /// since `epoch` was taken. The value is returned either way.
    pub async fn refresh_in<T, F, Fut>(&self, epoch: u64, key: QueryKey, fetch: F) -> Result<Arc<T>, ClientError>
    where
        T: Send + Sync + 'static,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, ClientError>>,
    {
        let started = self.lock().generation;
        debug!("Fetching {:?}", key);
        let value = Arc::new(fetch().await?);

        let mut inner = self.lock();
        if inner.epoch != epoch {
            debug!("Dropping {:?} fetched before the cache was cleared", key);
            return Ok(value);
        }
        let stale = inner.generation != started;
        inner.entries.insert(
            key,
            Entry {
                value: Arc::clone(&value) as Arc<dyn Any + Send + Sync>,
                fetched_at: Instant::now(),
                stale,
            },
        );
        Ok(value)
    }

    /// Marks every matching entry stale and returns how many matched.
    pub fn invalidate(&self, scope: QueryScope) -> usize {
        let mut inner = self.lock();
        inner.generation += 1;
        let mut marked = 0;
        for (key, entry) in inner.entries.iter_mut() {
            if scope.matches(key) {
                entry.stale = true;
                marked += 1;
            }
        }
        debug!("Invalidated {} entries for {:?}", marked, scope);
        marked
    }

    pub fn clear(&self) {
        let mut inner = self.lock();
        inner.generation += 1;
        inner.epoch += 1;
        inner.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
