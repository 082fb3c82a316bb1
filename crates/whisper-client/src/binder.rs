//! View-query binder: ties one view to one cache key and keeps a fetch in
//! flight whenever the key's value is missing or stale.

use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex};

use tokio::task::JoinHandle;
use tracing::warn;

use crate::cache::{QueryCache, QueryKey};
use crate::error::ClientError;

type BoxFuture<T> = Pin<Box<dyn Future<Output = Result<T, ClientError>> + Send>>;
type FetchFn<T> = Arc<dyn Fn() -> BoxFuture<T> + Send + Sync>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueryStatus {
    /// The query is disabled, e.g. it needs a session and there is none.
    Idle,
    /// Nothing cached yet; the first fetch is in flight.
    Loading,
    /// Serving a stale cached value while a refetch is in flight.
    Refreshing,
    Ready,
    /// The last fetch failed. Distinct from a successful fetch of nothing.
    Failed(String),
}

#[derive(Debug)]
pub struct QueryState<T> {
    pub data: Option<Arc<T>>,
    pub status: QueryStatus,
}

impl<T> QueryState<T> {
    fn idle() -> Self {
        Self {
            data: None,
            status: QueryStatus::Idle,
        }
    }

    pub fn is_loading(&self) -> bool {
        matches!(self.status, QueryStatus::Loading | QueryStatus::Refreshing)
    }
}

pub struct QueryBinder<T> {
    cache: QueryCache,
    key: Option<QueryKey>,
    fetch: Option<FetchFn<T>>,
    task: Option<JoinHandle<()>>,
    /// Last failure, tagged with the key it belongs to so a late write from
    /// an aborted fetch cannot leak into the next key.
    error: Arc<Mutex<Option<(QueryKey, String)>>>,
}

impl<T: Send + Sync + 'static> QueryBinder<T> {
    pub fn new(cache: QueryCache) -> Self {
        Self {
            cache,
            key: None,
            fetch: None,
            task: None,
            error: Arc::new(Mutex::new(None)),
        }
    }

    /// Points the binder at `key` and returns what the view should render.
    ///
    /// A changed key drops the in-flight fetch for the old one. A disabled
    /// query renders `Idle` and fetches nothing.
    pub fn sync<F, Fut>(&mut self, key: QueryKey, enabled: bool, fetch: F) -> QueryState<T>
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T, ClientError>> + Send + 'static,
    {
        if !enabled {
            self.reset();
            return QueryState::idle();
        }

        if self.key.as_ref() != Some(&key) {
            self.reset();
            self.key = Some(key);
        }
        let fetch: FetchFn<T> = Arc::new(move || -> BoxFuture<T> { Box::pin(fetch()) });
        self.fetch = Some(fetch);

        self.evaluate()
    }

    /// Current state without starting any fetch.
    pub fn state(&self) -> QueryState<T> {
        match &self.key {
            Some(key) => self.render(key),
            None => QueryState::idle(),
        }
    }

    /// Waits for the in-flight fetch, if any, to finish.
    pub async fn settled(&mut self) -> QueryState<T> {
        if let Some(task) = self.task.as_mut() {
            if let Err(e) = task.await {
                if !e.is_cancelled() {
                    warn!("Query task failed: {}", e);
                }
            }
            self.task = None;
        }
        self.state()
    }

    /// Clears a recorded failure and fetches again.
    pub fn retry(&mut self) -> QueryState<T> {
        *self.error.lock().unwrap_or_else(|e| e.into_inner()) = None;
        if let Some(task) = self.task.take() {
            task.abort();
        }
        self.evaluate()
    }

    fn reset(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
        self.key = None;
        self.fetch = None;
        *self.error.lock().unwrap_or_else(|e| e.into_inner()) = None;
    }

    fn in_flight(&self) -> bool {
        self.task.as_ref().is_some_and(|task| !task.is_finished())
    }

    fn failure(&self, key: &QueryKey) -> Option<String> {
        let error = self.error.lock().unwrap_or_else(|e| e.into_inner());
        match error.as_ref() {
            Some((failed, message)) if failed == key => Some(message.clone()),
            _ => None,
        }
    }

    fn evaluate(&mut self) -> QueryState<T> {
        let Some(key) = self.key.clone() else {
            return QueryState::idle();
        };

        let fresh = self.cache.peek::<T>(&key).is_some_and(|cached| cached.fresh);
        let failed = self.failure(&key).is_some();
        if !fresh && !failed && !self.in_flight() {
            self.spawn(key.clone());
        }

        self.render(&key)
    }

    fn render(&self, key: &QueryKey) -> QueryState<T> {
        let cached = self.cache.peek::<T>(key);
        let status = if let Some(message) = self.failure(key) {
            QueryStatus::Failed(message)
        } else {
            match &cached {
                Some(cached) if cached.fresh => QueryStatus::Ready,
                Some(_) if self.in_flight() => QueryStatus::Refreshing,
                // Stale with nothing in flight: the next sync refetches
                Some(_) => QueryStatus::Ready,
                None if self.in_flight() => QueryStatus::Loading,
                None => QueryStatus::Idle,
            }
        };

        QueryState {
            data: cached.map(|cached| cached.value),
            status,
        }
    }

    fn spawn(&mut self, key: QueryKey) {
        let Some(fetch) = self.fetch.clone() else {
            return;
        };
        let cache = self.cache.clone();
        let epoch = cache.epoch();
        let error = Arc::clone(&self.error);

        self.task = Some(tokio::spawn(async move {
            if let Err(e) = cache.refresh_in(epoch, key.clone(), || fetch()).await {
                warn!("Fetching {:?} failed: {}", key, e);
                *error.lock().unwrap_or_else(|e| e.into_inner()) = Some((key, e.to_string()));
            }
        }));
    }
}

impl<T> Drop for QueryBinder<T> {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}
