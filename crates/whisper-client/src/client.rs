use std::sync::Arc;

use tracing::{info, warn};
use uuid::Uuid;

use whisper_types::api::{CreateCommentRequest, CreateWhisperRequest, UpdateProfileRequest, WhisperListQuery};
use whisper_types::models::{
    Category, CategoryFilter, Comment, LikeState, Profile, SearchHistoryItem, SortMode, Whisper,
};
use whisper_types::validate;

use crate::binder::{QueryBinder, QueryState};
use crate::cache::{QueryCache, QueryKey, QueryScope};
use crate::config::ClientConfig;
use crate::error::ClientError;
use crate::like::LikeToggle;
use crate::search::SearchRecorder;
use crate::session::Session;
use crate::store::{Result, WallStore};

/// Reads go through the query cache; every mutation invalidates the
/// queries whose results it can change.
pub struct WallClient<S> {
    store: Arc<S>,
    cache: QueryCache,
    session: Option<Session>,
    config: ClientConfig,
}

/// Logs a failed mutation and hands the error back to the caller.
fn notify<T>(action: &str, result: Result<T>) -> Result<T> {
    if let Err(e) = &result {
        warn!("Failed to {}: {}", action, e);
    }
    result
}

impl<S: WallStore + 'static> WallClient<S> {
    pub fn new(store: S, config: ClientConfig) -> Self {
        Self {
            store: Arc::new(store),
            cache: QueryCache::new(config.stale_time),
            session: None,
            config,
        }
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    pub fn cache(&self) -> &QueryCache {
        &self.cache
    }

    pub fn session(&self) -> Option<&Session> {
        self.session.as_ref()
    }

    fn require_session(&self) -> Result<&Session> {
        self.session.as_ref().ok_or(ClientError::SignedOut)
    }

    // -- Identity --

    pub async fn register(&mut self, email: &str, password: &str, full_name: Option<&str>) -> Result<&Session> {
        validate::email(email)?;
        validate::password(password)?;
        let session = notify("register", self.store.register(email, password, full_name).await)?;
        Ok(self.start_session(session))
    }

    pub async fn sign_in(&mut self, email: &str, password: &str) -> Result<&Session> {
        let session = notify("sign in", self.store.sign_in(email, password).await)?;
        Ok(self.start_session(session))
    }

    /// Cached results are viewer-specific, so they go with the session.
    pub fn sign_out(&mut self) {
        if let Some(session) = self.session.take() {
            info!("Signed out {}", session.email);
        }
        self.cache.clear();
    }

    fn start_session(&mut self, session: Session) -> &Session {
        info!("Signed in as {}", session.email);
        self.cache.clear();
        self.session.insert(session)
    }

    // -- Reads --

    pub async fn whispers(&self, filter: CategoryFilter, sort: SortMode, search: &str) -> Result<Arc<Vec<Whisper>>> {
        let key = QueryKey::whispers(filter, sort, search);
        let query = WhisperListQuery::new(filter, sort, search);
        self.cache
            .fetch(key, || self.store.list_whispers(self.session.as_ref(), &query))
            .await
    }

    /// `None` inside the `Arc` means the whisper does not exist.
    pub async fn whisper(&self, id: Uuid) -> Result<Arc<Option<Whisper>>> {
        self.cache
            .fetch(QueryKey::Whisper(id), || self.store.get_whisper(self.session.as_ref(), id))
            .await
    }

    pub async fn comments(&self, whisper_id: Uuid) -> Result<Arc<Option<Vec<Comment>>>> {
        self.cache
            .fetch(QueryKey::Comments(whisper_id), || {
                self.store.list_comments(self.session.as_ref(), whisper_id)
            })
            .await
    }

    pub async fn profile(&self) -> Result<Arc<Option<Profile>>> {
        let session = self.require_session()?;
        self.cache
            .fetch(QueryKey::Profile(session.user_id), || self.store.get_profile(session))
            .await
    }

    pub async fn search_history(&self) -> Result<Arc<Vec<SearchHistoryItem>>> {
        let session = self.require_session()?;
        self.cache
            .fetch(QueryKey::SearchHistory(session.user_id), || {
                self.store.list_search_history(session)
            })
            .await
    }

    // -- View bindings --

    pub fn bind_whispers(
        &self,
        binder: &mut QueryBinder<Vec<Whisper>>,
        filter: CategoryFilter,
        sort: SortMode,
        search: &str,
    ) -> QueryState<Vec<Whisper>> {
        let store = Arc::clone(&self.store);
        let session = self.session.clone();
        let query = WhisperListQuery::new(filter, sort, search);
        binder.sync(QueryKey::whispers(filter, sort, search), true, move || {
            let store = Arc::clone(&store);
            let session = session.clone();
            let query = query.clone();
            async move { store.list_whispers(session.as_ref(), &query).await }
        })
    }

    pub fn bind_whisper(&self, binder: &mut QueryBinder<Option<Whisper>>, id: Uuid) -> QueryState<Option<Whisper>> {
        let store = Arc::clone(&self.store);
        let session = self.session.clone();
        binder.sync(QueryKey::Whisper(id), true, move || {
            let store = Arc::clone(&store);
            let session = session.clone();
            async move { store.get_whisper(session.as_ref(), id).await }
        })
    }

    pub fn bind_comments(
        &self,
        binder: &mut QueryBinder<Option<Vec<Comment>>>,
        whisper_id: Uuid,
    ) -> QueryState<Option<Vec<Comment>>> {
        let store = Arc::clone(&self.store);
        let session = self.session.clone();
        binder.sync(QueryKey::Comments(whisper_id), true, move || {
            let store = Arc::clone(&store);
            let session = session.clone();
            async move { store.list_comments(session.as_ref(), whisper_id).await }
        })
    }

    /// Disabled while signed out.
    pub fn bind_search_history(
        &self,
        binder: &mut QueryBinder<Vec<SearchHistoryItem>>,
    ) -> QueryState<Vec<SearchHistoryItem>> {
        let store = Arc::clone(&self.store);
        let session = self.session.clone();
        let key = QueryKey::SearchHistory(session.as_ref().map(|s| s.user_id).unwrap_or_default());
        let enabled = session.is_some();
        binder.sync(key, enabled, move || {
            let store = Arc::clone(&store);
            let session = session.clone();
            async move {
                let session = session.ok_or(ClientError::SignedOut)?;
                store.list_search_history(&session).await
            }
        })
    }

    // -- Mutations --

    /// Checks the session and the content before anything is sent.
    pub async fn create_whisper(&self, content: &str, category: Category, is_anonymous: bool) -> Result<Whisper> {
        let session = self.require_session()?;
        let content = validate::whisper_content(content)?;
        let req = CreateWhisperRequest {
            content,
            category,
            is_anonymous,
        };

        let whisper = notify("share whisper", self.store.create_whisper(session, &req).await)?;
        self.cache.invalidate(QueryScope::AllWhisperLists);
        Ok(whisper)
    }

    pub async fn delete_whisper(&self, id: Uuid) -> Result<()> {
        let session = self.require_session()?;
        notify("delete whisper", self.store.delete_whisper(session, id).await)?;
        self.cache.invalidate(QueryScope::AllWhisperLists);
        self.cache.invalidate(QueryScope::Whisper(id));
        self.cache.invalidate(QueryScope::Comments(id));
        Ok(())
    }

    pub async fn add_comment(&self, whisper_id: Uuid, content: &str, is_anonymous: bool) -> Result<Comment> {
        let session = self.require_session()?;
        let content = validate::comment_content(content)?;
        let req = CreateCommentRequest { content, is_anonymous };

        let comment = notify("add comment", self.store.add_comment(session, whisper_id, &req).await)?;
        // The parent's comments_count shows on the detail view and every list
        self.cache.invalidate(QueryScope::Comments(whisper_id));
        self.cache.invalidate(QueryScope::Whisper(whisper_id));
        self.cache.invalidate(QueryScope::AllWhisperLists);
        Ok(comment)
    }

    pub async fn toggle_like(&self, toggle: &mut LikeToggle) -> Result<LikeState> {
        let session = self.require_session()?;
        let state = notify("update like", toggle.toggle(self.store.as_ref(), session).await)?;
        for scope in toggle.subject().affected_scopes() {
            self.cache.invalidate(scope);
        }
        Ok(state)
    }

    pub async fn toggle_whisper_like(&self, whisper: &Whisper) -> Result<LikeState> {
        self.toggle_like(&mut LikeToggle::for_whisper(whisper)).await
    }

    pub async fn toggle_comment_like(&self, comment: &Comment) -> Result<LikeState> {
        self.toggle_like(&mut LikeToggle::for_comment(comment)).await
    }

    pub async fn update_profile(&self, full_name: Option<&str>, avatar_url: Option<&str>) -> Result<Profile> {
        let session = self.require_session()?;
        let req = UpdateProfileRequest {
            full_name: full_name.map(validate::full_name).transpose()?,
            avatar_url: avatar_url.map(str::to_string),
        };

        let profile = notify("update profile", self.store.update_profile(session, &req).await)?;
        self.cache.invalidate(QueryScope::Profile);
        Ok(profile)
    }

    pub async fn delete_search_item(&self, id: Uuid) -> Result<()> {
        let session = self.require_session()?;
        notify("delete search", self.store.delete_search_item(session, id).await)?;
        self.cache.invalidate(QueryScope::SearchHistory);
        Ok(())
    }

    pub async fn clear_search_history(&self) -> Result<usize> {
        let session = self.require_session()?;
        let deleted = notify("clear search history", self.store.clear_search_history(session).await)?;
        self.cache.invalidate(QueryScope::SearchHistory);
        Ok(deleted)
    }

    /// Starts the debounced recorder for the signed-in user.
    pub fn search_recorder(&self) -> Result<SearchRecorder> {
        let session = self.require_session()?;
        Ok(SearchRecorder::spawn(
            Arc::clone(&self.store),
            session.clone(),
            self.cache.clone(),
            self.config.search_debounce,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::binder::QueryStatus;
    use crate::memory::MemoryStore;

    async fn signed_in() -> WallClient<MemoryStore> {
        let mut client = WallClient::new(MemoryStore::new(), ClientConfig::default());
        client.register("a@example.com", "correct horse", None).await.unwrap();
        client
    }

    #[tokio::test]
    async fn overlong_whisper_is_rejected_before_any_call() {
        let client = signed_in().await;

        let err = client
            .create_whisper(&"x".repeat(1001), Category::General, true)
            .await
            .unwrap_err();
        assert!(matches!(err, ClientError::Validation(_)));
        assert_eq!(client.store().calls("create_whisper"), 0);

        client
            .create_whisper(&"x".repeat(1000), Category::General, true)
            .await
            .unwrap();
        assert_eq!(client.store().calls("create_whisper"), 1);
    }

    #[tokio::test]
    async fn mutations_require_a_session() {
        let client = WallClient::new(MemoryStore::new(), ClientConfig::default());
        let err = client.create_whisper("hi", Category::General, true).await.unwrap_err();
        assert!(matches!(err, ClientError::SignedOut));
        assert!(matches!(client.clear_search_history().await, Err(ClientError::SignedOut)));
        assert!(client.search_recorder().is_err());
    }

    #[tokio::test]
    async fn create_invalidates_lists() {
        let client = signed_in().await;

        let before = client.whispers(CategoryFilter::All, SortMode::Recent, "").await.unwrap();
        assert!(before.is_empty());
        client.whispers(CategoryFilter::All, SortMode::Recent, "").await.unwrap();
        assert_eq!(client.store().calls("list_whispers"), 1);

        client.create_whisper("test", Category::General, true).await.unwrap();
        let after = client.whispers(CategoryFilter::All, SortMode::Recent, "").await.unwrap();
        assert_eq!(after.len(), 1);
        assert_eq!(client.store().calls("list_whispers"), 2);
    }

    #[tokio::test]
    async fn like_scenario_updates_cached_counts() {
        let mut client = signed_in().await;
        let whisper = client.create_whisper("test", Category::General, true).await.unwrap();

        let general = CategoryFilter::Only(Category::General);
        let listed = client.whispers(general, SortMode::Recent, "").await.unwrap();
        assert_eq!((listed[0].likes_count, listed[0].comments_count), (0, 0));

        client.sign_out();
        client.register("b@example.com", "correct horse", None).await.unwrap();

        let state = client.toggle_whisper_like(&listed[0]).await.unwrap();
        assert_eq!(state, LikeState { liked: true, likes_count: 1 });
        assert_eq!(client.store().like_rows(), 1);

        let fetched = client.whisper(whisper.id).await.unwrap();
        let fetched = Option::as_ref(&fetched).unwrap();
        assert!(fetched.user_has_liked);

        let state = client.toggle_whisper_like(fetched).await.unwrap();
        assert_eq!(state, LikeState { liked: false, likes_count: 0 });
        assert_eq!(client.store().like_rows(), 0);

        let listed = client.whispers(general, SortMode::Recent, "").await.unwrap();
        assert_eq!(listed[0].likes_count, 0);
    }

    #[tokio::test]
    async fn comments_refresh_parent_counter() {
        let client = signed_in().await;
        let whisper = client.create_whisper("ask", Category::Question, false).await.unwrap();
        let detail = client.whisper(whisper.id).await.unwrap();
        assert_eq!(Option::as_ref(&detail).unwrap().comments_count, 0);

        let comment = client.add_comment(whisper.id, "answer", true).await.unwrap();
        let detail = client.whisper(whisper.id).await.unwrap();
        assert_eq!(Option::as_ref(&detail).unwrap().comments_count, 1);

        client.toggle_comment_like(&comment).await.unwrap();
        let comments = client.comments(whisper.id).await.unwrap();
        let comments = Option::as_ref(&comments).unwrap();
        assert_eq!(comments[0].likes_count, 1);
        assert!(comments[0].user_has_liked);
    }

    #[tokio::test]
    async fn missing_is_distinct_from_failed() {
        let client = signed_in().await;

        let missing = client.whisper(Uuid::new_v4()).await.unwrap();
        assert!(missing.is_none());

        client.store().fail_next();
        assert!(client.whisper(Uuid::new_v4()).await.is_err());
    }

    #[tokio::test]
    async fn failed_mutation_keeps_cache() {
        let client = signed_in().await;
        client.whispers(CategoryFilter::All, SortMode::Recent, "").await.unwrap();

        client.store().fail_next();
        assert!(client.create_whisper("test", Category::General, true).await.is_err());

        client.whispers(CategoryFilter::All, SortMode::Recent, "").await.unwrap();
        assert_eq!(client.store().calls("list_whispers"), 1);
    }

    #[tokio::test]
    async fn sign_out_clears_cache() {
        let mut client = signed_in().await;
        client.profile().await.unwrap();
        client.search_history().await.unwrap();
        assert_eq!(client.cache().len(), 2);

        client.sign_out();
        assert!(client.cache().is_empty());
        assert!(client.session().is_none());
    }

    #[tokio::test]
    async fn search_history_binding_follows_session() {
        let mut client = signed_in().await;
        let req = whisper_types::api::RecordSearchRequest {
            search_term: "cats".into(),
            category: None,
        };
        client.store().record_search(client.session().unwrap(), &req).await.unwrap();

        let mut binder = QueryBinder::new(client.cache().clone());
        assert_eq!(client.bind_search_history(&mut binder).status, QueryStatus::Loading);
        let state = binder.settled().await;
        assert_eq!(state.data.unwrap()[0].search_term, "cats");

        client.clear_search_history().await.unwrap();
        let state = client.bind_search_history(&mut binder);
        assert_eq!(state.status, QueryStatus::Refreshing);
        assert!(binder.settled().await.data.unwrap().is_empty());

        client.sign_out();
        assert_eq!(client.bind_search_history(&mut binder).status, QueryStatus::Idle);
    }

    #[tokio::test]
    async fn profile_update_is_visible_on_next_read() {
        let client = signed_in().await;
        let profile = client.profile().await.unwrap();
        assert_eq!(Option::as_ref(&profile).unwrap().initials(), "U");

        client.update_profile(Some("Ada Lovelace"), None).await.unwrap();
        let profile = client.profile().await.unwrap();
        assert_eq!(Option::as_ref(&profile).unwrap().initials(), "AL");
    }

    #[tokio::test]
    async fn sign_out_drops_fetch_started_for_previous_viewer() {
        let mut client = signed_in().await;
        client.create_whisper("mine", Category::General, true).await.unwrap();

        let mut binder = QueryBinder::new(client.cache().clone());
        let state = client.bind_whispers(&mut binder, CategoryFilter::All, SortMode::Recent, "");
        assert_eq!(state.status, QueryStatus::Loading);

        client.sign_out();
        let state = binder.settled().await;
        assert!(state.data.is_none());
        assert!(client.cache().is_empty());
    }
}
