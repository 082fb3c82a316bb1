//! In-process `WallStore` for unit tests. Keeps the same atomic like
//! semantics as the server and counts calls per operation.

use std::collections::{HashMap, HashSet};
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::Utc;
use reqwest::StatusCode;
use uuid::Uuid;

use whisper_types::api::{
    CreateCommentRequest, CreateWhisperRequest, RecordSearchRequest, UpdateProfileRequest, WhisperListQuery,
};
use whisper_types::models::{Category, Comment, LikeState, LikeTarget, Profile, SearchHistoryItem, SortMode, Whisper};

use crate::error::ClientError;
use crate::session::Session;
use crate::store::{Result, WallStore};

#[derive(Default)]
struct State {
    users: HashMap<String, Uuid>,
    profiles: HashMap<Uuid, Profile>,
    whispers: Vec<(Uuid, Whisper)>,
    comments: Vec<(Uuid, Comment)>,
    likes: HashSet<(LikeTarget, Uuid, Uuid)>,
    history: Vec<(Uuid, SearchHistoryItem)>,
    calls: HashMap<&'static str, usize>,
    fail_next: bool,
}

#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<State>,
}

fn not_found(what: &str) -> ClientError {
    ClientError::Rejected {
        status: StatusCode::NOT_FOUND,
        message: format!("{} not found", what),
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap()
    }

    /// Counts the call and consumes an armed failure.
    fn enter(&self, op: &'static str) -> Result<MutexGuard<'_, State>> {
        let mut state = self.lock();
        *state.calls.entry(op).or_default() += 1;
        if std::mem::take(&mut state.fail_next) {
            return Err(ClientError::Other(format!("{} failed", op)));
        }
        Ok(state)
    }

    pub fn fail_next(&self) {
        self.lock().fail_next = true;
    }

    pub fn calls(&self, op: &str) -> usize {
        self.lock().calls.get(op).copied().unwrap_or(0)
    }

    /// Registers a user directly and returns their session.
    pub fn session(&self, email: &str) -> Session {
        let mut state = self.lock();
        let user_id = Uuid::new_v4();
        state.users.insert(email.to_string(), user_id);
        state.profiles.insert(
            user_id,
            Profile {
                user_id,
                email: email.to_string(),
                full_name: None,
                avatar_url: None,
                created_at: Utc::now(),
                updated_at: Utc::now(),
            },
        );
        Session::new(user_id, email, user_id.to_string())
    }

    pub fn seed_whisper(&self, session: &Session, content: &str, category: Category) -> Whisper {
        let whisper = Whisper {
            id: Uuid::new_v4(),
            content: content.to_string(),
            category,
            is_anonymous: true,
            author_id: Some(session.user_id),
            created_at: Utc::now(),
            updated_at: Utc::now(),
            likes_count: 0,
            comments_count: 0,
            user_has_liked: false,
            is_own: true,
        };
        self.lock().whispers.push((session.user_id, whisper.clone()));
        whisper
    }

    pub fn like_rows(&self) -> usize {
        self.lock().likes.len()
    }

    pub fn history(&self, session: &Session) -> Vec<SearchHistoryItem> {
        let state = self.lock();
        state
            .history
            .iter()
            .rev()
            .filter(|(owner, _)| *owner == session.user_id)
            .map(|(_, item)| item.clone())
            .collect()
    }
}

impl State {
    fn view_whisper(&self, author: Uuid, whisper: &Whisper, viewer: Option<&Session>) -> Whisper {
        let viewer = viewer.map(|s| s.user_id);
        let is_own = viewer == Some(author);
        Whisper {
            author_id: (!whisper.is_anonymous || is_own).then_some(author),
            user_has_liked: viewer.is_some_and(|v| self.likes.contains(&(LikeTarget::Whisper, whisper.id, v))),
            is_own,
            ..whisper.clone()
        }
    }

    fn view_comment(&self, author: Uuid, comment: &Comment, viewer: Option<&Session>) -> Comment {
        let viewer = viewer.map(|s| s.user_id);
        let is_own = viewer == Some(author);
        Comment {
            author_id: (!comment.is_anonymous || is_own).then_some(author),
            user_has_liked: viewer.is_some_and(|v| self.likes.contains(&(LikeTarget::Comment, comment.id, v))),
            is_own,
            ..comment.clone()
        }
    }
}

#[async_trait]
impl WallStore for MemoryStore {
    async fn register(&self, email: &str, _password: &str, _full_name: Option<&str>) -> Result<Session> {
        drop(self.enter("register")?);
        Ok(self.session(email))
    }

    async fn sign_in(&self, email: &str, _password: &str) -> Result<Session> {
        let state = self.enter("sign_in")?;
        let user_id = *state.users.get(email).ok_or(ClientError::Rejected {
            status: StatusCode::UNAUTHORIZED,
            message: "invalid email or password".into(),
        })?;
        Ok(Session::new(user_id, email, user_id.to_string()))
    }

    async fn list_whispers(&self, session: Option<&Session>, query: &WhisperListQuery) -> Result<Vec<Whisper>> {
        let state = self.enter("list_whispers")?;
        let category = query.category.as_deref().and_then(|c| c.parse::<Category>().ok());
        let search = query.search.as_deref().map(str::to_lowercase);

        let mut whispers: Vec<Whisper> = state
            .whispers
            .iter()
            .filter(|(_, w)| category.is_none_or(|c| w.category == c))
            .filter(|(_, w)| search.as_deref().is_none_or(|s| w.content.to_lowercase().contains(s)))
            .map(|(author, w)| state.view_whisper(*author, w, session))
            .collect();

        whispers.reverse();
        match query.sort.unwrap_or_default() {
            SortMode::Recent => {}
            SortMode::Popular => whispers.sort_by(|a, b| b.likes_count.cmp(&a.likes_count)),
            SortMode::Discussed => whispers.sort_by(|a, b| b.comments_count.cmp(&a.comments_count)),
        }
        Ok(whispers)
    }

    async fn get_whisper(&self, session: Option<&Session>, id: Uuid) -> Result<Option<Whisper>> {
        let state = self.enter("get_whisper")?;
        Ok(state
            .whispers
            .iter()
            .find(|(_, w)| w.id == id)
            .map(|(author, w)| state.view_whisper(*author, w, session)))
    }

    async fn create_whisper(&self, session: &Session, req: &CreateWhisperRequest) -> Result<Whisper> {
        drop(self.enter("create_whisper")?);
        let whisper = Whisper {
            is_anonymous: req.is_anonymous,
            ..self.seed_whisper(session, req.content.trim(), req.category)
        };
        if let Some((_, stored)) = self.lock().whispers.iter_mut().find(|(_, w)| w.id == whisper.id) {
            stored.is_anonymous = req.is_anonymous;
        }
        Ok(whisper)
    }

    async fn delete_whisper(&self, session: &Session, id: Uuid) -> Result<()> {
        let mut state = self.enter("delete_whisper")?;
        let author = state
            .whispers
            .iter()
            .find(|(_, w)| w.id == id)
            .map(|(author, _)| *author)
            .ok_or_else(|| not_found("whisper"))?;
        if author != session.user_id {
            return Err(ClientError::Rejected {
                status: StatusCode::FORBIDDEN,
                message: "only the author can delete a whisper".into(),
            });
        }
        state.whispers.retain(|(_, w)| w.id != id);
        state.comments.retain(|(_, c)| c.whisper_id != id);
        Ok(())
    }

    async fn list_comments(&self, session: Option<&Session>, whisper_id: Uuid) -> Result<Option<Vec<Comment>>> {
        let state = self.enter("list_comments")?;
        if !state.whispers.iter().any(|(_, w)| w.id == whisper_id) {
            return Ok(None);
        }
        Ok(Some(
            state
                .comments
                .iter()
                .rev()
                .filter(|(_, c)| c.whisper_id == whisper_id)
                .map(|(author, c)| state.view_comment(*author, c, session))
                .collect(),
        ))
    }

    async fn add_comment(&self, session: &Session, whisper_id: Uuid, req: &CreateCommentRequest) -> Result<Comment> {
        let mut state = self.enter("add_comment")?;
        let (_, parent) = state
            .whispers
            .iter_mut()
            .find(|(_, w)| w.id == whisper_id)
            .ok_or_else(|| not_found("whisper"))?;
        parent.comments_count += 1;

        let comment = Comment {
            id: Uuid::new_v4(),
            whisper_id,
            content: req.content.trim().to_string(),
            is_anonymous: req.is_anonymous,
            author_id: Some(session.user_id),
            created_at: Utc::now(),
            likes_count: 0,
            user_has_liked: false,
            is_own: true,
        };
        state.comments.push((session.user_id, comment.clone()));
        Ok(comment)
    }

    async fn set_like(&self, session: &Session, target: LikeTarget, id: Uuid, liked: bool) -> Result<LikeState> {
        let mut guard = self.enter("set_like")?;
        let state = &mut *guard;
        let counter = match target {
            LikeTarget::Whisper => state
                .whispers
                .iter_mut()
                .find(|(_, w)| w.id == id)
                .map(|(_, w)| &mut w.likes_count),
            LikeTarget::Comment => state
                .comments
                .iter_mut()
                .find(|(_, c)| c.id == id)
                .map(|(_, c)| &mut c.likes_count),
        }
        .ok_or_else(|| not_found("like target"))?;

        let key = (target, id, session.user_id);
        let changed = if liked {
            state.likes.insert(key)
        } else {
            state.likes.remove(&key)
        };
        if changed {
            *counter = if liked { *counter + 1 } else { counter.saturating_sub(1) };
        }
        Ok(LikeState {
            liked,
            likes_count: *counter,
        })
    }

    async fn get_profile(&self, session: &Session) -> Result<Option<Profile>> {
        let state = self.enter("get_profile")?;
        Ok(state.profiles.get(&session.user_id).cloned())
    }

    async fn update_profile(&self, session: &Session, req: &UpdateProfileRequest) -> Result<Profile> {
        let mut state = self.enter("update_profile")?;
        let profile = state
            .profiles
            .get_mut(&session.user_id)
            .ok_or_else(|| not_found("profile"))?;
        if let Some(name) = &req.full_name {
            profile.full_name = Some(name.clone());
        }
        if let Some(url) = &req.avatar_url {
            profile.avatar_url = Some(url.clone());
        }
        profile.updated_at = Utc::now();
        Ok(profile.clone())
    }

    async fn list_search_history(&self, session: &Session) -> Result<Vec<SearchHistoryItem>> {
        drop(self.enter("list_search_history")?);
        Ok(self.history(session))
    }

    async fn record_search(&self, session: &Session, req: &RecordSearchRequest) -> Result<SearchHistoryItem> {
        let mut state = self.enter("record_search")?;
        let item = SearchHistoryItem {
            id: Uuid::new_v4(),
            search_term: req.search_term.trim().to_string(),
            category: req.category,
            created_at: Utc::now(),
        };
        state.history.push((session.user_id, item.clone()));
        Ok(item)
    }

    async fn delete_search_item(&self, session: &Session, id: Uuid) -> Result<()> {
        let mut state = self.enter("delete_search_item")?;
        state
            .history
            .retain(|(owner, item)| !(*owner == session.user_id && item.id == id));
        Ok(())
    }

    async fn clear_search_history(&self, session: &Session) -> Result<usize> {
        let mut state = self.enter("clear_search_history")?;
        let before = state.history.len();
        state.history.retain(|(owner, _)| *owner != session.user_id);
        Ok(before - state.history.len())
    }
}
