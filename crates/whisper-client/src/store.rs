use async_trait::async_trait;
use uuid::Uuid;

use whisper_types::api::{
    CreateCommentRequest, CreateWhisperRequest, RecordSearchRequest, UpdateProfileRequest, WhisperListQuery,
};
use whisper_types::models::{Comment, LikeState, LikeTarget, Profile, SearchHistoryItem, Whisper};

use crate::error::ClientError;
use crate::session::Session;

pub type Result<T> = std::result::Result<T, ClientError>;

/// The remote data store as seen by the client.
///
/// Lookups return `Ok(None)` when the resource does not exist and `Err` when
/// the request itself failed, so callers can render the two differently.
#[async_trait]
pub trait WallStore: Send + Sync {
    async fn register(&self, email: &str, password: &str, full_name: Option<&str>) -> Result<Session>;

    async fn sign_in(&self, email: &str, password: &str) -> Result<Session>;

    async fn list_whispers(&self, session: Option<&Session>, query: &WhisperListQuery) -> Result<Vec<Whisper>>;

    async fn get_whisper(&self, session: Option<&Session>, id: Uuid) -> Result<Option<Whisper>>;

    async fn create_whisper(&self, session: &Session, req: &CreateWhisperRequest) -> Result<Whisper>;

    async fn delete_whisper(&self, session: &Session, id: Uuid) -> Result<()>;

    /// `None` when the parent whisper does not exist.
    async fn list_comments(&self, session: Option<&Session>, whisper_id: Uuid) -> Result<Option<Vec<Comment>>>;

    async fn add_comment(&self, session: &Session, whisper_id: Uuid, req: &CreateCommentRequest) -> Result<Comment>;

    /// Idempotent: sets membership to `liked` and returns the stored state.
    async fn set_like(&self, session: &Session, target: LikeTarget, id: Uuid, liked: bool) -> Result<LikeState>;

    async fn get_profile(&self, session: &Session) -> Result<Option<Profile>>;

    async fn update_profile(&self, session: &Session, req: &UpdateProfileRequest) -> Result<Profile>;

    async fn list_search_history(&self, session: &Session) -> Result<Vec<SearchHistoryItem>>;

    async fn record_search(&self, session: &Session, req: &RecordSearchRequest) -> Result<SearchHistoryItem>;

    async fn delete_search_item(&self, session: &Session, id: Uuid) -> Result<()>;

    async fn clear_search_history(&self, session: &Session) -> Result<usize>;
}
