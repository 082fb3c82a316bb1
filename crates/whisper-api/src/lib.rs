pub mod auth;
pub mod comments;
pub mod convert;
pub mod error;
pub mod history;
pub mod likes;
pub mod middleware;
pub mod profile;
pub mod whispers;

use std::sync::Arc;

use axum::{
    Router,
    routing::{delete, get, post, put},
};
use tracing::error;

use whisper_db::Database;

pub use error::ApiError;

pub type AppState = Arc<AppStateInner>;

pub struct AppStateInner {
    pub db: Database,
    pub jwt_secret: String,
    pub token_ttl: chrono::Duration,
}

impl AppStateInner {
    pub fn new(db: Database, jwt_secret: impl Into<String>) -> Self {
        Self {
            db,
            jwt_secret: jwt_secret.into(),
            token_ttl: chrono::Duration::days(30),
        }
    }
}

/// Every route of the wall. Tokens are resolved once per request by
/// `resolve_viewer`; handlers that need a signed-in user take `AuthUser`.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/auth/register", post(auth::register))
        .route("/auth/login", post(auth::login))
        .route("/whispers", get(whispers::list_whispers).post(whispers::create_whisper))
        .route(
            "/whispers/{whisper_id}",
            get(whispers::get_whisper).delete(whispers::delete_whisper),
        )
        .route(
            "/whispers/{whisper_id}/comments",
            get(comments::list_comments).post(comments::add_comment),
        )
        .route(
            "/whispers/{whisper_id}/like",
            put(likes::like_whisper).delete(likes::unlike_whisper),
        )
        .route("/whispers/{whisper_id}/like/toggle", post(likes::toggle_whisper_like))
        .route(
            "/comments/{comment_id}/like",
            put(likes::like_comment).delete(likes::unlike_comment),
        )
        .route("/profile", get(profile::get_profile).patch(profile::update_profile))
        .route(
            "/search-history",
            get(history::list_history)
                .post(history::record_search)
                .delete(history::clear_history),
        )
        .route("/search-history/{item_id}", delete(history::delete_history_item))
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            middleware::resolve_viewer,
        ))
        .with_state(state)
}

/// Runs a blocking DB closure off the async runtime.
pub(crate) async fn run_db<F, T>(state: &AppState, f: F) -> Result<T, ApiError>
where
    F: FnOnce(&Database) -> anyhow::Result<T> + Send + 'static,
    T: Send + 'static,
{
    let state = state.clone();
    tokio::task::spawn_blocking(move || f(&state.db))
        .await
        .map_err(|e| {
            error!("spawn_blocking join error: {}", e);
            ApiError::Internal(e.to_string())
        })?
        .map_err(ApiError::from)
}
