use axum::{
    Json,
    extract::{Path, State},
};
use tracing::debug;
use uuid::Uuid;

use whisper_db::LikeTarget;
use whisper_types::models::LikeState;

use crate::middleware::AuthUser;
use crate::{AppState, error::ApiError, run_db};

/// Desired membership. `None` flips whatever is stored.
async fn apply(
    state: &AppState,
    claims_sub: Uuid,
    target: LikeTarget,
    target_id: Uuid,
    liked: Option<bool>,
) -> Result<Json<LikeState>, ApiError> {
    let tid = target_id.to_string();
    let uid = claims_sub.to_string();

    let outcome = run_db(state, move |db| match liked {
        Some(liked) => db.set_like(target, &tid, &uid, liked),
        None => db.toggle_like(target, &tid, &uid),
    })
    .await?;

    let like_state = outcome.ok_or(match target {
        LikeTarget::Whisper => ApiError::NotFound("whisper"),
        LikeTarget::Comment => ApiError::NotFound("comment"),
    })?;

    debug!(
        "{:?} {} like by {} -> {:?}",
        target, target_id, claims_sub, like_state
    );
    Ok(Json(like_state))
}

/// PUT /whispers/{id}/like
pub async fn like_whisper(
    State(state): State<AppState>,
    AuthUser(claims): AuthUser,
    Path(whisper_id): Path<Uuid>,
) -> Result<Json<LikeState>, ApiError> {
    apply(&state, claims.sub, LikeTarget::Whisper, whisper_id, Some(true)).await
}

/// DELETE /whispers/{id}/like
pub async fn unlike_whisper(
    State(state): State<AppState>,
    AuthUser(claims): AuthUser,
    Path(whisper_id): Path<Uuid>,
) -> Result<Json<LikeState>, ApiError> {
    apply(&state, claims.sub, LikeTarget::Whisper, whisper_id, Some(false)).await
}

/// POST /whispers/{id}/like/toggle
pub async fn toggle_whisper_like(
    State(state): State<AppState>,
    AuthUser(claims): AuthUser,
    Path(whisper_id): Path<Uuid>,
) -> Result<Json<LikeState>, ApiError> {
    apply(&state, claims.sub, LikeTarget::Whisper, whisper_id, None).await
}

pub async fn like_comment(
    State(state): State<AppState>,
    AuthUser(claims): AuthUser,
    Path(comment_id): Path<Uuid>,
) -> Result<Json<LikeState>, ApiError> {
    apply(&state, claims.sub, LikeTarget::Comment, comment_id, Some(true)).await
}

pub async fn unlike_comment(
    State(state): State<AppState>,
    AuthUser(claims): AuthUser,
    Path(comment_id): Path<Uuid>,
) -> Result<Json<LikeState>, ApiError> {
    apply(&state, claims.sub, LikeTarget::Comment, comment_id, Some(false)).await
}
