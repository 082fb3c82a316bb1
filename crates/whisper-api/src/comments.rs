use std::collections::HashSet;

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use uuid::Uuid;

use whisper_db::LikeTarget;
use whisper_types::api::CreateCommentRequest;
use whisper_types::models::Comment;
use whisper_types::validate;

use crate::middleware::{AuthUser, Viewer};
use crate::{AppState, convert, error::ApiError, run_db};

/// GET /whispers/{id}/comments, newest first. A missing whisper is a 404,
/// not an empty list.
pub async fn list_comments(
    State(state): State<AppState>,
    viewer: Viewer,
    Path(whisper_id): Path<Uuid>,
) -> Result<Json<Vec<Comment>>, ApiError> {
    let viewer_id = viewer.user_id();
    let wid = whisper_id.to_string();

    let found = run_db(&state, move |db| {
        if db.get_whisper(&wid)?.is_none() {
            return Ok(None);
        }
        let rows = db.list_comments(&wid)?;
        let liked = match viewer_id {
            Some(uid) => {
                let ids: Vec<String> = rows.iter().map(|r| r.id.clone()).collect();
                db.liked_ids(LikeTarget::Comment, &uid.to_string(), &ids)?
            }
            None => vec![],
        };
        Ok(Some((rows, liked)))
    })
    .await?;

    let (rows, liked) = found.ok_or(ApiError::NotFound("whisper"))?;
    let liked: HashSet<String> = liked.into_iter().collect();

    Ok(Json(
        rows.into_iter()
            .map(|row| {
                let has_liked = liked.contains(&row.id);
                convert::comment(row, viewer_id, has_liked)
            })
            .collect(),
    ))
}

pub async fn add_comment(
    State(state): State<AppState>,
    AuthUser(claims): AuthUser,
    Path(whisper_id): Path<Uuid>,
    Json(req): Json<CreateCommentRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let content = validate::comment_content(&req.content)?;

    let cid = Uuid::new_v4().to_string();
    let wid = whisper_id.to_string();
    let uid = claims.sub.to_string();
    let row = run_db(&state, move |db| {
        db.insert_comment(&cid, &wid, &uid, &content, req.is_anonymous)
    })
    .await?
    .ok_or(ApiError::NotFound("whisper"))?;

    Ok((StatusCode::CREATED, Json(convert::comment(row, Some(claims.sub), false))))
}
