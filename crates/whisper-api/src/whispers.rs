use std::collections::HashSet;

use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use tracing::info;
use uuid::Uuid;

use whisper_db::{DeleteOutcome, LikeTarget, WhisperFilter};
use whisper_types::api::{CreateWhisperRequest, WhisperListQuery};
use whisper_types::models::{CategoryFilter, Whisper};
use whisper_types::validate;

use crate::middleware::{AuthUser, Viewer};
use crate::{AppState, convert, error::ApiError, run_db};

/// GET /whispers: the wall, filtered and sorted, annotated with the viewer's likes.
pub async fn list_whispers(
    State(state): State<AppState>,
    viewer: Viewer,
    Query(query): Query<WhisperListQuery>,
) -> Result<Json<Vec<Whisper>>, ApiError> {
    let filter: CategoryFilter = query
        .category
        .as_deref()
        .unwrap_or("all")
        .parse()
        .map_err(|e: whisper_types::models::UnknownCategory| ApiError::BadRequest(e.to_string()))?;
    let viewer_id = viewer.user_id();

    let (rows, liked) = run_db(&state, move |db| {
        let search = query.search.as_deref().map(str::trim);
        let rows = db.list_whispers(&WhisperFilter {
            category: filter.category(),
            sort: query.sort.unwrap_or_default(),
            search,
            limit: query.limit,
        })?;

        // Batch-fetch the viewer's likes for the page
        let liked = match viewer_id {
            Some(uid) => {
                let ids: Vec<String> = rows.iter().map(|r| r.id.clone()).collect();
                db.liked_ids(LikeTarget::Whisper, &uid.to_string(), &ids)?
            }
            None => vec![],
        };
        Ok((rows, liked))
    })
    .await?;

    let liked: HashSet<String> = liked.into_iter().collect();
    let whispers = rows
        .into_iter()
        .map(|row| {
            let has_liked = liked.contains(&row.id);
            convert::whisper(row, viewer_id, has_liked)
        })
        .collect();

    Ok(Json(whispers))
}

pub async fn get_whisper(
    State(state): State<AppState>,
    viewer: Viewer,
    Path(whisper_id): Path<Uuid>,
) -> Result<Json<Whisper>, ApiError> {
    let viewer_id = viewer.user_id();
    let wid = whisper_id.to_string();

    let (row, liked) = run_db(&state, move |db| {
        let Some(row) = db.get_whisper(&wid)? else {
            return Ok((None, false));
        };
        let liked = match viewer_id {
            Some(uid) => !db.liked_ids(LikeTarget::Whisper, &uid.to_string(), &[wid])?.is_empty(),
            None => false,
        };
        Ok((Some(row), liked))
    })
    .await?;

    let row = row.ok_or(ApiError::NotFound("whisper"))?;
    Ok(Json(convert::whisper(row, viewer_id, liked)))
}

pub async fn create_whisper(
    State(state): State<AppState>,
    AuthUser(claims): AuthUser,
    Json(req): Json<CreateWhisperRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let content = validate::whisper_content(&req.content)?;
    let whisper_id = Uuid::new_v4();

    let wid = whisper_id.to_string();
    let uid = claims.sub.to_string();
    let row = run_db(&state, move |db| {
        db.insert_whisper(&wid, &uid, &content, req.category, req.is_anonymous)
    })
    .await?;

    info!("Whisper {} created in {}", whisper_id, req.category);
    Ok((StatusCode::CREATED, Json(convert::whisper(row, Some(claims.sub), false))))
}

pub async fn delete_whisper(
    State(state): State<AppState>,
    AuthUser(claims): AuthUser,
    Path(whisper_id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    let wid = whisper_id.to_string();
    let uid = claims.sub.to_string();

    match run_db(&state, move |db| db.delete_whisper(&wid, &uid)).await? {
        DeleteOutcome::Deleted => {
            info!("Whisper {} deleted", whisper_id);
            Ok(StatusCode::NO_CONTENT)
        }
        DeleteOutcome::NotFound => Err(ApiError::NotFound("whisper")),
        DeleteOutcome::Forbidden => Err(ApiError::Forbidden("only the author can delete a whisper")),
    }
}
