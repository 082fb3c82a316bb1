use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use tracing::debug;
use uuid::Uuid;

use whisper_db::history::HISTORY_LIMIT;
use whisper_types::api::{ClearHistoryResponse, RecordSearchRequest};
use whisper_types::models::SearchHistoryItem;
use whisper_types::validate;

use crate::middleware::AuthUser;
use crate::{AppState, convert, error::ApiError, run_db};

/// GET /search-history: the caller's latest searches.
pub async fn list_history(
    State(state): State<AppState>,
    AuthUser(claims): AuthUser,
) -> Result<Json<Vec<SearchHistoryItem>>, ApiError> {
    let uid = claims.sub.to_string();
    let rows = run_db(&state, move |db| db.list_search_history(&uid, HISTORY_LIMIT)).await?;

    Ok(Json(rows.into_iter().map(convert::search_item).collect()))
}

pub async fn record_search(
    State(state): State<AppState>,
    AuthUser(claims): AuthUser,
    Json(req): Json<RecordSearchRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let term = validate::search_term(&req.search_term)?;

    let id = Uuid::new_v4().to_string();
    let uid = claims.sub.to_string();
    let category = req.category.map(|c| c.as_str());
    let row = run_db(&state, move |db| db.insert_search(&id, &uid, &term, category)).await?;

    Ok((StatusCode::CREATED, Json(convert::search_item(row))))
}

pub async fn delete_history_item(
    State(state): State<AppState>,
    AuthUser(claims): AuthUser,
    Path(item_id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    let id = item_id.to_string();
    let uid = claims.sub.to_string();

    if run_db(&state, move |db| db.delete_search_item(&uid, &id)).await? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(ApiError::NotFound("search history item"))
    }
}

pub async fn clear_history(
    State(state): State<AppState>,
    AuthUser(claims): AuthUser,
) -> Result<Json<ClearHistoryResponse>, ApiError> {
    let uid = claims.sub.to_string();
    let deleted = run_db(&state, move |db| db.clear_search_history(&uid)).await?;

    debug!("Cleared {} search history entries for {}", deleted, claims.sub);
    Ok(Json(ClearHistoryResponse { deleted }))
}
