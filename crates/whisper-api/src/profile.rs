use axum::{
    Json,
    extract::State,
};

use whisper_types::api::UpdateProfileRequest;
use whisper_types::models::Profile;
use whisper_types::validate;

use crate::middleware::AuthUser;
use crate::{AppState, convert, error::ApiError, run_db};

pub async fn get_profile(
    State(state): State<AppState>,
    AuthUser(claims): AuthUser,
) -> Result<Json<Profile>, ApiError> {
    let uid = claims.sub.to_string();
    let row = run_db(&state, move |db| db.get_profile(&uid))
        .await?
        .ok_or(ApiError::NotFound("profile"))?;

    Ok(Json(convert::profile(row)))
}

pub async fn update_profile(
    State(state): State<AppState>,
    AuthUser(claims): AuthUser,
    Json(req): Json<UpdateProfileRequest>,
) -> Result<Json<Profile>, ApiError> {
    let full_name = req.full_name.as_deref().map(validate::full_name).transpose()?;
    let avatar_url = req.avatar_url.map(|url| url.trim().to_string());

    let uid = claims.sub.to_string();
    let row = run_db(&state, move |db| {
        db.update_profile(&uid, full_name.as_deref(), avatar_url.as_deref())
    })
    .await?
    .ok_or(ApiError::NotFound("profile"))?;

    Ok(Json(convert::profile(row)))
}
