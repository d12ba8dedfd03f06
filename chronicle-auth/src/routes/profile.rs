use axum::extract::State;
use axum::Json;
use serde::Deserialize;
use std::sync::Arc;

use chronicle_shared::errors::AppResult;
use chronicle_shared::types::auth::AuthUser;
use chronicle_shared::types::ApiResponse;

use crate::models::User;
use crate::store::ProfileChanges;
use crate::AppState;

pub async fn get_profile(
    user: AuthUser,
    State(state): State<Arc<AppState>>,
) -> AppResult<Json<ApiResponse<User>>> {
    let profile = state.auth.profile(user.id)?;
    Ok(Json(ApiResponse::ok(profile)))
}

#[derive(Debug, Deserialize)]
pub struct UpdateProfileRequest {
    pub username: Option<String>,
    pub full_name: Option<String>,
    pub avatar_url: Option<String>,
}

pub async fn update_profile(
    user: AuthUser,
    State(state): State<Arc<AppState>>,
    Json(req): Json<UpdateProfileRequest>,
) -> AppResult<Json<ApiResponse<User>>> {
    let updated = state.auth.update_profile(
        user.id,
        ProfileChanges {
            username: req.username,
            full_name: req.full_name,
            avatar_url: req.avatar_url,
        },
    )?;

    Ok(Json(ApiResponse::ok_with_message(updated, "profile updated")))
}
