use axum::extract::State;
use axum::Json;
use serde::Deserialize;
use std::sync::Arc;

use chronicle_shared::errors::AppResult;
use chronicle_shared::types::auth::AuthUser;
use chronicle_shared::types::ApiResponse;

use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct ChangePasswordRequest {
    pub current_password: String,
    pub new_password: String,
}

pub async fn change_password(
    user: AuthUser,
    State(state): State<Arc<AppState>>,
    Json(req): Json<ChangePasswordRequest>,
) -> AppResult<Json<ApiResponse<&'static str>>> {
    state
        .auth
        .change_password(user.id, &req.current_password, &req.new_password)?;
    Ok(Json(ApiResponse::ok("password changed")))
}
