use axum::extract::State;
use axum::Json;
use serde::Deserialize;
use std::sync::Arc;

use chronicle_shared::errors::AppResult;
use chronicle_shared::types::auth::AuthUser;
use chronicle_shared::types::ApiResponse;

use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct LogoutRequest {
    pub refresh_token: String,
}

pub async fn logout(
    user: AuthUser,
    State(state): State<Arc<AppState>>,
    Json(req): Json<LogoutRequest>,
) -> AppResult<Json<ApiResponse<&'static str>>> {
    state.auth.logout(user.id, &req.refresh_token)?;
    Ok(Json(ApiResponse::ok("logged out")))
}
