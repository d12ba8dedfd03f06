use axum::extract::State;
use axum::Json;
use serde::Deserialize;
use std::sync::Arc;

use chronicle_shared::errors::AppResult;
use chronicle_shared::types::ApiResponse;

use crate::AppState;

use super::SessionResponse;

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    /// Email (contains `@`) or username.
    pub login: String,
    pub password: String,
}

pub async fn login(
    State(state): State<Arc<AppState>>,
    Json(req): Json<LoginRequest>,
) -> AppResult<Json<ApiResponse<SessionResponse>>> {
    let authenticated = state.auth.login(&req.login, &req.password)?;

    Ok(Json(ApiResponse::ok(SessionResponse {
        user: authenticated.user,
        tokens: authenticated.tokens,
    })))
}
