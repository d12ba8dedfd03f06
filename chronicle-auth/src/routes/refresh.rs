use axum::extract::State;
use axum::Json;
use serde::Deserialize;
use std::sync::Arc;

use chronicle_shared::errors::AppResult;
use chronicle_shared::types::ApiResponse;

use crate::AppState;

use super::SessionResponse;

#[derive(Debug, Deserialize)]
pub struct RefreshRequest {
    pub refresh_token: String,
}

pub async fn refresh(
    State(state): State<Arc<AppState>>,
    Json(req): Json<RefreshRequest>,
) -> AppResult<Json<ApiResponse<SessionResponse>>> {
    let authenticated = state.auth.refresh(&req.refresh_token)?;

    Ok(Json(ApiResponse::ok(SessionResponse {
        user: authenticated.user,
        tokens: authenticated.tokens,
    })))
}
