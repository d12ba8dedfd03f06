use axum::extract::{Query, State};
use axum::Json;
use serde::Deserialize;
use std::sync::Arc;

use chronicle_shared::errors::AppResult;
use chronicle_shared::types::ApiResponse;

use crate::models::User;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct VerifyEmailRequest {
    pub token: String,
}

/// POST variant: token in the request body.
pub async fn verify_email(
    State(state): State<Arc<AppState>>,
    Json(req): Json<VerifyEmailRequest>,
) -> AppResult<Json<ApiResponse<User>>> {
    complete(&state, &req.token)
}

/// GET variant: token in the query string, for inbox links.
pub async fn verify_email_link(
    State(state): State<Arc<AppState>>,
    Query(req): Query<VerifyEmailRequest>,
) -> AppResult<Json<ApiResponse<User>>> {
    complete(&state, &req.token)
}

fn complete(state: &AppState, token: &str) -> AppResult<Json<ApiResponse<User>>> {
    let user = state.auth.verify_email(token)?;
    Ok(Json(ApiResponse::ok_with_message(user, "email verified")))
}
