use axum::extract::State;
use axum::Json;
use serde::Deserialize;
use std::sync::Arc;

use chronicle_shared::errors::AppResult;
use chronicle_shared::types::ApiResponse;

use crate::models::User;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
    pub username: Option<String>,
    pub full_name: Option<String>,
}

pub async fn register(
    State(state): State<Arc<AppState>>,
    Json(req): Json<RegisterRequest>,
) -> AppResult<Json<ApiResponse<User>>> {
    let registered = state.auth.register(
        &req.email,
        &req.password,
        req.username.as_deref(),
        req.full_name.as_deref(),
    )?;

    if let Err(e) = state
        .email
        .send_verification_link(&registered.user.email, &registered.verification_token)
        .await
    {
        tracing::error!(error = %e, "failed to send verification email");
    }

    Ok(Json(ApiResponse::ok_with_message(
        registered.user,
        "registration successful, please verify your email",
    )))
}
