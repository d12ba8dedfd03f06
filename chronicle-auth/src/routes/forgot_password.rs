use axum::extract::State;
use axum::Json;
use serde::Deserialize;
use std::sync::Arc;

use chronicle_shared::errors::AppResult;
use chronicle_shared::types::ApiResponse;

use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct ForgotPasswordRequest {
    pub email: String,
}

/// Responds identically whether or not the email maps to an account.
pub async fn forgot_password(
    State(state): State<Arc<AppState>>,
    Json(req): Json<ForgotPasswordRequest>,
) -> AppResult<Json<ApiResponse<&'static str>>> {
    if let Some(issued) = state.auth.forgot_password(&req.email)? {
        if let Err(e) = state
            .email
            .send_password_reset_link(&issued.email, &issued.token)
            .await
        {
            tracing::error!(error = %e, "failed to send reset email");
        }
    }

    Ok(Json(ApiResponse::ok(
        "if the email exists, a reset link has been sent",
    )))
}
