use axum::extract::State;
use axum::Json;
use std::sync::Arc;

use chronicle_shared::errors::AppResult;
use chronicle_shared::types::auth::AuthUser;
use chronicle_shared::types::ApiResponse;

use crate::AppState;

pub async fn resend_verification(
    user: AuthUser,
    State(state): State<Arc<AppState>>,
) -> AppResult<Json<ApiResponse<&'static str>>> {
    let issued = state.auth.resend_verification(user.id)?;

    if let Err(e) = state
        .email
        .send_verification_link(&issued.email, &issued.token)
        .await
    {
        tracing::error!(error = %e, "failed to send verification email");
    }

    Ok(Json(ApiResponse::ok("verification email sent")))
}
