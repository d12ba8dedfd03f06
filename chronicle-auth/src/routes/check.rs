use axum::extract::State;
use axum::Json;
use std::sync::Arc;

use chronicle_shared::errors::AppResult;
use chronicle_shared::types::auth::AuthUser;
use chronicle_shared::types::ApiResponse;

use crate::models::User;
use crate::AppState;

/// Lightweight "am I signed in" probe: fails through the extractor if the
/// bearer token is missing or invalid, otherwise returns the account.
pub async fn check(
    user: AuthUser,
    State(state): State<Arc<AppState>>,
) -> AppResult<Json<ApiResponse<User>>> {
    let profile = state.auth.profile(user.id)?;
    Ok(Json(ApiResponse::ok(profile)))
}
