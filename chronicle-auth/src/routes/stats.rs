use axum::extract::State;
use axum::Json;
use std::sync::Arc;

use chronicle_shared::errors::AppResult;
use chronicle_shared::middleware::ModeratorUser;
use chronicle_shared::types::auth::Permission;
use chronicle_shared::types::ApiResponse;

use crate::store::UserStats;
use crate::AppState;

pub async fn user_stats(
    ModeratorUser(moderator): ModeratorUser,
    State(state): State<Arc<AppState>>,
) -> AppResult<Json<ApiResponse<UserStats>>> {
    moderator.require_permission(Permission::ReadUsers)?;

    let stats = state.auth.user_stats()?;
    Ok(Json(ApiResponse::ok(stats)))
}
