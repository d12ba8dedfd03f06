use axum::extract::{Path, Query, State};
use axum::Json;
use serde::Deserialize;
use std::sync::Arc;

use chronicle_shared::errors::AppResult;
use chronicle_shared::middleware::AdminUser;
use chronicle_shared::types::auth::{Permission, UserRole};
use chronicle_shared::types::pagination::{Paginated, PaginationParams};
use chronicle_shared::types::ApiResponse;

use crate::models::User;
use crate::AppState;

pub async fn list_users(
    AdminUser(admin): AdminUser,
    State(state): State<Arc<AppState>>,
    Query(params): Query<PaginationParams>,
) -> AppResult<Json<ApiResponse<Paginated<User>>>> {
    admin.require_permission(Permission::ReadUsers)?;

    let (items, total) = state.auth.list_users(&params)?;
    Ok(Json(ApiResponse::ok(Paginated::new(items, total, &params))))
}

pub async fn get_user(
    AdminUser(admin): AdminUser,
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<i64>,
) -> AppResult<Json<ApiResponse<User>>> {
    admin.require_permission(Permission::ReadUsers)?;

    let user = state.auth.profile(user_id)?;
    Ok(Json(ApiResponse::ok(user)))
}

#[derive(Debug, Deserialize)]
pub struct AdminUpdateRequest {
    pub role: Option<UserRole>,
    pub is_active: Option<bool>,
}

pub async fn update_user(
    AdminUser(admin): AdminUser,
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<i64>,
    Json(req): Json<AdminUpdateRequest>,
) -> AppResult<Json<ApiResponse<User>>> {
    admin.require_permission(Permission::WriteUsers)?;
    if req.role.is_some() {
        admin.require_permission(Permission::ManageRoles)?;
    }

    let updated = state.auth.admin_update_user(user_id, req.role, req.is_active)?;
    tracing::info!(admin_id = admin.id, user_id, "user updated by admin");
    Ok(Json(ApiResponse::ok_with_message(updated, "user updated")))
}

pub async fn delete_user(
    AdminUser(admin): AdminUser,
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<i64>,
) -> AppResult<Json<ApiResponse<&'static str>>> {
    admin.require_permission(Permission::DeleteUsers)?;

    state.auth.delete_user(user_id)?;
    tracing::info!(admin_id = admin.id, user_id, "user deleted by admin");
    Ok(Json(ApiResponse::ok("user deleted")))
}
