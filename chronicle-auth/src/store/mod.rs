use chrono::{DateTime, Utc};
use diesel::prelude::*;
use serde::Serialize;

use chronicle_shared::errors::AppResult;
use chronicle_shared::types::pagination::PaginationParams;

use crate::models::{NewSession, NewUser, Session, User};
use crate::schema::users;

mod postgres;

pub use postgres::PgStore;

/// Profile fields a user may change about themselves. `None` means "leave
/// unchanged".
#[derive(Debug, Default, AsChangeset)]
#[diesel(table_name = users)]
pub struct ProfileChanges {
    pub username: Option<String>,
    pub full_name: Option<String>,
    pub avatar_url: Option<String>,
}

impl ProfileChanges {
    pub fn is_empty(&self) -> bool {
        self.username.is_none() && self.full_name.is_none() && self.avatar_url.is_none()
    }
}

/// Fields an administrator may change on any account.
#[derive(Debug, Default, AsChangeset)]
#[diesel(table_name = users)]
pub struct AdminChanges {
    pub role: Option<String>,
    pub is_active: Option<bool>,
}

impl AdminChanges {
    pub fn is_empty(&self) -> bool {
        self.role.is_none() && self.is_active.is_none()
    }
}

#[derive(Debug, Serialize)]
pub struct UserStats {
    pub total: i64,
    pub active: i64,
    pub verified: i64,
    pub moderators: i64,
    pub admins: i64,
}

/// Persistence seam for user and session records. The service layer is the
/// only consumer; durable state never leaks past it.
pub trait CredentialStore: Send + Sync {
    fn find_user_by_id(&self, id: i64) -> AppResult<Option<User>>;
    fn find_user_by_email(&self, email: &str) -> AppResult<Option<User>>;
    fn find_user_by_username(&self, username: &str) -> AppResult<Option<User>>;
    fn username_taken(&self, username: &str, exclude_user: Option<i64>) -> AppResult<bool>;
    fn insert_user(&self, new_user: NewUser) -> AppResult<User>;
    fn update_profile(&self, id: i64, changes: ProfileChanges) -> AppResult<User>;
    fn update_password(&self, id: i64, password_hash: &str) -> AppResult<()>;

    /// Overwrites any outstanding reset token; one outstanding token per
    /// user at a time.
    fn set_password_reset(
        &self,
        id: i64,
        token: &str,
        expires_at: DateTime<Utc>,
    ) -> AppResult<()>;
    fn find_user_by_reset_token(&self, token: &str) -> AppResult<Option<User>>;
    /// Replaces the password hash and clears both reset-token fields.
    fn complete_password_reset(&self, id: i64, password_hash: &str) -> AppResult<()>;

    /// Overwrites any outstanding verification token.
    fn set_email_verification(
        &self,
        id: i64,
        token: &str,
        expires_at: DateTime<Utc>,
    ) -> AppResult<()>;
    fn find_user_by_verification_token(&self, token: &str) -> AppResult<Option<User>>;
    /// Sets `email_verified`, clears both verification-token fields.
    fn mark_email_verified(&self, id: i64) -> AppResult<User>;

    fn insert_session(&self, session: NewSession) -> AppResult<Session>;
    /// Atomically removes and returns the session matching `token_hash`.
    /// A second concurrent call for the same hash comes back empty, which
    /// is what makes refresh rotation single-use.
    fn consume_session(&self, token_hash: &str) -> AppResult<Option<Session>>;
    fn delete_session(&self, user_id: i64, token_hash: &str) -> AppResult<()>;
    fn delete_user_sessions(&self, user_id: i64) -> AppResult<usize>;

    fn list_users(&self, params: &PaginationParams) -> AppResult<(Vec<User>, u64)>;
    fn update_user_admin(&self, id: i64, changes: AdminChanges) -> AppResult<User>;
    fn delete_user(&self, id: i64) -> AppResult<bool>;
    fn user_stats(&self) -> AppResult<UserStats>;
}
