use chrono::{DateTime, Utc};
use diesel::pg::PgConnection;
use diesel::prelude::*;
use diesel::r2d2::{ConnectionManager, PooledConnection};

use chronicle_shared::clients::db::DbPool;
use chronicle_shared::errors::{AppError, AppResult};
use chronicle_shared::types::pagination::PaginationParams;

use crate::models::{NewSession, NewUser, Session, User};
use crate::schema::{sessions, users};

use super::{AdminChanges, CredentialStore, ProfileChanges, UserStats};

/// Diesel-backed store over a shared r2d2 Postgres pool. Each operation is
/// one or more sequential statements; no multi-statement transaction is
/// held across them.
pub struct PgStore {
    pool: DbPool,
}

impl PgStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    fn conn(&self) -> AppResult<PooledConnection<ConnectionManager<PgConnection>>> {
        self.pool
            .get()
            .map_err(|e| AppError::internal(format!("connection pool exhausted: {e}")))
    }
}

impl CredentialStore for PgStore {
    fn find_user_by_id(&self, id: i64) -> AppResult<Option<User>> {
        let mut conn = self.conn()?;
        Ok(users::table.find(id).first(&mut conn).optional()?)
    }

    fn find_user_by_email(&self, email: &str) -> AppResult<Option<User>> {
        let mut conn = self.conn()?;
        Ok(users::table
            .filter(users::email.eq(email))
            .first(&mut conn)
            .optional()?)
    }

    fn find_user_by_username(&self, username: &str) -> AppResult<Option<User>> {
        let mut conn = self.conn()?;
        Ok(users::table
            .filter(users::username.eq(username))
            .first(&mut conn)
            .optional()?)
    }

    fn username_taken(&self, username: &str, exclude_user: Option<i64>) -> AppResult<bool> {
        let mut conn = self.conn()?;
        let count: i64 = match exclude_user {
            Some(id) => users::table
                .filter(users::username.eq(username))
                .filter(users::id.ne(id))
                .count()
                .get_result(&mut conn)?,
            None => users::table
                .filter(users::username.eq(username))
                .count()
                .get_result(&mut conn)?,
        };
        Ok(count > 0)
    }

    fn insert_user(&self, new_user: NewUser) -> AppResult<User> {
        let mut conn = self.conn()?;
        Ok(diesel::insert_into(users::table)
            .values(&new_user)
            .get_result(&mut conn)?)
    }

    fn update_profile(&self, id: i64, changes: ProfileChanges) -> AppResult<User> {
        let mut conn = self.conn()?;
        Ok(diesel::update(users::table.find(id))
            .set((changes, users::updated_at.eq(Utc::now())))
            .get_result(&mut conn)?)
    }

    fn update_password(&self, id: i64, password_hash: &str) -> AppResult<()> {
        let mut conn = self.conn()?;
        diesel::update(users::table.find(id))
            .set((
                users::password_hash.eq(password_hash),
                users::updated_at.eq(Utc::now()),
            ))
            .execute(&mut conn)?;
        Ok(())
    }

    fn set_password_reset(
        &self,
        id: i64,
        token: &str,
        expires_at: DateTime<Utc>,
    ) -> AppResult<()> {
        let mut conn = self.conn()?;
        diesel::update(users::table.find(id))
            .set((
                users::password_reset_token.eq(Some(token)),
                users::password_reset_expires.eq(Some(expires_at)),
                users::updated_at.eq(Utc::now()),
            ))
            .execute(&mut conn)?;
        Ok(())
    }

    fn find_user_by_reset_token(&self, token: &str) -> AppResult<Option<User>> {
        let mut conn = self.conn()?;
        Ok(users::table
            .filter(users::password_reset_token.eq(token))
            .first(&mut conn)
            .optional()?)
    }

    fn complete_password_reset(&self, id: i64, password_hash: &str) -> AppResult<()> {
        let mut conn = self.conn()?;
        diesel::update(users::table.find(id))
            .set((
                users::password_hash.eq(password_hash),
                users::password_reset_token.eq(None::<String>),
                users::password_reset_expires.eq(None::<DateTime<Utc>>),
                users::updated_at.eq(Utc::now()),
            ))
            .execute(&mut conn)?;
        Ok(())
    }

    fn set_email_verification(
        &self,
        id: i64,
        token: &str,
        expires_at: DateTime<Utc>,
    ) -> AppResult<()> {
        let mut conn = self.conn()?;
        diesel::update(users::table.find(id))
            .set((
                users::email_verification_token.eq(Some(token)),
                users::email_verification_expires.eq(Some(expires_at)),
                users::updated_at.eq(Utc::now()),
            ))
            .execute(&mut conn)?;
        Ok(())
    }

    fn find_user_by_verification_token(&self, token: &str) -> AppResult<Option<User>> {
        let mut conn = self.conn()?;
        Ok(users::table
            .filter(users::email_verification_token.eq(token))
            .first(&mut conn)
            .optional()?)
    }

    fn mark_email_verified(&self, id: i64) -> AppResult<User> {
        let mut conn = self.conn()?;
        Ok(diesel::update(users::table.find(id))
            .set((
                users::email_verified.eq(true),
                users::email_verification_token.eq(None::<String>),
                users::email_verification_expires.eq(None::<DateTime<Utc>>),
                users::updated_at.eq(Utc::now()),
            ))
            .get_result(&mut conn)?)
    }

    fn insert_session(&self, session: NewSession) -> AppResult<Session> {
        let mut conn = self.conn()?;
        Ok(diesel::insert_into(sessions::table)
            .values(&session)
            .get_result(&mut conn)?)
    }

    fn consume_session(&self, token_hash: &str) -> AppResult<Option<Session>> {
        let mut conn = self.conn()?;
        // DELETE ... RETURNING, so two concurrent presentations of the same
        // refresh token cannot both read a still-live row.
        Ok(
            diesel::delete(sessions::table.filter(sessions::token_hash.eq(token_hash)))
                .get_result(&mut conn)
                .optional()?,
        )
    }

    fn delete_session(&self, user_id: i64, token_hash: &str) -> AppResult<()> {
        let mut conn = self.conn()?;
        diesel::delete(
            sessions::table
                .filter(sessions::user_id.eq(user_id))
                .filter(sessions::token_hash.eq(token_hash)),
        )
        .execute(&mut conn)?;
        Ok(())
    }

    fn delete_user_sessions(&self, user_id: i64) -> AppResult<usize> {
        let mut conn = self.conn()?;
        Ok(
            diesel::delete(sessions::table.filter(sessions::user_id.eq(user_id)))
                .execute(&mut conn)?,
        )
    }

    fn list_users(&self, params: &PaginationParams) -> AppResult<(Vec<User>, u64)> {
        let mut conn = self.conn()?;
        let total: i64 = users::table.count().get_result(&mut conn)?;
        let items = users::table
            .order(users::created_at.desc())
            .offset(i64::try_from(params.offset()).unwrap_or(i64::MAX))
            .limit(params.limit() as i64)
            .load(&mut conn)?;
        Ok((items, total as u64))
    }

    fn update_user_admin(&self, id: i64, changes: AdminChanges) -> AppResult<User> {
        let mut conn = self.conn()?;
        Ok(diesel::update(users::table.find(id))
            .set((changes, users::updated_at.eq(Utc::now())))
            .get_result(&mut conn)?)
    }

    fn delete_user(&self, id: i64) -> AppResult<bool> {
        let mut conn = self.conn()?;
        diesel::delete(sessions::table.filter(sessions::user_id.eq(id))).execute(&mut conn)?;
        let deleted = diesel::delete(users::table.find(id)).execute(&mut conn)?;
        Ok(deleted > 0)
    }

    fn user_stats(&self) -> AppResult<UserStats> {
        let mut conn = self.conn()?;
        let total: i64 = users::table.count().get_result(&mut conn)?;
        let active: i64 = users::table
            .filter(users::is_active.eq(true))
            .count()
            .get_result(&mut conn)?;
        let verified: i64 = users::table
            .filter(users::email_verified.eq(true))
            .count()
            .get_result(&mut conn)?;
        let moderators: i64 = users::table
            .filter(users::role.eq("moderator"))
            .count()
            .get_result(&mut conn)?;
        let admins: i64 = users::table
            .filter(users::role.eq("admin"))
            .count()
            .get_result(&mut conn)?;
        Ok(UserStats {
            total,
            active,
            verified,
            moderators,
            admins,
        })
    }
}
