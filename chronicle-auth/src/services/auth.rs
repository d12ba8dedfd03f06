use std::sync::Arc;

use chrono::{Duration, Utc};

use chronicle_shared::errors::{AppError, AppResult, ErrorCode};
use chronicle_shared::types::auth::{TokenPair, UserRole};
use chronicle_shared::types::pagination::PaginationParams;

use crate::config::AppConfig;
use crate::models::{NewSession, NewUser, User};
use crate::store::{AdminChanges, CredentialStore, ProfileChanges, UserStats};

use super::{password, token, validation};

/// A freshly registered account together with the raw verification token.
/// This is the one place a token value travels back to the orchestrating
/// layer instead of only being stored: it has to reach the user's inbox.
#[derive(Debug)]
pub struct RegisteredUser {
    pub user: User,
    pub verification_token: String,
}

#[derive(Debug)]
pub struct AuthenticatedUser {
    pub user: User,
    pub tokens: TokenPair,
}

/// Raw token handed to the route layer for out-of-band delivery.
#[derive(Debug)]
pub struct IssuedToken {
    pub email: String,
    pub token: String,
}

/// Business rules for the credential and session lifecycle. Stateless
/// between calls; safe to share across concurrent requests.
#[derive(Clone)]
pub struct AuthService {
    store: Arc<dyn CredentialStore>,
    config: AppConfig,
}

impl AuthService {
    pub fn new(store: Arc<dyn CredentialStore>, config: AppConfig) -> Self {
        Self { store, config }
    }

    pub fn register(
        &self,
        email: &str,
        password_plain: &str,
        username: Option<&str>,
        full_name: Option<&str>,
    ) -> AppResult<RegisteredUser> {
        validation::validate_registration(email, password_plain, username)?;

        let email = email.to_lowercase();
        if self.store.find_user_by_email(&email)?.is_some() {
            return Err(AppError::new(
                ErrorCode::EmailAlreadyExists,
                "email already registered",
            ));
        }
        if let Some(username) = username {
            if self.store.username_taken(username, None)? {
                return Err(AppError::new(
                    ErrorCode::UsernameTaken,
                    "username already taken",
                ));
            }
        }

        let verification_token = token::new_opaque_token(token::EMAIL_TOKEN_BYTES);
        let user = self.store.insert_user(NewUser {
            email,
            username: username.map(str::to_string),
            full_name: full_name.map(str::to_string),
            password_hash: password::hash_password(password_plain)?,
            role: UserRole::User.to_string(),
            email_verified: false,
            email_verification_token: Some(verification_token.clone()),
            email_verification_expires: Some(
                Utc::now() + Duration::seconds(self.config.email_verification_ttl),
            ),
        })?;

        tracing::info!(user_id = user.id, email = %user.email, "user registered");

        Ok(RegisteredUser {
            user,
            verification_token,
        })
    }

    /// `login` is an email when it contains `@`, a username otherwise; the
    /// service never tries both. Unknown account and wrong password produce
    /// the same message so callers cannot enumerate accounts.
    pub fn login(&self, login: &str, password_plain: &str) -> AppResult<AuthenticatedUser> {
        let user = if login.contains('@') {
            self.store.find_user_by_email(&login.to_lowercase())?
        } else {
            self.store.find_user_by_username(login)?
        };

        let Some(user) = user else {
            return Err(AppError::new(
                ErrorCode::InvalidCredentials,
                "invalid credentials",
            ));
        };
        if !password::verify_password(password_plain, &user.password_hash) {
            return Err(AppError::new(
                ErrorCode::InvalidCredentials,
                "invalid credentials",
            ));
        }
        if !user.is_active {
            return Err(AppError::new(ErrorCode::AccountBlocked, "account blocked"));
        }

        let tokens = self.issue_session(&user)?;
        tracing::info!(user_id = user.id, "user logged in");

        Ok(AuthenticatedUser { user, tokens })
    }

    /// Single-use rotation: the presented token's session row is consumed
    /// atomically, so it is unusable afterwards even if the caller drops
    /// the replacement.
    pub fn refresh(&self, refresh_token: &str) -> AppResult<AuthenticatedUser> {
        let token_hash = token::hash_opaque(refresh_token);

        let Some(session) = self.store.consume_session(&token_hash)? else {
            return Err(AppError::new(
                ErrorCode::SessionNotFound,
                "invalid refresh token",
            ));
        };
        if session.expires_at < Utc::now() {
            // the stale row is already gone; nothing to refresh
            return Err(AppError::new(
                ErrorCode::SessionExpired,
                "refresh token expired",
            ));
        }

        let user = self.store.find_user_by_id(session.user_id)?;
        let user = match user {
            Some(user) if user.is_active => user,
            _ => {
                return Err(AppError::unauthorized("user not found or blocked"));
            }
        };

        let tokens = self.issue_session(&user)?;
        Ok(AuthenticatedUser { user, tokens })
    }

    /// Idempotent: logging out with an unknown token is not an error.
    pub fn logout(&self, user_id: i64, refresh_token: &str) -> AppResult<()> {
        let token_hash = token::hash_opaque(refresh_token);
        self.store.delete_session(user_id, &token_hash)
    }

    pub fn profile(&self, user_id: i64) -> AppResult<User> {
        self.store
            .find_user_by_id(user_id)?
            .ok_or_else(|| AppError::new(ErrorCode::UserNotFound, "user not found"))
    }

    pub fn update_profile(&self, user_id: i64, changes: ProfileChanges) -> AppResult<User> {
        if changes.is_empty() {
            return Err(AppError::bad_request("no fields to update"));
        }
        if let Some(username) = changes.username.as_deref() {
            if let Some(msg) = validation::username_violation(username) {
                return Err(AppError::validation(vec![msg]));
            }
            if self.store.username_taken(username, Some(user_id))? {
                return Err(AppError::new(
                    ErrorCode::UsernameTaken,
                    "username already taken",
                ));
            }
        }
        // resolve first so a missing id surfaces as 404, not a bare update miss
        self.profile(user_id)?;
        self.store.update_profile(user_id, changes)
    }

    /// Existing sessions stay valid after a password change; only the
    /// reset flow revokes them.
    pub fn change_password(
        &self,
        user_id: i64,
        current_password: &str,
        new_password: &str,
    ) -> AppResult<()> {
        let user = self.profile(user_id)?;
        if !password::verify_password(current_password, &user.password_hash) {
            return Err(AppError::new(
                ErrorCode::InvalidCredentials,
                "wrong current password",
            ));
        }
        validation::validate_password(new_password)?;
        self.store
            .update_password(user_id, &password::hash_password(new_password)?)?;
        tracing::info!(user_id, "password changed");
        Ok(())
    }

    /// Always succeeds outward; `None` means no matching account, which the
    /// caller must not distinguish from success. A new token overwrites any
    /// outstanding one.
    pub fn forgot_password(&self, email: &str) -> AppResult<Option<IssuedToken>> {
        let Some(user) = self.store.find_user_by_email(&email.to_lowercase())? else {
            return Ok(None);
        };

        let reset_token = token::new_opaque_token(token::EMAIL_TOKEN_BYTES);
        self.store.set_password_reset(
            user.id,
            &reset_token,
            Utc::now() + Duration::seconds(self.config.password_reset_ttl),
        )?;
        tracing::info!(user_id = user.id, "password reset token issued");

        Ok(Some(IssuedToken {
            email: user.email,
            token: reset_token,
        }))
    }

    /// Single-use: completing the reset clears the token fields, and all
    /// standing sessions for the account are revoked (compromised-password
    /// recovery must not leave leaked refresh tokens alive).
    pub fn reset_password(&self, reset_token: &str, new_password: &str) -> AppResult<()> {
        validation::validate_password(new_password)?;

        let Some(user) = self.store.find_user_by_reset_token(reset_token)? else {
            return Err(AppError::new(
                ErrorCode::ResetTokenInvalid,
                "invalid reset token",
            ));
        };
        match user.password_reset_expires {
            Some(expires) if expires >= Utc::now() => {}
            _ => {
                return Err(AppError::new(
                    ErrorCode::ResetTokenExpired,
                    "reset token expired",
                ));
            }
        }

        self.store
            .complete_password_reset(user.id, &password::hash_password(new_password)?)?;
        let revoked = self.store.delete_user_sessions(user.id)?;
        tracing::info!(user_id = user.id, revoked, "password reset completed");
        Ok(())
    }

    pub fn verify_email(&self, verification_token: &str) -> AppResult<User> {
        let Some(user) = self
            .store
            .find_user_by_verification_token(verification_token)?
        else {
            return Err(AppError::new(
                ErrorCode::VerificationTokenInvalid,
                "invalid verification token",
            ));
        };
        match user.email_verification_expires {
            Some(expires) if expires >= Utc::now() => {}
            _ => {
                return Err(AppError::new(
                    ErrorCode::VerificationTokenExpired,
                    "verification token expired",
                ));
            }
        }

        let user = self.store.mark_email_verified(user.id)?;
        tracing::info!(user_id = user.id, "email verified");
        Ok(user)
    }

    /// Overwrites the outstanding verification token; the previous one
    /// becomes invalid immediately.
    pub fn resend_verification(&self, user_id: i64) -> AppResult<IssuedToken> {
        let user = self.profile(user_id)?;
        if user.email_verified {
            return Err(AppError::new(
                ErrorCode::AlreadyVerified,
                "email already verified",
            ));
        }

        let verification_token = token::new_opaque_token(token::EMAIL_TOKEN_BYTES);
        self.store.set_email_verification(
            user.id,
            &verification_token,
            Utc::now() + Duration::seconds(self.config.email_verification_ttl),
        )?;

        Ok(IssuedToken {
            email: user.email,
            token: verification_token,
        })
    }

    // --- administration ---

    pub fn list_users(&self, params: &PaginationParams) -> AppResult<(Vec<User>, u64)> {
        self.store.list_users(params)
    }

    pub fn admin_update_user(
        &self,
        user_id: i64,
        role: Option<UserRole>,
        is_active: Option<bool>,
    ) -> AppResult<User> {
        let changes = AdminChanges {
            role: role.map(|r| r.to_string()),
            is_active,
        };
        if changes.is_empty() {
            return Err(AppError::bad_request("no fields to update"));
        }
        self.profile(user_id)?;
        self.store.update_user_admin(user_id, changes)
    }

    pub fn delete_user(&self, user_id: i64) -> AppResult<()> {
        if !self.store.delete_user(user_id)? {
            return Err(AppError::new(ErrorCode::UserNotFound, "user not found"));
        }
        tracing::info!(user_id, "user deleted");
        Ok(())
    }

    pub fn user_stats(&self) -> AppResult<UserStats> {
        self.store.user_stats()
    }

    fn issue_session(&self, user: &User) -> AppResult<TokenPair> {
        let (tokens, refresh_hash) =
            token::issue_pair(user, &self.config.jwt_secret, self.config.jwt_access_ttl)?;
        self.store.insert_session(NewSession {
            user_id: user.id,
            token_hash: refresh_hash,
            expires_at: Utc::now() + Duration::seconds(self.config.jwt_refresh_ttl),
        })?;
        Ok(tokens)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::DateTime;
    use std::sync::Mutex;

    use crate::models::Session;

    #[derive(Default)]
    struct MemInner {
        users: Vec<User>,
        sessions: Vec<Session>,
        next_user_id: i64,
        next_session_id: i64,
    }

    /// In-memory double for the persistence seam.
    #[derive(Default)]
    struct MemoryStore {
        inner: Mutex<MemInner>,
    }

    impl MemoryStore {
        fn with_user<R>(&self, id: i64, f: impl FnOnce(&mut User) -> R) -> AppResult<R> {
            let mut inner = self.inner.lock().unwrap();
            let user = inner
                .users
                .iter_mut()
                .find(|u| u.id == id)
                .ok_or_else(|| AppError::not_found("user not found"))?;
            Ok(f(user))
        }
    }

    impl CredentialStore for MemoryStore {
        fn find_user_by_id(&self, id: i64) -> AppResult<Option<User>> {
            let inner = self.inner.lock().unwrap();
            Ok(inner.users.iter().find(|u| u.id == id).cloned())
        }

        fn find_user_by_email(&self, email: &str) -> AppResult<Option<User>> {
            let inner = self.inner.lock().unwrap();
            Ok(inner.users.iter().find(|u| u.email == email).cloned())
        }

        fn find_user_by_username(&self, username: &str) -> AppResult<Option<User>> {
            let inner = self.inner.lock().unwrap();
            Ok(inner
                .users
                .iter()
                .find(|u| u.username.as_deref() == Some(username))
                .cloned())
        }

        fn username_taken(&self, username: &str, exclude_user: Option<i64>) -> AppResult<bool> {
            let inner = self.inner.lock().unwrap();
            Ok(inner
                .users
                .iter()
                .any(|u| u.username.as_deref() == Some(username) && Some(u.id) != exclude_user))
        }

        fn insert_user(&self, new_user: NewUser) -> AppResult<User> {
            let mut inner = self.inner.lock().unwrap();
            inner.next_user_id += 1;
            let now = Utc::now();
            let user = User {
                id: inner.next_user_id,
                email: new_user.email,
                username: new_user.username,
                full_name: new_user.full_name,
                avatar_url: None,
                password_hash: new_user.password_hash,
                role: new_user.role,
                is_active: true,
                email_verified: new_user.email_verified,
                email_verification_token: new_user.email_verification_token,
                email_verification_expires: new_user.email_verification_expires,
                password_reset_token: None,
                password_reset_expires: None,
                created_at: now,
                updated_at: now,
            };
            inner.users.push(user.clone());
            Ok(user)
        }

        fn update_profile(&self, id: i64, changes: ProfileChanges) -> AppResult<User> {
            self.with_user(id, |user| {
                if let Some(username) = changes.username {
                    user.username = Some(username);
                }
                if let Some(full_name) = changes.full_name {
                    user.full_name = Some(full_name);
                }
                if let Some(avatar_url) = changes.avatar_url {
                    user.avatar_url = Some(avatar_url);
                }
                user.updated_at = Utc::now();
                user.clone()
            })
        }

        fn update_password(&self, id: i64, password_hash: &str) -> AppResult<()> {
            self.with_user(id, |user| {
                user.password_hash = password_hash.to_string();
            })
        }

        fn set_password_reset(
            &self,
            id: i64,
            token: &str,
            expires_at: DateTime<Utc>,
        ) -> AppResult<()> {
            self.with_user(id, |user| {
                user.password_reset_token = Some(token.to_string());
                user.password_reset_expires = Some(expires_at);
            })
        }

        fn find_user_by_reset_token(&self, token: &str) -> AppResult<Option<User>> {
            let inner = self.inner.lock().unwrap();
            Ok(inner
                .users
                .iter()
                .find(|u| u.password_reset_token.as_deref() == Some(token))
                .cloned())
        }

        fn complete_password_reset(&self, id: i64, password_hash: &str) -> AppResult<()> {
            self.with_user(id, |user| {
                user.password_hash = password_hash.to_string();
                user.password_reset_token = None;
                user.password_reset_expires = None;
            })
        }

        fn set_email_verification(
            &self,
            id: i64,
            token: &str,
            expires_at: DateTime<Utc>,
        ) -> AppResult<()> {
            self.with_user(id, |user| {
                user.email_verification_token = Some(token.to_string());
                user.email_verification_expires = Some(expires_at);
            })
        }

        fn find_user_by_verification_token(&self, token: &str) -> AppResult<Option<User>> {
            let inner = self.inner.lock().unwrap();
            Ok(inner
                .users
                .iter()
                .find(|u| u.email_verification_token.as_deref() == Some(token))
                .cloned())
        }

        fn mark_email_verified(&self, id: i64) -> AppResult<User> {
            self.with_user(id, |user| {
                user.email_verified = true;
                user.email_verification_token = None;
                user.email_verification_expires = None;
                user.clone()
            })
        }

        fn insert_session(&self, session: NewSession) -> AppResult<Session> {
            let mut inner = self.inner.lock().unwrap();
            inner.next_session_id += 1;
            let session = Session {
                id: inner.next_session_id,
                user_id: session.user_id,
                token_hash: session.token_hash,
                expires_at: session.expires_at,
                created_at: Utc::now(),
            };
            inner.sessions.push(session.clone());
            Ok(session)
        }

        fn consume_session(&self, token_hash: &str) -> AppResult<Option<Session>> {
            let mut inner = self.inner.lock().unwrap();
            let pos = inner.sessions.iter().position(|s| s.token_hash == token_hash);
            Ok(pos.map(|pos| inner.sessions.remove(pos)))
        }

        fn delete_session(&self, user_id: i64, token_hash: &str) -> AppResult<()> {
            let mut inner = self.inner.lock().unwrap();
            inner
                .sessions
                .retain(|s| !(s.user_id == user_id && s.token_hash == token_hash));
            Ok(())
        }

        fn delete_user_sessions(&self, user_id: i64) -> AppResult<usize> {
            let mut inner = self.inner.lock().unwrap();
            let before = inner.sessions.len();
            inner.sessions.retain(|s| s.user_id != user_id);
            Ok(before - inner.sessions.len())
        }

        fn list_users(&self, params: &PaginationParams) -> AppResult<(Vec<User>, u64)> {
            let inner = self.inner.lock().unwrap();
            let total = inner.users.len() as u64;
            let items = inner
                .users
                .iter()
                .skip(params.offset() as usize)
                .take(params.limit() as usize)
                .cloned()
                .collect();
            Ok((items, total))
        }

        fn update_user_admin(&self, id: i64, changes: AdminChanges) -> AppResult<User> {
            self.with_user(id, |user| {
                if let Some(role) = changes.role {
                    user.role = role;
                }
                if let Some(is_active) = changes.is_active {
                    user.is_active = is_active;
                }
                user.updated_at = Utc::now();
                user.clone()
            })
        }

        fn delete_user(&self, id: i64) -> AppResult<bool> {
            let mut inner = self.inner.lock().unwrap();
            inner.sessions.retain(|s| s.user_id != id);
            let before = inner.users.len();
            inner.users.retain(|u| u.id != id);
            Ok(inner.users.len() < before)
        }

        fn user_stats(&self) -> AppResult<UserStats> {
            let inner = self.inner.lock().unwrap();
            Ok(UserStats {
                total: inner.users.len() as i64,
                active: inner.users.iter().filter(|u| u.is_active).count() as i64,
                verified: inner.users.iter().filter(|u| u.email_verified).count() as i64,
                moderators: inner.users.iter().filter(|u| u.role == "moderator").count() as i64,
                admins: inner.users.iter().filter(|u| u.role == "admin").count() as i64,
            })
        }
    }

    fn test_config() -> AppConfig {
        AppConfig {
            port: 0,
            database_url: String::new(),
            db_pool_size: 1,
            environment: "test".into(),
            jwt_secret: "test-secret".into(),
            jwt_access_ttl: 3600,
            jwt_refresh_ttl: 604_800,
            email_verification_ttl: 172_800,
            password_reset_ttl: 86_400,
            resend_api_key: String::new(),
            from_email: String::new(),
            app_base_url: String::new(),
        }
    }

    fn service() -> (AuthService, Arc<MemoryStore>) {
        let store = Arc::new(MemoryStore::default());
        (
            AuthService::new(store.clone(), test_config()),
            store,
        )
    }

    fn code_of(err: AppError) -> ErrorCode {
        match err {
            AppError::Known { code, .. } => code,
            other => panic!("expected known error, got {other:?}"),
        }
    }

    fn message_of(err: AppError) -> String {
        err.to_string()
    }

    #[test]
    fn registration_and_verification_flow() {
        let (svc, _) = service();
        let registered = svc
            .register("A@Test.com", "Passw0rd", Some("ada"), Some("Ada Lovelace"))
            .unwrap();

        assert_eq!(registered.user.email, "a@test.com");
        assert!(!registered.user.email_verified);
        assert_eq!(registered.verification_token.len(), 64);

        let verified = svc.verify_email(&registered.verification_token).unwrap();
        assert!(verified.email_verified);

        // single-use: the token was cleared on success
        let err = svc.verify_email(&registered.verification_token).unwrap_err();
        assert_eq!(code_of(err), ErrorCode::VerificationTokenInvalid);
    }

    #[test]
    fn register_rejects_duplicates() {
        let (svc, _) = service();
        svc.register("a@test.com", "Passw0rd", Some("ada"), None)
            .unwrap();

        let err = svc
            .register("A@TEST.COM", "Passw0rd", Some("other"), None)
            .unwrap_err();
        assert_eq!(code_of(err), ErrorCode::EmailAlreadyExists);

        let err = svc
            .register("b@test.com", "Passw0rd", Some("ada"), None)
            .unwrap_err();
        assert_eq!(code_of(err), ErrorCode::UsernameTaken);
    }

    #[test]
    fn register_aggregates_validation_failures() {
        let (svc, _) = service();
        let err = svc
            .register("nope", "weak", Some("x"), None)
            .unwrap_err();
        assert_eq!(code_of(err), ErrorCode::ValidationError);
    }

    #[test]
    fn login_by_email_or_username() {
        let (svc, _) = service();
        svc.register("a@test.com", "Passw0rd", Some("ada"), None)
            .unwrap();

        let by_email = svc.login("A@Test.com", "Passw0rd").unwrap();
        assert_eq!(by_email.user.username.as_deref(), Some("ada"));
        assert!(!by_email.tokens.access_token.is_empty());
        assert_eq!(by_email.tokens.refresh_token.len(), 128);

        let by_username = svc.login("ada", "Passw0rd").unwrap();
        assert_eq!(by_username.user.email, "a@test.com");
    }

    #[test]
    fn login_failures_do_not_leak_account_existence() {
        let (svc, _) = service();
        svc.register("a@test.com", "Passw0rd", None, None).unwrap();

        let unknown = svc.login("ghost@test.com", "Passw0rd").unwrap_err();
        let wrong_pw = svc.login("a@test.com", "Wrong0pass").unwrap_err();

        assert_eq!(message_of(unknown), message_of(wrong_pw));
    }

    #[test]
    fn blocked_account_is_distinguished_from_bad_credentials() {
        let (svc, store) = service();
        let registered = svc.register("a@test.com", "Passw0rd", None, None).unwrap();
        store
            .with_user(registered.user.id, |u| u.is_active = false)
            .unwrap();

        let err = svc.login("a@test.com", "Passw0rd").unwrap_err();
        assert_eq!(code_of(err), ErrorCode::AccountBlocked);
    }

    #[test]
    fn refresh_rotation_is_single_use() {
        let (svc, _) = service();
        svc.register("a@test.com", "Passw0rd", None, None).unwrap();
        let login = svc.login("a@test.com", "Passw0rd").unwrap();

        let rotated = svc.refresh(&login.tokens.refresh_token).unwrap();
        assert_ne!(rotated.tokens.refresh_token, login.tokens.refresh_token);

        // the presented token is permanently unusable after rotation
        let err = svc.refresh(&login.tokens.refresh_token).unwrap_err();
        assert_eq!(code_of(err), ErrorCode::SessionNotFound);

        // the replacement still works
        svc.refresh(&rotated.tokens.refresh_token).unwrap();
    }

    #[test]
    fn expired_session_is_deleted_on_refresh() {
        let (svc, store) = service();
        svc.register("a@test.com", "Passw0rd", None, None).unwrap();
        let login = svc.login("a@test.com", "Passw0rd").unwrap();

        {
            let mut inner = store.inner.lock().unwrap();
            for session in &mut inner.sessions {
                session.expires_at = Utc::now() - Duration::seconds(1);
            }
        }

        let err = svc.refresh(&login.tokens.refresh_token).unwrap_err();
        assert_eq!(code_of(err), ErrorCode::SessionExpired);
        // lazy cleanup: the stale row is gone
        assert!(store.inner.lock().unwrap().sessions.is_empty());
    }

    #[test]
    fn refresh_rejects_deactivated_user() {
        let (svc, store) = service();
        let registered = svc.register("a@test.com", "Passw0rd", None, None).unwrap();
        let login = svc.login("a@test.com", "Passw0rd").unwrap();
        store
            .with_user(registered.user.id, |u| u.is_active = false)
            .unwrap();

        let err = svc.refresh(&login.tokens.refresh_token).unwrap_err();
        assert_eq!(code_of(err), ErrorCode::Unauthorized);
    }

    #[test]
    fn logout_is_idempotent() {
        let (svc, store) = service();
        let registered = svc.register("a@test.com", "Passw0rd", None, None).unwrap();
        let login = svc.login("a@test.com", "Passw0rd").unwrap();

        svc.logout(registered.user.id, &login.tokens.refresh_token)
            .unwrap();
        assert!(store.inner.lock().unwrap().sessions.is_empty());

        // second logout with the same token is a no-op, not an error
        svc.logout(registered.user.id, &login.tokens.refresh_token)
            .unwrap();
    }

    #[test]
    fn multiple_concurrent_sessions_are_allowed() {
        let (svc, store) = service();
        svc.register("a@test.com", "Passw0rd", None, None).unwrap();
        let first = svc.login("a@test.com", "Passw0rd").unwrap();
        let second = svc.login("a@test.com", "Passw0rd").unwrap();

        assert_eq!(store.inner.lock().unwrap().sessions.len(), 2);
        svc.refresh(&first.tokens.refresh_token).unwrap();
        svc.refresh(&second.tokens.refresh_token).unwrap();
    }

    #[test]
    fn change_password_requires_current_and_keeps_sessions() {
        let (svc, store) = service();
        let registered = svc.register("a@test.com", "Passw0rd", None, None).unwrap();
        let login = svc.login("a@test.com", "Passw0rd").unwrap();

        let err = svc
            .change_password(registered.user.id, "Wrong0pass", "NewPass1")
            .unwrap_err();
        assert_eq!(code_of(err), ErrorCode::InvalidCredentials);

        svc.change_password(registered.user.id, "Passw0rd", "NewPass1")
            .unwrap();
        assert!(svc.login("a@test.com", "NewPass1").is_ok());
        assert_eq!(code_of(svc.login("a@test.com", "Passw0rd").unwrap_err()),
            ErrorCode::InvalidCredentials);

        // the pre-change session survives alongside the fresh login's
        assert_eq!(store.inner.lock().unwrap().sessions.len(), 2);
        svc.refresh(&login.tokens.refresh_token).unwrap();
    }

    #[test]
    fn forgot_password_is_enumeration_resistant() {
        let (svc, _) = service();
        svc.register("a@test.com", "Passw0rd", None, None).unwrap();

        assert!(svc.forgot_password("a@test.com").unwrap().is_some());
        // unknown email: same outward success, just nothing issued
        assert!(svc.forgot_password("ghost@test.com").unwrap().is_none());
    }

    #[test]
    fn reset_flow_rotates_password_and_revokes_sessions() {
        let (svc, store) = service();
        svc.register("a@test.com", "Passw0rd", None, None).unwrap();
        svc.login("a@test.com", "Passw0rd").unwrap();

        let issued = svc.forgot_password("a@test.com").unwrap().unwrap();
        assert_eq!(issued.token.len(), 64);

        svc.reset_password(&issued.token, "NewPass1").unwrap();
        assert!(svc.login("a@test.com", "NewPass1").is_ok());
        assert_eq!(
            code_of(svc.login("a@test.com", "Passw0rd").unwrap_err()),
            ErrorCode::InvalidCredentials
        );

        // single-use reset token
        let err = svc.reset_password(&issued.token, "OtherPass1").unwrap_err();
        assert_eq!(code_of(err), ErrorCode::ResetTokenInvalid);

        // all sessions from before the reset are revoked (one remains
        // from the post-reset login above)
        assert_eq!(store.inner.lock().unwrap().sessions.len(), 1);
    }

    #[test]
    fn expired_reset_token_is_rejected() {
        let (svc, store) = service();
        let registered = svc.register("a@test.com", "Passw0rd", None, None).unwrap();
        let issued = svc.forgot_password("a@test.com").unwrap().unwrap();
        store
            .with_user(registered.user.id, |u| {
                u.password_reset_expires = Some(Utc::now() - Duration::seconds(1));
            })
            .unwrap();

        let err = svc.reset_password(&issued.token, "NewPass1").unwrap_err();
        assert_eq!(code_of(err), ErrorCode::ResetTokenExpired);
    }

    #[test]
    fn resend_verification_overwrites_previous_token() {
        let (svc, _) = service();
        let registered = svc.register("a@test.com", "Passw0rd", None, None).unwrap();

        let reissued = svc.resend_verification(registered.user.id).unwrap();
        assert_ne!(reissued.token, registered.verification_token);

        // the original token is dead; only one outstanding token per user
        let err = svc.verify_email(&registered.verification_token).unwrap_err();
        assert_eq!(code_of(err), ErrorCode::VerificationTokenInvalid);
        svc.verify_email(&reissued.token).unwrap();

        let err = svc.resend_verification(registered.user.id).unwrap_err();
        assert_eq!(code_of(err), ErrorCode::AlreadyVerified);
    }

    #[test]
    fn profile_update_edge_cases() {
        let (svc, _) = service();
        let a = svc
            .register("a@test.com", "Passw0rd", Some("ada"), None)
            .unwrap();
        let b = svc
            .register("b@test.com", "Passw0rd", Some("bob"), None)
            .unwrap();

        let err = svc
            .update_profile(a.user.id, ProfileChanges::default())
            .unwrap_err();
        assert_eq!(code_of(err), ErrorCode::BadRequest);

        let err = svc
            .update_profile(
                b.user.id,
                ProfileChanges {
                    username: Some("ada".into()),
                    ..Default::default()
                },
            )
            .unwrap_err();
        assert_eq!(code_of(err), ErrorCode::UsernameTaken);

        // setting your own current username is not a conflict
        let updated = svc
            .update_profile(
                a.user.id,
                ProfileChanges {
                    username: Some("ada".into()),
                    full_name: Some("Ada Lovelace".into()),
                    ..Default::default()
                },
            )
            .unwrap();
        assert_eq!(updated.full_name.as_deref(), Some("Ada Lovelace"));

        let err = svc
            .update_profile(
                9999,
                ProfileChanges {
                    full_name: Some("Ghost".into()),
                    ..Default::default()
                },
            )
            .unwrap_err();
        assert_eq!(code_of(err), ErrorCode::UserNotFound);
    }

    #[test]
    fn admin_operations() {
        let (svc, _) = service();
        let a = svc.register("a@test.com", "Passw0rd", None, None).unwrap();
        let registered_b = svc.register("b@test.com", "Passw0rd", None, None).unwrap();
        svc.verify_email(&registered_b.verification_token).unwrap();

        let promoted = svc
            .admin_update_user(a.user.id, Some(UserRole::Moderator), None)
            .unwrap();
        assert_eq!(promoted.role(), UserRole::Moderator);

        let err = svc.admin_update_user(a.user.id, None, None).unwrap_err();
        assert_eq!(code_of(err), ErrorCode::BadRequest);

        let stats = svc.user_stats().unwrap();
        assert_eq!(stats.total, 2);
        assert_eq!(stats.verified, 1);
        assert_eq!(stats.moderators, 1);

        let (listed, total) = svc.list_users(&PaginationParams::default()).unwrap();
        assert_eq!(total, 2);
        assert_eq!(listed.len(), 2);

        svc.delete_user(a.user.id).unwrap();
        let err = svc.delete_user(a.user.id).unwrap_err();
        assert_eq!(code_of(err), ErrorCode::UserNotFound);
    }
}
