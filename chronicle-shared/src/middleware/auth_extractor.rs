use axum::extract::{FromRef, FromRequestParts};
use axum::http::request::Parts;
use axum::http::HeaderMap;
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};

use crate::errors::{AppError, ErrorCode};
use crate::types::auth::{AuthUser, Claims, UserRole};

/// Verification half of the JWT secret. Built once at startup from the same
/// configured secret the signing path uses, then carried in router state so
/// the extractors and the token issuer can never disagree.
#[derive(Clone)]
pub struct JwtVerifier {
    decoding: DecodingKey,
}

impl JwtVerifier {
    pub fn new(secret: &str) -> Self {
        Self {
            decoding: DecodingKey::from_secret(secret.as_bytes()),
        }
    }

    pub fn verify(&self, token: &str) -> Result<Claims, AppError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = true;

        let token_data =
            decode::<Claims>(token, &self.decoding, &validation).map_err(|e| match e.kind() {
                jsonwebtoken::errors::ErrorKind::ExpiredSignature => {
                    AppError::new(ErrorCode::TokenExpired, "token has expired")
                }
                _ => AppError::new(ErrorCode::TokenInvalid, "invalid token"),
            })?;

        Ok(token_data.claims)
    }
}

// Orphan rules keep downstream crates from writing
// `impl FromRef<Arc<TheirState>> for JwtVerifier`; forward through Arc here
// so they only need `impl FromRef<TheirState> for JwtVerifier`.
impl<S> FromRef<std::sync::Arc<S>> for JwtVerifier
where
    JwtVerifier: FromRef<S>,
{
    fn from_ref(state: &std::sync::Arc<S>) -> Self {
        JwtVerifier::from_ref(&**state)
    }
}

/// Bearer-token extractor. A missing or unreadable Authorization header is
/// rejected as 401; a present token that fails verification (expired,
/// malformed, bad signature) is rejected as 403.
#[axum::async_trait]
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
    JwtVerifier: FromRef<S>,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let token = extract_bearer_token(&parts.headers)?;
        let claims = JwtVerifier::from_ref(state).verify(&token)?;
        Ok(AuthUser::from(claims))
    }
}

fn extract_bearer_token(headers: &HeaderMap) -> Result<String, AppError> {
    let auth_header = headers
        .get("Authorization")
        .ok_or_else(|| AppError::new(ErrorCode::Unauthorized, "missing authorization header"))?
        .to_str()
        .map_err(|_| AppError::new(ErrorCode::Unauthorized, "invalid authorization header"))?;

    if !auth_header.starts_with("Bearer ") {
        return Err(AppError::new(
            ErrorCode::Unauthorized,
            "authorization header must use Bearer scheme",
        ));
    }

    Ok(auth_header[7..].to_string())
}

/// Optional auth extractor: guests pass through with `None`, invalid tokens
/// are treated the same as absent ones.
pub struct OptionalAuthUser(pub Option<AuthUser>);

#[axum::async_trait]
impl<S> FromRequestParts<S> for OptionalAuthUser
where
    S: Send + Sync,
    JwtVerifier: FromRef<S>,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        match AuthUser::from_request_parts(parts, state).await {
            Ok(user) => Ok(Self(Some(user))),
            Err(_) => Ok(Self(None)),
        }
    }
}

/// Require Admin role
pub struct AdminUser(pub AuthUser);

#[axum::async_trait]
impl<S> FromRequestParts<S> for AdminUser
where
    S: Send + Sync,
    JwtVerifier: FromRef<S>,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let user = AuthUser::from_request_parts(parts, state).await?;
        if user.role != UserRole::Admin {
            return Err(AppError::new(ErrorCode::Forbidden, "admin access required"));
        }
        Ok(Self(user))
    }
}

/// Require Moderator or Admin role
pub struct ModeratorUser(pub AuthUser);

#[axum::async_trait]
impl<S> FromRequestParts<S> for ModeratorUser
where
    S: Send + Sync,
    JwtVerifier: FromRef<S>,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let user = AuthUser::from_request_parts(parts, state).await?;
        if !matches!(user.role, UserRole::Moderator | UserRole::Admin) {
            return Err(AppError::new(
                ErrorCode::Forbidden,
                "moderator access required",
            ));
        }
        Ok(Self(user))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request;
    use jsonwebtoken::{encode, EncodingKey, Header};

    const SECRET: &str = "a-real-secret-for-this-deployment";

    #[derive(Clone)]
    struct TestState {
        jwt: JwtVerifier,
    }

    impl FromRef<TestState> for JwtVerifier {
        fn from_ref(state: &TestState) -> Self {
            state.jwt.clone()
        }
    }

    fn signed_token(secret: &str) -> String {
        let claims = Claims::new(7, "ada@test.com", UserRole::User, true, 3600);
        encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(secret.as_bytes()),
        )
        .unwrap()
    }

    fn parts_with_auth(value: &str) -> Parts {
        let (parts, _) = Request::builder()
            .header("Authorization", value)
            .body(())
            .unwrap()
            .into_parts();
        parts
    }

    #[tokio::test]
    async fn token_signed_with_the_configured_secret_is_accepted() {
        let state = TestState {
            jwt: JwtVerifier::new(SECRET),
        };
        let token = signed_token(SECRET);
        let mut parts = parts_with_auth(&format!("Bearer {token}"));

        let user = AuthUser::from_request_parts(&mut parts, &state)
            .await
            .unwrap();
        assert_eq!(user.id, 7);
        assert_eq!(user.email, "ada@test.com");
    }

    #[tokio::test]
    async fn token_signed_with_another_secret_is_rejected() {
        let state = TestState {
            jwt: JwtVerifier::new(SECRET),
        };
        // A well-known placeholder secret must not verify against the
        // configured one.
        let token = signed_token("development-secret-change-in-production");
        let mut parts = parts_with_auth(&format!("Bearer {token}"));

        let err = AuthUser::from_request_parts(&mut parts, &state)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            AppError::Known {
                code: ErrorCode::TokenInvalid,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn missing_header_is_a_distinct_failure() {
        let state = TestState {
            jwt: JwtVerifier::new(SECRET),
        };
        let (mut parts, _) = Request::builder().body(()).unwrap().into_parts();

        let err = AuthUser::from_request_parts(&mut parts, &state)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            AppError::Known {
                code: ErrorCode::Unauthorized,
                ..
            }
        ));
    }
}
