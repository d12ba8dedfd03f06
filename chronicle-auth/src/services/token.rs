use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use rand::RngCore;
use sha2::{Digest, Sha256};

use chronicle_shared::errors::AppError;
use chronicle_shared::types::auth::{Claims, TokenPair};

use crate::models::User;

/// Refresh tokens: 64 random bytes, 128 hex chars on the wire.
pub const REFRESH_TOKEN_BYTES: usize = 64;
/// Email-verification and password-reset tokens: 32 random bytes, 64 hex chars.
pub const EMAIL_TOKEN_BYTES: usize = 32;

pub fn sign_access(user: &User, secret: &str, ttl_secs: i64) -> Result<String, AppError> {
    let claims = Claims::new(
        user.id,
        user.email.clone(),
        user.role(),
        user.email_verified,
        ttl_secs,
    );
    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|e| AppError::internal(format!("JWT encoding failed: {e}")))
}

/// Returns `None` on expiry, bad signature, or malformed input; token
/// verification failures never surface as errors.
pub fn verify_access(token: &str, secret: &str) -> Option<Claims> {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.validate_exp = true;

    decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &validation,
    )
    .map(|data| data.claims)
    .ok()
}

/// Cryptographically random opaque token, hex encoded. No store-side
/// uniqueness check: collision odds at these lengths are negligible.
pub fn new_opaque_token(byte_length: usize) -> String {
    let mut bytes = vec![0u8; byte_length];
    rand::thread_rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}

/// Deterministic sha256 hex digest. Shared by the issuing and verifying
/// paths so only hashes of refresh tokens are ever persisted.
pub fn hash_opaque(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    hex::encode(hasher.finalize())
}

/// Access token plus a fresh opaque refresh token; the caller stores only
/// the returned hash of the latter.
pub fn issue_pair(user: &User, secret: &str, access_ttl: i64) -> Result<(TokenPair, String), AppError> {
    let access_token = sign_access(user, secret, access_ttl)?;
    let refresh_token = new_opaque_token(REFRESH_TOKEN_BYTES);
    let refresh_hash = hash_opaque(&refresh_token);
    let pair = TokenPair::new(access_token, refresh_token, access_ttl);
    Ok((pair, refresh_hash))
}
