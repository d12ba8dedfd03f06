pub mod change_password;
pub mod check;
pub mod forgot_password;
pub mod health;
pub mod login;
pub mod logout;
pub mod profile;
pub mod refresh;
pub mod register;
pub mod resend_verification;
pub mod reset_password;
pub mod stats;
pub mod users;
pub mod verify_email;

use serde::Serialize;

use chronicle_shared::types::auth::TokenPair;

use crate::models::User;

/// Body for login and refresh: the user record plus both tokens. The raw
/// refresh token appears here exactly once, at issuance.
#[derive(Debug, Serialize)]
pub struct SessionResponse {
    pub user: User,
    pub tokens: TokenPair,
}
