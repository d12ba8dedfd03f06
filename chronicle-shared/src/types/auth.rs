use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::errors::{AppError, ErrorCode};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UserRole {
    User,
    Moderator,
    Admin,
}

impl UserRole {
    pub const ALL: [UserRole; 3] = [UserRole::User, UserRole::Moderator, UserRole::Admin];
}

impl std::fmt::Display for UserRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            UserRole::User => write!(f, "user"),
            UserRole::Moderator => write!(f, "moderator"),
            UserRole::Admin => write!(f, "admin"),
        }
    }
}

impl std::str::FromStr for UserRole {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "user" => Ok(UserRole::User),
            "moderator" => Ok(UserRole::Moderator),
            "admin" => Ok(UserRole::Admin),
            _ => Err(format!("unknown role: {s}")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Permission {
    #[serde(rename = "read:persons")]
    ReadPersons,
    #[serde(rename = "write:persons")]
    WritePersons,
    #[serde(rename = "delete:persons")]
    DeletePersons,
    #[serde(rename = "read:users")]
    ReadUsers,
    #[serde(rename = "write:users")]
    WriteUsers,
    #[serde(rename = "delete:users")]
    DeleteUsers,
    #[serde(rename = "manage:roles")]
    ManageRoles,
    #[serde(rename = "manage:system")]
    ManageSystem,
}

impl std::fmt::Display for Permission {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Permission::ReadPersons => "read:persons",
            Permission::WritePersons => "write:persons",
            Permission::DeletePersons => "delete:persons",
            Permission::ReadUsers => "read:users",
            Permission::WriteUsers => "write:users",
            Permission::DeleteUsers => "delete:users",
            Permission::ManageRoles => "manage:roles",
            Permission::ManageSystem => "manage:system",
        };
        write!(f, "{s}")
    }
}

/// Role -> permission mapping. Exact membership only: moderator does not
/// inherit admin rights, and there is no wildcard expansion.
pub fn role_permissions(role: UserRole) -> &'static [Permission] {
    match role {
        UserRole::User => &[Permission::ReadPersons],
        UserRole::Moderator => &[
            Permission::ReadPersons,
            Permission::WritePersons,
            Permission::ReadUsers,
        ],
        UserRole::Admin => &[
            Permission::ReadPersons,
            Permission::WritePersons,
            Permission::DeletePersons,
            Permission::ReadUsers,
            Permission::WriteUsers,
            Permission::DeleteUsers,
            Permission::ManageRoles,
            Permission::ManageSystem,
        ],
    }
}

pub fn has_permission(role: UserRole, permission: Permission) -> bool {
    role_permissions(role).contains(&permission)
}

/// Startup check: every role must map to a non-empty permission set.
pub fn verify_permission_table() -> anyhow::Result<()> {
    for role in UserRole::ALL {
        if role_permissions(role).is_empty() {
            anyhow::bail!("role {role} has no permissions configured");
        }
    }
    Ok(())
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: i64,
    pub email: String,
    pub role: UserRole,
    pub email_verified: bool,
    pub iat: i64,
    pub exp: i64,
}

impl Claims {
    pub fn new(
        user_id: i64,
        email: impl Into<String>,
        role: UserRole,
        email_verified: bool,
        duration_secs: i64,
    ) -> Self {
        let now = Utc::now().timestamp();
        Self {
            sub: user_id,
            email: email.into(),
            role,
            email_verified,
            iat: now,
            exp: now + duration_secs,
        }
    }

    pub fn is_expired(&self) -> bool {
        Utc::now().timestamp() > self.exp
    }

    pub fn is_admin(&self) -> bool {
        self.role == UserRole::Admin
    }

    pub fn is_moderator(&self) -> bool {
        matches!(self.role, UserRole::Moderator | UserRole::Admin)
    }
}

/// Authenticated request context, decoded from a bearer token.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub id: i64,
    pub email: String,
    pub role: UserRole,
    pub email_verified: bool,
}

impl AuthUser {
    pub fn require_permission(&self, permission: Permission) -> Result<(), AppError> {
        if has_permission(self.role, permission) {
            Ok(())
        } else {
            Err(AppError::new(
                ErrorCode::Forbidden,
                format!("{permission} permission required"),
            ))
        }
    }
}

impl From<Claims> for AuthUser {
    fn from(claims: Claims) -> Self {
        Self {
            id: claims.sub,
            email: claims.email,
            role: claims.role,
            email_verified: claims.email_verified,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
    pub token_type: String,
    pub expires_in: i64,
}

impl TokenPair {
    pub fn new(access_token: String, refresh_token: String, expires_in: i64) -> Self {
        Self {
            access_token,
            refresh_token,
            token_type: "Bearer".to_string(),
            expires_in,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_parse_roundtrip() {
        for role in UserRole::ALL {
            assert_eq!(role.to_string().parse::<UserRole>().unwrap(), role);
        }
        assert!("superuser".parse::<UserRole>().is_err());
        assert_eq!("ADMIN".parse::<UserRole>().unwrap(), UserRole::Admin);
    }

    #[test]
    fn permission_matrix_exact() {
        use Permission::*;
        let all = [
            ReadPersons,
            WritePersons,
            DeletePersons,
            ReadUsers,
            WriteUsers,
            DeleteUsers,
            ManageRoles,
            ManageSystem,
        ];

        for p in all {
            assert!(has_permission(UserRole::Admin, p));
        }
        assert!(has_permission(UserRole::User, ReadPersons));
        for p in all.iter().filter(|p| **p != ReadPersons) {
            assert!(!has_permission(UserRole::User, *p));
        }

        let moderator_allowed = [ReadPersons, WritePersons, ReadUsers];
        for p in all {
            assert_eq!(
                has_permission(UserRole::Moderator, p),
                moderator_allowed.contains(&p)
            );
        }
        // moderator never gains admin-only rights
        assert!(!has_permission(UserRole::Moderator, DeletePersons));
        assert!(!has_permission(UserRole::Moderator, ManageRoles));
    }

    #[test]
    fn permission_table_is_complete() {
        verify_permission_table().unwrap();
    }

    #[test]
    fn claims_carry_user_fields() {
        let claims = Claims::new(42, "a@test.com", UserRole::Moderator, true, 3600);
        assert_eq!(claims.sub, 42);
        assert_eq!(claims.email, "a@test.com");
        assert!(claims.email_verified);
        assert!(!claims.is_expired());
        assert!(claims.is_moderator());
        assert!(!claims.is_admin());
        assert!(claims.exp > claims.iat);
    }
}
