/// Domain model types
///
/// Row structs mirror the migration schema; `Role` is a closed enumeration
/// validated at every boundary so an unrecognized stored or claimed role can
/// never silently grant access.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{AppError, AuthError, ValidationError};

/// User role
///
/// `parse_claim` fails closed: a role value we do not recognize is treated
/// as insufficient privilege, never as a default grant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Admin => "admin",
        }
    }

    /// Parse a role from a trusted-ish source (token claim, stored row).
    /// Unknown values fail closed.
    pub fn parse_claim(value: &str) -> Result<Role, AppError> {
        match value {
            "user" => Ok(Role::User),
            "admin" => Ok(Role::Admin),
            other => {
                tracing::warn!(role = other, "Unrecognized role value, failing closed");
                Err(AppError::Auth(AuthError::InsufficientPrivileges))
            }
        }
    }

    /// Parse a role from client input (e.g. a role-change request body).
    pub fn parse_input(value: &str) -> Result<Role, AppError> {
        match value {
            "user" => Ok(Role::User),
            "admin" => Ok(Role::Admin),
            _ => Err(AppError::Validation(ValidationError::InvalidFormat(
                "role".to_string(),
            ))),
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The authenticated identity resolved from a verified access token.
///
/// Role comes from the token claim, not the live user row, so a role change
/// only takes effect on tokens issued afterwards.
#[derive(Debug, Clone)]
pub struct Principal {
    pub user_id: Uuid,
    pub role: Role,
}

impl Principal {
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    /// Admin gate for protected handlers. Authenticated-but-wrong-role is
    /// Forbidden, distinct from Unauthorized.
    pub fn require_admin(&self) -> Result<(), AppError> {
        if self.is_admin() {
            Ok(())
        } else {
            Err(AppError::Auth(AuthError::InsufficientPrivileges))
        }
    }
}

/// users table row
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct User {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    pub password_hash: String,
    pub role: String,
    pub created_at: DateTime<Utc>,
}

impl User {
    pub fn role(&self) -> Result<Role, AppError> {
        Role::parse_claim(&self.role)
    }
}

/// refresh_tokens table row
///
/// `token_hash` is the SHA-256 of the refresh token string; plaintext is
/// never stored. `revoked` only ever transitions false -> true.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct RefreshTokenRecord {
    pub id: Uuid,
    pub user_id: Uuid,
    pub token_hash: String,
    pub revoked: bool,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl RefreshTokenRecord {
    pub fn is_expired(&self) -> bool {
        self.expires_at < Utc::now()
    }

    /// Usable for refresh/logout only while not revoked and not expired.
    pub fn is_active(&self) -> bool {
        !self.revoked && !self.is_expired()
    }
}

/// calculations table row
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct Calculation {
    pub id: Uuid,
    pub user_id: Uuid,
    pub operation: String,
    pub operands: sqlx::types::Json<Vec<f64>>,
    pub result: f64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_round_trip() {
        assert_eq!(Role::parse_claim("user").unwrap(), Role::User);
        assert_eq!(Role::parse_claim("admin").unwrap(), Role::Admin);
        assert_eq!(Role::Admin.as_str(), "admin");
    }

    #[test]
    fn test_unknown_role_fails_closed() {
        let err = Role::parse_claim("superuser").unwrap_err();
        match err {
            AppError::Auth(AuthError::InsufficientPrivileges) => (),
            other => panic!("Expected fail-closed forbidden, got {:?}", other),
        }
    }

    #[test]
    fn test_unknown_role_input_is_a_validation_error() {
        let err = Role::parse_input("root").unwrap_err();
        match err {
            AppError::Validation(_) => (),
            other => panic!("Expected validation error, got {:?}", other),
        }
    }

    #[test]
    fn test_require_admin() {
        let admin = Principal {
            user_id: Uuid::new_v4(),
            role: Role::Admin,
        };
        let user = Principal {
            user_id: Uuid::new_v4(),
            role: Role::User,
        };
        assert!(admin.require_admin().is_ok());
        assert!(user.require_admin().is_err());
    }

    #[test]
    fn test_refresh_token_activity() {
        let record = RefreshTokenRecord {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            token_hash: "abc".to_string(),
            revoked: false,
            created_at: Utc::now(),
            expires_at: Utc::now() + chrono::Duration::days(7),
        };
        assert!(record.is_active());

        let revoked = RefreshTokenRecord {
            revoked: true,
            ..record.clone()
        };
        assert!(!revoked.is_active());

        let expired = RefreshTokenRecord {
            expires_at: Utc::now() - chrono::Duration::seconds(1),
            ..record
        };
        assert!(!expired.is_active());
    }
}
