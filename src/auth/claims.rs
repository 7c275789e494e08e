/// JWT Claims structure
///
/// Represents the payload of a JWT token containing the subject identity,
/// role, and standard JWT claims (RFC 7519). Every token carries a type
/// discriminator so a refresh token can never be replayed as an access
/// token or vice versa.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{AppError, TokenError};
use crate::models::Role;

/// Token type discriminator, carried in the `typ` claim.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenType {
    Access,
    Refresh,
}

impl TokenType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TokenType::Access => "access",
            TokenType::Refresh => "refresh",
        }
    }
}

/// JWT claims for access and refresh tokens
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    /// Subject (user ID as UUID string)
    pub sub: String,
    /// Role at issuance time; authorization reads this claim, so a role
    /// change only reaches tokens issued afterwards
    pub role: String,
    /// Token type discriminator ("access" or "refresh")
    pub typ: String,
    /// Expiration time (Unix timestamp)
    pub exp: i64,
    /// Issued at (Unix timestamp)
    pub iat: i64,
    /// Issuer
    pub iss: String,
    /// Unique token id; keeps two tokens minted for the same subject in the
    /// same second from serializing identically
    pub jti: String,
}

impl Claims {
    pub fn new(
        user_id: Uuid,
        role: Role,
        token_type: TokenType,
        expiry_seconds: i64,
        issuer: String,
    ) -> Self {
        let now = chrono::Utc::now().timestamp();
        Self {
            sub: user_id.to_string(),
            role: role.as_str().to_string(),
            typ: token_type.as_str().to_string(),
            exp: now + expiry_seconds,
            iat: now,
            iss: issuer,
            jti: Uuid::new_v4().to_string(),
        }
    }

    /// Extract the subject user ID.
    ///
    /// A subject that is not a UUID means the token was not minted here;
    /// treated as malformed.
    pub fn user_id(&self) -> Result<Uuid, AppError> {
        Uuid::parse_str(&self.sub).map_err(|_| AppError::Token(TokenError::Malformed))
    }

    /// Extract the role claim. Unrecognized values fail closed.
    pub fn role(&self) -> Result<Role, AppError> {
        Role::parse_claim(&self.role)
    }

    /// Extract the token type discriminator.
    pub fn token_type(&self) -> Result<TokenType, TokenError> {
        match self.typ.as_str() {
            "access" => Ok(TokenType::Access),
            "refresh" => Ok(TokenType::Refresh),
            _ => Err(TokenError::Malformed),
        }
    }

    /// Check if token has expired
    pub fn is_expired(&self) -> bool {
        let now = chrono::Utc::now().timestamp();
        self.exp < now
    }
}
