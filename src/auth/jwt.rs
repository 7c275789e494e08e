/// JWT Token Generation and Validation
///
/// Creates and verifies the signed, expiring tokens used for authentication.
/// Signing is HS256 with the process-wide configured secret; access and
/// refresh TTLs come from configuration, never from call sites.

use jsonwebtoken::{decode, encode, errors::ErrorKind, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use uuid::Uuid;

use crate::auth::claims::{Claims, TokenType};
use crate::configuration::JwtSettings;
use crate::error::{AppError, TokenError};
use crate::models::Role;

/// Generate a new access token for a user
///
/// # Errors
/// Returns error if token generation fails
pub fn generate_access_token(
    user_id: &Uuid,
    role: Role,
    config: &JwtSettings,
) -> Result<String, AppError> {
    generate_token(user_id, role, TokenType::Access, config.access_token_expiry, config)
}

/// Generate a new refresh token for a user
///
/// # Errors
/// Returns error if token generation fails
pub fn generate_refresh_token(
    user_id: &Uuid,
    role: Role,
    config: &JwtSettings,
) -> Result<String, AppError> {
    generate_token(user_id, role, TokenType::Refresh, config.refresh_token_expiry, config)
}

fn generate_token(
    user_id: &Uuid,
    role: Role,
    token_type: TokenType,
    expiry_seconds: i64,
    config: &JwtSettings,
) -> Result<String, AppError> {
    let claims = Claims::new(*user_id, role, token_type, expiry_seconds, config.issuer.clone());

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(config.secret.as_bytes()),
    )
    .map_err(|e| AppError::Internal(format!("Token generation failed: {}", e)))
}

/// Decode and verify a token's signature, expiry, and issuer.
///
/// # Errors
/// `TokenError::Expired` when the embedded expiry is in the past;
/// `TokenError::Malformed` for anything else (bad signature, wrong issuer,
/// structural damage)
pub fn decode_token(token: &str, config: &JwtSettings) -> Result<Claims, TokenError> {
    let mut validation = Validation::new(Algorithm::HS256);
    // Verify issuer matches configuration
    validation.set_issuer(&[&config.issuer]);

    decode::<Claims>(
        token,
        &DecodingKey::from_secret(config.secret.as_bytes()),
        &validation,
    )
    .map(|data| data.claims)
    .map_err(|e| {
        tracing::warn!("JWT validation error: {}", e);
        match e.kind() {
            ErrorKind::ExpiredSignature => TokenError::Expired,
            _ => TokenError::Malformed,
        }
    })
}

/// Decode a token and demand a specific token type.
///
/// # Errors
/// Like [`decode_token`], plus `TokenError::WrongType` when the type
/// discriminator does not match the calling context
pub fn verify_token(
    token: &str,
    expected: TokenType,
    config: &JwtSettings,
) -> Result<Claims, TokenError> {
    let claims = decode_token(token, config)?;
    if claims.token_type()? != expected {
        tracing::warn!(
            expected = expected.as_str(),
            actual = %claims.typ,
            "Token type mismatch"
        );
        return Err(TokenError::WrongType);
    }
    Ok(claims)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn get_test_config() -> JwtSettings {
        JwtSettings {
            secret: "test-secret-key-at-least-32-characters-long".to_string(),
            access_token_expiry: 3600,
            refresh_token_expiry: 604800,
            issuer: "test".to_string(),
        }
    }

    #[test]
    fn test_generate_and_verify_access_token() {
        let config = get_test_config();
        let user_id = Uuid::new_v4();

        let token = generate_access_token(&user_id, Role::User, &config)
            .expect("Failed to generate token");
        let claims = verify_token(&token, TokenType::Access, &config)
            .expect("Failed to verify token");

        assert_eq!(claims.sub, user_id.to_string());
        assert_eq!(claims.role, "user");
        assert_eq!(claims.iss, "test");
    }

    #[test]
    fn test_round_trip_preserves_subject_and_role() {
        let config = get_test_config();
        let user_id = Uuid::new_v4();

        let token = generate_refresh_token(&user_id, Role::Admin, &config)
            .expect("Failed to generate token");
        let claims = verify_token(&token, TokenType::Refresh, &config)
            .expect("Failed to verify token");

        assert_eq!(claims.user_id().unwrap(), user_id);
        assert_eq!(claims.role().unwrap(), Role::Admin);
    }

    #[test]
    fn test_access_token_rejected_on_refresh_path() {
        let config = get_test_config();
        let user_id = Uuid::new_v4();

        let access = generate_access_token(&user_id, Role::User, &config).unwrap();
        let result = verify_token(&access, TokenType::Refresh, &config);

        assert_eq!(result.unwrap_err(), TokenError::WrongType);
    }

    #[test]
    fn test_refresh_token_rejected_on_access_path() {
        let config = get_test_config();
        let user_id = Uuid::new_v4();

        let refresh = generate_refresh_token(&user_id, Role::User, &config).unwrap();
        let result = verify_token(&refresh, TokenType::Access, &config);

        assert_eq!(result.unwrap_err(), TokenError::WrongType);
    }

    #[test]
    fn test_invalid_token() {
        let config = get_test_config();
        let result = decode_token("invalid.token.here", &config);

        assert_eq!(result.unwrap_err(), TokenError::Malformed);
    }

    #[test]
    fn test_tampered_token() {
        let config = get_test_config();
        let user_id = Uuid::new_v4();

        let token = generate_access_token(&user_id, Role::User, &config).unwrap();

        // Tamper with token
        let tampered = format!("{}X", token);
        let result = decode_token(&tampered, &config);

        assert_eq!(result.unwrap_err(), TokenError::Malformed);
    }

    #[test]
    fn test_expired_token_is_distinguished() {
        let config = get_test_config();
        // Mint a token whose expiry is well past the default leeway
        let mut claims = Claims::new(
            Uuid::new_v4(),
            Role::User,
            TokenType::Access,
            3600,
            config.issuer.clone(),
        );
        claims.iat = chrono::Utc::now().timestamp() - 7200;
        claims.exp = chrono::Utc::now().timestamp() - 3600;

        let token = encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(config.secret.as_bytes()),
        )
        .unwrap();

        assert_eq!(decode_token(&token, &config).unwrap_err(), TokenError::Expired);
    }

    #[test]
    fn test_wrong_issuer() {
        let mut config = get_test_config();
        let user_id = Uuid::new_v4();

        let token = generate_access_token(&user_id, Role::User, &config).unwrap();

        // Change issuer in validation config
        config.issuer = "wrong-issuer".to_string();
        let result = decode_token(&token, &config);

        assert_eq!(result.unwrap_err(), TokenError::Malformed);
    }

    #[test]
    fn test_wrong_secret() {
        let config = get_test_config();
        let user_id = Uuid::new_v4();

        let token = generate_access_token(&user_id, Role::User, &config).unwrap();

        let other = JwtSettings {
            secret: "another-secret-key-also-32-characters-xx".to_string(),
            ..get_test_config()
        };
        assert_eq!(decode_token(&token, &other).unwrap_err(), TokenError::Malformed);
    }
}
