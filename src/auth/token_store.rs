/// Refresh Token Store
///
/// Persistent record of issued refresh tokens and their revocation state.
/// Tokens are hashed with SHA-256 before storage (never store plaintext)
/// and are only ever flagged revoked, never deleted, so the table doubles
/// as an audit trail.
///
/// The store is the source of truth for refresh/logout: a token whose
/// signature still verifies but whose record is missing or revoked must be
/// rejected. A leaked-but-revoked token stops working immediately, before
/// its embedded expiry, which a stateless signature check cannot guarantee.

use chrono::{Duration, Utc};
use sha2::{Digest, Sha256};
use sqlx::PgPool;
use uuid::Uuid;

use crate::error::{AppError, AuthError};
use crate::models::RefreshTokenRecord;

/// Hash a refresh token using SHA-256
pub fn hash_token(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Save a refresh token to the database
///
/// One record per login. The unique constraint on `token_hash` closes any
/// race on duplicate token strings.
///
/// # Errors
/// Returns error if database operation fails
pub async fn save_refresh_token(
    pool: &PgPool,
    user_id: Uuid,
    token: &str,
    expiry_seconds: i64,
) -> Result<RefreshTokenRecord, AppError> {
    let token_hash = hash_token(token);
    let now = Utc::now();
    let expires_at = now + Duration::seconds(expiry_seconds);

    let record = sqlx::query_as::<_, RefreshTokenRecord>(
        r#"
        INSERT INTO refresh_tokens (id, user_id, token_hash, revoked, created_at, expires_at)
        VALUES ($1, $2, $3, false, $4, $5)
        RETURNING id, user_id, token_hash, revoked, created_at, expires_at
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(user_id)
    .bind(token_hash)
    .bind(now)
    .bind(expires_at)
    .fetch_one(pool)
    .await?;

    Ok(record)
}

/// Look up a refresh token record by its plaintext token string
pub async fn find_by_token(
    pool: &PgPool,
    token: &str,
) -> Result<Option<RefreshTokenRecord>, AppError> {
    let token_hash = hash_token(token);

    let record = sqlx::query_as::<_, RefreshTokenRecord>(
        r#"
        SELECT id, user_id, token_hash, revoked, created_at, expires_at
        FROM refresh_tokens
        WHERE token_hash = $1
        "#,
    )
    .bind(token_hash)
    .fetch_optional(pool)
    .await?;

    Ok(record)
}

/// Validate a refresh token against the store
///
/// Checks:
/// 1. Token exists in database
/// 2. Token has not been revoked
/// 3. Token has not expired
///
/// All three rejections collapse to the same external outcome; the
/// distinction is logged.
///
/// # Errors
/// `AuthError::InvalidRefreshToken` if the record is missing, revoked, or
/// expired
pub async fn validate_refresh_token(
    pool: &PgPool,
    token: &str,
) -> Result<RefreshTokenRecord, AppError> {
    match find_by_token(pool, token).await? {
        None => {
            tracing::warn!("Refresh token not found in database");
            Err(AppError::Auth(AuthError::InvalidRefreshToken))
        }
        Some(record) => {
            if record.revoked {
                tracing::warn!(user_id = %record.user_id, "Attempt to use revoked refresh token");
                return Err(AppError::Auth(AuthError::InvalidRefreshToken));
            }

            if record.is_expired() {
                tracing::info!(user_id = %record.user_id, "Refresh token expired");
                return Err(AppError::Auth(AuthError::InvalidRefreshToken));
            }

            Ok(record)
        }
    }
}

/// Revoke one of the caller's own tokens by record id
///
/// Returns false when the record doesn't exist or belongs to someone else;
/// revoking an already-revoked token is a no-op success.
pub async fn revoke_for_user(
    pool: &PgPool,
    token_id: Uuid,
    user_id: Uuid,
) -> Result<bool, AppError> {
    let result = sqlx::query(
        r#"
        UPDATE refresh_tokens
        SET revoked = true
        WHERE id = $1 AND user_id = $2
        "#,
    )
    .bind(token_id)
    .bind(user_id)
    .execute(pool)
    .await?;

    Ok(result.rows_affected() > 0)
}

/// Revoke one of the caller's own tokens by plaintext token string
pub async fn revoke_by_token_for_user(
    pool: &PgPool,
    token: &str,
    user_id: Uuid,
) -> Result<bool, AppError> {
    let token_hash = hash_token(token);

    let result = sqlx::query(
        r#"
        UPDATE refresh_tokens
        SET revoked = true
        WHERE token_hash = $1 AND user_id = $2
        "#,
    )
    .bind(token_hash)
    .bind(user_id)
    .execute(pool)
    .await?;

    Ok(result.rows_affected() > 0)
}

/// Revoke any token by plaintext token string (admin surface)
pub async fn revoke_by_token(pool: &PgPool, token: &str) -> Result<bool, AppError> {
    let token_hash = hash_token(token);

    let result = sqlx::query(
        r#"
        UPDATE refresh_tokens
        SET revoked = true
        WHERE token_hash = $1
        "#,
    )
    .bind(token_hash)
    .execute(pool)
    .await?;

    Ok(result.rows_affected() > 0)
}

/// Revoke all refresh tokens for a user
///
/// Used for "log out everywhere" and the admin revoke-all action. Returns
/// the number of tokens newly revoked.
pub async fn revoke_all_for_user(pool: &PgPool, user_id: Uuid) -> Result<u64, AppError> {
    let result = sqlx::query(
        r#"
        UPDATE refresh_tokens
        SET revoked = true
        WHERE user_id = $1 AND revoked = false
        "#,
    )
    .bind(user_id)
    .execute(pool)
    .await?;

    tracing::info!(user_id = %user_id, revoked = result.rows_affected(), "All refresh tokens revoked for user");
    Ok(result.rows_affected())
}

/// List a user's refresh token records, newest first
pub async fn list_for_user(
    pool: &PgPool,
    user_id: Uuid,
) -> Result<Vec<RefreshTokenRecord>, AppError> {
    let records = sqlx::query_as::<_, RefreshTokenRecord>(
        r#"
        SELECT id, user_id, token_hash, revoked, created_at, expires_at
        FROM refresh_tokens
        WHERE user_id = $1
        ORDER BY created_at DESC
        "#,
    )
    .bind(user_id)
    .fetch_all(pool)
    .await?;

    Ok(records)
}

/// List every refresh token record (admin surface), newest first
pub async fn list_all(pool: &PgPool) -> Result<Vec<RefreshTokenRecord>, AppError> {
    let records = sqlx::query_as::<_, RefreshTokenRecord>(
        r#"
        SELECT id, user_id, token_hash, revoked, created_at, expires_at
        FROM refresh_tokens
        ORDER BY created_at DESC
        "#,
    )
    .fetch_all(pool)
    .await?;

    Ok(records)
}
