/// Authentication Routes
///
/// Handles user registration, login, token refresh, and logout.

use actix_web::{web, HttpResponse};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use uuid::Uuid;

use crate::auth::{
    generate_access_token, generate_refresh_token, hash_password, revoke_by_token_for_user,
    save_refresh_token, validate_refresh_token, verify_password, verify_token, TokenType,
};
use crate::configuration::JwtSettings;
use crate::error::{AppError, AuthError, DatabaseError, ErrorContext};
use crate::models::{Principal, Role, User};
use crate::validators::{is_valid_email, is_valid_username};

/// User registration request
#[derive(Deserialize)]
pub struct RegisterRequest {
    pub username: String,
    pub email: String,
    pub password: String,
}

/// User login request; the identifier may be a username or an email
#[derive(Deserialize)]
pub struct LoginRequest {
    pub identifier: String,
    pub password: String,
}

/// Token refresh / revocation request
#[derive(Deserialize)]
pub struct RefreshRequest {
    pub refresh_token: String,
}

/// Authentication response with access and refresh tokens
#[derive(Serialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub refresh_token: String,
    pub token_type: String,
    pub expires_in: i64,
}

/// User information response
#[derive(Serialize)]
pub struct UserResponse {
    pub id: String,
    pub username: String,
    pub email: String,
    pub role: String,
    pub created_at: String,
}

impl UserResponse {
    pub fn from_user(user: &User) -> Self {
        Self {
            id: user.id.to_string(),
            username: user.username.clone(),
            email: user.email.clone(),
            role: user.role.clone(),
            created_at: user.created_at.to_rfc3339(),
        }
    }
}

const USER_COLUMNS: &str = "id, username, email, password_hash, role, created_at";

/// POST /users/register
///
/// Register a new user with username, email, and password. New accounts
/// always start with the `user` role.
///
/// # Errors
/// - 400: Validation errors (invalid username/email/password)
/// - 409: Username or email already registered. Uniqueness is enforced by
///   the database constraints, so two concurrent registrations of the same
///   name produce exactly one success and one conflict.
pub async fn register(
    form: web::Json<RegisterRequest>,
    pool: web::Data<PgPool>,
) -> Result<HttpResponse, AppError> {
    let context = ErrorContext::new("user_registration");

    // Validate inputs
    let username = is_valid_username(&form.username)?;
    let email = is_valid_email(&form.email)?;
    let password_hash = hash_password(&form.password)?;

    // Create user in database; a unique violation surfaces as 409
    let user = sqlx::query_as::<_, User>(&format!(
        r#"
        INSERT INTO users (id, username, email, password_hash, role, created_at)
        VALUES ($1, $2, $3, $4, $5, $6)
        RETURNING {USER_COLUMNS}
        "#
    ))
    .bind(Uuid::new_v4())
    .bind(&username)
    .bind(&email)
    .bind(&password_hash)
    .bind(Role::User.as_str())
    .bind(Utc::now())
    .fetch_one(pool.get_ref())
    .await?;

    tracing::info!(
        request_id = %context.request_id,
        user_id = %user.id,
        "User registered successfully"
    );

    Ok(HttpResponse::Created().json(UserResponse::from_user(&user)))
}

/// POST /users/login
///
/// Authenticate with a username-or-email identifier and password.
/// Returns access token and refresh token on success; the refresh token is
/// recorded server-side so it can be revoked later.
///
/// # Errors
/// - 401: Invalid credentials (identifier not found or wrong password)
/// - 500: Internal server error
///
/// # Security Notes
/// - Uses same error for "not found" and "wrong password"
/// - Prevents user enumeration attacks
pub async fn login(
    form: web::Json<LoginRequest>,
    pool: web::Data<PgPool>,
    jwt_config: web::Data<JwtSettings>,
) -> Result<HttpResponse, AppError> {
    let context = ErrorContext::new("user_login");

    let user = sqlx::query_as::<_, User>(&format!(
        "SELECT {USER_COLUMNS} FROM users WHERE username = $1 OR email = $1"
    ))
    .bind(&form.identifier)
    .fetch_optional(pool.get_ref())
    .await?
    .ok_or(AppError::Auth(AuthError::InvalidCredentials))?;

    // Same outcome as an unknown identifier
    if !verify_password(&form.password, &user.password_hash) {
        return Err(AppError::Auth(AuthError::InvalidCredentials));
    }

    let role = user.role()?;

    // Mint the pair and persist the refresh token
    let access_token = generate_access_token(&user.id, role, jwt_config.get_ref())?;
    let refresh_token = generate_refresh_token(&user.id, role, jwt_config.get_ref())?;

    save_refresh_token(
        pool.get_ref(),
        user.id,
        &refresh_token,
        jwt_config.refresh_token_expiry,
    )
    .await?;

    tracing::info!(
        request_id = %context.request_id,
        user_id = %user.id,
        "User logged in successfully"
    );

    Ok(HttpResponse::Ok().json(TokenResponse {
        access_token,
        refresh_token,
        token_type: "bearer".to_string(),
        expires_in: jwt_config.access_token_expiry,
    }))
}

/// POST /users/refresh
///
/// Exchange a refresh token for a new access token. The refresh token is
/// NOT rotated: it stays usable until its own expiry or revocation.
///
/// Verification is two-layer: the codec checks signature, expiry, and the
/// type discriminator; the store check is authoritative for existence and
/// revocation. Every rejection collapses to the same 401 externally - the
/// distinction is logged.
pub async fn refresh(
    form: web::Json<RefreshRequest>,
    pool: web::Data<PgPool>,
    jwt_config: web::Data<JwtSettings>,
) -> Result<HttpResponse, AppError> {
    let context = ErrorContext::new("token_refresh");

    let claims = verify_token(&form.refresh_token, TokenType::Refresh, jwt_config.get_ref())
        .map_err(|e| {
            tracing::warn!(
                request_id = %context.request_id,
                error = %e,
                "Refresh token failed codec verification"
            );
            AppError::Auth(AuthError::InvalidRefreshToken)
        })?;

    let record = validate_refresh_token(pool.get_ref(), &form.refresh_token).await?;

    // The token's subject must match the stored owner
    let claimed_user = claims
        .user_id()
        .map_err(|_| AppError::Auth(AuthError::InvalidRefreshToken))?;
    if claimed_user != record.user_id {
        tracing::warn!(
            request_id = %context.request_id,
            user_id = %record.user_id,
            "Refresh token subject does not match stored owner"
        );
        return Err(AppError::Auth(AuthError::InvalidRefreshToken));
    }

    // Resolve the owner; the role is read fresh so the new access token
    // carries the user's current role
    let user = sqlx::query_as::<_, User>(&format!(
        "SELECT {USER_COLUMNS} FROM users WHERE id = $1"
    ))
    .bind(record.user_id)
    .fetch_optional(pool.get_ref())
    .await?
    .ok_or_else(|| {
        tracing::warn!(
            request_id = %context.request_id,
            user_id = %record.user_id,
            "Refresh token owner no longer resolves"
        );
        AppError::Auth(AuthError::InvalidRefreshToken)
    })?;

    let role = user.role()?;
    let access_token = generate_access_token(&user.id, role, jwt_config.get_ref())?;

    tracing::info!(
        request_id = %context.request_id,
        user_id = %user.id,
        "Token refreshed successfully"
    );

    Ok(HttpResponse::Ok().json(TokenResponse {
        access_token,
        refresh_token: form.refresh_token.clone(),
        token_type: "bearer".to_string(),
        expires_in: jwt_config.access_token_expiry,
    }))
}

/// POST /users/logout
///
/// Revoke exactly the presented refresh token, scoped to the caller.
/// Revoking an already-revoked token succeeds (no-op); a token that does
/// not exist for this caller is 404.
pub async fn logout(
    form: web::Json<RefreshRequest>,
    principal: web::ReqData<Principal>,
    pool: web::Data<PgPool>,
) -> Result<HttpResponse, AppError> {
    let revoked =
        revoke_by_token_for_user(pool.get_ref(), &form.refresh_token, principal.user_id).await?;

    if !revoked {
        return Err(AppError::Database(DatabaseError::NotFound(
            "refresh token not found".to_string(),
        )));
    }

    tracing::info!(user_id = %principal.user_id, "User logged out");

    Ok(HttpResponse::Ok().json(serde_json::json!({ "msg": "logged out" })))
}
