/// User Profile Routes
///
/// Current-user information, profile updates, password change, and
/// self-service refresh-token management. Everything here is scoped to the
/// authenticated caller's own records.

use actix_web::{web, HttpResponse};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use uuid::Uuid;

use crate::auth::{
    hash_password, list_for_user, revoke_by_token_for_user, revoke_for_user, verify_password,
};
use crate::error::{AppError, DatabaseError, ErrorContext, ValidationError};
use crate::models::{Principal, RefreshTokenRecord, User};
use crate::routes::auth::{RefreshRequest, UserResponse};
use crate::validators::{is_valid_email, is_valid_username};

/// Partial profile update; absent fields are left unchanged
#[derive(Deserialize)]
pub struct ProfileUpdateRequest {
    pub username: Option<String>,
    pub email: Option<String>,
}

#[derive(Deserialize)]
pub struct PasswordChangeRequest {
    pub current_password: String,
    pub new_password: String,
}

/// Refresh-token record as exposed over the API.
/// Carries metadata only; the stored hash stays server-side and the
/// plaintext token was only ever shown once, at login.
#[derive(Serialize)]
pub struct RefreshTokenResponse {
    pub id: String,
    pub user_id: String,
    pub revoked: bool,
    pub created_at: String,
    pub expires_at: String,
}

impl RefreshTokenResponse {
    pub fn from_record(record: &RefreshTokenRecord) -> Self {
        Self {
            id: record.id.to_string(),
            user_id: record.user_id.to_string(),
            revoked: record.revoked,
            created_at: record.created_at.to_rfc3339(),
            expires_at: record.expires_at.to_rfc3339(),
        }
    }
}

const USER_COLUMNS: &str = "id, username, email, password_hash, role, created_at";

/// GET /users/me
///
/// Get current authenticated user's information.
pub async fn get_current_user(
    principal: web::ReqData<Principal>,
    pool: web::Data<PgPool>,
) -> Result<HttpResponse, AppError> {
    let user = sqlx::query_as::<_, User>(&format!(
        "SELECT {USER_COLUMNS} FROM users WHERE id = $1"
    ))
    .bind(principal.user_id)
    .fetch_one(pool.get_ref())
    .await?;

    Ok(HttpResponse::Ok().json(UserResponse::from_user(&user)))
}

/// PATCH /users/me
///
/// Update the caller's username and/or email. Collisions with another
/// account are 409; the database constraints back the pre-checks up.
pub async fn update_profile(
    form: web::Json<ProfileUpdateRequest>,
    principal: web::ReqData<Principal>,
    pool: web::Data<PgPool>,
) -> Result<HttpResponse, AppError> {
    let context = ErrorContext::new("profile_update");

    let username = match form.username.as_deref() {
        Some(value) => Some(is_valid_username(value)?),
        None => None,
    };
    let email = match form.email.as_deref() {
        Some(value) => Some(is_valid_email(value)?),
        None => None,
    };

    if username.is_none() && email.is_none() {
        return Err(AppError::Validation(ValidationError::EmptyField(
            "profile update".to_string(),
        )));
    }

    let user = sqlx::query_as::<_, User>(&format!(
        r#"
        UPDATE users
        SET username = COALESCE($1, username), email = COALESCE($2, email)
        WHERE id = $3
        RETURNING {USER_COLUMNS}
        "#
    ))
    .bind(username)
    .bind(email)
    .bind(principal.user_id)
    .fetch_one(pool.get_ref())
    .await?;

    tracing::info!(
        request_id = %context.request_id,
        user_id = %user.id,
        "User updated their profile"
    );

    Ok(HttpResponse::Ok().json(UserResponse::from_user(&user)))
}

/// POST /users/me/change-password
///
/// Change the caller's password after verifying the current one.
pub async fn change_password(
    form: web::Json<PasswordChangeRequest>,
    principal: web::ReqData<Principal>,
    pool: web::Data<PgPool>,
) -> Result<HttpResponse, AppError> {
    let context = ErrorContext::new("password_change");

    let user = sqlx::query_as::<_, User>(&format!(
        "SELECT {USER_COLUMNS} FROM users WHERE id = $1"
    ))
    .bind(principal.user_id)
    .fetch_one(pool.get_ref())
    .await?;

    if !verify_password(&form.current_password, &user.password_hash) {
        return Err(AppError::Validation(ValidationError::InvalidFormat(
            "current_password".to_string(),
        )));
    }

    let password_hash = hash_password(&form.new_password)?;

    sqlx::query("UPDATE users SET password_hash = $1 WHERE id = $2")
        .bind(&password_hash)
        .bind(principal.user_id)
        .execute(pool.get_ref())
        .await?;

    tracing::info!(
        request_id = %context.request_id,
        user_id = %principal.user_id,
        "User changed their password"
    );

    Ok(HttpResponse::Ok().json(serde_json::json!({
        "message": "Password changed successfully"
    })))
}

/// GET /users/me/tokens
///
/// List the caller's refresh-token records, newest first.
pub async fn list_my_tokens(
    principal: web::ReqData<Principal>,
    pool: web::Data<PgPool>,
) -> Result<HttpResponse, AppError> {
    let tokens = list_for_user(pool.get_ref(), principal.user_id).await?;
    let body: Vec<RefreshTokenResponse> =
        tokens.iter().map(RefreshTokenResponse::from_record).collect();

    Ok(HttpResponse::Ok().json(body))
}

/// DELETE /users/me/tokens/{token_id}
///
/// Revoke one of the caller's own tokens by record id. 404 when the record
/// does not exist or belongs to someone else.
pub async fn revoke_my_token(
    token_id: web::Path<Uuid>,
    principal: web::ReqData<Principal>,
    pool: web::Data<PgPool>,
) -> Result<HttpResponse, AppError> {
    let revoked = revoke_for_user(pool.get_ref(), token_id.into_inner(), principal.user_id).await?;

    if !revoked {
        return Err(AppError::Database(DatabaseError::NotFound(
            "refresh token not found".to_string(),
        )));
    }

    Ok(HttpResponse::Ok().json(serde_json::json!({ "msg": "revoked" })))
}

/// POST /users/me/revoke
///
/// Alias for logout: revoke a refresh token string belonging to the caller.
pub async fn revoke_my_token_by_string(
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

    Ok(HttpResponse::Ok().json(serde_json::json!({ "msg": "revoked" })))
}
