/// Admin Routes
///
/// User and token administration. Every handler gates on
/// `Principal::require_admin`, so an authenticated non-admin gets 403 -
/// distinct from the 401 an unauthenticated caller gets at the middleware.

use actix_web::{web, HttpResponse};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use uuid::Uuid;

use crate::auth::{list_all, list_for_user, revoke_all_for_user, revoke_by_token};
use crate::error::{AppError, DatabaseError, ErrorContext};
use crate::models::{Principal, Role, User};
use crate::routes::auth::{RefreshRequest, UserResponse};
use crate::routes::profile::RefreshTokenResponse;

#[derive(Deserialize)]
pub struct PaginationQuery {
    pub skip: Option<i64>,
    pub limit: Option<i64>,
}

impl PaginationQuery {
    pub fn bounds(&self) -> (i64, i64) {
        (self.skip.unwrap_or(0).max(0), self.limit.unwrap_or(100).clamp(1, 1000))
    }
}

#[derive(Deserialize)]
pub struct RoleUpdateRequest {
    pub role: String,
}

/// User listing entry with the number of refresh tokens on record
#[derive(Serialize)]
pub struct UserWithTokenCount {
    pub id: String,
    pub username: String,
    pub email: String,
    pub role: String,
    pub token_count: i64,
}

const USER_COLUMNS: &str = "id, username, email, password_hash, role, created_at";

async fn find_user_by_username(pool: &PgPool, username: &str) -> Result<User, AppError> {
    sqlx::query_as::<_, User>(&format!(
        "SELECT {USER_COLUMNS} FROM users WHERE username = $1"
    ))
    .bind(username)
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| AppError::Database(DatabaseError::NotFound("User not found".to_string())))
}

/// GET /users
///
/// List users with pagination.
pub async fn list_users(
    query: web::Query<PaginationQuery>,
    principal: web::ReqData<Principal>,
    pool: web::Data<PgPool>,
) -> Result<HttpResponse, AppError> {
    principal.require_admin()?;
    let (skip, limit) = query.bounds();

    let users = sqlx::query_as::<_, User>(&format!(
        "SELECT {USER_COLUMNS} FROM users ORDER BY created_at LIMIT $1 OFFSET $2"
    ))
    .bind(limit)
    .bind(skip)
    .fetch_all(pool.get_ref())
    .await?;

    let body: Vec<UserResponse> = users.iter().map(UserResponse::from_user).collect();
    Ok(HttpResponse::Ok().json(body))
}

/// GET /admin/users
///
/// List users with the count of refresh tokens each has on record.
pub async fn list_users_with_token_counts(
    query: web::Query<PaginationQuery>,
    principal: web::ReqData<Principal>,
    pool: web::Data<PgPool>,
) -> Result<HttpResponse, AppError> {
    principal.require_admin()?;
    let (skip, limit) = query.bounds();

    let rows = sqlx::query_as::<_, (Uuid, String, String, String, i64)>(
        r#"
        SELECT u.id, u.username, u.email, u.role, COUNT(rt.id) AS token_count
        FROM users u
        LEFT JOIN refresh_tokens rt ON rt.user_id = u.id
        GROUP BY u.id, u.username, u.email, u.role, u.created_at
        ORDER BY u.created_at
        LIMIT $1 OFFSET $2
        "#,
    )
    .bind(limit)
    .bind(skip)
    .fetch_all(pool.get_ref())
    .await?;

    let body: Vec<UserWithTokenCount> = rows
        .into_iter()
        .map(|(id, username, email, role, token_count)| UserWithTokenCount {
            id: id.to_string(),
            username,
            email,
            role,
            token_count,
        })
        .collect();

    Ok(HttpResponse::Ok().json(body))
}

/// POST /users/{username}/role
///
/// Change a named user's role. Tokens issued before the change keep their
/// old role claim until the user logs in or refreshes.
pub async fn set_user_role(
    username: web::Path<String>,
    form: web::Json<RoleUpdateRequest>,
    principal: web::ReqData<Principal>,
    pool: web::Data<PgPool>,
) -> Result<HttpResponse, AppError> {
    principal.require_admin()?;
    let context = ErrorContext::new("role_change");

    let role = Role::parse_input(&form.role)?;

    let user = sqlx::query_as::<_, User>(&format!(
        r#"
        UPDATE users SET role = $1 WHERE username = $2
        RETURNING {USER_COLUMNS}
        "#
    ))
    .bind(role.as_str())
    .bind(username.as_str())
    .fetch_optional(pool.get_ref())
    .await?
    .ok_or_else(|| AppError::Database(DatabaseError::NotFound("User not found".to_string())))?;

    tracing::info!(
        request_id = %context.request_id,
        admin_id = %principal.user_id,
        user_id = %user.id,
        role = %role,
        "User role changed"
    );

    Ok(HttpResponse::Ok().json(UserResponse::from_user(&user)))
}

/// POST /users/{username}/revoke_all
///
/// Revoke every refresh token owned by the named user.
pub async fn revoke_all_tokens_for_user(
    username: web::Path<String>,
    principal: web::ReqData<Principal>,
    pool: web::Data<PgPool>,
) -> Result<HttpResponse, AppError> {
    principal.require_admin()?;

    let user = find_user_by_username(pool.get_ref(), username.as_str()).await?;
    let revoked = revoke_all_for_user(pool.get_ref(), user.id).await?;

    Ok(HttpResponse::Ok().json(serde_json::json!({
        "msg": "revoked all",
        "revoked": revoked
    })))
}

/// GET /admin/tokens
///
/// List every refresh-token record.
pub async fn list_all_tokens(
    principal: web::ReqData<Principal>,
    pool: web::Data<PgPool>,
) -> Result<HttpResponse, AppError> {
    principal.require_admin()?;

    let tokens = list_all(pool.get_ref()).await?;
    let body: Vec<RefreshTokenResponse> =
        tokens.iter().map(RefreshTokenResponse::from_record).collect();

    Ok(HttpResponse::Ok().json(body))
}

/// GET /admin/users/{username}/tokens
///
/// List the refresh tokens of a named user.
pub async fn list_tokens_for_user(
    username: web::Path<String>,
    principal: web::ReqData<Principal>,
    pool: web::Data<PgPool>,
) -> Result<HttpResponse, AppError> {
    principal.require_admin()?;

    let user = find_user_by_username(pool.get_ref(), username.as_str()).await?;
    let tokens = list_for_user(pool.get_ref(), user.id).await?;
    let body: Vec<RefreshTokenResponse> =
        tokens.iter().map(RefreshTokenResponse::from_record).collect();

    Ok(HttpResponse::Ok().json(body))
}

/// POST /admin/tokens/revoke
///
/// Revoke an arbitrary refresh token by its string.
pub async fn revoke_token_by_string(
    form: web::Json<RefreshRequest>,
    principal: web::ReqData<Principal>,
    pool: web::Data<PgPool>,
) -> Result<HttpResponse, AppError> {
    principal.require_admin()?;

    let revoked = revoke_by_token(pool.get_ref(), &form.refresh_token).await?;
    if !revoked {
        return Err(AppError::Database(DatabaseError::NotFound(
            "Token not found".to_string(),
        )));
    }

    Ok(HttpResponse::Ok().json(serde_json::json!({ "msg": "revoked" })))
}
