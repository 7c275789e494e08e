/// JWT Authentication Middleware
///
/// Validates bearer access tokens from the Authorization header and injects
/// the resolved `Principal` into request extensions for route handlers.
/// Expired and structurally invalid tokens produce distinct error codes;
/// an unrecognized role claim fails closed with 403.

use actix_web::{
    dev::{forward_ready, Service, ServiceRequest, ServiceResponse, Transform},
    Error, HttpMessage, HttpResponse,
};
use futures::future::LocalBoxFuture;
use std::rc::Rc;

use crate::auth::{verify_token, TokenType};
use crate::configuration::JwtSettings;
use crate::error::TokenError;
use crate::models::Principal;

/// JWT middleware for protecting routes
///
/// Must be applied to routes that require authentication.
/// Extracts and validates the access token from the Authorization header.
pub struct JwtMiddleware {
    jwt_config: JwtSettings,
}

impl JwtMiddleware {
    /// Create new JWT middleware instance
    pub fn new(jwt_config: JwtSettings) -> Self {
        Self { jwt_config }
    }
}

impl<S, B> Transform<S, ServiceRequest> for JwtMiddleware
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type InitError = ();
    type Transform = JwtMiddlewareService<S>;
    type Future = std::future::Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        std::future::ready(Ok(JwtMiddlewareService {
            service: Rc::new(service),
            jwt_config: self.jwt_config.clone(),
        }))
    }
}

pub struct JwtMiddlewareService<S> {
    service: Rc<S>,
    jwt_config: JwtSettings,
}

impl<S, B> Service<ServiceRequest> for JwtMiddlewareService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        // Extract Authorization header
        let auth_header = req
            .headers()
            .get("Authorization")
            .and_then(|h| h.to_str().ok())
            .and_then(|h| {
                if h.starts_with("Bearer ") {
                    Some(h[7..].to_string())
                } else {
                    None
                }
            });

        let token = match auth_header {
            Some(token) => token,
            None => {
                tracing::warn!("Missing or invalid Authorization header");
                let response = HttpResponse::Unauthorized().json(serde_json::json!({
                    "error": "Missing or invalid authorization header",
                    "code": "MISSING_TOKEN"
                }));
                return Box::pin(async move {
                    Err(actix_web::error::InternalError::from_response(
                        "Unauthorized",
                        response,
                    )
                    .into())
                });
            }
        };

        let claims = match verify_token(&token, TokenType::Access, &self.jwt_config) {
            Ok(claims) => claims,
            Err(e) => {
                tracing::warn!("Access token rejected: {}", e);
                let (code, message) = match e {
                    TokenError::Expired => ("TOKEN_EXPIRED", "Token has expired"),
                    _ => ("TOKEN_INVALID", "Invalid token"),
                };
                let response = HttpResponse::Unauthorized().json(serde_json::json!({
                    "error": message,
                    "code": code
                }));
                return Box::pin(async move {
                    Err(actix_web::error::InternalError::from_response(
                        "Invalid token",
                        response,
                    )
                    .into())
                });
            }
        };

        let user_id = match claims.user_id() {
            Ok(user_id) => user_id,
            Err(_) => {
                tracing::warn!("Access token subject is not a valid user id");
                let response = HttpResponse::Unauthorized().json(serde_json::json!({
                    "error": "Invalid token",
                    "code": "TOKEN_INVALID"
                }));
                return Box::pin(async move {
                    Err(actix_web::error::InternalError::from_response(
                        "Invalid token",
                        response,
                    )
                    .into())
                });
            }
        };

        // Unknown role claims fail closed: authenticated, but never granted
        let role = match claims.role() {
            Ok(role) => role,
            Err(_) => {
                let response = HttpResponse::Forbidden().json(serde_json::json!({
                    "error": "Insufficient privileges",
                    "code": "FORBIDDEN"
                }));
                return Box::pin(async move {
                    Err(actix_web::error::InternalError::from_response(
                        "Forbidden",
                        response,
                    )
                    .into())
                });
            }
        };

        let principal = Principal { user_id, role };

        tracing::debug!(
            user_id = %principal.user_id,
            role = %principal.role,
            "JWT validated successfully"
        );

        // Inject the principal into request extensions
        req.extensions_mut().insert(principal);

        let service = self.service.clone();
        Box::pin(async move { service.call(req).await })
    }
}
