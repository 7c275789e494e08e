/// Stateless Arithmetic Routes
///
/// Public two-operand calculator endpoints; nothing is persisted.

use actix_web::{web, HttpResponse};
use serde::Deserialize;

use crate::error::AppError;
use crate::operations::{compute_pair, Operation};

#[derive(Deserialize)]
pub struct OperandsQuery {
    pub a: f64,
    pub b: f64,
}

fn respond(operation: &str, a: f64, b: f64, result: f64) -> HttpResponse {
    HttpResponse::Ok().json(serde_json::json!({
        "operation": operation,
        "a": a,
        "b": b,
        "result": result
    }))
}

/// GET /add
pub async fn add(query: web::Query<OperandsQuery>) -> Result<HttpResponse, AppError> {
    let result = compute_pair(Operation::Add, query.a, query.b)?;
    tracing::info!(a = query.a, b = query.b, result, "add called");
    Ok(respond("add", query.a, query.b, result))
}

/// GET /subtract
pub async fn subtract(query: web::Query<OperandsQuery>) -> Result<HttpResponse, AppError> {
    let result = compute_pair(Operation::Sub, query.a, query.b)?;
    tracing::info!(a = query.a, b = query.b, result, "subtract called");
    Ok(respond("subtract", query.a, query.b, result))
}

/// GET /multiply
pub async fn multiply(query: web::Query<OperandsQuery>) -> Result<HttpResponse, AppError> {
    let result = compute_pair(Operation::Mul, query.a, query.b)?;
    tracing::info!(a = query.a, b = query.b, result, "multiply called");
    Ok(respond("multiply", query.a, query.b, result))
}

/// GET /divide
///
/// 400 when `b` is zero.
pub async fn divide(query: web::Query<OperandsQuery>) -> Result<HttpResponse, AppError> {
    let result = compute_pair(Operation::Div, query.a, query.b)?;
    tracing::info!(a = query.a, b = query.b, result, "divide called");
    Ok(respond("divide", query.a, query.b, result))
}
