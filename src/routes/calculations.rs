/// Calculation Routes (BREAD)
///
/// Browse/Read/Edit/Add/Delete over the calculation resource. Results are
/// always recomputed server-side from the operands; client-provided results
/// are ignored. Requests may use the current body shape
/// `{operation, operands}` or the legacy two-operand `{a, b, type}` form.
///
/// Ownership policy: an id that does not exist and an id owned by another
/// user both return 404, so callers cannot probe other users' resources.
/// Admins bypass the ownership filter on by-id operations.

use actix_web::{web, HttpResponse};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use uuid::Uuid;

use crate::error::{AppError, DatabaseError, ValidationError};
use crate::models::{Calculation, Principal};
use crate::operations::{compute, Operation};
use crate::routes::admin::PaginationQuery;

/// Create/replace request; either `{operation, operands}` or the legacy
/// `{a, b, type}` form
#[derive(Deserialize)]
pub struct CalculationCreate {
    pub operation: Option<Operation>,
    pub operands: Option<Vec<f64>>,
    // legacy two-operand form
    pub a: Option<f64>,
    pub b: Option<f64>,
    #[serde(rename = "type")]
    pub legacy_type: Option<Operation>,
}

impl CalculationCreate {
    /// Normalize both accepted shapes to `(operation, operands)`.
    fn normalize(&self) -> Result<(Operation, Vec<f64>), AppError> {
        if let (Some(operation), Some(operands)) = (self.operation, self.operands.as_ref()) {
            return Ok((operation, operands.clone()));
        }
        if let (Some(a), Some(b), Some(operation)) = (self.a, self.b, self.legacy_type) {
            return Ok((operation, vec![a, b]));
        }
        Err(AppError::Validation(ValidationError::EmptyField(
            "operation/operands".to_string(),
        )))
    }
}

/// Partial update request
#[derive(Deserialize)]
pub struct CalculationUpdate {
    pub operation: Option<Operation>,
    pub operands: Option<Vec<f64>>,
    // legacy form patches the first/second operand
    pub a: Option<f64>,
    pub b: Option<f64>,
    #[serde(rename = "type")]
    pub legacy_type: Option<Operation>,
}

#[derive(Serialize)]
pub struct CalculationResponse {
    pub id: String,
    pub user_id: String,
    pub operation: String,
    pub operands: Vec<f64>,
    pub result: f64,
    pub created_at: String,
    pub updated_at: String,
}

impl CalculationResponse {
    fn from_row(calc: &Calculation) -> Self {
        Self {
            id: calc.id.to_string(),
            user_id: calc.user_id.to_string(),
            operation: calc.operation.clone(),
            operands: calc.operands.0.clone(),
            result: calc.result,
            created_at: calc.created_at.to_rfc3339(),
            updated_at: calc.updated_at.to_rfc3339(),
        }
    }
}

const CALC_COLUMNS: &str = "id, user_id, operation, operands, result, created_at, updated_at";

fn not_found() -> AppError {
    AppError::Database(DatabaseError::NotFound("Calculation not found".to_string()))
}

/// Fetch a calculation the principal may act on. Absent rows and rows owned
/// by someone else are indistinguishable from outside.
async fn fetch_for_principal(
    pool: &PgPool,
    calc_id: Uuid,
    principal: &Principal,
) -> Result<Calculation, AppError> {
    let calc = sqlx::query_as::<_, Calculation>(&format!(
        "SELECT {CALC_COLUMNS} FROM calculations WHERE id = $1"
    ))
    .bind(calc_id)
    .fetch_optional(pool)
    .await?
    .ok_or_else(not_found)?;

    if calc.user_id != principal.user_id && !principal.is_admin() {
        tracing::warn!(
            user_id = %principal.user_id,
            calculation_id = %calc_id,
            "Cross-user calculation access denied"
        );
        return Err(not_found());
    }

    Ok(calc)
}

/// GET /calculations
///
/// Browse: the caller's own calculations, oldest first.
pub async fn list_calculations(
    query: web::Query<PaginationQuery>,
    principal: web::ReqData<Principal>,
    pool: web::Data<PgPool>,
) -> Result<HttpResponse, AppError> {
    let (skip, limit) = query.bounds();

    let calcs = sqlx::query_as::<_, Calculation>(&format!(
        r#"
        SELECT {CALC_COLUMNS} FROM calculations
        WHERE user_id = $1
        ORDER BY created_at
        LIMIT $2 OFFSET $3
        "#
    ))
    .bind(principal.user_id)
    .bind(limit)
    .bind(skip)
    .fetch_all(pool.get_ref())
    .await?;

    let body: Vec<CalculationResponse> = calcs.iter().map(CalculationResponse::from_row).collect();
    Ok(HttpResponse::Ok().json(body))
}

/// POST /calculations
///
/// Add: create a calculation for the caller. A zero divisor is rejected
/// before anything touches the database.
pub async fn create_calculation(
    form: web::Json<CalculationCreate>,
    principal: web::ReqData<Principal>,
    pool: web::Data<PgPool>,
) -> Result<HttpResponse, AppError> {
    let (operation, operands) = form.normalize()?;
    let result = compute(operation, &operands)?;

    let now = Utc::now();
    let calc = sqlx::query_as::<_, Calculation>(&format!(
        r#"
        INSERT INTO calculations (id, user_id, operation, operands, result, created_at, updated_at)
        VALUES ($1, $2, $3, $4, $5, $6, $6)
        RETURNING {CALC_COLUMNS}
        "#
    ))
    .bind(Uuid::new_v4())
    .bind(principal.user_id)
    .bind(operation.as_str())
    .bind(sqlx::types::Json(&operands))
    .bind(result)
    .bind(now)
    .fetch_one(pool.get_ref())
    .await?;

    tracing::info!(
        user_id = %principal.user_id,
        calculation_id = %calc.id,
        operation = %operation,
        "Calculation created"
    );

    Ok(HttpResponse::Created().json(CalculationResponse::from_row(&calc)))
}

/// GET /calculations/{calc_id}
///
/// Read: one calculation by id.
pub async fn read_calculation(
    calc_id: web::Path<Uuid>,
    principal: web::ReqData<Principal>,
    pool: web::Data<PgPool>,
) -> Result<HttpResponse, AppError> {
    let calc = fetch_for_principal(pool.get_ref(), calc_id.into_inner(), &principal).await?;
    Ok(HttpResponse::Ok().json(CalculationResponse::from_row(&calc)))
}

/// PUT /calculations/{calc_id}
///
/// Edit: replace an existing calculation and recompute its result.
pub async fn update_calculation(
    calc_id: web::Path<Uuid>,
    form: web::Json<CalculationCreate>,
    principal: web::ReqData<Principal>,
    pool: web::Data<PgPool>,
) -> Result<HttpResponse, AppError> {
    let calc = fetch_for_principal(pool.get_ref(), calc_id.into_inner(), &principal).await?;

    let (operation, operands) = form.normalize()?;
    let result = compute(operation, &operands)?;

    let updated = sqlx::query_as::<_, Calculation>(&format!(
        r#"
        UPDATE calculations
        SET operation = $1, operands = $2, result = $3, updated_at = $4
        WHERE id = $5
        RETURNING {CALC_COLUMNS}
        "#
    ))
    .bind(operation.as_str())
    .bind(sqlx::types::Json(&operands))
    .bind(result)
    .bind(Utc::now())
    .bind(calc.id)
    .fetch_one(pool.get_ref())
    .await?;

    Ok(HttpResponse::Ok().json(CalculationResponse::from_row(&updated)))
}

/// PATCH /calculations/{calc_id}
///
/// Edit: partially update a calculation. `operands` replaces the whole
/// list; legacy `a`/`b` patch the first/second operand. The result is
/// always recomputed.
pub async fn patch_calculation(
    calc_id: web::Path<Uuid>,
    form: web::Json<CalculationUpdate>,
    principal: web::ReqData<Principal>,
    pool: web::Data<PgPool>,
) -> Result<HttpResponse, AppError> {
    let calc = fetch_for_principal(pool.get_ref(), calc_id.into_inner(), &principal).await?;

    let operation = match form.operation.or(form.legacy_type) {
        Some(operation) => operation,
        None => Operation::parse(&calc.operation)
            .map_err(|_| AppError::Internal("stored operation is invalid".to_string()))?,
    };

    let mut operands = match form.operands.as_ref() {
        Some(operands) => operands.clone(),
        None => calc.operands.0.clone(),
    };
    if form.operands.is_none() {
        if let Some(a) = form.a {
            if let Some(first) = operands.get_mut(0) {
                *first = a;
            }
        }
        if let Some(b) = form.b {
            if let Some(second) = operands.get_mut(1) {
                *second = b;
            }
        }
    }

    let result = compute(operation, &operands)?;

    let updated = sqlx::query_as::<_, Calculation>(&format!(
        r#"
        UPDATE calculations
        SET operation = $1, operands = $2, result = $3, updated_at = $4
        WHERE id = $5
        RETURNING {CALC_COLUMNS}
        "#
    ))
    .bind(operation.as_str())
    .bind(sqlx::types::Json(&operands))
    .bind(result)
    .bind(Utc::now())
    .bind(calc.id)
    .fetch_one(pool.get_ref())
    .await?;

    Ok(HttpResponse::Ok().json(CalculationResponse::from_row(&updated)))
}

/// DELETE /calculations/{calc_id}
///
/// Delete: remove a calculation by id.
pub async fn delete_calculation(
    calc_id: web::Path<Uuid>,
    principal: web::ReqData<Principal>,
    pool: web::Data<PgPool>,
) -> Result<HttpResponse, AppError> {
    let calc = fetch_for_principal(pool.get_ref(), calc_id.into_inner(), &principal).await?;

    sqlx::query("DELETE FROM calculations WHERE id = $1")
        .bind(calc.id)
        .execute(pool.get_ref())
        .await?;

    tracing::info!(
        user_id = %principal.user_id,
        calculation_id = %calc.id,
        "Calculation deleted"
    );

    Ok(HttpResponse::NoContent().finish())
}
