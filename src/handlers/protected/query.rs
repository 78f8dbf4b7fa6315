use axum::{
    extract::{rejection::JsonRejection, Query, State},
    Extension, Json,
};
use serde::Deserialize;
use serde_json::Value;

use crate::database::models::QueryOutcome;
use crate::middleware::{ApiResponse, ApiResult, AuthUser};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct SqlQuery {
    pub sql: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct SqlRequest {
    pub sql: Option<String>,
    #[serde(default)]
    pub params: Vec<Value>,
}

/// GET /api/v1/sql?sql=... - run a parameterless SELECT or INSERT
pub async fn sql_get(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Query(query): Query<SqlQuery>,
) -> ApiResult<QueryOutcome> {
    tracing::debug!("User {} submitted a gateway query", user.id);
    let sql = query.sql.unwrap_or_default();
    let outcome = state.gateway.execute(&sql, &[]).await?;
    Ok(ApiResponse::success(outcome))
}

/// POST /api/v1/sql - run a SELECT or INSERT with bound parameters
///
/// Expected Input:
/// ```json
/// { "sql": "INSERT INTO t(x) VALUES($1)", "params": [5] }
/// ```
pub async fn sql_post(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    payload: Result<Json<SqlRequest>, JsonRejection>,
) -> ApiResult<QueryOutcome> {
    let Json(request) = payload?;
    tracing::debug!("User {} submitted a gateway query", user.id);

    let sql = request.sql.unwrap_or_default();
    let outcome = state.gateway.execute(&sql, &request.params).await?;
    Ok(ApiResponse::created(outcome))
}
