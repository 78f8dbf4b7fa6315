// handlers/public/usage.rs - Usage counters readable without a session

use axum::{
    extract::{rejection::JsonRejection, State},
    Json,
};
use serde::Deserialize;

use crate::database::models::{EndpointUsage, UserUsage};
use crate::error::ApiError;
use crate::middleware::{ApiResponse, ApiResult};
use crate::state::AppState;

/// GET /get-user-usage - All per-user counters, ordered by user id
pub async fn user_usage_get(State(state): State<AppState>) -> ApiResult<Vec<UserUsage>> {
    Ok(ApiResponse::success(state.ledger.user_usage().await?))
}

/// GET /get-endpoint-usage - All per-endpoint counters, ordered by endpoint then method
pub async fn endpoint_usage_get(State(state): State<AppState>) -> ApiResult<Vec<EndpointUsage>> {
    Ok(ApiResponse::success(state.ledger.endpoint_usage().await?))
}

#[derive(Debug, Deserialize)]
pub struct EndpointHit {
    pub endpoint: Option<String>,
    pub method: Option<String>,
}

/// POST /add-endpoint-usage - Record a hit reported by the caller
///
/// Expected Input:
/// ```json
/// { "endpoint": "/reports", "method": "GET" }
/// ```
pub async fn endpoint_usage_post(
    State(state): State<AppState>,
    payload: Result<Json<EndpointHit>, JsonRejection>,
) -> ApiResult<EndpointUsage> {
    let Json(hit) = payload?;

    let (endpoint, method) = match (non_blank(hit.endpoint), non_blank(hit.method)) {
        (Some(endpoint), Some(method)) => (endpoint, method.to_ascii_uppercase()),
        _ => return Err(ApiError::bad_request("Endpoint and method are required")),
    };

    let usage = state.ledger.record_endpoint_hit(&endpoint, &method).await?;
    Ok(ApiResponse::success(usage))
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}
