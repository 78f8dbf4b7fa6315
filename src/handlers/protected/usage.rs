use axum::{
    extract::{rejection::JsonRejection, State},
    Extension, Json,
};
use serde::Deserialize;

use crate::database::models::UserUsage;
use crate::middleware::{ApiResponse, ApiResult, AuthUser};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct CallOutcome {
    pub success: bool,
}

/// POST /update-user-usage - record one call by the caller
///
/// Expected Input:
/// ```json
/// { "success": true }
/// ```
pub async fn update_user_usage_post(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    payload: Result<Json<CallOutcome>, JsonRejection>,
) -> ApiResult<UserUsage> {
    let Json(outcome) = payload?;
    let usage = state.ledger.record_user_call(user.id, outcome.success).await?;
    Ok(ApiResponse::success(usage))
}

/// GET /get-self-usage - the caller's counter, empty until the first recorded call
pub async fn self_usage_get(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
) -> ApiResult<Vec<UserUsage>> {
    let usage = state.ledger.usage_for(user.id).await?;
    Ok(ApiResponse::success(usage.into_iter().collect()))
}
