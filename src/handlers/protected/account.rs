use axum::{
    extract::{rejection::JsonRejection, State},
    Extension, Json,
};
use serde::Serialize;
use serde_json::{json, Map, Value};

use crate::database::models::Identity;
use crate::middleware::{clear_session_cookie, ApiResponse, ApiResult, AuthUser};
use crate::services::UpdatableField;
use crate::state::AppState;

/// GET /me - the caller's identity record
pub async fn me_get(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
) -> ApiResult<Identity> {
    Ok(ApiResponse::success(state.accounts.profile(user.id).await?))
}

#[derive(Debug, Serialize)]
pub struct UpdateResponse {
    pub message: &'static str,
    pub user: Identity,
}

/// PUT /update-user - change the caller's username or password
///
/// Expected Input (exactly one field):
/// ```json
/// { "username": "new@b.com" }
/// ```
pub async fn update_user_put(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    payload: Result<Json<Map<String, Value>>, JsonRejection>,
) -> ApiResult<UpdateResponse> {
    let Json(body) = payload?;
    let field = UpdatableField::from_body(&body)?;

    let updated = state.accounts.update_field(user.id, field).await?;

    Ok(ApiResponse::success(UpdateResponse {
        message: "User updated successfully",
        user: updated,
    }))
}

/// DELETE /delete-user - remove the caller's identity and end the session
pub async fn delete_user_delete(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
) -> ApiResult<Value> {
    state.accounts.delete_user(user.id).await?;

    Ok(
        ApiResponse::success(json!({ "message": "User deleted successfully" }))
            .with_cookie(clear_session_cookie(&state.config.security)),
    )
}

/// GET /get-users - every identity, admins only
pub async fn users_get(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
) -> ApiResult<Vec<Identity>> {
    Ok(ApiResponse::success(
        state.accounts.list_identities(user.id).await?,
    ))
}
