// handlers/public/auth/register.rs - POST /register handler

use axum::{
    extract::{rejection::JsonRejection, State},
    Json,
};
use serde::Serialize;

use super::Credentials;
use crate::middleware::{ApiResponse, ApiResult};
use crate::state::AppState;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterResponse {
    pub user_id: i32,
}

/// POST /register - Create a new identity
///
/// Expected Input:
/// ```json
/// { "username": "a@b.com", "password": "pw1" }
/// ```
///
/// Expected Output (201):
/// ```json
/// { "success": true, "data": { "userId": 1 } }
/// ```
///
/// A username that is not email-shaped, or already taken, is a 400.
pub async fn register_post(
    State(state): State<AppState>,
    payload: Result<Json<Credentials>, JsonRejection>,
) -> ApiResult<RegisterResponse> {
    let Json(credentials) = payload?;

    let user_id = state
        .accounts
        .register(&credentials.username, &credentials.password)
        .await?;

    Ok(ApiResponse::created(RegisterResponse { user_id }))
}
