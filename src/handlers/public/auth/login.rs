// handlers/public/auth/login.rs - POST /login handler

use axum::{
    extract::{rejection::JsonRejection, State},
    Json,
};
use serde::Serialize;

use super::Credentials;
use crate::middleware::{session_cookie, ApiResponse, ApiResult};
use crate::state::AppState;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginResponse {
    pub is_admin: bool,
    pub message: &'static str,
}

/**
 * POST /login - Authenticate and receive a session cookie
 *
 * Expected Input:
 * ```json
 * { "username": "a@b.com", "password": "pw1" }
 * ```
 *
 * Expected Output (Success):
 * ```json
 * { "success": true, "data": { "isAdmin": false, "message": "Login successful" } }
 * ```
 *
 * The token travels only in the `auth-token` cookie. Unknown usernames and wrong
 * passwords both answer 401 with the same message.
 */
pub async fn login_post(
    State(state): State<AppState>,
    payload: Result<Json<Credentials>, JsonRejection>,
) -> ApiResult<LoginResponse> {
    let Json(credentials) = payload?;

    let outcome = state
        .accounts
        .login(&credentials.username, &credentials.password)
        .await?;

    let cookie = session_cookie(&outcome.token, &state.config.security)?;

    Ok(ApiResponse::success(LoginResponse {
        is_admin: outcome.identity.is_admin,
        message: "Login successful",
    })
    .with_cookie(cookie))
}
