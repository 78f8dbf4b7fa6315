// handlers/public/auth/logout.rs - GET /logout handler

use axum::extract::State;
use serde_json::{json, Value};

use crate::middleware::{clear_session_cookie, ApiResponse};
use crate::state::AppState;

/// GET /logout - Expire the session cookie. Always succeeds.
pub async fn logout_get(State(state): State<AppState>) -> ApiResponse<Value> {
    ApiResponse::success(json!({ "message": "Logged out successfully" }))
        .with_cookie(clear_session_cookie(&state.config.security))
}
