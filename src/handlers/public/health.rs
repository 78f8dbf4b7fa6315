use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use serde_json::{json, Value};

use crate::state::AppState;

/// GET / - service description
pub async fn root() -> Json<Value> {
    let version = env!("CARGO_PKG_VERSION");

    Json(json!({
        "success": true,
        "data": {
            "name": "Usage Gateway",
            "version": version,
            "description": "Authenticated API gateway with per-user and per-endpoint usage tracking",
            "endpoints": {
                "home": "/, /health (public)",
                "auth": "/register, /login, /logout (public)",
                "usage": "/get-user-usage, /get-endpoint-usage, /add-endpoint-usage (public)",
                "account": "/me, /update-user, /delete-user, /get-users (protected)",
                "tracking": "/update-user-usage, /get-self-usage (protected)",
                "query": "/api/v1/sql (protected)",
            }
        }
    }))
}

/// GET /health - liveness plus a storage round trip
pub async fn health(State(state): State<AppState>) -> impl IntoResponse {
    let now = chrono::Utc::now();

    match state.store.health_check().await {
        Ok(_) => (
            StatusCode::OK,
            Json(json!({
                "success": true,
                "data": {
                    "status": "ok",
                    "timestamp": now,
                    "database": "ok"
                }
            })),
        ),
        Err(e) => {
            tracing::error!("Health check failed: {}", e);
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({
                    "success": false,
                    "error": "database unavailable",
                    "data": {
                        "status": "degraded",
                        "timestamp": now
                    }
                })),
            )
        }
    }
}
