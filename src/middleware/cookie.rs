use axum::http::HeaderValue;

use crate::config::SecurityConfig;
use crate::error::ApiError;

/// Name of the HTTP-only cookie carrying the session token.
pub const SESSION_COOKIE: &str = "auth-token";

/// `Set-Cookie` value installing a freshly issued session token.
pub fn session_cookie(token: &str, security: &SecurityConfig) -> Result<HeaderValue, ApiError> {
    let value = format!(
        "{}={}; HttpOnly; Path=/; Max-Age={}; {}",
        SESSION_COOKIE,
        token,
        security.token_ttl_secs,
        same_site(security)
    );
    HeaderValue::from_str(&value)
        .map_err(|e| ApiError::internal_server_error(format!("Invalid session cookie: {}", e)))
}

/// `Set-Cookie` value that removes the session cookie from the client.
pub fn clear_session_cookie(security: &SecurityConfig) -> HeaderValue {
    let value = format!(
        "{}=; HttpOnly; Path=/; Max-Age=0; {}",
        SESSION_COOKIE,
        same_site(security)
    );
    // Only static ASCII goes into this value.
    HeaderValue::from_str(&value).unwrap_or_else(|_| HeaderValue::from_static("auth-token=; Max-Age=0"))
}

fn same_site(security: &SecurityConfig) -> &'static str {
    if security.cookie_secure {
        "SameSite=None; Secure"
    } else {
        "SameSite=Lax"
    }
}
