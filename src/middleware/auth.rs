use axum::{
    extract::{Request, State},
    http::{header, HeaderMap},
    middleware::Next,
    response::Response,
};

use crate::auth::SessionIdentity;
use crate::error::ApiError;
use crate::middleware::cookie::SESSION_COOKIE;
use crate::services::ServiceError;
use crate::state::AppState;

/// Authenticated caller, attached to the request by [`require_auth`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AuthUser {
    pub id: i32,
    pub username: String,
}

impl From<SessionIdentity> for AuthUser {
    fn from(identity: SessionIdentity) -> Self {
        Self {
            id: identity.id,
            username: identity.username,
        }
    }
}

/// Token authentication middleware for the protected route groups.
///
/// No token is a 401; a token that fails verification is a 403. Nothing is written anywhere,
/// so running the guard twice on the same request gives the same answer.
pub async fn require_auth(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let token = extract_token(request.headers()).ok_or(ServiceError::Unauthenticated)?;

    let identity = state.tokens.verify(&token).map_err(ServiceError::from)?;
    tracing::debug!("Authenticated user {}", identity.id);

    request.extensions_mut().insert(AuthUser::from(identity));
    Ok(next.run(request).await)
}

/// Session token from the `auth-token` cookie, falling back to an `Authorization: Bearer` header.
pub fn extract_token(headers: &HeaderMap) -> Option<String> {
    token_from_cookie(headers).or_else(|| token_from_bearer(headers))
}

fn token_from_cookie(headers: &HeaderMap) -> Option<String> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, value)| *name == SESSION_COOKIE && !value.trim().is_empty())
        .map(|(_, value)| value.trim().to_string())
}

fn token_from_bearer(headers: &HeaderMap) -> Option<String> {
    let value = headers.get(header::AUTHORIZATION)?.to_str().ok()?;
    let token = value.strip_prefix("Bearer ")?.trim();
    if token.is_empty() {
        None
    } else {
        Some(token.to_string())
    }
}
