use axum::{
    extract::{MatchedPath, Request, State},
    http::Method,
    middleware::Next,
    response::Response,
};

use crate::state::AppState;

/// Counter key shared by every request that matches no route.
pub const UNMATCHED_ENDPOINT: &str = "<unmatched>";

/// Count every inbound request against its `(route, method)` pair.
///
/// The key is the matched route template, never the raw path, so made-up URLs all land on
/// [`UNMATCHED_ENDPOINT`]. Tracking is best-effort: a ledger failure is logged and the
/// request proceeds.
pub async fn track_endpoint_usage(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Response {
    let endpoint = request
        .extensions()
        .get::<MatchedPath>()
        .map(|matched| matched.as_str())
        .unwrap_or(UNMATCHED_ENDPOINT)
        .to_string();
    let method = counted_method(request.method());

    state.ledger.track_endpoint_hit(&endpoint, method).await;

    next.run(request).await
}

/// Extension methods are folded together for the same reason as unmatched paths.
fn counted_method(method: &Method) -> &'static str {
    match method.as_str() {
        "GET" => "GET",
        "POST" => "POST",
        "PUT" => "PUT",
        "DELETE" => "DELETE",
        "PATCH" => "PATCH",
        "HEAD" => "HEAD",
        "OPTIONS" => "OPTIONS",
        "CONNECT" => "CONNECT",
        "TRACE" => "TRACE",
        _ => "OTHER",
    }
}
