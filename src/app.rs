use axum::{
    extract::DefaultBodyLimit,
    http::{header, HeaderValue, Method},
    middleware,
    routing::{delete, get, post, put},
    Router,
};
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    trace::TraceLayer,
};

use crate::config::{AppConfig, Environment};
use crate::handlers::{protected, public};
use crate::middleware::{require_auth, track_endpoint_usage};
use crate::state::AppState;

/// Full router with every route group and the global layers applied.
pub fn app(state: AppState) -> Router {
    let body_limit = state.config.server.max_request_size_bytes;
    let cors = cors_layer(&state.config);

    Router::new()
        .merge(public_routes())
        .merge(protected_routes(state.clone()))
        .merge(query_routes(state.clone()))
        // Global middleware
        .layer(middleware::from_fn_with_state(
            state.clone(),
            track_endpoint_usage,
        ))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn public_routes() -> Router<AppState> {
    use public::{auth, health, usage};

    Router::new()
        .route("/", get(health::root))
        .route("/health", get(health::health))
        // Session acquisition
        .route("/register", post(auth::register_post))
        .route("/login", post(auth::login_post))
        .route("/logout", get(auth::logout_get))
        // Usage counters
        .route("/get-user-usage", get(usage::user_usage_get))
        .route("/get-endpoint-usage", get(usage::endpoint_usage_get))
        .route("/add-endpoint-usage", post(usage::endpoint_usage_post))
}

fn protected_routes(state: AppState) -> Router<AppState> {
    use protected::{account, usage};

    Router::new()
        .route("/me", get(account::me_get))
        .route("/update-user", put(account::update_user_put))
        .route("/delete-user", delete(account::delete_user_delete))
        .route("/get-users", get(account::users_get))
        .route("/update-user-usage", post(usage::update_user_usage_post))
        .route("/get-self-usage", get(usage::self_usage_get))
        .route_layer(middleware::from_fn_with_state(state, require_auth))
}

fn query_routes(state: AppState) -> Router<AppState> {
    use protected::query;

    Router::new()
        .route("/api/v1/sql", get(query::sql_get).post(query::sql_post))
        .route_layer(middleware::from_fn_with_state(state, require_auth))
}

fn cors_layer(config: &AppConfig) -> CorsLayer {
    let security = &config.security;
    if !security.enable_cors {
        return CorsLayer::new();
    }
    if config.environment == Environment::Development {
        return CorsLayer::permissive();
    }

    let origins: Vec<HeaderValue> = security
        .cors_origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!("Ignoring invalid CORS origin {:?}", origin);
                None
            }
        })
        .collect();

    // Cookies cross origins only with an explicit allow-list.
    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
        .allow_credentials(true)
}
