//! Route configuration.

use axum::Router;
use axum::http::HeaderValue;
use axum::middleware::{from_fn, from_fn_with_state};
use axum::routing::{delete, get, post};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::warn;

use crate::handlers::{
    bootstrap_admin_password, column_values, create_key, delete_key, get_config, get_logs, health,
    list_columns, list_keys, login, logout, patch_config, root,
};
use crate::middleware::{require_admin, require_localhost, require_read_only};
use crate::state::SharedState;

/// Create the API router.
///
/// - public: `/`, `/health`, `/api/admin/login`
/// - read-only key or admin session: `/api/logs`, `/api/meta[/{column}]`
/// - admin session: `/api/admin/logout`, `/api/admin/keys[/{name}]`,
///   `/api/admin/config`
/// - loopback peer: `/api/bootstrap/admin-password`
pub fn create_router(state: SharedState) -> Router {
    let cors = build_cors_layer(&state.config().server.allowed_origins);

    let read_routes = Router::new()
        .route("/logs", get(get_logs))
        .route("/meta", get(list_columns))
        .route("/meta/{column}", get(column_values))
        .route_layer(from_fn_with_state(state.clone(), require_read_only));

    let admin_routes = Router::new()
        .route("/logout", post(logout))
        .route("/keys", get(list_keys).post(create_key))
        .route("/keys/{name}", delete(delete_key))
        .route("/config", get(get_config).patch(patch_config))
        .route_layer(from_fn_with_state(state.clone(), require_admin));

    let bootstrap_routes = Router::new()
        .route("/admin-password", post(bootstrap_admin_password))
        .route_layer(from_fn(require_localhost));

    let api_routes = Router::new()
        .merge(read_routes)
        .nest(
            "/admin",
            Router::new().route("/login", post(login)).merge(admin_routes),
        )
        .nest("/bootstrap", bootstrap_routes);

    Router::new()
        .route("/", get(root))
        .route("/health", get(health))
        .nest("/api", api_routes)
        .with_state(state)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}

/// Build the CORS layer. `*` anywhere in the list allows any origin.
fn build_cors_layer(allowed_origins: &[String]) -> CorsLayer {
    let layer = CorsLayer::new().allow_methods(Any).allow_headers(Any);
    if allowed_origins.is_empty() || allowed_origins.iter().any(|o| o == "*") {
        return layer.allow_origin(Any);
    }

    let origins: Vec<HeaderValue> = allowed_origins
        .iter()
        .filter_map(|origin| match origin.parse() {
            Ok(value) => Some(value),
            Err(_) => {
                warn!(origin = %origin, "ignoring unparsable CORS origin");
                None
            }
        })
        .collect();
    layer.allow_origin(origins)
}
