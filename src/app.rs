use axum::{middleware::from_fn_with_state, routing::get, Router};
use tower_http::trace::TraceLayer;

use crate::auth::AllowedRoles;
use crate::error::AppError;
use crate::middleware::{auth_middleware, rate_limit::rate_limit_middleware, require_role_middleware};
use crate::routes::{health, identity};
use crate::state::AppState;

/// Roles admitted to `/api/v1/admin/*`.
pub const ADMIN_ROLES: [&str; 1] = ["admin"];

/// Builds the HTTP router.
///
/// Layering, outermost first: request tracing, admission control (API routes only),
/// token verification, and for admin routes the role check. Health and metrics endpoints
/// bypass all three.
pub fn build_router(state: AppState) -> Router {
    let admin = Router::new()
        .route("/admin/ping", get(identity::admin_ping))
        .route_layer(from_fn_with_state((state.clone(), AllowedRoles::new(ADMIN_ROLES)), require_role_middleware));

    let protected = Router::new()
        .route("/me", get(identity::me))
        .merge(admin)
        .route_layer(from_fn_with_state(state.clone(), auth_middleware));

    let api = Router::new()
        .nest("/api/v1", protected)
        .route_layer(from_fn_with_state(state.clone(), rate_limit_middleware));

    Router::new()
        .route("/healthz", get(health::healthz))
        .route("/version", get(health::version))
        .route("/metrics", get(health::metrics))
        .route("/metrics/prometheus", get(health::metrics_prometheus))
        .merge(api)
        .fallback(not_found)
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}

async fn not_found(uri: axum::http::Uri) -> AppError {
    AppError::NotFound(uri.path().to_owned())
}
