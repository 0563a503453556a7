use crate::state::AppState;
use axum::{
    extract::State,
    http::{header, StatusCode},
    response::IntoResponse,
    Json,
};

// Health check endpoint - lightweight, no rate limiting
pub async fn healthz() -> impl IntoResponse {
    (StatusCode::OK, "ok")
}

// Metrics endpoint: returns JSON snapshot
pub async fn metrics(State(state): State<AppState>) -> impl IntoResponse {
    let snapshot = state.metrics.get_snapshot(state.gate.tracked_clients(), state.gate.swept_total());
    Json(snapshot)
}

// Prometheus-compatible text exposition format
pub async fn metrics_prometheus(State(state): State<AppState>) -> impl IntoResponse {
    let m = state.metrics.get_snapshot(state.gate.tracked_clients(), state.gate.swept_total());
    let body = format!(
        "# HELP gatehouse_requests_admitted Requests admitted by the rate limiter\n# TYPE gatehouse_requests_admitted counter\ngatehouse_requests_admitted {}\n\
# HELP gatehouse_requests_rate_limited Requests rejected by the rate limiter\n# TYPE gatehouse_requests_rate_limited counter\ngatehouse_requests_rate_limited {}\n\
# HELP gatehouse_auth_succeeded Successful token verifications\n# TYPE gatehouse_auth_succeeded counter\ngatehouse_auth_succeeded {}\n\
# HELP gatehouse_auth_failed Failed token verifications\n# TYPE gatehouse_auth_failed counter\ngatehouse_auth_failed {}\n\
# HELP gatehouse_role_rejections Requests refused for insufficient role\n# TYPE gatehouse_role_rejections counter\ngatehouse_role_rejections {}\n\
# HELP gatehouse_tracked_clients Clients currently held in the rate limiter table\n# TYPE gatehouse_tracked_clients gauge\ngatehouse_tracked_clients {}\n\
# HELP gatehouse_clients_swept Stale client records removed by the sweeper\n# TYPE gatehouse_clients_swept counter\ngatehouse_clients_swept {}\n\
# HELP gatehouse_uptime_seconds Uptime seconds\n# TYPE gatehouse_uptime_seconds gauge\ngatehouse_uptime_seconds {}\n",
        m.requests_admitted,
        m.requests_rate_limited,
        m.auth_succeeded,
        m.auth_failed,
        m.role_rejections,
        m.tracked_clients,
        m.clients_swept,
        m.uptime_seconds,
    );
    ([(header::CONTENT_TYPE, "text/plain; version=0.0.4")], body)
}

// Version/Build info endpoint (JSON)
pub async fn version() -> impl IntoResponse {
    let body = serde_json::json!({
        "name": env!("CARGO_PKG_NAME"),
        "version": env!("CARGO_PKG_VERSION"),
        "package": {
            "description": env!("CARGO_PKG_DESCRIPTION"),
            "license": env!("CARGO_PKG_LICENSE"),
        },
        "build": {
            "profile": if cfg!(debug_assertions) { "debug" } else { "release" },
            "os": std::env::consts::OS,
            "arch": std::env::consts::ARCH,
        }
    });
    (StatusCode::OK, Json(body))
}
