use axum::{response::IntoResponse, Json};
use serde::Serialize;

use crate::middleware::AuthUser;

#[derive(Debug, Serialize)]
pub struct IdentityResponse {
    pub subject_id: String,
    pub role: String,
    pub expires_at: i64,
}

/// Echoes the identity the auth middleware attached to this request.
pub async fn me(AuthUser(ctx): AuthUser) -> impl IntoResponse {
    Json(IdentityResponse {
        subject_id: ctx.subject_id().to_owned(),
        role: ctx.role().to_owned(),
        expires_at: ctx.claims().expires_at,
    })
}

// Only reachable through the admin role layer
pub async fn admin_ping(AuthUser(ctx): AuthUser) -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "subject_id": ctx.subject_id(),
    }))
}
