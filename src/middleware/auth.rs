use axum::{
    extract::{FromRequestParts, Request, State},
    http::{header, request::Parts},
    middleware::Next,
    response::Response,
};

use crate::auth::{require_role, AllowedRoles, AuthContext};
use crate::error::AppError;
use crate::state::AppState;

/// Middleware that requires a valid `Authorization: Bearer <token>` header.
///
/// On success the verified identity is attached to the request as an [`AuthContext`];
/// on failure the request is rejected with 401 and never reaches the handler.
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, AppError> {
    let header_value = req.headers().get(header::AUTHORIZATION).and_then(|h| h.to_str().ok());

    match state.tokens.authenticate(header_value) {
        Ok(claims) => {
            state.metrics.inc_auth_succeeded();
            tracing::debug!(subject = %claims.subject_id, role = %claims.role, "request authenticated");
            req.extensions_mut().insert(AuthContext::new(claims));
            Ok(next.run(req).await)
        }
        Err(e) => {
            state.metrics.inc_auth_failed();
            tracing::warn!(
                method = %req.method(),
                path = %req.uri().path(),
                reason = e.code(),
                "authentication failed"
            );
            Err(e.into())
        }
    }
}

/// Middleware that admits only identities whose role is in the configured set.
///
/// Must be layered inside [`auth_middleware`]; a request without an [`AuthContext`] is
/// refused with 403.
pub async fn require_role_middleware(
    State((state, roles)): State<(AppState, AllowedRoles)>,
    req: Request,
    next: Next,
) -> Result<Response, AppError> {
    let ctx = req.extensions().get::<AuthContext>();
    if let Err(e) = require_role(ctx, roles.as_slice()) {
        state.metrics.inc_role_rejections();
        tracing::warn!(
            path = %req.uri().path(),
            role = ctx.map(AuthContext::role).unwrap_or("<none>"),
            "role not permitted"
        );
        return Err(e);
    }
    Ok(next.run(req).await)
}

/// Extractor for the identity attached by [`auth_middleware`].
#[derive(Debug, Clone)]
pub struct AuthUser(pub AuthContext);

impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts.extensions.get::<AuthContext>().cloned().map(AuthUser).ok_or(AppError::InsufficientRole)
    }
}
