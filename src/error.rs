use axum::{
    http::{header::RETRY_AFTER, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use std::error::Error;
use std::fmt;

/// Why a bearer credential was refused.
///
/// Only the category ever reaches the caller. The underlying parser or crypto error is
/// dropped at the point of classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum AuthError {
    /// Header absent, wrong scheme, wrong field count, undecodable token or foreign claims.
    #[error("malformed credential")]
    MalformedCredential,
    /// The token names a signing algorithm other than HMAC.
    #[error("unsupported signing algorithm")]
    UnsupportedAlgorithm,
    /// The signature does not verify under the configured secret.
    #[error("invalid signature")]
    InvalidSignature,
    /// `exp` is not strictly after the verification time.
    #[error("credential expired")]
    Expired,
}

impl AuthError {
    pub const fn code(&self) -> &'static str {
        match self {
            AuthError::MalformedCredential => "MALFORMED_CREDENTIAL",
            AuthError::UnsupportedAlgorithm => "UNSUPPORTED_ALGORITHM",
            AuthError::InvalidSignature => "INVALID_SIGNATURE",
            AuthError::Expired => "TOKEN_EXPIRED",
        }
    }
}

/// The primary error type for the application.
///
/// Every rejection the gate or the authenticator produces ends up here and is mapped to
/// exactly one HTTP response in [`IntoResponse`].
#[derive(Debug)]
pub enum AppError {
    /// Authentication failed (401).
    Auth(AuthError),
    /// Authenticated caller lacks the role, or no identity was attached at all (403).
    InsufficientRole,
    /// For when a client has sent too many requests in a given amount of time.
    RateLimited {
        /// The number of seconds to wait before retrying the request.
        retry_after_seconds: u64,
    },
    /// For when a requested resource is not found.
    NotFound(String),
    /// For internal server errors that are not expected to be handled by the client.
    Internal(anyhow::Error),
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Auth(_) => StatusCode::UNAUTHORIZED,
            AppError::InsufficientRole => StatusCode::FORBIDDEN,
            AppError::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            AppError::Auth(e) => e.code(),
            AppError::InsufficientRole => "INSUFFICIENT_ROLE",
            AppError::RateLimited { .. } => "RATE_LIMIT_EXCEEDED",
            AppError::NotFound(_) => "NOT_FOUND",
            AppError::Internal(_) => "INTERNAL_ERROR",
        }
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::Auth(e) => write!(f, "Unauthorized: {}", e),
            AppError::InsufficientRole => write!(f, "Forbidden: insufficient role"),
            AppError::RateLimited { retry_after_seconds } => {
                write!(f, "Rate limited. Retry after {} seconds", retry_after_seconds)
            }
            AppError::NotFound(msg) => write!(f, "Not found: {}", msg),
            AppError::Internal(e) => write!(f, "Internal error: {}", e),
        }
    }
}

impl Error for AppError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            AppError::Auth(e) => Some(e),
            AppError::Internal(e) => Some(e.as_ref()),
            _ => None,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let code = self.code();
        let (message, details) = match &self {
            AppError::Auth(AuthError::Expired) => ("Token has expired".to_string(), None),
            AppError::Auth(_) => ("Invalid or missing credentials".to_string(), None),
            AppError::InsufficientRole => {
                ("You do not have permission to access this resource".to_string(), None)
            }
            AppError::RateLimited { retry_after_seconds } => (
                format!("Too many requests. Please retry after {} seconds", retry_after_seconds),
                Some(json!({ "retry_after_seconds": retry_after_seconds })),
            ),
            AppError::NotFound(msg) => (msg.clone(), None),
            AppError::Internal(e) => {
                let error_id = uuid::Uuid::new_v4();
                tracing::error!("Internal error {}: {:?}", error_id, e);
                (
                    "An internal server error occurred".to_string(),
                    Some(json!({ "error_id": error_id.to_string() })),
                )
            }
        };

        let mut body = json!({
            "error": {
                "code": code,
                "message": message,
            },
            "status": status.as_u16(),
            "timestamp": chrono::Utc::now().to_rfc3339(),
        });

        if let Some(details) = details {
            body["error"]["details"] = details;
        }

        let mut response = (status, Json(body)).into_response();
        if let AppError::RateLimited { retry_after_seconds } = self {
            response.headers_mut().insert(RETRY_AFTER, HeaderValue::from(retry_after_seconds));
        }
        response
    }
}

impl From<AuthError> for AppError {
    fn from(err: AuthError) -> Self {
        AppError::Auth(err)
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        AppError::Internal(err)
    }
}

impl From<jsonwebtoken::errors::Error> for AppError {
    fn from(err: jsonwebtoken::errors::Error) -> Self {
        AppError::Internal(anyhow::Error::new(err).context("failed to sign token"))
    }
}

/// A type alias for `Result<T, AppError>`, used throughout the application.
pub type AppResult<T> = Result<T, AppError>;
