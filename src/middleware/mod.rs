//! Middleware components for HTTP request processing.
//!
//! Admission control runs first and only looks at the client address. Authentication and
//! role checks run inside it.

pub mod auth;
pub mod ip;
pub mod rate_limit;

pub use auth::{auth_middleware, require_role_middleware, AuthUser};
pub use rate_limit::{Admission, AdmissionGate, RateLimiterConfig, SweeperHandle};
