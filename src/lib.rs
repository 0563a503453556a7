//! # Gatehouse
//!
//! Admission control and bearer-token authentication for HTTP services built on Axum.
//!
//! Every request to the API passes two gates:
//!
//! 1. [`middleware::AdmissionGate`] counts requests per client address in a fixed window
//!    and blocks clients that exceed the limit for a penalty period.
//! 2. [`auth::TokenAuthenticator`] verifies an HMAC-signed bearer token and attaches the
//!    caller's identity to the request; [`auth::require_role`] then restricts routes to
//!    a set of roles.
//!
//! ## Core Components
//!
//! - [`app`]: router assembly and middleware ordering
//! - [`auth`]: token issuing, verification and role checks
//! - [`clock`]: monotonic time source, swappable in tests
//! - [`config`]: layered configuration (embedded defaults, file, environment)
//! - [`error`]: error taxonomy and JSON error responses
//! - [`metrics`]: gating counters
//! - [`middleware`]: rate limiting, authentication and client identification
//! - [`routes`]: HTTP endpoint handlers
//! - [`state`]: shared application state

pub mod app;
pub mod auth;
pub mod clock;
pub mod config;
pub mod error;
pub mod metrics;
pub mod middleware;
pub mod routes;
pub mod state;

pub use app::build_router;

#[cfg(test)]
mod tests;
