//! HTTP route handlers for the Gatehouse API.
//!
//! - `health`: liveness, version and metrics endpoints (never rate limited)
//! - `identity`: endpoints that expose the authenticated caller

pub mod health;
pub mod identity;
