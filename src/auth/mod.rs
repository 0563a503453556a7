//! Bearer-token authentication and role checks.
//!
//! - [`token`]: signing and verification of access and refresh tokens
//! - [`claims`]: token payloads and the per-request [`AuthContext`]
//! - [`role`]: role-based admission on top of an authenticated identity

pub mod claims;
pub mod role;
pub mod token;

pub use claims::{AuthContext, Claims, RefreshClaims};
pub use role::{require_role, AllowedRoles};
pub use token::{parse_bearer, TokenAuthenticator, TokenConfig};
