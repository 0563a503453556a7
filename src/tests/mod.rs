//! Integration and unit tests for Gatehouse.
//!
//! ## Test Modules
//!
//! - **admission_tests**: rate limiting, blocking and sweeping through the public gate API
//! - **token_tests**: issuing and verifying access and refresh tokens
//! - **api_tests**: the assembled router, end to end
//! - **error_tests**: error codes and the JSON error envelope
//! - **config_tests**: configuration loading and validation
//!
//! Individual test modules can be run with:
//! ```bash
//! cargo test admission_tests
//! cargo test api_tests
//! # etc.
//! ```

pub mod api_tests;

use crate::config::{self, AppConfig};

pub(crate) const TEST_SECRET: &str = "test-secret-0123456789-abcdefghijklmnop";

/// Defaults plus a usable secret, with `extra` TOML layered on top.
pub(crate) fn test_config(extra: &str) -> AppConfig {
    let toml = format!("[auth]\nsecret = \"{}\"\n{}", TEST_SECRET, extra);
    config::load_from_str(&toml).unwrap()
}
