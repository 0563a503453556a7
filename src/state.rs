use std::sync::Arc;

use crate::auth::{TokenAuthenticator, TokenConfig};
use crate::config::AppConfig;
use crate::metrics::Metrics;
use crate::middleware::rate_limit::{AdmissionGate, RateLimiterConfig};

/// The shared application state.
///
/// Cloned into every handler and middleware; all members are cheap `Arc` clones.
#[derive(Clone)]
pub struct AppState {
    /// The application configuration.
    pub config: Arc<AppConfig>,
    /// Per-client admission control. Holds the only mutable shared table in the service.
    pub gate: AdmissionGate,
    /// Stateless bearer-token verifier and issuer.
    pub tokens: TokenAuthenticator,
    /// Gating counters.
    pub metrics: Metrics,
}

impl AppState {
    /// Builds the state from configuration, with a gate on the system clock.
    pub fn new(config: AppConfig) -> Self {
        let gate = AdmissionGate::new(RateLimiterConfig::from(&config.rate_limit));
        Self::with_gate(config, gate)
    }

    /// Builds the state around an existing gate (e.g. one driven by a mock clock).
    pub fn with_gate(config: AppConfig, gate: AdmissionGate) -> Self {
        let tokens = TokenAuthenticator::new(TokenConfig::from(&config.auth));
        Self { config: Arc::new(config), gate, tokens, metrics: Metrics::new() }
    }
}
