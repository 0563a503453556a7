use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

/// Request-gating counters for monitoring
#[derive(Clone)]
pub struct Metrics {
    pub requests_admitted: Arc<AtomicU64>,
    pub requests_rate_limited: Arc<AtomicU64>,
    pub auth_succeeded: Arc<AtomicU64>,
    pub auth_failed: Arc<AtomicU64>,
    pub role_rejections: Arc<AtomicU64>,
    pub start_time: Instant,
}

impl Metrics {
    pub fn new() -> Self {
        Self {
            requests_admitted: Arc::new(AtomicU64::new(0)),
            requests_rate_limited: Arc::new(AtomicU64::new(0)),
            auth_succeeded: Arc::new(AtomicU64::new(0)),
            auth_failed: Arc::new(AtomicU64::new(0)),
            role_rejections: Arc::new(AtomicU64::new(0)),
            start_time: Instant::now(),
        }
    }

    pub fn inc_admitted(&self) {
        self.requests_admitted.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_rate_limited(&self) {
        self.requests_rate_limited.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_auth_succeeded(&self) {
        self.auth_succeeded.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_auth_failed(&self) {
        self.auth_failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_role_rejections(&self) {
        self.role_rejections.fetch_add(1, Ordering::Relaxed);
    }

    /// Point-in-time view; `tracked_clients` and `clients_swept` come from the gate.
    pub fn get_snapshot(&self, tracked_clients: usize, clients_swept: u64) -> MetricsSnapshot {
        MetricsSnapshot {
            requests_admitted: self.requests_admitted.load(Ordering::Relaxed),
            requests_rate_limited: self.requests_rate_limited.load(Ordering::Relaxed),
            auth_succeeded: self.auth_succeeded.load(Ordering::Relaxed),
            auth_failed: self.auth_failed.load(Ordering::Relaxed),
            role_rejections: self.role_rejections.load(Ordering::Relaxed),
            tracked_clients,
            clients_swept,
            uptime_seconds: self.start_time.elapsed().as_secs(),
        }
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Serialize)]
pub struct MetricsSnapshot {
    pub requests_admitted: u64,
    pub requests_rate_limited: u64,
    pub auth_succeeded: u64,
    pub auth_failed: u64,
    pub role_rejections: u64,
    pub tracked_clients: usize,
    pub clients_swept: u64,
    pub uptime_seconds: u64,
}
