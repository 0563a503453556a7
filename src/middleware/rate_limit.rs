//! Per-client admission control.
//!
//! Each client gets a counting window of `window` length. Going over `limit` inside one
//! window blocks the client for `block_duration`; while blocked every request is rejected
//! without being counted. Windows are reset lazily when a request arrives, so there is no
//! per-client timer. The price is that a client can send `limit` requests at the end of one
//! window and another `limit` right after it rolls over.

use super::ip::extract_client_ip;
use crate::clock::{Clock, SystemClock};
use crate::config::RateLimitSettings;
use crate::error::AppError;
use crate::state::AppState;
use axum::{
    extract::{connect_info::ConnectInfo, Request, State},
    middleware::Next,
    response::{IntoResponse, Response},
};
use std::{
    collections::HashMap,
    net::SocketAddr,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc, Mutex, MutexGuard, PoisonError,
    },
    time::{Duration, Instant},
};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

/// Immutable limiter settings, shared read-only by every request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimiterConfig {
    /// Requests allowed per window.
    pub limit: u32,
    pub window: Duration,
    /// Cooldown applied to a client that exceeded `limit`.
    pub block_duration: Duration,
    /// Cadence of the background sweep.
    pub sweep_interval: Duration,
    /// Idle time after which an unblocked record may be swept.
    pub stale_after: Duration,
}

impl Default for RateLimiterConfig {
    fn default() -> Self {
        Self {
            limit: 100,
            window: Duration::from_secs(60),
            block_duration: Duration::from_secs(300),
            sweep_interval: Duration::from_secs(3600),
            stale_after: Duration::from_secs(3600),
        }
    }
}

impl From<&RateLimitSettings> for RateLimiterConfig {
    fn from(s: &RateLimitSettings) -> Self {
        Self {
            limit: s.limit,
            window: s.window(),
            block_duration: s.block_duration(),
            sweep_interval: s.sweep_interval(),
            stale_after: s.stale_after(),
        }
    }
}

/// Outcome of [`AdmissionGate::admit`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    Accepted,
    Rejected {
        /// How long the client should back off before trying again.
        retry_after: Duration,
    },
}

impl Admission {
    pub fn is_accepted(&self) -> bool {
        matches!(self, Admission::Accepted)
    }

    pub fn into_result(self) -> Result<(), AppError> {
        match self {
            Admission::Accepted => Ok(()),
            Admission::Rejected { retry_after } => {
                Err(AppError::RateLimited { retry_after_seconds: retry_after_secs(retry_after) })
            }
        }
    }
}

/// Whole seconds for a `Retry-After` header, rounded up so clients never retry early.
pub fn retry_after_secs(d: Duration) -> u64 {
    d.as_secs() + u64::from(d.subsec_nanos() > 0)
}

/// Upper bound on a block when `now + block_duration` does not fit in an `Instant`.
const MAX_BLOCK: Duration = Duration::from_secs(100 * 365 * 24 * 3600);

fn block_deadline(now: Instant, block_duration: Duration) -> Instant {
    now.checked_add(block_duration)
        .or_else(|| now.checked_add(MAX_BLOCK))
        .unwrap_or(now)
}

/// Usage state of a single client.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClientUsageRecord {
    /// Requests counted in the current window.
    pub count: u32,
    pub window_start: Instant,
    /// `Some` while a block is pending or has not yet been observed as expired.
    pub blocked_until: Option<Instant>,
}

impl ClientUsageRecord {
    fn new(now: Instant) -> Self {
        Self { count: 0, window_start: now, blocked_until: None }
    }

    pub fn is_blocked_at(&self, now: Instant) -> bool {
        self.blocked_until.is_some_and(|until| now < until)
    }

    fn is_stale_at(&self, now: Instant, stale_after: Duration) -> bool {
        now.saturating_duration_since(self.window_start) > stale_after
    }
}

struct GateInner {
    config: RateLimiterConfig,
    clients: Mutex<HashMap<String, ClientUsageRecord>>,
    clock: Arc<dyn Clock>,
    swept_total: AtomicU64,
}

/// A thread-safe, per-client fixed-window limiter with a cooldown penalty.
///
/// The whole client table sits behind one mutex. Every admit decision and every sweep
/// runs entirely inside that lock, and nothing inside it logs or awaits.
#[derive(Clone)]
pub struct AdmissionGate {
    inner: Arc<GateInner>,
}

impl AdmissionGate {
    /// Creates a gate reading time from the system clock.
    pub fn new(config: RateLimiterConfig) -> Self {
        Self::with_clock(config, SystemClock)
    }

    /// Creates a gate with an injected time source.
    pub fn with_clock(config: RateLimiterConfig, clock: impl Clock) -> Self {
        Self {
            inner: Arc::new(GateInner {
                config,
                clients: Mutex::new(HashMap::new()),
                clock: Arc::new(clock),
                swept_total: AtomicU64::new(0),
            }),
        }
    }

    pub fn config(&self) -> &RateLimiterConfig {
        &self.inner.config
    }

    fn clients(&self) -> MutexGuard<'_, HashMap<String, ClientUsageRecord>> {
        // A panic while holding the lock cannot leave a record half-written
        self.inner.clients.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Decides whether `client_id` may proceed, using the gate's clock.
    pub fn admit(&self, client_id: &str) -> Admission {
        self.admit_at(client_id, self.inner.clock.now())
    }

    /// Decides whether `client_id` may proceed at `now`.
    pub fn admit_at(&self, client_id: &str, now: Instant) -> Admission {
        let cfg = &self.inner.config;
        let mut clients = self.clients();
        let record = clients.entry(client_id.to_owned()).or_insert_with(|| ClientUsageRecord::new(now));

        if let Some(until) = record.blocked_until {
            if now < until {
                return Admission::Rejected { retry_after: until - now };
            }
            // Block served, the client starts over
            record.blocked_until = None;
            record.count = 0;
            record.window_start = now;
        }

        if now.saturating_duration_since(record.window_start) > cfg.window {
            record.count = 0;
            record.window_start = now;
        }

        record.count = record.count.saturating_add(1);

        if record.count > cfg.limit {
            let until = block_deadline(now, cfg.block_duration);
            record.blocked_until = Some(until);
            return Admission::Rejected { retry_after: until - now };
        }

        Admission::Accepted
    }

    /// Removes idle, unblocked records. Returns how many were removed.
    pub fn sweep(&self) -> usize {
        self.sweep_at(self.inner.clock.now())
    }

    pub fn sweep_at(&self, now: Instant) -> usize {
        let stale_after = self.inner.config.stale_after;
        let removed = {
            let mut clients = self.clients();
            let before = clients.len();
            clients.retain(|_, r| r.is_blocked_at(now) || !r.is_stale_at(now, stale_after));
            before - clients.len()
        };
        self.inner.swept_total.fetch_add(removed as u64, Ordering::Relaxed);
        removed
    }

    /// Number of clients currently tracked.
    pub fn tracked_clients(&self) -> usize {
        self.clients().len()
    }

    /// Records removed by sweeps since the gate was created.
    pub fn swept_total(&self) -> u64 {
        self.inner.swept_total.load(Ordering::Relaxed)
    }

    /// Snapshot of a client's record, if one exists.
    pub fn usage(&self, client_id: &str) -> Option<ClientUsageRecord> {
        self.clients().get(client_id).copied()
    }

    /// Spawns the periodic sweep on the current tokio runtime.
    ///
    /// The task runs every `sweep_interval` until the returned handle is shut down or dropped.
    pub fn start_sweeper(&self) -> SweeperHandle {
        let cancel = CancellationToken::new();
        let token = cancel.clone();
        let gate = self.clone();
        let period = self.inner.config.sweep_interval;

        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // The first tick completes immediately
            ticker.tick().await;
            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    _ = ticker.tick() => {
                        let removed = gate.sweep();
                        if removed > 0 {
                            tracing::debug!("Rate limiter sweep removed {} idle clients", removed);
                        }
                    }
                }
            }
            tracing::debug!("Rate limiter sweeper stopped");
        });

        SweeperHandle { cancel, task: Some(task) }
    }
}

/// Owner of the background sweep task. Dropping it cancels the task.
pub struct SweeperHandle {
    cancel: CancellationToken,
    task: Option<JoinHandle<()>>,
}

impl SweeperHandle {
    pub fn is_running(&self) -> bool {
        self.task.as_ref().is_some_and(|t| !t.is_finished())
    }

    /// Cancels the sweep and waits for the task to exit.
    pub async fn shutdown(mut self) {
        self.cancel.cancel();
        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                tracing::warn!("Rate limiter sweeper ended abnormally: {}", e);
            }
        }
    }
}

impl Drop for SweeperHandle {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

/// Axum middleware running every request through the [`AdmissionGate`].
///
/// Rejected clients get `429 Too Many Requests` with a `Retry-After` header.
pub async fn rate_limit_middleware(State(state): State<AppState>, req: Request, next: Next) -> Response {
    let remote_ip = req.extensions().get::<ConnectInfo<SocketAddr>>().map(|info| info.0.ip());
    let ip = extract_client_ip(req.headers(), remote_ip, state.config.rate_limit.trust_proxy_headers);
    let client_id = ip.to_string();

    let admission = state.gate.admit(&client_id);
    // The gate's lock is released here; logging happens outside of it
    match admission.into_result() {
        Ok(()) => {
            state.metrics.inc_admitted();
            next.run(req).await
        }
        Err(err) => {
            state.metrics.inc_rate_limited();
            tracing::warn!("Rejected request from rate limited client {}: {}", client_id, err);
            err.into_response()
        }
    }
}
