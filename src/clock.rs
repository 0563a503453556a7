//! Time sources for the admission gate.
//!
//! The gate never calls `Instant::now()` directly; it asks its [`Clock`]. Production code
//! uses [`SystemClock`], tests drive time explicitly with [`MockClock`] instead of sleeping.

use std::sync::Arc;
use std::time::Instant;

/// A monotonic time source.
pub trait Clock: Send + Sync + 'static {
    fn now(&self) -> Instant;
}

/// Wall-clock backed [`Clock`] using `Instant::now()`.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

impl<C: Clock + ?Sized> Clock for Arc<C> {
    fn now(&self) -> Instant {
        (**self).now()
    }
}

#[cfg(test)]
pub use mock::MockClock;
