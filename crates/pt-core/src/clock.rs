//! Time sources.
//!
//! Two readings are kept deliberately apart:
//! - [`Clock::tick`] is monotonic and only meaningful within one process. It
//!   drives running-counter arithmetic and is never persisted.
//! - [`Clock::wall_ms`] is epoch milliseconds. It is comparable across restarts
//!   and is what the idle marker and snapshot `savedAt` use.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};
use std::time::{Duration, Instant};

use chrono::Utc;

/// A source of monotonic ticks and wall-clock timestamps.
pub trait Clock: Send + Sync + fmt::Debug {
    /// Monotonic time since an arbitrary per-process origin.
    fn tick(&self) -> Duration;

    /// Wall-clock time as milliseconds since the Unix epoch.
    fn wall_ms(&self) -> i64;
}

/// Production clock backed by [`Instant`] and the system wall clock.
#[derive(Debug, Clone)]
pub struct SystemClock {
    origin: Instant,
}

impl SystemClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }

    /// Convenience constructor for the shared handle counters expect.
    pub fn shared() -> Arc<dyn Clock> {
        Arc::new(Self::new())
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn tick(&self) -> Duration {
        self.origin.elapsed()
    }

    fn wall_ms(&self) -> i64 {
        Utc::now().timestamp_millis()
    }
}

/// Manually driven clock for tests and simulations.
///
/// Clones share the same underlying readings, so a test can keep one handle
/// and hand another to the code under test.
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    inner: Arc<ManualState>,
}

#[derive(Debug, Default)]
struct ManualState {
    tick_nanos: AtomicU64,
    wall_ms: AtomicI64,
}

impl ManualClock {
    /// Creates a clock with tick zero and the given wall time.
    pub fn new(wall_ms: i64) -> Self {
        let clock = Self::default();
        clock.inner.wall_ms.store(wall_ms, Ordering::SeqCst);
        clock
    }

    /// Moves both the monotonic tick and the wall clock forward.
    pub fn advance(&self, by: Duration) {
        let nanos = u64::try_from(by.as_nanos()).unwrap_or(u64::MAX);
        self.inner.tick_nanos.fetch_add(nanos, Ordering::SeqCst);
        let ms = i64::try_from(by.as_millis()).unwrap_or(i64::MAX);
        self.inner.wall_ms.fetch_add(ms, Ordering::SeqCst);
    }

    /// Shorthand for [`advance`](Self::advance) in milliseconds.
    pub fn advance_ms(&self, ms: u64) {
        self.advance(Duration::from_millis(ms));
    }

    /// Sets the wall clock without touching the monotonic tick.
    pub fn set_wall_ms(&self, wall_ms: i64) {
        self.inner.wall_ms.store(wall_ms, Ordering::SeqCst);
    }

    /// Returns a shared handle to this clock.
    pub fn shared(&self) -> Arc<dyn Clock> {
        Arc::new(self.clone())
    }
}

impl Clock for ManualClock {
    fn tick(&self) -> Duration {
        Duration::from_nanos(self.inner.tick_nanos.load(Ordering::SeqCst))
    }

    fn wall_ms(&self) -> i64 {
        self.inner.wall_ms.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn system_clock_ticks_are_monotonic() {
        let clock = SystemClock::new();
        let first = clock.tick();
        let second = clock.tick();
        assert!(second >= first);
    }

    #[test]
    fn manual_clock_clones_share_state() {
        let clock = ManualClock::new(1_000);
        let handle = clock.shared();

        clock.advance_ms(250);

        assert_eq!(handle.tick(), Duration::from_millis(250));
        assert_eq!(handle.wall_ms(), 1_250);
    }

    #[test]
    fn set_wall_leaves_tick_alone() {
        let clock = ManualClock::new(0);
        clock.advance_ms(10);
        clock.set_wall_ms(5_000_000);

        assert_eq!(clock.tick(), Duration::from_millis(10));
        assert_eq!(clock.wall_ms(), 5_000_000);
    }
}
