//! The per-timer state machine.
//!
//! ```text
//! stopped --start--> running --pause--> paused --start--> running
//!    ^                                                       |
//!    +------------------------ reset (any state) ------------+
//! ```
//!
//! A counter keeps the time accrued before its current running session in
//! `elapsed` and, while running, the monotonic tick at which that session
//! began. The visible total is always derived on demand from the clock.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;

use crate::clock::Clock;
use crate::snapshot::{CounterSnapshot, validate_counter};
use crate::types::{CounterId, CounterState, Title, ValidationError, format_hms};

/// A single named timer.
#[derive(Clone)]
pub struct Counter {
    id: CounterId,
    title: Title,
    state: CounterState,
    elapsed: Duration,
    started_at: Option<Duration>,
    clock: Arc<dyn Clock>,
}

impl fmt::Debug for Counter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Counter")
            .field("id", &self.id)
            .field("title", &self.title)
            .field("state", &self.state)
            .field("elapsed", &self.elapsed)
            .field("started_at", &self.started_at)
            .finish_non_exhaustive()
    }
}

impl Counter {
    /// Creates a stopped counter with a freshly generated ID.
    pub fn new(title: impl Into<String>, clock: Arc<dyn Clock>) -> Result<Self, ValidationError> {
        Self::with_id(CounterId::generate(), title, clock)
    }

    /// Creates a stopped counter with a caller-chosen ID.
    pub fn with_id(
        id: CounterId,
        title: impl Into<String>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, ValidationError> {
        Ok(Self {
            id,
            title: Title::new(title)?,
            state: CounterState::Stopped,
            elapsed: Duration::ZERO,
            started_at: None,
            clock,
        })
    }

    /// Rebuilds a counter from a snapshot.
    ///
    /// A `running` snapshot comes back `paused`: the monotonic baseline it
    /// would need does not survive a restart.
    pub fn from_snapshot(snapshot: CounterSnapshot, clock: Arc<dyn Clock>) -> Self {
        let state = match snapshot.state {
            CounterState::Stopped => CounterState::Stopped,
            CounterState::Paused | CounterState::Running => CounterState::Paused,
        };
        Self {
            id: snapshot.id,
            title: snapshot.title,
            state,
            elapsed: Duration::from_millis(snapshot.elapsed_ms),
            started_at: None,
            clock,
        }
    }

    /// Rebuilds a counter from untyped JSON, rejecting malformed shapes.
    pub fn from_json(value: &Value, clock: Arc<dyn Clock>) -> Result<Self, ValidationError> {
        validate_counter(value).map_err(|err| ValidationError::MalformedSnapshot {
            reason: err.to_string(),
        })?;
        let snapshot: CounterSnapshot = serde_json::from_value(value.clone()).map_err(|err| {
            ValidationError::MalformedSnapshot {
                reason: err.to_string(),
            }
        })?;
        Ok(Self::from_snapshot(snapshot, clock))
    }

    pub const fn id(&self) -> &CounterId {
        &self.id
    }

    pub const fn title(&self) -> &Title {
        &self.title
    }

    pub const fn state(&self) -> CounterState {
        self.state
    }

    /// Monotonic tick at which the current running session began.
    pub const fn started_at(&self) -> Option<Duration> {
        self.started_at
    }

    /// Replaces the title, applying the same validation as construction.
    pub fn rename(&mut self, title: impl Into<String>) -> Result<(), ValidationError> {
        self.title = Title::new(title)?;
        Ok(())
    }

    /// Starts accruing time. Does nothing if already running.
    pub fn start(&mut self) {
        if self.state == CounterState::Running {
            return;
        }
        self.started_at = Some(self.clock.tick());
        self.state = CounterState::Running;
    }

    /// Folds the current session into the stored total. Does nothing unless running.
    pub fn pause(&mut self) {
        if self.state != CounterState::Running {
            return;
        }
        self.elapsed += self.session_elapsed();
        self.started_at = None;
        self.state = CounterState::Paused;
    }

    /// Clears all accrued time and stops.
    pub fn reset(&mut self) {
        self.state = CounterState::Stopped;
        self.elapsed = Duration::ZERO;
        self.started_at = None;
    }

    /// Credits time to the stored base, leaving state and session untouched.
    pub fn add_elapsed_ms(&mut self, ms: u64) {
        self.elapsed = self.elapsed.saturating_add(Duration::from_millis(ms));
    }

    /// Total elapsed time, including the running session if any.
    pub fn elapsed(&self) -> Duration {
        if self.state == CounterState::Running {
            self.elapsed + self.session_elapsed()
        } else {
            self.elapsed
        }
    }

    /// Total elapsed time in whole milliseconds.
    pub fn elapsed_ms(&self) -> u64 {
        u64::try_from(self.elapsed().as_millis()).unwrap_or(u64::MAX)
    }

    /// Elapsed time as `HH:MM:SS`.
    pub fn formatted_time(&self) -> String {
        format_hms(self.elapsed_ms())
    }

    pub fn is_running(&self) -> bool {
        self.state == CounterState::Running
    }

    /// Serializable view of this counter.
    ///
    /// Running counters are recorded as paused with the time accrued so far.
    pub fn snapshot(&self) -> CounterSnapshot {
        let state = match self.state {
            CounterState::Running => CounterState::Paused,
            other => other,
        };
        CounterSnapshot {
            id: self.id.clone(),
            title: self.title.clone(),
            elapsed_ms: self.elapsed_ms(),
            state,
        }
    }

    fn session_elapsed(&self) -> Duration {
        self.started_at
            .map_or(Duration::ZERO, |start| self.clock.tick().saturating_sub(start))
    }
}
