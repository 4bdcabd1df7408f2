//! Idle detection across hidden/visible transitions and process restarts.
//!
//! A hidden transition writes the current wall time under a well-known
//! durable key. The next visible transition consumes that marker: it is
//! deleted *before* the idle duration is evaluated, so one idle interval is
//! reported at most once no matter how quickly visibility toggles.
//!
//! Because the marker lives in durable storage, an interval that spans a
//! full restart is still reconstructed: the tracker runs one visible check
//! at construction.

use std::fmt;
use std::sync::Arc;

use crate::clock::Clock;
use crate::store::KeyValueStore;

/// Default durable key for the idle marker.
pub const DEFAULT_MARKER_KEY: &str = "idle_detector_hidden_at";

/// Host visibility as reported by the embedding environment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Visibility {
    Hidden,
    Visible,
}

/// Result of a visible-transition check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdleOutcome {
    /// Nothing to reconcile; carry on.
    Resumed,
    /// The host was away longer than the threshold.
    Idle { idle_ms: u64 },
}

/// Tracker settings.
#[derive(Debug, Clone)]
pub struct IdleConfig {
    /// Absences up to and including this long count as a resume.
    pub threshold_ms: u64,
    pub marker_key: String,
}

impl Default for IdleConfig {
    fn default() -> Self {
        Self {
            threshold_ms: 10_000,
            marker_key: DEFAULT_MARKER_KEY.to_string(),
        }
    }
}

type IdleCallback = Box<dyn FnMut(u64)>;
type ResumeCallback = Box<dyn FnMut()>;

/// Records visibility transitions and reports idle intervals.
pub struct IdleTracker<S> {
    store: S,
    clock: Arc<dyn Clock>,
    config: IdleConfig,
    on_idle: IdleCallback,
    on_resume: ResumeCallback,
}

impl<S> fmt::Debug for IdleTracker<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IdleTracker")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl<S: KeyValueStore> IdleTracker<S> {
    /// Creates a tracker and immediately runs one visible check.
    ///
    /// That first check picks up a marker left behind when the process went
    /// away while hidden.
    pub fn new(
        store: S,
        clock: Arc<dyn Clock>,
        config: IdleConfig,
        on_idle: impl FnMut(u64) + 'static,
        on_resume: impl FnMut() + 'static,
    ) -> Self {
        let mut tracker = Self {
            store,
            clock,
            config,
            on_idle: Box::new(on_idle),
            on_resume: Box::new(on_resume),
        };
        tracker.on_visible();
        tracker
    }

    /// Dispatches a visibility change.
    pub fn handle(&mut self, visibility: Visibility) -> Option<IdleOutcome> {
        match visibility {
            Visibility::Hidden => {
                self.on_hidden();
                None
            }
            Visibility::Visible => Some(self.on_visible()),
        }
    }

    /// Records the moment the host went hidden. Last write wins.
    pub fn on_hidden(&mut self) {
        let now = self.clock.wall_ms();
        if let Err(err) = self.store.set(&self.config.marker_key, &now.to_string()) {
            tracing::warn!(error = %err, "failed to record hidden timestamp");
        }
    }

    /// Consumes the marker and fires exactly one callback.
    pub fn on_visible(&mut self) -> IdleOutcome {
        let outcome = self.consume_marker();
        match outcome {
            IdleOutcome::Idle { idle_ms } => {
                tracing::debug!(idle_ms, "idle interval detected");
                (self.on_idle)(idle_ms);
            }
            IdleOutcome::Resumed => (self.on_resume)(),
        }
        outcome
    }

    /// Whether a hidden marker is currently stored.
    pub fn has_pending_marker(&self) -> bool {
        matches!(self.store.get(&self.config.marker_key), Ok(Some(_)))
    }

    fn consume_marker(&self) -> IdleOutcome {
        let raw = match self.store.get(&self.config.marker_key) {
            Ok(Some(raw)) => raw,
            Ok(None) => return IdleOutcome::Resumed,
            Err(err) => {
                tracing::warn!(error = %err, "failed to read hidden timestamp");
                return IdleOutcome::Resumed;
            }
        };

        if let Err(err) = self.store.remove(&self.config.marker_key) {
            tracing::warn!(error = %err, "failed to clear hidden timestamp");
        }

        let Ok(hidden_at) = raw.trim().parse::<i64>() else {
            tracing::warn!(value = %raw, "ignoring unparseable hidden timestamp");
            return IdleOutcome::Resumed;
        };

        let Some(span) = self.clock.wall_ms().checked_sub(hidden_at) else {
            tracing::warn!(hidden_at, "ignoring out-of-range hidden timestamp");
            return IdleOutcome::Resumed;
        };
        // A wall clock stepped backwards yields a negative span; treat as zero.
        let idle_ms = u64::try_from(span).unwrap_or(0);
        if idle_ms > self.config.threshold_ms {
            IdleOutcome::Idle { idle_ms }
        } else {
            IdleOutcome::Resumed
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::store::MemoryStore;
    use std::cell::RefCell;
    use std::rc::Rc;

    const NOW: i64 = 1_736_931_600_000;

    #[derive(Debug, Default)]
    struct Calls {
        idle: Vec<u64>,
        resumed: usize,
    }

    fn tracker(
        store: &Rc<MemoryStore>,
        clock: &ManualClock,
    ) -> (IdleTracker<Rc<MemoryStore>>, Rc<RefCell<Calls>>) {
        let calls = Rc::new(RefCell::new(Calls::default()));
        let idle_calls = Rc::clone(&calls);
        let resume_calls = Rc::clone(&calls);
        let tracker = IdleTracker::new(
            Rc::clone(store),
            clock.shared(),
            IdleConfig::default(),
            move |ms| idle_calls.borrow_mut().idle.push(ms),
            move || resume_calls.borrow_mut().resumed += 1,
        );
        (tracker, calls)
    }

    fn set_marker(store: &MemoryStore, at: i64) {
        store.set(DEFAULT_MARKER_KEY, &at.to_string()).unwrap();
    }

    #[test]
    fn construction_without_marker_resumes() {
        let store = Rc::new(MemoryStore::new());
        let clock = ManualClock::new(NOW);
        let (_tracker, calls) = tracker(&store, &clock);

        assert_eq!(calls.borrow().resumed, 1);
        assert!(calls.borrow().idle.is_empty());
    }

    #[test]
    fn long_absence_fires_idle_callback() {
        let store = Rc::new(MemoryStore::new());
        let clock = ManualClock::new(NOW);
        let (mut tracker, calls) = tracker(&store, &clock);

        set_marker(&store, NOW - 15_000);
        let outcome = tracker.on_visible();

        assert!(matches!(outcome, IdleOutcome::Idle { idle_ms } if idle_ms >= 15_000));
        assert_eq!(calls.borrow().idle, vec![15_000]);
        assert!(store.raw(DEFAULT_MARKER_KEY).is_none());
    }

    #[test]
    fn short_absence_resumes() {
        let store = Rc::new(MemoryStore::new());
        let clock = ManualClock::new(NOW);
        let (mut tracker, calls) = tracker(&store, &clock);

        set_marker(&store, NOW - 5_000);
        assert_eq!(tracker.on_visible(), IdleOutcome::Resumed);

        assert!(calls.borrow().idle.is_empty());
        assert_eq!(calls.borrow().resumed, 2);
        assert!(store.raw(DEFAULT_MARKER_KEY).is_none());
    }

    #[test]
    fn exactly_threshold_is_not_idle() {
        let store = Rc::new(MemoryStore::new());
        let clock = ManualClock::new(NOW);
        let (mut tracker, _calls) = tracker(&store, &clock);

        set_marker(&store, NOW - 10_000);
        assert_eq!(tracker.on_visible(), IdleOutcome::Resumed);
    }

    #[test]
    fn hidden_then_visible_measures_the_gap() {
        let store = Rc::new(MemoryStore::new());
        let clock = ManualClock::new(NOW);
        let (mut tracker, calls) = tracker(&store, &clock);

        assert_eq!(tracker.handle(Visibility::Hidden), None);
        assert!(tracker.has_pending_marker());
        clock.advance_ms(45_000);
        assert_eq!(
            tracker.handle(Visibility::Visible),
            Some(IdleOutcome::Idle { idle_ms: 45_000 })
        );
        assert_eq!(calls.borrow().idle, vec![45_000]);
    }

    #[test]
    fn repeated_visible_checks_consume_once() {
        let store = Rc::new(MemoryStore::new());
        let clock = ManualClock::new(NOW);
        let (mut tracker, calls) = tracker(&store, &clock);
        let resumed_at_start = calls.borrow().resumed;

        set_marker(&store, NOW - 60_000);
        tracker.on_visible();
        tracker.on_visible();

        let calls = calls.borrow();
        assert_eq!(calls.idle.len(), 1);
        assert_eq!(calls.resumed - resumed_at_start, 1);
    }

    #[test]
    fn last_hidden_write_wins() {
        let store = Rc::new(MemoryStore::new());
        let clock = ManualClock::new(NOW);
        let (mut tracker, _calls) = tracker(&store, &clock);

        tracker.on_hidden();
        clock.advance_ms(30_000);
        tracker.on_hidden();
        clock.advance_ms(1_000);

        assert_eq!(tracker.on_visible(), IdleOutcome::Resumed);
    }

    #[test]
    fn marker_left_before_restart_is_reported_at_construction() {
        let store = Rc::new(MemoryStore::new());
        set_marker(&store, NOW - 120_000);

        let clock = ManualClock::new(NOW);
        let (_tracker, calls) = tracker(&store, &clock);

        assert_eq!(calls.borrow().idle, vec![120_000]);
        assert_eq!(calls.borrow().resumed, 0);
        assert!(store.raw(DEFAULT_MARKER_KEY).is_none());
    }

    #[test]
    fn garbage_marker_is_cleared_and_resumes() {
        let store = Rc::new(MemoryStore::new());
        store.set(DEFAULT_MARKER_KEY, "yesterday").unwrap();

        let clock = ManualClock::new(NOW);
        let (_tracker, calls) = tracker(&store, &clock);

        assert_eq!(calls.borrow().resumed, 1);
        assert!(store.raw(DEFAULT_MARKER_KEY).is_none());
    }

    #[test]
    fn out_of_range_marker_is_cleared_and_resumes() {
        for extreme in [i64::MIN, i64::MIN + 1] {
            let store = Rc::new(MemoryStore::new());
            set_marker(&store, extreme);

            let clock = ManualClock::new(NOW);
            let (_tracker, calls) = tracker(&store, &clock);

            assert!(calls.borrow().idle.is_empty());
            assert_eq!(calls.borrow().resumed, 1);
            assert!(store.raw(DEFAULT_MARKER_KEY).is_none());
        }
    }

    #[test]
    fn far_future_marker_counts_as_zero_idle() {
        let store = Rc::new(MemoryStore::new());
        set_marker(&store, i64::MAX);

        let clock = ManualClock::new(NOW);
        let (_tracker, calls) = tracker(&store, &clock);

        assert!(calls.borrow().idle.is_empty());
        assert_eq!(calls.borrow().resumed, 1);
    }

    #[test]
    fn marker_in_the_future_counts_as_zero_idle() {
        let store = Rc::new(MemoryStore::new());
        set_marker(&store, NOW + 60_000);

        let clock = ManualClock::new(NOW);
        let (_tracker, calls) = tracker(&store, &clock);

        assert!(calls.borrow().idle.is_empty());
        assert_eq!(calls.borrow().resumed, 1);
    }
}
