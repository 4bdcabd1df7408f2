//! Orchestration of a bounded collection of counters.
//!
//! # Invariants
//!
//! - At most one counter is running. [`TimerManager::start_timer`] pauses the
//!   current one before starting the next, inside a single call.
//! - `running_id` only ever names a counter in the collection.
//! - The collection never drops below one counter or grows beyond
//!   [`MAX_COUNTERS`].
//!
//! Every mutation writes the whole collection through the [`SnapshotStore`].
//! A failed write is logged and otherwise ignored: in-memory state stays
//! authoritative.

use std::sync::Arc;

use thiserror::Error;

use crate::allocation::Allocation;
use crate::clock::Clock;
use crate::counter::Counter;
use crate::snapshot::{MAX_COUNTERS, Payload};
use crate::store::{DEFAULT_STORAGE_KEY, KeyValueStore, SnapshotStore};
use crate::types::{CounterId, ValidationError};

/// Errors returned by manager commands.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ManagerError {
    /// No counter has the given ID.
    #[error("timer not found: {id}")]
    NotFound { id: String },

    /// The collection is already at its maximum size.
    #[error("maximum of {max} timers reached")]
    LimitReached { max: usize },

    /// The last remaining counter cannot be removed.
    #[error("cannot remove the last timer")]
    LastTimer,

    /// The requested seed size is outside 1..=20.
    #[error("initial timer count must be between 1 and {max}, got {count}")]
    InvalidSeedCount { count: usize, max: usize },

    /// A title or other input failed validation.
    #[error(transparent)]
    Validation(#[from] ValidationError),
}

/// Construction options for a [`TimerManager`].
#[derive(Debug, Clone)]
pub struct ManagerConfig {
    /// Counters to create when nothing valid is stored. Default: 2.
    pub initial_count: usize,

    /// Durable key holding the snapshot.
    pub storage_key: String,
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self {
            initial_count: 2,
            storage_key: DEFAULT_STORAGE_KEY.to_string(),
        }
    }
}

/// Owns the counters and enforces chess-clock exclusivity.
#[derive(Debug)]
pub struct TimerManager<S: KeyValueStore> {
    counters: Vec<Counter>,
    running_id: Option<CounterId>,
    storage: SnapshotStore<S>,
    clock: Arc<dyn Clock>,
}

impl<S: KeyValueStore> TimerManager<S> {
    /// Creates a manager, hydrating from `store` when it holds a valid snapshot.
    ///
    /// Hydrated counters never come back running: their monotonic baseline
    /// died with the previous process.
    pub fn new(store: S, clock: Arc<dyn Clock>, config: &ManagerConfig) -> Result<Self, ManagerError> {
        if !(1..=MAX_COUNTERS).contains(&config.initial_count) {
            return Err(ManagerError::InvalidSeedCount {
                count: config.initial_count,
                max: MAX_COUNTERS,
            });
        }

        let storage = SnapshotStore::new(store, config.storage_key.clone(), Arc::clone(&clock));
        let counters = match storage.load() {
            Some(payload) => {
                tracing::debug!(count = payload.counters.len(), "restored timers from storage");
                payload
                    .counters
                    .into_iter()
                    .map(|snapshot| Counter::from_snapshot(snapshot, Arc::clone(&clock)))
                    .collect()
            }
            None => {
                tracing::debug!(count = config.initial_count, "seeding default timers");
                (1..=config.initial_count)
                    .map(|n| Counter::new(format!("Timer {n}"), Arc::clone(&clock)))
                    .collect::<Result<Vec<_>, _>>()?
            }
        };

        Ok(Self {
            counters,
            running_id: None,
            storage,
            clock,
        })
    }

    /// All counters in presentation order.
    pub fn all_timers(&self) -> &[Counter] {
        &self.counters
    }

    pub fn get_timer(&self, id: &str) -> Option<&Counter> {
        self.counters.iter().find(|c| c.id().as_str() == id)
    }

    /// The running counter, if any.
    pub fn running_timer(&self) -> Option<&Counter> {
        self.running_id
            .as_ref()
            .and_then(|id| self.get_timer(id.as_str()))
    }

    pub const fn running_id(&self) -> Option<&CounterId> {
        self.running_id.as_ref()
    }

    pub fn len(&self) -> usize {
        self.counters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.counters.is_empty()
    }

    /// Whether durable storage passed its availability probe.
    pub const fn storage_available(&self) -> bool {
        self.storage.is_available()
    }

    /// Starts `id`, pausing whichever counter is currently running.
    pub fn start_timer(&mut self, id: &str) -> Result<(), ManagerError> {
        let index = self.index_of(id)?;
        if self.counters[index].is_running() {
            return Ok(());
        }

        if let Some(running) = self.running_id.take() {
            if let Some(current) = self.counters.iter_mut().find(|c| *c.id() == running) {
                current.pause();
            }
        }

        let counter = &mut self.counters[index];
        counter.start();
        self.running_id = Some(counter.id().clone());
        tracing::debug!(id, "timer started");
        self.persist();
        Ok(())
    }

    /// Pauses `id` if it is the running counter; otherwise a no-op.
    pub fn pause_timer(&mut self, id: &str) -> Result<(), ManagerError> {
        let index = self.index_of(id)?;
        let counter = &mut self.counters[index];
        if counter.is_running() {
            counter.pause();
            self.running_id = None;
            tracing::debug!(id, "timer paused");
        }
        self.persist();
        Ok(())
    }

    /// Appends a counter. An absent or empty title becomes `Timer {n}`.
    pub fn add_timer(&mut self, title: Option<&str>) -> Result<&Counter, ManagerError> {
        if self.counters.len() >= MAX_COUNTERS {
            return Err(ManagerError::LimitReached { max: MAX_COUNTERS });
        }

        let title = match title {
            Some(title) if !title.is_empty() => title.to_string(),
            _ => format!("Timer {}", self.counters.len() + 1),
        };
        let counter = Counter::new(title, Arc::clone(&self.clock))?;
        tracing::debug!(id = %counter.id(), "timer added");
        self.counters.push(counter);
        self.persist();

        Ok(&self.counters[self.counters.len() - 1])
    }

    /// Removes `id`. The last remaining counter cannot be removed.
    pub fn remove_timer(&mut self, id: &str) -> Result<(), ManagerError> {
        if self.counters.len() <= 1 {
            return Err(ManagerError::LastTimer);
        }
        let index = self.index_of(id)?;

        let removed = self.counters.remove(index);
        if removed.is_running() {
            self.running_id = None;
        }
        tracing::debug!(id, "timer removed");
        self.persist();
        Ok(())
    }

    /// Resets every counter and clears the running one.
    pub fn reset_all(&mut self) {
        for counter in &mut self.counters {
            counter.reset();
        }
        self.running_id = None;
        self.persist();
    }

    /// Resets `id`, clearing the running slot if it was the running counter.
    pub fn reset_timer(&mut self, id: &str) -> Result<(), ManagerError> {
        let index = self.index_of(id)?;
        let counter = &mut self.counters[index];
        if counter.is_running() {
            self.running_id = None;
        }
        counter.reset();
        self.persist();
        Ok(())
    }

    /// Renames `id`. Validation failures are returned without persisting.
    pub fn update_timer_title(&mut self, id: &str, title: &str) -> Result<(), ManagerError> {
        let index = self.index_of(id)?;
        self.counters[index].rename(title)?;
        self.persist();
        Ok(())
    }

    /// Credits each allocation entry to the matching counter's stored total.
    ///
    /// Entries naming unknown counters are skipped. Returns `true` if at
    /// least one entry applied.
    ///
    /// A running counter is credited without moving its session baseline, so
    /// its displayed total includes both the credit and the live session.
    pub fn distribute_time(&mut self, allocation: &Allocation) -> bool {
        let mut applied = false;
        for (id, ms) in allocation {
            match self.counters.iter_mut().find(|c| c.id() == id) {
                Some(counter) => {
                    counter.add_elapsed_ms(ms);
                    applied = true;
                }
                None => tracing::warn!(%id, ms, "skipping allocation for unknown timer"),
            }
        }

        if applied {
            self.persist();
        }
        applied
    }

    fn index_of(&self, id: &str) -> Result<usize, ManagerError> {
        self.counters
            .iter()
            .position(|c| c.id().as_str() == id)
            .ok_or_else(|| ManagerError::NotFound { id: id.to_string() })
    }

    fn payload(&self) -> Payload {
        Payload {
            counters: self.counters.iter().map(Counter::snapshot).collect(),
            running_id: self.running_id.clone(),
        }
    }

    fn persist(&self) {
        if let Err(err) = self.storage.save(&self.payload()) {
            tracing::warn!(error = %err, "failed to persist timer state");
        }
    }
}
