//! Core timekeeping for chess-clock productivity timers.
//!
//! This crate contains:
//! - Counter: the per-timer start/pause/reset state machine
//! - Manager: a bounded collection where at most one counter runs
//! - Allocation: lossless splitting of idle time across counters
//! - Store: versioned, self-healing persistence over a host key-value store
//! - Idle: reconstructing idle intervals across hidden/visible transitions

pub mod allocation;
pub mod clock;
mod counter;
pub mod idle;
mod manager;
pub mod snapshot;
pub mod store;
mod strategy;
pub mod types;

pub use allocation::{Allocation, AllocationError};
pub use clock::{Clock, ManualClock, SystemClock};
pub use counter::Counter;
pub use idle::{IdleConfig, IdleOutcome, IdleTracker, Visibility};
pub use manager::{ManagerConfig, ManagerError, TimerManager};
pub use snapshot::{CounterSnapshot, MAX_COUNTERS, Payload, SCHEMA_VERSION};
pub use store::{KeyValueStore, MemoryStore, PersistenceError, SnapshotStore, StoreError};
pub use strategy::{AllocationStrategy, PendingIdle};
pub use types::{CounterId, CounterState, Title, ValidationError, format_hms};
