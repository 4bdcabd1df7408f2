//! Durable key-value storage and the versioned snapshot adapter.
//!
//! The host supplies a [`KeyValueStore`]; the core never reaches for a global
//! handle. [`SnapshotStore`] wraps one with schema versioning, validation and
//! corruption recovery. Durability is best effort: nothing in here panics or
//! escalates a storage problem beyond a returned error value.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;
use std::sync::Arc;

use thiserror::Error;

use crate::clock::Clock;
use crate::snapshot::{
    Payload, PersistedSnapshot, SCHEMA_VERSION, SnapshotError, validate_payload,
};

/// Default key for the timer snapshot.
pub const DEFAULT_STORAGE_KEY: &str = "productivity-timers-v1";

const PROBE_KEY: &str = "__storage_test__";

/// Failures reported by a [`KeyValueStore`] implementation.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The store cannot be used at all.
    #[error("storage unavailable")]
    Unavailable,

    /// A write would exceed the store's capacity.
    #[error("storage quota exceeded: {needed} bytes needed, {limit} allowed")]
    QuotaExceeded { needed: usize, limit: usize },

    /// The backing implementation failed.
    #[error("storage backend error: {0}")]
    Backend(#[source] Box<dyn std::error::Error + Send + Sync>),
}

/// A host-provided durable string store.
///
/// Methods take `&self` so one store can be shared between the timer
/// manager and the idle tracker; implementations use interior mutability.
pub trait KeyValueStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError>;
    fn set(&self, key: &str, value: &str) -> Result<(), StoreError>;
    fn remove(&self, key: &str) -> Result<(), StoreError>;
}

impl<T: KeyValueStore + ?Sized> KeyValueStore for &T {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        (**self).get(key)
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        (**self).set(key, value)
    }

    fn remove(&self, key: &str) -> Result<(), StoreError> {
        (**self).remove(key)
    }
}

impl<T: KeyValueStore + ?Sized> KeyValueStore for Rc<T> {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        (**self).get(key)
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        (**self).set(key, value)
    }

    fn remove(&self, key: &str) -> Result<(), StoreError> {
        (**self).remove(key)
    }
}

impl<T: KeyValueStore + ?Sized> KeyValueStore for Arc<T> {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        (**self).get(key)
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        (**self).set(key, value)
    }

    fn remove(&self, key: &str) -> Result<(), StoreError> {
        (**self).remove(key)
    }
}

/// In-memory store, mainly for tests.
///
/// Can be capped at a byte quota (keys plus values) or made entirely
/// unavailable to exercise the recovery paths.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: RefCell<HashMap<String, String>>,
    quota: Option<usize>,
    unavailable: bool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// A store that rejects writes that would grow it beyond `bytes`.
    pub fn with_quota(bytes: usize) -> Self {
        Self {
            quota: Some(bytes),
            ..Self::default()
        }
    }

    /// A store on which every operation fails.
    pub fn unavailable() -> Self {
        Self {
            unavailable: true,
            ..Self::default()
        }
    }

    /// Returns the raw value under `key`, bypassing error handling.
    pub fn raw(&self, key: &str) -> Option<String> {
        self.entries.borrow().get(key).cloned()
    }

    fn used_bytes_without(&self, key: &str) -> usize {
        self.entries
            .borrow()
            .iter()
            .filter(|(k, _)| k.as_str() != key)
            .map(|(k, v)| k.len() + v.len())
            .sum()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        if self.unavailable {
            return Err(StoreError::Unavailable);
        }
        Ok(self.entries.borrow().get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        if self.unavailable {
            return Err(StoreError::Unavailable);
        }
        if let Some(limit) = self.quota {
            let needed = self.used_bytes_without(key) + key.len() + value.len();
            if needed > limit {
                return Err(StoreError::QuotaExceeded { needed, limit });
            }
        }
        self.entries
            .borrow_mut()
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StoreError> {
        if self.unavailable {
            return Err(StoreError::Unavailable);
        }
        self.entries.borrow_mut().remove(key);
        Ok(())
    }
}

/// Why a snapshot could not be saved.
#[derive(Debug, Error)]
pub enum PersistenceError {
    /// The availability probe failed at construction.
    #[error("durable storage is unavailable")]
    Unavailable,

    /// The payload failed structural validation.
    #[error("refusing to save invalid payload: {0}")]
    Invalid(#[from] SnapshotError),

    /// The payload could not be encoded.
    #[error("failed to encode snapshot: {0}")]
    Encode(#[from] serde_json::Error),

    /// The underlying store rejected the write.
    #[error("failed to write snapshot: {0}")]
    Write(#[source] StoreError),
}

/// Versioned snapshot persistence on top of a [`KeyValueStore`].
#[derive(Debug)]
pub struct SnapshotStore<S> {
    store: S,
    key: String,
    available: bool,
    clock: Arc<dyn Clock>,
}

impl<S: KeyValueStore> SnapshotStore<S> {
    /// Wraps `store`, probing it with a throwaway write.
    pub fn new(store: S, key: impl Into<String>, clock: Arc<dyn Clock>) -> Self {
        let available = probe(&store);
        if !available {
            tracing::warn!("durable storage not available; timer state will not persist");
        }
        Self {
            store,
            key: key.into(),
            available,
            clock,
        }
    }

    pub const fn is_available(&self) -> bool {
        self.available
    }

    /// Validates and writes `payload` under the snapshot key.
    pub fn save(&self, payload: &Payload) -> Result<(), PersistenceError> {
        if !self.available {
            return Err(PersistenceError::Unavailable);
        }

        let value = serde_json::to_value(payload)?;
        validate_payload(&value)?;

        let envelope = PersistedSnapshot {
            schema_version: SCHEMA_VERSION,
            saved_at: self.clock.wall_ms(),
            payload: value,
        };
        let encoded = serde_json::to_string(&envelope)?;

        self.store.set(&self.key, &encoded).map_err(|err| {
            match &err {
                StoreError::QuotaExceeded { .. } => {
                    tracing::warn!(key = %self.key, error = %err, "storage quota exceeded; state not saved");
                }
                _ => tracing::warn!(key = %self.key, error = %err, "failed to save state"),
            }
            PersistenceError::Write(err)
        })
    }

    /// Reads the snapshot, clearing the slot if it is corrupt or stale.
    pub fn load(&self) -> Option<Payload> {
        if !self.available {
            return None;
        }

        let raw = match self.store.get(&self.key) {
            Ok(Some(raw)) => raw,
            Ok(None) => return None,
            Err(err) => {
                tracing::warn!(key = %self.key, error = %err, "failed to read stored state");
                return None;
            }
        };

        let envelope: PersistedSnapshot = match serde_json::from_str(&raw) {
            Ok(envelope) => envelope,
            Err(err) => {
                tracing::warn!(key = %self.key, error = %err, "stored state is not a valid snapshot; clearing");
                self.clear();
                return None;
            }
        };

        if envelope.schema_version != SCHEMA_VERSION {
            tracing::warn!(
                found = envelope.schema_version,
                expected = SCHEMA_VERSION,
                "snapshot schema version mismatch; clearing old data"
            );
            self.clear();
            return None;
        }

        if let Err(err) = validate_payload(&envelope.payload) {
            tracing::warn!(error = %err, "invalid timer state in storage; clearing corrupted data");
            self.clear();
            return None;
        }

        match serde_json::from_value(envelope.payload) {
            Ok(payload) => Some(payload),
            Err(err) => {
                tracing::warn!(error = %err, "stored timer state failed to decode; clearing");
                self.clear();
                None
            }
        }
    }

    /// Removes the snapshot. Failures are logged.
    pub fn clear(&self) {
        if !self.available {
            return;
        }
        if let Err(err) = self.store.remove(&self.key) {
            tracing::warn!(key = %self.key, error = %err, "failed to clear stored state");
        }
    }
}

fn probe<S: KeyValueStore>(store: &S) -> bool {
    store
        .set(PROBE_KEY, PROBE_KEY)
        .and_then(|()| store.remove(PROBE_KEY))
        .is_ok()
}
