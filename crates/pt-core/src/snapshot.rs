//! Persisted snapshot schema and its structural validator.
//!
//! # Wire format
//!
//! ```json
//! {
//!   "schemaVersion": 1,
//!   "savedAt": 1736931600000,
//!   "payload": {
//!     "counters": [{"id": "…", "title": "Timer 1", "elapsedMs": 0, "state": "stopped"}],
//!     "runningId": null
//!   }
//! }
//! ```
//!
//! Validation runs on the untyped [`Value`] before any typed decoding so that
//! a rejected snapshot yields a reason instead of a half-parsed struct.

use std::collections::HashSet;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::types::{CounterId, CounterState, Title};

/// Current snapshot schema version.
pub const SCHEMA_VERSION: i64 = 1;

/// Upper bound on counters in one collection (and one snapshot).
pub const MAX_COUNTERS: usize = 20;

/// Why a snapshot (or one of its counters) was rejected.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SnapshotError {
    #[error("payload must be an object")]
    NotAnObject,
    #[error("counters must be a list")]
    CountersNotAList,
    #[error("counters must hold between 1 and {max} entries, got {count}")]
    CounterCount { count: usize, max: usize },
    #[error("counter {index}: {reason}")]
    InvalidCounter { index: usize, reason: String },
    #[error("duplicate counter id: {id}")]
    DuplicateId { id: String },
    #[error("runningId must be null or a string")]
    RunningIdType,
    #[error("runningId {id} does not match any counter")]
    DanglingRunningId { id: String },
}

/// Persisted form of one counter. Never carries a monotonic baseline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CounterSnapshot {
    pub id: CounterId,
    pub title: Title,
    #[serde(deserialize_with = "deserialize_millis")]
    pub elapsed_ms: u64,
    pub state: CounterState,
}

/// The collection state a manager persists.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Payload {
    pub counters: Vec<CounterSnapshot>,
    pub running_id: Option<CounterId>,
}

/// Versioned envelope written to the durable store.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersistedSnapshot {
    pub schema_version: i64,
    pub saved_at: i64,
    pub payload: Value,
}

/// Accepts any non-negative JSON number, flooring fractional milliseconds.
fn deserialize_millis<'de, D>(deserializer: D) -> Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    let value = f64::deserialize(deserializer)?;
    if !value.is_finite() || value < 0.0 {
        return Err(serde::de::Error::custom(format!(
            "elapsedMs must be a non-negative number, got {value}"
        )));
    }
    #[expect(
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss,
        reason = "value is finite, non-negative and floored"
    )]
    let ms = value.floor() as u64;
    Ok(ms)
}

/// Checks one counter entry.
pub fn validate_counter(value: &Value) -> Result<(), String> {
    let Some(obj) = value.as_object() else {
        return Err("entry must be an object".to_string());
    };

    match obj.get("id").and_then(Value::as_str) {
        Some(id) if !id.is_empty() => {}
        _ => return Err("id must be a non-empty string".to_string()),
    }

    match obj.get("title").and_then(Value::as_str) {
        Some(title) if !title.is_empty() => {}
        _ => return Err("title must be a non-empty string".to_string()),
    }

    match obj.get("elapsedMs").and_then(Value::as_f64) {
        Some(ms) if ms.is_finite() && ms >= 0.0 => {}
        _ => return Err("elapsedMs must be a number >= 0".to_string()),
    }

    match obj.get("state").and_then(Value::as_str) {
        Some(state) if state.parse::<CounterState>().is_ok() => {}
        Some(state) => return Err(format!("unknown state: {state}")),
        None => return Err("state must be a string".to_string()),
    }

    Ok(())
}

/// Checks a whole payload; any failure invalidates the snapshot.
pub fn validate_payload(value: &Value) -> Result<(), SnapshotError> {
    let obj = value.as_object().ok_or(SnapshotError::NotAnObject)?;

    let counters = obj
        .get("counters")
        .and_then(Value::as_array)
        .ok_or(SnapshotError::CountersNotAList)?;

    if counters.is_empty() || counters.len() > MAX_COUNTERS {
        return Err(SnapshotError::CounterCount {
            count: counters.len(),
            max: MAX_COUNTERS,
        });
    }

    let mut ids = HashSet::with_capacity(counters.len());
    for (index, counter) in counters.iter().enumerate() {
        validate_counter(counter).map_err(|reason| SnapshotError::InvalidCounter { index, reason })?;
        // validate_counter guarantees a string id
        let id = counter["id"].as_str().unwrap_or_default();
        if !ids.insert(id) {
            return Err(SnapshotError::DuplicateId { id: id.to_string() });
        }
    }

    match obj.get("runningId") {
        None | Some(Value::Null) => Ok(()),
        Some(Value::String(id)) if ids.contains(id.as_str()) => Ok(()),
        Some(Value::String(id)) => Err(SnapshotError::DanglingRunningId { id: id.clone() }),
        Some(_) => Err(SnapshotError::RunningIdType),
    }
}
