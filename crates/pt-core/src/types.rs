//! Core type definitions with validation.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Maximum title length, counted in characters.
pub const MAX_TITLE_CHARS: usize = 50;

/// Validation errors for core types.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// The provided value was empty.
    #[error("{field} cannot be empty")]
    Empty { field: &'static str },

    /// The title was empty.
    #[error("title cannot be empty")]
    EmptyTitle,

    /// The title exceeded [`MAX_TITLE_CHARS`].
    #[error("title cannot exceed {max} characters, got {len}")]
    TitleTooLong { len: usize, max: usize },

    /// Invalid counter state value.
    #[error("invalid counter state: {value}")]
    InvalidState { value: String },

    /// A serialized counter did not have the expected shape.
    #[error("malformed counter snapshot: {reason}")]
    MalformedSnapshot { reason: String },
}

/// Lifecycle state of a single counter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CounterState {
    /// Never started, or reset.
    Stopped,
    /// Holds accrued time but is not accruing.
    Paused,
    /// Currently accruing time.
    Running,
}

impl CounterState {
    /// Every accepted wire value, in declaration order.
    pub const ALL: [Self; 3] = [Self::Stopped, Self::Paused, Self::Running];

    /// String representation used in snapshots.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Stopped => "stopped",
            Self::Paused => "paused",
            Self::Running => "running",
        }
    }
}

impl fmt::Display for CounterState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for CounterState {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "stopped" => Ok(Self::Stopped),
            "paused" => Ok(Self::Paused),
            "running" => Ok(Self::Running),
            _ => Err(ValidationError::InvalidState {
                value: s.to_string(),
            }),
        }
    }
}

/// A validated counter identifier.
///
/// Counter IDs must be non-empty strings. Freshly created counters get a
/// UUID v4; hydrated counters keep whatever ID was persisted.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct CounterId(String);

impl CounterId {
    /// Creates a new ID after validation.
    pub fn new(id: impl Into<String>) -> Result<Self, ValidationError> {
        let id = id.into();
        if id.is_empty() {
            return Err(ValidationError::Empty { field: "counter ID" });
        }
        Ok(Self(id))
    }

    /// Generates a random ID.
    #[must_use]
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    /// Returns the ID as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for CounterId {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<CounterId> for String {
    fn from(id: CounterId) -> Self {
        id.0
    }
}

impl fmt::Display for CounterId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl AsRef<str> for CounterId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl PartialEq<str> for CounterId {
    fn eq(&self, other: &str) -> bool {
        self.0 == other
    }
}

/// A user-editable counter label of 1 to [`MAX_TITLE_CHARS`] characters.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Title(String);

impl Title {
    /// Creates a new title after validation.
    pub fn new(title: impl Into<String>) -> Result<Self, ValidationError> {
        let title = title.into();
        if title.is_empty() {
            return Err(ValidationError::EmptyTitle);
        }
        let len = title.chars().count();
        if len > MAX_TITLE_CHARS {
            return Err(ValidationError::TitleTooLong {
                len,
                max: MAX_TITLE_CHARS,
            });
        }
        Ok(Self(title))
    }

    /// Returns the title as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for Title {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Title> for String {
    fn from(title: Title) -> Self {
        title.0
    }
}

impl fmt::Display for Title {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Formats milliseconds as zero-padded `HH:MM:SS`.
///
/// Hours are not capped, so long totals render as e.g. `125:30:45`.
#[must_use]
pub fn format_hms(ms: u64) -> String {
    let total_seconds = ms / 1000;
    let hours = total_seconds / 3600;
    let minutes = (total_seconds % 3600) / 60;
    let seconds = total_seconds % 60;
    format!("{hours:02}:{minutes:02}:{seconds:02}")
}
