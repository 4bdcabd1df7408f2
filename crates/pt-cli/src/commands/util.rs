//! Shared utilities for CLI commands.

use std::io::Write;

use pt_core::{CounterId, KeyValueStore, ManagerError, TimerManager};

/// Resolves a user-supplied timer reference.
///
/// Accepts a 1-based position as listed by `status`, or a timer ID.
pub fn resolve_timer<S: KeyValueStore>(
    manager: &TimerManager<S>,
    reference: &str,
) -> Result<CounterId, ManagerError> {
    let timers = manager.all_timers();

    let by_position = reference
        .parse::<usize>()
        .ok()
        .and_then(|position| position.checked_sub(1))
        .and_then(|index| timers.get(index));
    if let Some(counter) = by_position {
        return Ok(counter.id().clone());
    }

    manager
        .get_timer(reference)
        .map(|counter| counter.id().clone())
        .ok_or_else(|| ManagerError::NotFound {
            id: reference.to_string(),
        })
}

/// Writes one line per timer: position, title, state, time and ID.
pub fn write_timers<W: Write, S: KeyValueStore>(
    writer: &mut W,
    manager: &TimerManager<S>,
) -> std::io::Result<()> {
    let width = manager
        .all_timers()
        .iter()
        .map(|c| c.title().as_str().chars().count())
        .max()
        .unwrap_or(0);

    for (index, counter) in manager.all_timers().iter().enumerate() {
        writeln!(
            writer,
            "{}. {:<width$}  {:<7}  {}  {}",
            index + 1,
            counter.title().as_str(),
            counter.state().as_str(),
            counter.formatted_time(),
            counter.id(),
        )?;
    }
    Ok(())
}
