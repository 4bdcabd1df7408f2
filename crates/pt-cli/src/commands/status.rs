//! Status command for listing timers.

use std::io::Write;

use anyhow::{Context, Result};
use serde::Serialize;

use pt_core::{CounterState, KeyValueStore, TimerManager};

use super::util::write_timers;

#[derive(Debug, Serialize)]
struct StatusOutput<'a> {
    timers: Vec<TimerOutput<'a>>,
    idle_pending: bool,
    storage_available: bool,
}

#[derive(Debug, Serialize)]
struct TimerOutput<'a> {
    position: usize,
    id: &'a str,
    title: &'a str,
    state: CounterState,
    elapsed_ms: u64,
    formatted: String,
}

pub fn run<W: Write, S: KeyValueStore>(
    writer: &mut W,
    manager: &TimerManager<S>,
    idle_pending: bool,
    json: bool,
) -> Result<()> {
    if json {
        let output = StatusOutput {
            timers: manager
                .all_timers()
                .iter()
                .enumerate()
                .map(|(index, counter)| TimerOutput {
                    position: index + 1,
                    id: counter.id().as_str(),
                    title: counter.title().as_str(),
                    state: counter.state(),
                    elapsed_ms: counter.elapsed_ms(),
                    formatted: counter.formatted_time(),
                })
                .collect(),
            idle_pending,
            storage_available: manager.storage_available(),
        };
        let json = serde_json::to_string_pretty(&output).context("failed to serialize status")?;
        writeln!(writer, "{json}")?;
        return Ok(());
    }

    writeln!(writer, "Productivity timers")?;
    write_timers(writer, manager)?;

    if idle_pending {
        writeln!(writer, "Idle: time away is waiting to be assigned (run `pt shell`)")?;
    }
    if !manager.storage_available() {
        writeln!(writer, "Storage: unavailable, changes will not be saved")?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    use insta::assert_snapshot;
    use pt_core::store::DEFAULT_STORAGE_KEY;
    use pt_core::{ManagerConfig, ManualClock, MemoryStore};

    const STORED: &str = r#"{"schemaVersion":1,"savedAt":0,"payload":{"counters":[
        {"id":"a","title":"Writing","elapsedMs":5400000,"state":"paused"},
        {"id":"b","title":"Email","elapsedMs":0,"state":"stopped"}
    ],"runningId":null}}"#;

    fn manager(store: MemoryStore) -> TimerManager<MemoryStore> {
        TimerManager::new(store, ManualClock::new(0).shared(), &ManagerConfig::default()).unwrap()
    }

    fn stored_manager() -> TimerManager<MemoryStore> {
        let store = MemoryStore::new();
        store.set(DEFAULT_STORAGE_KEY, STORED).unwrap();
        manager(store)
    }

    fn render(manager: &TimerManager<MemoryStore>, idle_pending: bool, json: bool) -> String {
        let mut output = Vec::new();
        run(&mut output, manager, idle_pending, json).unwrap();
        String::from_utf8(output).unwrap()
    }

    #[test]
    fn status_lists_timers() {
        let output = render(&stored_manager(), false, false);
        assert_snapshot!(output, @r"
        Productivity timers
        1. Writing  paused   01:30:00  a
        2. Email    stopped  00:00:00  b
        ");
    }

    #[test]
    fn status_mentions_pending_idle_and_missing_storage() {
        let manager = manager(MemoryStore::unavailable());
        let ids: Vec<String> = manager
            .all_timers()
            .iter()
            .map(|c| c.id().to_string())
            .collect();

        let mut output = render(&manager, true, false);
        for (n, id) in ids.iter().enumerate() {
            output = output.replace(id.as_str(), &format!("[ID{}]", n + 1));
        }
        assert_snapshot!(output, @r"
        Productivity timers
        1. Timer 1  stopped  00:00:00  [ID1]
        2. Timer 2  stopped  00:00:00  [ID2]
        Idle: time away is waiting to be assigned (run `pt shell`)
        Storage: unavailable, changes will not be saved
        ");
    }

    #[test]
    fn status_json() {
        let output = render(&stored_manager(), false, true);
        assert_snapshot!(output, @r#"
        {
          "timers": [
            {
              "position": 1,
              "id": "a",
              "title": "Writing",
              "state": "paused",
              "elapsed_ms": 5400000,
              "formatted": "01:30:00"
            },
            {
              "position": 2,
              "id": "b",
              "title": "Email",
              "state": "stopped",
              "elapsed_ms": 0,
              "formatted": "00:00:00"
            }
          ],
          "idle_pending": false,
          "storage_available": true
        }
        "#);
    }
}
