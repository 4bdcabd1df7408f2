//! One-shot timer mutations: add, rename, remove, reset, credit.

use std::io::Write;

use anyhow::{Context, Result};

use pt_core::allocation::{hours_minutes_to_ms, to_single};
use pt_core::{KeyValueStore, TimerManager, format_hms};

use super::util::resolve_timer;

pub fn add<W: Write, S: KeyValueStore>(
    writer: &mut W,
    manager: &mut TimerManager<S>,
    title: Option<&str>,
) -> Result<()> {
    let counter = manager.add_timer(title.map(str::trim))?;
    let (title, id) = (counter.title().to_string(), counter.id().to_string());
    writeln!(writer, "Added timer {}: {title} ({id})", manager.len())?;
    Ok(())
}

pub fn rename<W: Write, S: KeyValueStore>(
    writer: &mut W,
    manager: &mut TimerManager<S>,
    timer: &str,
    title: &str,
) -> Result<()> {
    let id = resolve_timer(manager, timer)?;
    manager.update_timer_title(id.as_str(), title)?;
    writeln!(writer, "Renamed timer to {title}")?;
    Ok(())
}

pub fn remove<W: Write, S: KeyValueStore>(
    writer: &mut W,
    manager: &mut TimerManager<S>,
    timer: &str,
) -> Result<()> {
    let id = resolve_timer(manager, timer)?;
    let title = title_of(manager, id.as_str());
    manager.remove_timer(id.as_str())?;
    writeln!(writer, "Removed timer: {title}")?;
    Ok(())
}

pub fn reset<W: Write, S: KeyValueStore>(
    writer: &mut W,
    manager: &mut TimerManager<S>,
    timer: Option<&str>,
) -> Result<()> {
    let Some(timer) = timer else {
        manager.reset_all();
        writeln!(writer, "Reset all timers")?;
        return Ok(());
    };

    let id = resolve_timer(manager, timer)?;
    manager.reset_timer(id.as_str())?;
    writeln!(writer, "Reset timer: {}", title_of(manager, id.as_str()))?;
    Ok(())
}

/// Adds `minutes` to a timer's stored total.
pub fn credit<W: Write, S: KeyValueStore>(
    writer: &mut W,
    manager: &mut TimerManager<S>,
    timer: &str,
    minutes: u64,
) -> Result<()> {
    let id = resolve_timer(manager, timer)?;
    let ms = hours_minutes_to_ms(0, minutes).context("minutes value is too large")?;
    manager.distribute_time(&to_single(ms, id.clone()));

    let counter = manager.get_timer(id.as_str());
    writeln!(
        writer,
        "Credited {} to {} (now {})",
        format_hms(ms),
        counter.map_or("?", |c| c.title().as_str()),
        counter.map_or_else(|| format_hms(0), |c| c.formatted_time()),
    )?;
    Ok(())
}

fn title_of<S: KeyValueStore>(manager: &TimerManager<S>, id: &str) -> String {
    manager
        .get_timer(id)
        .map(|c| c.title().to_string())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::rc::Rc;

    use insta::assert_snapshot;
    use pt_core::store::DEFAULT_STORAGE_KEY;
    use pt_core::{ManagerConfig, ManagerError, ManualClock, MemoryStore};

    const STORED: &str = r#"{"schemaVersion":1,"savedAt":0,"payload":{"counters":[
        {"id":"a","title":"Writing","elapsedMs":60000,"state":"paused"},
        {"id":"b","title":"Email","elapsedMs":0,"state":"stopped"}
    ],"runningId":null}}"#;

    fn manager() -> TimerManager<MemoryStore> {
        let store = MemoryStore::new();
        store.set(DEFAULT_STORAGE_KEY, STORED).unwrap();
        TimerManager::new(store, ManualClock::new(0).shared(), &ManagerConfig::default()).unwrap()
    }

    fn output(buf: Vec<u8>) -> String {
        String::from_utf8(buf).unwrap()
    }

    #[test]
    fn add_with_default_title() {
        let mut manager = manager();
        let mut buf = Vec::new();
        add(&mut buf, &mut manager, None).unwrap();

        let id = manager.all_timers()[2].id().to_string();
        let text = output(buf).replace(&id, "[ID]");
        assert_snapshot!(text, @"Added timer 3: Timer 3 ([ID])");
    }

    #[test]
    fn add_rejects_overlong_title() {
        let mut manager = manager();
        let long = "x".repeat(51);
        let err = add(&mut Vec::new(), &mut manager, Some(&long)).unwrap_err();
        assert_eq!(err.to_string(), "title cannot exceed 50 characters, got 51");
        assert_eq!(manager.len(), 2);
    }

    #[test]
    fn rename_by_position() {
        let mut manager = manager();
        let mut buf = Vec::new();
        rename(&mut buf, &mut manager, "2", "Inbox").unwrap();

        assert_snapshot!(output(buf), @"Renamed timer to Inbox");
        assert_eq!(manager.get_timer("b").unwrap().title().as_str(), "Inbox");
    }

    #[test]
    fn remove_by_id_then_last_is_refused() {
        let mut manager = manager();
        let mut buf = Vec::new();
        remove(&mut buf, &mut manager, "a").unwrap();
        assert_snapshot!(output(buf), @"Removed timer: Writing");

        let err = remove(&mut Vec::new(), &mut manager, "1").unwrap_err();
        assert_eq!(
            err.downcast_ref::<ManagerError>(),
            Some(&ManagerError::LastTimer)
        );
    }

    #[test]
    fn reset_single_and_all() {
        let mut manager = manager();
        let mut buf = Vec::new();
        reset(&mut buf, &mut manager, Some("1")).unwrap();
        reset(&mut buf, &mut manager, None).unwrap();

        assert_snapshot!(output(buf), @r"
        Reset timer: Writing
        Reset all timers
        ");
        assert_eq!(manager.get_timer("a").unwrap().elapsed_ms(), 0);
    }

    #[test]
    fn credit_adds_minutes_and_persists() {
        let store = Rc::new(MemoryStore::new());
        store.set(DEFAULT_STORAGE_KEY, STORED).unwrap();
        let mut manager =
            TimerManager::new(Rc::clone(&store), ManualClock::new(0).shared(), &ManagerConfig::default())
                .unwrap();

        let mut buf = Vec::new();
        credit(&mut buf, &mut manager, "1", 15).unwrap();

        assert_snapshot!(output(buf), @"Credited 00:15:00 to Writing (now 00:16:00)");
        assert_eq!(manager.get_timer("a").unwrap().elapsed_ms(), 960_000);
        assert!(
            store
                .raw(DEFAULT_STORAGE_KEY)
                .unwrap()
                .contains(r#""elapsedMs":960000"#)
        );
    }

    #[test]
    fn credit_rejects_minutes_that_overflow() {
        let store = Rc::new(MemoryStore::new());
        store.set(DEFAULT_STORAGE_KEY, STORED).unwrap();
        let mut manager =
            TimerManager::new(Rc::clone(&store), ManualClock::new(0).shared(), &ManagerConfig::default())
                .unwrap();
        let before = store.raw(DEFAULT_STORAGE_KEY);

        let err = credit(&mut Vec::new(), &mut manager, "1", u64::MAX / 1000).unwrap_err();

        assert_eq!(err.to_string(), "minutes value is too large");
        assert_eq!(manager.get_timer("a").unwrap().elapsed_ms(), 60_000);
        assert_eq!(store.raw(DEFAULT_STORAGE_KEY), before);
    }

    #[test]
    fn credit_by_title_is_not_supported() {
        let mut manager = manager();
        assert!(credit(&mut Vec::new(), &mut manager, "Writing", 15).is_err());
    }

    #[test]
    fn unknown_timer_is_reported() {
        let mut manager = manager();
        let err = reset(&mut Vec::new(), &mut manager, Some("9")).unwrap_err();
        assert_eq!(err.to_string(), "timer not found: 9");
    }
}
