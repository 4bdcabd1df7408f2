//! Interactive shell hosting the timers for a whole session.
//!
//! Timers only accrue while a process is alive, so the shell is where they
//! actually run. It also plays the role of the visibility source: `hide` and
//! `show` drive the idle tracker, and an idle interval found on `show` (or
//! left over from a previous session) is offered for allocation before the
//! prompt returns.

use std::cell::Cell;
use std::io::{BufRead, Lines, Write};
use std::rc::Rc;
use std::sync::Arc;

use anyhow::{Context, Result, bail};

use pt_core::allocation::hours_minutes_to_ms;
use pt_core::{
    Allocation, AllocationStrategy, Clock, CounterId, IdleConfig, IdleOutcome, IdleTracker,
    KeyValueStore, ManagerConfig, PendingIdle, TimerManager, format_hms,
};

use super::util::{resolve_timer, write_timers};

const HELP: &str = "\
Commands:
  list                 show timers
  start <timer>        start a timer (pauses the running one)
  pause [timer]        pause a timer, or the running one
  add [title]          add a timer
  remove <timer>       remove a timer
  reset <timer>        reset a timer
  reset-all            reset every timer
  rename <timer> <title>
  hide                 step away (pauses the running timer)
  show                 come back
  help                 show this help
  quit                 leave the shell
<timer> is a position from `list` or a timer ID.";

const ALLOCATION_HELP: &str = "\
Assign it with one of:
  previous                              the timer that was running
  timer <t>                             a single timer
  fixed <t>=<min>... rest <t>           fixed minutes, remainder to one timer
  percent <t>=<pct>... rest <t>         percentages, remainder to one timer
  discard                               drop it (blank line or `cancel` too)";

/// Runs the shell until `quit` or end of input.
pub fn run<R, W, S>(
    input: R,
    output: W,
    store: S,
    clock: Arc<dyn Clock>,
    manager_config: &ManagerConfig,
    idle_config: IdleConfig,
) -> Result<()>
where
    R: BufRead,
    W: Write,
    S: KeyValueStore + Clone,
{
    let manager = TimerManager::new(store.clone(), Arc::clone(&clock), manager_config)?;

    // The tracker checks for a leftover marker as soon as it is built.
    let detected = Rc::new(Cell::new(None));
    let on_idle = Rc::clone(&detected);
    let tracker = IdleTracker::new(
        store,
        clock,
        idle_config,
        move |idle_ms| on_idle.set(Some(idle_ms)),
        || {},
    );

    let mut shell = Shell {
        input: input.lines(),
        output,
        manager,
        tracker,
        paused_on_hide: None,
    };

    if let Some(idle_ms) = detected.take() {
        writeln!(shell.output, "Away for {} since the last session.", format_hms(idle_ms))?;
        shell.allocate(&PendingIdle::new(idle_ms, None))?;
    }

    shell.repl()
}

struct Shell<R, W, S: KeyValueStore> {
    input: Lines<R>,
    output: W,
    manager: TimerManager<S>,
    tracker: IdleTracker<S>,
    paused_on_hide: Option<CounterId>,
}

impl<R: BufRead, W: Write, S: KeyValueStore> Shell<R, W, S> {
    fn repl(&mut self) -> Result<()> {
        write_timers(&mut self.output, &self.manager)?;

        while let Some(line) = self.prompt("pt> ")? {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            let (command, rest) = line.split_once(char::is_whitespace).unwrap_or((line, ""));
            let rest = rest.trim();

            if matches!(command, "quit" | "exit") {
                break;
            }
            if let Err(err) = self.dispatch(command, rest) {
                writeln!(self.output, "error: {err:#}")?;
            }
        }

        // A pending hidden marker is left in place for the next session.
        if let Some(id) = self.manager.running_id().cloned() {
            self.manager.pause_timer(id.as_str())?;
        }
        Ok(())
    }

    fn dispatch(&mut self, command: &str, rest: &str) -> Result<()> {
        match command {
            "list" | "ls" => write_timers(&mut self.output, &self.manager)?,
            "start" => {
                let id = self.timer_arg(rest)?;
                self.manager.start_timer(id.as_str())?;
                self.say(&format!("Started {}", self.title(&id)))?;
            }
            "pause" => {
                let id = if rest.is_empty() {
                    self.manager.running_id().cloned()
                } else {
                    Some(self.timer_arg(rest)?)
                };
                let Some(id) = id else {
                    return self.say("No timer is running");
                };
                self.manager.pause_timer(id.as_str())?;
                self.say(&format!("Paused {}", self.title(&id)))?;
            }
            "add" => {
                let title = (!rest.is_empty()).then_some(rest);
                let counter = self.manager.add_timer(title)?;
                let message = format!("Added {}", counter.title());
                self.say(&message)?;
            }
            "remove" | "rm" => {
                let id = self.timer_arg(rest)?;
                let title = self.title(&id);
                self.manager.remove_timer(id.as_str())?;
                self.say(&format!("Removed {title}"))?;
            }
            "reset" => {
                let id = self.timer_arg(rest)?;
                self.manager.reset_timer(id.as_str())?;
                self.say(&format!("Reset {}", self.title(&id)))?;
            }
            "reset-all" => {
                self.manager.reset_all();
                self.say("Reset all timers")?;
            }
            "rename" => {
                let (timer, title) = rest
                    .split_once(char::is_whitespace)
                    .context("usage: rename <timer> <title>")?;
                let id = resolve_timer(&self.manager, timer)?;
                self.manager.update_timer_title(id.as_str(), title.trim())?;
                self.say(&format!("Renamed to {}", self.title(&id)))?;
            }
            "hide" => self.hide()?,
            "show" => self.show()?,
            "help" | "?" => self.say(HELP)?,
            other => bail!("unknown command `{other}` (try `help`)"),
        }
        Ok(())
    }

    fn hide(&mut self) -> Result<()> {
        self.paused_on_hide = self.manager.running_id().cloned();
        if let Some(id) = &self.paused_on_hide {
            self.manager.pause_timer(id.as_str())?;
        }
        self.tracker.on_hidden();

        match self.paused_on_hide.clone() {
            Some(id) => self.say(&format!("Away. Paused {}", self.title(&id))),
            None => self.say("Away."),
        }
    }

    fn show(&mut self) -> Result<()> {
        let remembered = self.paused_on_hide.take();

        match self.tracker.on_visible() {
            IdleOutcome::Resumed => self.say("Welcome back.")?,
            IdleOutcome::Idle { idle_ms } => {
                writeln!(self.output, "Away for {}.", format_hms(idle_ms))?;
                self.allocate(&PendingIdle::new(idle_ms, remembered.clone()))?;
            }
        }

        if let Some(id) = remembered {
            if self.manager.get_timer(id.as_str()).is_some() {
                self.manager.start_timer(id.as_str())?;
                self.say(&format!("Resumed {}", self.title(&id)))?;
            }
        }
        Ok(())
    }

    /// Asks how to assign an idle interval until a valid answer arrives.
    fn allocate(&mut self, pending: &PendingIdle) -> Result<()> {
        self.say(ALLOCATION_HELP)?;

        let allocation = loop {
            let choice = match self.prompt("allocate> ")? {
                Some(line) => match self.parse_strategy(&line) {
                    Ok(choice) => choice,
                    Err(err) => {
                        writeln!(self.output, "error: {err:#}")?;
                        continue;
                    }
                },
                None => None,
            };

            match pending.resolve(choice) {
                Ok(allocation) => break allocation,
                Err(err) => writeln!(self.output, "error: {err}")?,
            }
        };

        self.report_allocation(&allocation)?;
        self.manager.distribute_time(&allocation);
        Ok(())
    }

    fn report_allocation(&mut self, allocation: &Allocation) -> Result<()> {
        if allocation.is_empty() {
            return self.say("Idle time discarded.");
        }
        for (id, ms) in allocation {
            let line = format!("  +{} {}", format_hms(ms), self.title(id));
            self.say(&line)?;
        }
        Ok(())
    }

    /// Parses an allocation answer. `Ok(None)` means the choice was cancelled.
    fn parse_strategy(&self, line: &str) -> Result<Option<AllocationStrategy>> {
        let mut words = line.split_whitespace();
        let Some(kind) = words.next() else {
            return Ok(None);
        };
        let args: Vec<&str> = words.collect();

        let strategy = match kind {
            "cancel" => return Ok(None),
            "discard" => AllocationStrategy::Discard,
            "previous" => AllocationStrategy::PreviousTimer,
            "timer" => {
                let [timer] = args.as_slice() else {
                    bail!("usage: timer <t>");
                };
                AllocationStrategy::SelectedTimer(resolve_timer(&self.manager, timer)?)
            }
            "fixed" => {
                let (pairs, remainder) = self.split_remainder(&args)?;
                let mut amounts = Allocation::new();
                for (id, value) in pairs {
                    let minutes: u64 = value
                        .parse()
                        .with_context(|| format!("invalid minutes `{value}`"))?;
                    let ms = hours_minutes_to_ms(0, minutes)
                        .with_context(|| format!("minutes value `{value}` is too large"))?;
                    amounts.insert(id, ms);
                }
                AllocationStrategy::FixedDistribution { amounts, remainder }
            }
            "percent" => {
                let (pairs, remainder) = self.split_remainder(&args)?;
                let percentages = pairs
                    .into_iter()
                    .map(|(id, value)| {
                        value
                            .trim_end_matches('%')
                            .parse::<f64>()
                            .map(|pct| (id, pct))
                            .with_context(|| format!("invalid percentage `{value}`"))
                    })
                    .collect::<Result<Vec<_>>>()?;
                AllocationStrategy::PercentageDistribution {
                    percentages,
                    remainder,
                }
            }
            other => bail!("unknown choice `{other}`"),
        };
        Ok(Some(strategy))
    }

    /// Splits `<t>=<n>... rest <t>` into resolved pairs and the remainder timer.
    fn split_remainder<'a>(
        &self,
        args: &[&'a str],
    ) -> Result<(Vec<(CounterId, &'a str)>, CounterId)> {
        let Some(rest_at) = args.iter().position(|arg| *arg == "rest") else {
            bail!("missing `rest <t>`");
        };
        let [remainder] = &args[rest_at + 1..] else {
            bail!("expected exactly one timer after `rest`");
        };

        let pairs = args[..rest_at]
            .iter()
            .copied()
            .map(|pair| -> Result<(CounterId, &'a str)> {
                let (timer, value) = pair
                    .split_once('=')
                    .with_context(|| format!("expected <t>=<n>, got `{pair}`"))?;
                Ok((resolve_timer(&self.manager, timer)?, value))
            })
            .collect::<Result<Vec<_>>>()?;

        Ok((pairs, resolve_timer(&self.manager, remainder)?))
    }

    fn timer_arg(&self, rest: &str) -> Result<CounterId> {
        if rest.is_empty() {
            bail!("missing <timer>");
        }
        Ok(resolve_timer(&self.manager, rest)?)
    }

    fn title(&self, id: &CounterId) -> String {
        self.manager
            .get_timer(id.as_str())
            .map_or_else(|| id.to_string(), |c| c.title().to_string())
    }

    fn say(&mut self, message: &str) -> Result<()> {
        writeln!(self.output, "{message}")?;
        Ok(())
    }

    /// Writes `prompt` and reads one line. `None` at end of input.
    fn prompt(&mut self, prompt: &str) -> Result<Option<String>> {
        write!(self.output, "{prompt}")?;
        self.output.flush()?;
        match self.input.next() {
            Some(line) => Ok(Some(line.context("failed to read input")?)),
            None => {
                writeln!(self.output)?;
                Ok(None)
            }
        }
    }
}
