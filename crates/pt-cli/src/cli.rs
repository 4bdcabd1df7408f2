//! Command-line argument definitions.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Chess-clock productivity timers.
///
/// Keeps a small set of named timers where starting one pauses the others,
/// and lets time spent away be assigned back to them.
#[derive(Debug, Parser)]
#[command(name = "pt", version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Path to config file.
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available subcommands.
///
/// `<TIMER>` is either a 1-based position as shown by `status` or a timer ID.
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Show timers and whether an idle interval is waiting.
    Status {
        /// Output as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Add a timer.
    Add {
        /// Title for the new timer (defaults to "Timer N").
        title: Option<String>,
    },

    /// Rename a timer.
    Rename {
        timer: String,
        title: String,
    },

    /// Remove a timer.
    Remove { timer: String },

    /// Reset a timer, or all of them.
    Reset {
        #[arg(required_unless_present = "all")]
        timer: Option<String>,

        /// Reset every timer.
        #[arg(long, conflicts_with = "timer")]
        all: bool,
    },

    /// Credit minutes to a timer.
    Credit {
        timer: String,
        minutes: u64,
    },

    /// Run timers interactively.
    Shell,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_reset_all() {
        let cli = Cli::try_parse_from(["pt", "reset", "--all"]).unwrap();
        assert!(matches!(
            cli.command,
            Some(Commands::Reset {
                timer: None,
                all: true
            })
        ));
    }

    #[test]
    fn reset_requires_a_target() {
        assert!(Cli::try_parse_from(["pt", "reset"]).is_err());
        assert!(Cli::try_parse_from(["pt", "reset", "1", "--all"]).is_err());
    }

    #[test]
    fn global_flags_follow_subcommand() {
        let cli = Cli::try_parse_from(["pt", "status", "--json", "-v"]).unwrap();
        assert!(cli.verbose);
        assert!(matches!(cli.command, Some(Commands::Status { json: true })));
    }

    #[test]
    fn credit_rejects_negative_minutes() {
        assert!(Cli::try_parse_from(["pt", "credit", "1", "-5"]).is_err());
    }
}
