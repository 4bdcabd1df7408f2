//! CLI subcommand implementations.

pub mod shell;
pub mod status;
pub mod timers;
mod util;
