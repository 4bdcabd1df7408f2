//! Productivity timers CLI library.
//!
//! This crate provides the CLI interface and the interactive shell that hosts
//! the timer core.

mod cli;
pub mod commands;
mod config;

pub use cli::{Cli, Commands};
pub use config::Config;
