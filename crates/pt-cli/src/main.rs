use std::io;
use std::path::Path;
use std::rc::Rc;

use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use pt_cli::commands::{shell, status, timers};
use pt_cli::{Cli, Commands, Config};
use pt_core::{KeyValueStore, SystemClock, TimerManager};
use pt_db::Database;

/// Load config and open database, ensuring the parent directory exists.
fn open_database(config_path: Option<&Path>) -> Result<(Rc<Database>, Config)> {
    let config = Config::load_from(config_path).context("failed to load configuration")?;
    tracing::debug!(?config, "loaded configuration");

    if let Some(parent) = config.database_path.parent() {
        std::fs::create_dir_all(parent).context("failed to create database directory")?;
    }

    let db = Database::open(&config.database_path)
        .with_context(|| format!("failed to open {}", config.database_path.display()))?;
    Ok((Rc::new(db), config))
}

fn open_manager(db: &Rc<Database>, config: &Config) -> Result<TimerManager<Rc<Database>>> {
    let manager = TimerManager::new(
        Rc::clone(db),
        SystemClock::shared(),
        &config.manager_config(),
    )?;
    Ok(manager)
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::from_default_env()
    };
    // Logs go to stderr so command output stays machine-readable.
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .try_init();

    let Some(command) = &cli.command else {
        use clap::CommandFactory;
        Cli::command().print_help()?;
        println!();
        return Ok(());
    };

    let (db, config) = open_database(cli.config.as_deref())?;
    let mut stdout = io::stdout().lock();

    match command {
        Commands::Status { json } => {
            let manager = open_manager(&db, &config)?;
            let idle_pending = db.get(&config.idle_config().marker_key)?.is_some();
            status::run(&mut stdout, &manager, idle_pending, *json)?;
        }
        Commands::Add { title } => {
            let mut manager = open_manager(&db, &config)?;
            timers::add(&mut stdout, &mut manager, title.as_deref())?;
        }
        Commands::Rename { timer, title } => {
            let mut manager = open_manager(&db, &config)?;
            timers::rename(&mut stdout, &mut manager, timer, title)?;
        }
        Commands::Remove { timer } => {
            let mut manager = open_manager(&db, &config)?;
            timers::remove(&mut stdout, &mut manager, timer)?;
        }
        Commands::Reset { timer, all } => {
            let mut manager = open_manager(&db, &config)?;
            let target = if *all { None } else { timer.as_deref() };
            timers::reset(&mut stdout, &mut manager, target)?;
        }
        Commands::Credit { timer, minutes } => {
            let mut manager = open_manager(&db, &config)?;
            timers::credit(&mut stdout, &mut manager, timer, *minutes)?;
        }
        Commands::Shell => {
            shell::run(
                io::stdin().lock(),
                &mut stdout,
                Rc::clone(&db),
                SystemClock::shared(),
                &config.manager_config(),
                config.idle_config(),
            )?;
        }
    }

    Ok(())
}
