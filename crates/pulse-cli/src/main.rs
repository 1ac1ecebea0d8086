use std::fs::File;
use std::io::{self, BufReader};
use std::path::Path;

use anyhow::{Context, Result};
use chrono::Utc;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use pulse_cli::commands::{ingest, report, status, util};
use pulse_cli::{Cli, Commands, Config};

/// Load config and open database, ensuring the parent directory exists.
fn open_database(config_path: Option<&Path>) -> Result<(pulse_db::Database, Config)> {
    let config = Config::load_from(config_path).context("failed to load configuration")?;
    tracing::debug!(?config, "loaded configuration");

    if let Some(parent) = config.database_path.parent() {
        std::fs::create_dir_all(parent).context("failed to create database directory")?;
    }

    let db =
        pulse_db::Database::open(&config.database_path).context("failed to open database")?;
    Ok((db, config))
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize tracing with verbose flag support
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::from_default_env()
    };
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .try_init();

    let mut stdout = io::stdout().lock();

    match &cli.command {
        Some(Commands::Ingest { input }) => {
            let (mut db, config) = open_database(cli.config.as_deref())?;
            match input {
                Some(path) => {
                    let file = File::open(path)
                        .with_context(|| format!("failed to open {}", path.display()))?;
                    ingest::run(&mut db, &config, BufReader::new(file), &mut stdout)?;
                }
                None => {
                    ingest::run(&mut db, &config, io::stdin().lock(), &mut stdout)?;
                }
            }
        }
        Some(Commands::Report { json, now }) => {
            let (db, config) = open_database(cli.config.as_deref())?;
            let now = match now {
                Some(s) => util::parse_datetime(s, Utc::now())?,
                None => Utc::now(),
            };
            let ledger = db
                .load_ledger(config.ledger_config())
                .context("failed to load recorded history")?;
            report::run(&mut stdout, &ledger, *json, now)?;
        }
        Some(Commands::Status) => {
            let (db, config) = open_database(cli.config.as_deref())?;
            status::run(&mut stdout, &db, &config)?;
        }
        None => {
            // No subcommand, show help
            use clap::CommandFactory;
            Cli::command().print_help()?;
            println!();
        }
    }

    Ok(())
}
