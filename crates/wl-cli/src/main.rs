use std::path::Path;

use anyhow::{Context, Result};
use chrono::Utc;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use wl_cli::commands::{self, note, report, sessions, start, status, stop, users, watch};
use wl_cli::{Cli, Commands, Config, ReportPeriod};
use wl_core::report::local_date_of;

/// Load config and open database, ensuring the parent directory exists.
fn open_database(config_path: Option<&Path>) -> Result<(wl_db::Database, Config)> {
    let config = Config::load_from(config_path).context("failed to load configuration")?;
    tracing::debug!(?config, "loaded configuration");

    if let Some(parent) = config.database_path.parent() {
        std::fs::create_dir_all(parent).context("failed to create database directory")?;
    }

    let db = wl_db::Database::open(&config.database_path).context("failed to open database")?;
    Ok((db, config))
}

#[allow(
    clippy::too_many_lines,
    reason = "CLI command dispatch is inherently verbose"
)]
fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize tracing with verbose flag support
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::from_default_env()
    };
    // Use try_init to avoid panic if tracing is already initialized (e.g., in tests)
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();

    let mut stdout = std::io::stdout().lock();

    match &cli.command {
        Some(Commands::Start { user }) => {
            let (mut db, _config) = open_database(cli.config.as_deref())?;
            start::run(&mut stdout, &mut db, user, Utc::now())?;
        }
        Some(Commands::Stop { user }) => {
            let (mut db, _config) = open_database(cli.config.as_deref())?;
            stop::run(&mut stdout, &mut db, user, Utc::now())?;
        }
        Some(Commands::Note { session, text }) => {
            let (mut db, _config) = open_database(cli.config.as_deref())?;
            note::run(&mut stdout, &mut db, *session, text)?;
        }
        Some(Commands::Status { user }) => {
            let (db, _config) = open_database(cli.config.as_deref())?;
            status::run(&mut stdout, &db, user, Utc::now())?;
        }
        Some(Commands::Sessions {
            user,
            date,
            tz_offset,
            json,
        }) => {
            let (db, _config) = open_database(cli.config.as_deref())?;
            let now = Utc::now();
            let tz = tz_offset.unwrap_or_else(commands::local_tz_offset);
            let date = date.unwrap_or_else(|| local_date_of(now, tz));
            sessions::run(&mut stdout, &db, user, date, tz, *json, now)?;
        }
        Some(Commands::Report {
            user,
            date,
            month,
            tz_offset,
            live,
            json,
        }) => {
            let (db, _config) = open_database(cli.config.as_deref())?;
            let now = Utc::now();
            let tz = tz_offset.unwrap_or_else(commands::local_tz_offset);
            let period = match month {
                Some(month) => {
                    let (year, month_num) = report::parse_month(month)
                        .with_context(|| format!("invalid month: {month} (expected YYYY-MM)"))?;
                    ReportPeriod::Month {
                        year,
                        month: month_num,
                    }
                }
                None => ReportPeriod::Day(date.unwrap_or_else(|| local_date_of(now, tz))),
            };
            report::run(&mut stdout, &db, user, period, tz, *live, *json, now)?;
        }
        Some(Commands::Watch) => {
            let (mut db, config) = open_database(cli.config.as_deref())?;
            watch::run(&mut db, &config)?;
        }
        Some(Commands::Users { action }) => {
            let (mut db, _config) = open_database(cli.config.as_deref())?;
            users::run(&mut stdout, &mut db, action)?;
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
