//! Command-line argument definitions.

use std::path::PathBuf;

use chrono::NaiveDate;
use clap::{Parser, Subcommand};

use wl_core::{DeviceId, TzOffset};

/// Presence-based work logger.
///
/// Tracks work sessions per user, either through explicit start/stop or
/// automatically from device presence on the local network (`wl watch`).
#[derive(Debug, Parser)]
#[command(name = "wl", version, about, long_about = None)]
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
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Manually start a session for a user.
    Start {
        /// User name.
        user: String,
    },

    /// Manually stop a user's open session.
    Stop {
        /// User name.
        user: String,
    },

    /// Attach or replace the note on a session.
    Note {
        /// Session ID (as printed by `start` or `sessions`).
        session: i64,

        /// Note text.
        text: String,
    },

    /// List a user's sessions for one calendar date.
    Sessions {
        /// User name.
        user: String,

        /// Local calendar date (YYYY-MM-DD); defaults to today.
        #[arg(long)]
        date: Option<NaiveDate>,

        /// Timezone offset in minutes to add to local time to reach UTC
        /// (JavaScript getTimezoneOffset convention); defaults to this
        /// host's current zone.
        #[arg(long)]
        tz_offset: Option<TzOffset>,

        /// Output JSON instead of a table.
        #[arg(long)]
        json: bool,
    },

    /// Show whether a user has an open session.
    Status {
        /// User name.
        user: String,
    },

    /// Total tracked time for a date or a month.
    Report {
        /// User name.
        user: String,

        /// Local calendar date (YYYY-MM-DD); defaults to today.
        #[arg(long, conflicts_with = "month")]
        date: Option<NaiveDate>,

        /// Local calendar month (YYYY-MM).
        #[arg(long)]
        month: Option<String>,

        /// Timezone offset in minutes to add to local time to reach UTC;
        /// defaults to this host's current zone.
        #[arg(long)]
        tz_offset: Option<TzOffset>,

        /// Include the elapsed time of a still-open session in the total.
        #[arg(long)]
        live: bool,

        /// Output JSON instead of a table.
        #[arg(long)]
        json: bool,
    },

    /// Run the presence-tracking loop until interrupted.
    Watch,

    /// Manage users and their devices.
    Users {
        #[command(subcommand)]
        action: UsersAction,
    },
}

/// User administration subcommands.
#[derive(Debug, Subcommand)]
pub enum UsersAction {
    /// Create a user.
    Add {
        /// User name.
        name: String,

        /// Device (MAC) address for presence tracking.
        #[arg(long)]
        device: Option<DeviceId>,
    },

    /// List all users.
    List,

    /// Assign a device (MAC) address to a user.
    SetDevice {
        /// User name.
        name: String,

        /// Device (MAC) address.
        device: DeviceId,
    },

    /// Remove a user's device assignment.
    ClearDevice {
        /// User name.
        name: String,
    },

    /// Deactivate a user (stops presence tracking; keeps history).
    Deactivate {
        /// User name.
        name: String,
    },

    /// Reactivate a previously deactivated user.
    Activate {
        /// User name.
        name: String,
    },
}

/// Report granularity resolved from `--date`/`--month`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportPeriod {
    Day(NaiveDate),
    Month { year: i32, month: u32 },
}
