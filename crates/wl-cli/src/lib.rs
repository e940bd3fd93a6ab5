//! Work logger CLI library.
//!
//! This crate provides the CLI interface for the work logger: the manual
//! session surface (`start`, `stop`, `note`, ...), read-only queries, user
//! administration, and the `watch` command running the presence-tracking
//! loop.

mod cli;
pub mod commands;
mod config;
pub mod tracker;

pub use cli::{Cli, Commands, ReportPeriod, UsersAction};
pub use config::{Config, ConfigError};
