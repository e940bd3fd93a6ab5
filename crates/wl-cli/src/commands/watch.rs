//! The `watch` command: run the presence-tracking loop.

use anyhow::{Context, Result};

use wl_db::Database;
use wl_scan::ArpScanner;

use crate::{Config, tracker};

pub fn run(db: &mut Database, config: &Config) -> Result<()> {
    let scanner = ArpScanner::new(&config.scan_program, config.scan_timeout());
    let runtime = tokio::runtime::Runtime::new().context("failed to start async runtime")?;
    runtime.block_on(tracker::run(db, &scanner, config))
}
