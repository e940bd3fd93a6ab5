//! The presence-tracking loop behind `wl watch`.
//!
//! Each tick: scan the local network, resolve observed devices to users
//! through the directory, feed the result into the debounced presence
//! tracker, and open/close sessions for the transitions it emits. The
//! per-tick logic lives in [`apply_tick`], a synchronous function taking the
//! scan result and `now` as inputs, so tests drive whole presence scenarios
//! without timers or a real scanner.

use std::collections::HashSet;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use tokio::time::MissedTickBehavior;

use wl_core::{DeviceDirectory, DeviceId, PresenceEvent, PresenceTracker, SessionSource, UserId};
use wl_db::{Database, DbError};
use wl_scan::Scanner;

use crate::Config;

/// Session transitions performed by one tick.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct TickSummary {
    pub opened: Vec<UserId>,
    pub closed: Vec<UserId>,
}

/// Applies one successful scan result to the tracker and the session store.
///
/// The directory is rebuilt from the user table on every call, so device
/// assignments and deactivations take effect on the next tick. Domain
/// outcomes (`AlreadyOpen`, `NoOpenSession`) are absorbed here: the first
/// covers sessions already running (manually opened ones included), the
/// second covers absences whose session was already stopped by hand.
pub fn apply_tick(
    db: &mut Database,
    tracker: &mut PresenceTracker,
    observed: &HashSet<DeviceId>,
    now: DateTime<Utc>,
) -> Result<TickSummary> {
    let pairs = db
        .active_users_with_devices()
        .context("failed to load user devices")?;
    let directory = DeviceDirectory::from_entries(pairs).context("device directory misconfigured")?;
    let tracked: HashSet<UserId> = directory.users().collect();
    let present: HashSet<UserId> = observed
        .iter()
        .filter_map(|device| directory.resolve(device))
        .collect();

    let mut summary = TickSummary::default();
    for event in tracker.apply_scan(&tracked, &present, now) {
        match event {
            PresenceEvent::BecamePresent(user) => {
                match db.open_session(user, SessionSource::Auto, now) {
                    Ok(session) => {
                        tracing::info!(%user, session_id = %session.id, "presence opened session");
                        summary.opened.push(user);
                    }
                    Err(DbError::AlreadyOpen { .. }) => {
                        tracing::debug!(%user, "session already open; leaving it");
                    }
                    Err(err) => return Err(err).context("failed to open session"),
                }
            }
            PresenceEvent::BecameAbsent(user) => {
                // Only auto-opened sessions are fair game: a manual session
                // outlives presence and is closed by the user alone.
                match db.close_open_session(user, Some(SessionSource::Auto), now) {
                    Ok(session) => {
                        tracing::info!(%user, session_id = %session.id, "absence closed session");
                        summary.closed.push(user);
                    }
                    Err(DbError::NoOpenSession { .. }) => {
                        tracing::debug!(%user, "no auto session to close");
                    }
                    Err(err) => return Err(err).context("failed to close session"),
                }
            }
        }
    }
    Ok(summary)
}

/// Runs the tracking loop until a shutdown signal arrives.
///
/// If the scan capability is unavailable at startup the loop does not run
/// at all and the system stays on manual tracking. A tick in progress
/// always completes before the loop observes the signal, so shutdown never
/// leaves partial tick effects behind. Scan failures keep the previous
/// presence state and are logged once per failure streak rather than once
/// per tick.
pub async fn run<S: Scanner>(db: &mut Database, scanner: &S, config: &Config) -> Result<()> {
    if !scanner.is_available().await {
        tracing::warn!("scan tool unavailable; automatic tracking disabled, manual tracking still works");
        return Ok(());
    }

    let mut tracker = PresenceTracker::new(config.absence_timeout());
    let mut ticker = tokio::time::interval(config.scan_interval());
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);
    let mut failure_logged = false;

    tracing::info!(
        scan_interval_secs = config.scan_interval_secs,
        absence_timeout_secs = config.absence_timeout_secs,
        "presence tracking started"
    );

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let now = Utc::now();
                match scanner.scan().await {
                    Ok(observed) => {
                        failure_logged = false;
                        apply_tick(db, &mut tracker, &observed, now)?;
                    }
                    Err(err) => {
                        if !failure_logged {
                            tracing::warn!(error = %err, "scan failed; keeping previous presence state");
                            failure_logged = true;
                        }
                        tracker.record_scan_failure(now);
                    }
                }
            }
            _ = &mut shutdown => {
                tracing::info!("shutdown signal received; presence tracking stopped");
                break;
            }
        }
    }
    Ok(())
}
