//! CLI subcommand implementations.
//!
//! Commands write to an injected `Write` so tests can capture their output,
//! and take `now` from the caller so output involving durations is
//! deterministic under test.

pub mod note;
pub mod report;
pub mod sessions;
pub mod start;
pub mod status;
pub mod stop;
pub mod users;
pub mod watch;

use anyhow::{Context, Result};
use chrono::{DateTime, Duration, NaiveDateTime, Offset, Utc};

use wl_core::TzOffset;
use wl_db::{Database, UserRecord};

/// Resolves a user by name, with a hint when it does not exist.
pub(crate) fn require_user(db: &Database, name: &str) -> Result<UserRecord> {
    db.user_by_name(name)?
        .with_context(|| format!("no such user: {name} (run 'wl users add {name}' first)"))
}

/// This host's current zone as a `getTimezoneOffset`-style offset.
#[must_use]
pub fn local_tz_offset() -> TzOffset {
    let east_seconds = chrono::Local::now().offset().fix().local_minus_utc();
    TzOffset::new(-(east_seconds / 60)).unwrap_or(TzOffset::UTC)
}

/// Shifts a UTC instant to the caller's local wall-clock time.
pub(crate) fn to_local(instant: DateTime<Utc>, tz: TzOffset) -> NaiveDateTime {
    (instant - Duration::minutes(i64::from(tz.minutes()))).naive_utc()
}
