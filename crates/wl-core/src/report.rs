//! Timezone-corrected reporting over session records.
//!
//! Dates are always the *caller's* calendar dates: the UTC query window for
//! a local date is derived from the caller-supplied offset, and a session
//! belongs to the date containing its start instant under that offset. The
//! server's own zone never enters into it.

use chrono::{DateTime, Duration, NaiveDate, NaiveTime, Utc};

use crate::session::Session;
use crate::types::TzOffset;

/// UTC window covering one local calendar date, as a half-open interval.
///
/// With the `getTimezoneOffset` convention (minutes added to local time to
/// reach UTC), local midnight maps to `00:00 + offset` in UTC.
#[must_use]
pub fn local_day_bounds(date: NaiveDate, tz: TzOffset) -> (DateTime<Utc>, DateTime<Utc>) {
    let start = date.and_time(NaiveTime::MIN).and_utc() + Duration::minutes(i64::from(tz.minutes()));
    (start, start + Duration::days(1))
}

/// UTC window covering one local calendar month, as a half-open interval.
///
/// Returns `None` for an invalid year/month combination.
#[must_use]
pub fn local_month_bounds(year: i32, month: u32, tz: TzOffset) -> Option<(DateTime<Utc>, DateTime<Utc>)> {
    let first = NaiveDate::from_ymd_opt(year, month, 1)?;
    let next = if month == 12 {
        NaiveDate::from_ymd_opt(year + 1, 1, 1)?
    } else {
        NaiveDate::from_ymd_opt(year, month + 1, 1)?
    };
    let offset = Duration::minutes(i64::from(tz.minutes()));
    Some((
        first.and_time(NaiveTime::MIN).and_utc() + offset,
        next.and_time(NaiveTime::MIN).and_utc() + offset,
    ))
}

/// The local calendar date an instant falls on under the given offset.
#[must_use]
pub fn local_date_of(instant: DateTime<Utc>, tz: TzOffset) -> NaiveDate {
    (instant - Duration::minutes(i64::from(tz.minutes()))).date_naive()
}

/// Sums session durations for a report.
///
/// Closed sessions always count. An open session counts only when
/// `include_active` is set, measured from its start to `now`; that live
/// component exists solely in the returned value and is never written back.
pub fn total_duration<'a>(
    sessions: impl IntoIterator<Item = &'a Session>,
    now: DateTime<Utc>,
    include_active: bool,
) -> Duration {
    sessions
        .into_iter()
        .filter(|s| include_active || !s.is_open())
        .fold(Duration::zero(), |acc, s| acc + s.duration(now))
}

/// Formats a duration as `Hh MMm` (e.g. `1h 30m`, `0h 05m`).
#[must_use]
pub fn format_duration(duration: Duration) -> String {
    let seconds = duration.num_seconds().max(0);
    let hours = seconds / 3600;
    let minutes = (seconds % 3600) / 60;
    format!("{hours}h {minutes:02}m")
}
