//! Report command: totals for a date or a month.

use std::collections::BTreeMap;
use std::io::Write;

use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;

use wl_core::report::{format_duration, local_date_of, local_month_bounds, total_duration};
use wl_core::{Session, TzOffset};
use wl_db::Database;

use crate::ReportPeriod;

use super::{require_user, to_local};

/// Parses a `YYYY-MM` month argument.
pub fn parse_month(value: &str) -> Option<(i32, u32)> {
    let (year, month) = value.split_once('-')?;
    let year: i32 = year.parse().ok()?;
    let month: u32 = month.parse().ok()?;
    (1..=12).contains(&month).then_some((year, month))
}

#[derive(Debug, Serialize)]
struct DayReportJson<'a> {
    user: &'a str,
    date: NaiveDate,
    tz_offset_minutes: i32,
    live: bool,
    total_seconds: i64,
    sessions: &'a [Session],
}

#[derive(Debug, Serialize)]
struct DayTotalJson {
    date: NaiveDate,
    total_seconds: i64,
    sessions: usize,
}

#[derive(Debug, Serialize)]
struct MonthReportJson<'a> {
    user: &'a str,
    month: String,
    tz_offset_minutes: i32,
    live: bool,
    total_seconds: i64,
    days: Vec<DayTotalJson>,
}

#[expect(clippy::too_many_arguments, reason = "thin dispatch surface")]
pub fn run<W: Write>(
    writer: &mut W,
    db: &Database,
    user_name: &str,
    period: ReportPeriod,
    tz: TzOffset,
    live: bool,
    json: bool,
    now: DateTime<Utc>,
) -> Result<()> {
    match period {
        ReportPeriod::Day(date) => run_day(writer, db, user_name, date, tz, live, json, now),
        ReportPeriod::Month { year, month } => {
            run_month(writer, db, user_name, year, month, tz, live, json, now)
        }
    }
}

#[expect(clippy::too_many_arguments, reason = "thin dispatch surface")]
fn run_day<W: Write>(
    writer: &mut W,
    db: &Database,
    user_name: &str,
    date: NaiveDate,
    tz: TzOffset,
    live: bool,
    json: bool,
    now: DateTime<Utc>,
) -> Result<()> {
    let user = require_user(db, user_name)?;
    let sessions = db.sessions_for_local_date(user.id, date, tz)?;
    let total = total_duration(&sessions, now, live);

    if json {
        let payload = DayReportJson {
            user: &user.name,
            date,
            tz_offset_minutes: tz.minutes(),
            live,
            total_seconds: total.num_seconds(),
            sessions: &sessions,
        };
        writeln!(writer, "{}", serde_json::to_string_pretty(&payload)?)?;
        return Ok(());
    }

    writeln!(
        writer,
        "Report for {} on {} (tz offset {})",
        user.name, date, tz
    )?;
    for session in &sessions {
        let start = to_local(session.start, tz).format("%H:%M").to_string();
        let end = session.end.map_or_else(
            || "open".to_string(),
            |end| to_local(end, tz).format("%H:%M").to_string(),
        );
        writeln!(
            writer,
            "{}  {start}-{end}  {}  {}",
            session.id,
            format_duration(session.duration(now)),
            session.source
        )?;
    }
    let suffix = if live && sessions.iter().any(Session::is_open) {
        " (live)"
    } else {
        ""
    };
    writeln!(writer, "Total: {}{suffix}", format_duration(total))?;
    Ok(())
}

#[expect(clippy::too_many_arguments, reason = "thin dispatch surface")]
fn run_month<W: Write>(
    writer: &mut W,
    db: &Database,
    user_name: &str,
    year: i32,
    month: u32,
    tz: TzOffset,
    live: bool,
    json: bool,
    now: DateTime<Utc>,
) -> Result<()> {
    let user = require_user(db, user_name)?;
    let (start, end) =
        local_month_bounds(year, month, tz).context("invalid year/month combination")?;
    let sessions = db.sessions_started_between(user.id, start, end)?;
    let total = total_duration(&sessions, now, live);

    let mut by_day: BTreeMap<NaiveDate, Vec<&Session>> = BTreeMap::new();
    for session in &sessions {
        by_day
            .entry(local_date_of(session.start, tz))
            .or_default()
            .push(session);
    }

    if json {
        let days = by_day
            .iter()
            .map(|(date, day_sessions)| DayTotalJson {
                date: *date,
                total_seconds: total_duration(day_sessions.iter().copied(), now, live)
                    .num_seconds(),
                sessions: day_sessions.len(),
            })
            .collect();
        let payload = MonthReportJson {
            user: &user.name,
            month: format!("{year:04}-{month:02}"),
            tz_offset_minutes: tz.minutes(),
            live,
            total_seconds: total.num_seconds(),
            days,
        };
        writeln!(writer, "{}", serde_json::to_string_pretty(&payload)?)?;
        return Ok(());
    }

    writeln!(
        writer,
        "Report for {}, {year:04}-{month:02} (tz offset {})",
        user.name, tz
    )?;
    for (date, day_sessions) in &by_day {
        let day_total = total_duration(day_sessions.iter().copied(), now, live);
        let count = day_sessions.len();
        let plural = if count == 1 { "" } else { "s" };
        writeln!(
            writer,
            "{date}  {}  ({count} session{plural})",
            format_duration(day_total)
        )?;
    }
    writeln!(writer, "Month total: {}", format_duration(total))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use insta::assert_snapshot;
    use wl_core::SessionSource;

    fn at(s: &str) -> DateTime<Utc> {
        s.parse().unwrap()
    }

    #[test]
    fn parse_month_accepts_valid_rejects_invalid() {
        assert_eq!(parse_month("2024-01"), Some((2024, 1)));
        assert_eq!(parse_month("2024-12"), Some((2024, 12)));
        assert_eq!(parse_month("2024-13"), None);
        assert_eq!(parse_month("2024"), None);
        assert_eq!(parse_month("not-a-month"), None);
    }

    #[test]
    fn live_report_counts_open_session_only_with_flag() {
        let mut db = Database::open_in_memory().unwrap();
        let user = db.create_user("ana", None).unwrap();
        db.open_session(user.id, SessionSource::Manual, at("2024-01-01T08:00:00Z"))
            .unwrap();
        db.close_open_session(user.id, None, at("2024-01-01T09:00:00Z"))
            .unwrap();
        // Open session started 90 minutes before `now`
        db.open_session(user.id, SessionSource::Auto, at("2024-01-01T10:30:00Z"))
            .unwrap();
        let now = at("2024-01-01T12:00:00Z");
        let date = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();

        let mut output = Vec::new();
        run(
            &mut output,
            &db,
            "ana",
            ReportPeriod::Day(date),
            TzOffset::UTC,
            true,
            false,
            now,
        )
        .unwrap();
        let output = String::from_utf8(output).unwrap();
        assert_snapshot!(output, @r"
        Report for ana on 2024-01-01 (tz offset 0)
        1  08:00-09:00  1h 00m  manual
        2  10:30-open  1h 30m  auto
        Total: 2h 30m (live)
        ");

        let mut output = Vec::new();
        run(
            &mut output,
            &db,
            "ana",
            ReportPeriod::Day(date),
            TzOffset::UTC,
            false,
            false,
            now,
        )
        .unwrap();
        let output = String::from_utf8(output).unwrap();
        assert!(output.contains("Total: 1h 00m"));
        assert!(!output.contains("(live)"));
    }

    #[test]
    fn month_report_groups_by_local_date() {
        let mut db = Database::open_in_memory().unwrap();
        let user = db.create_user("ana", None).unwrap();
        // 23:30 UTC on Jan 1 is 00:30 on Jan 2 in a zone one hour ahead
        db.open_session(user.id, SessionSource::Manual, at("2024-01-01T23:30:00Z"))
            .unwrap();
        db.close_open_session(user.id, None, at("2024-01-02T01:00:00Z"))
            .unwrap();
        db.open_session(user.id, SessionSource::Auto, at("2024-01-05T09:00:00Z"))
            .unwrap();
        db.close_open_session(user.id, None, at("2024-01-05T10:00:00Z"))
            .unwrap();

        let tz_ahead = TzOffset::new(-60).unwrap();
        let mut output = Vec::new();
        run(
            &mut output,
            &db,
            "ana",
            ReportPeriod::Month {
                year: 2024,
                month: 1,
            },
            tz_ahead,
            false,
            false,
            at("2024-02-01T00:00:00Z"),
        )
        .unwrap();
        let output = String::from_utf8(output).unwrap();
        assert_snapshot!(output, @r"
        Report for ana, 2024-01 (tz offset -60)
        2024-01-02  1h 30m  (1 session)
        2024-01-05  1h 00m  (1 session)
        Month total: 2h 30m
        ");
    }

    #[test]
    fn month_json_reports_day_totals() {
        let mut db = Database::open_in_memory().unwrap();
        let user = db.create_user("ana", None).unwrap();
        db.open_session(user.id, SessionSource::Manual, at("2024-01-05T09:00:00Z"))
            .unwrap();
        db.close_open_session(user.id, None, at("2024-01-05T10:00:00Z"))
            .unwrap();

        let mut output = Vec::new();
        run(
            &mut output,
            &db,
            "ana",
            ReportPeriod::Month {
                year: 2024,
                month: 1,
            },
            TzOffset::UTC,
            false,
            true,
            at("2024-02-01T00:00:00Z"),
        )
        .unwrap();

        let value: serde_json::Value = serde_json::from_slice(&output).unwrap();
        assert_eq!(value["month"], "2024-01");
        assert_eq!(value["total_seconds"], 3600);
        assert_eq!(value["days"][0]["date"], "2024-01-05");
        assert_eq!(value["days"][0]["sessions"], 1);
    }
}
