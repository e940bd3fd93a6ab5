//! Session listing for one calendar date.

use std::io::Write;

use anyhow::Result;
use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;

use wl_core::report::{format_duration, total_duration};
use wl_core::{Session, TzOffset};
use wl_db::Database;

use super::{require_user, to_local};

#[derive(Debug, Serialize)]
struct SessionsJson<'a> {
    user: &'a str,
    date: NaiveDate,
    tz_offset_minutes: i32,
    sessions: &'a [Session],
}

pub fn run<W: Write>(
    writer: &mut W,
    db: &Database,
    user_name: &str,
    date: NaiveDate,
    tz: TzOffset,
    json: bool,
    now: DateTime<Utc>,
) -> Result<()> {
    let user = require_user(db, user_name)?;
    let sessions = db.sessions_for_local_date(user.id, date, tz)?;

    if json {
        let payload = SessionsJson {
            user: &user.name,
            date,
            tz_offset_minutes: tz.minutes(),
            sessions: &sessions,
        };
        writeln!(writer, "{}", serde_json::to_string_pretty(&payload)?)?;
        return Ok(());
    }

    writeln!(
        writer,
        "Sessions for {} on {} (tz offset {})",
        user.name, date, tz
    )?;
    if sessions.is_empty() {
        writeln!(writer, "No sessions.")?;
        return Ok(());
    }
    for session in &sessions {
        let start = to_local(session.start, tz).format("%H:%M").to_string();
        let end = session.end.map_or_else(
            || "open".to_string(),
            |end| to_local(end, tz).format("%H:%M").to_string(),
        );
        let note = session
            .note
            .as_deref()
            .map(|n| format!("  {n}"))
            .unwrap_or_default();
        writeln!(
            writer,
            "{}  {start}-{end}  {}  {}{note}",
            session.id,
            format_duration(session.duration(now)),
            session.source
        )?;
    }
    writeln!(
        writer,
        "Total (closed): {}",
        format_duration(total_duration(&sessions, now, false))
    )?;
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

    fn seeded_db() -> Database {
        let mut db = Database::open_in_memory().unwrap();
        let user = db.create_user("ana", None).unwrap();
        let first = db
            .open_session(user.id, SessionSource::Manual, at("2024-01-01T09:00:00Z"))
            .unwrap();
        db.close_open_session(user.id, None, at("2024-01-01T10:30:00Z"))
            .unwrap();
        db.set_session_note(first.id, "standup").unwrap();
        db.open_session(user.id, SessionSource::Auto, at("2024-01-01T11:00:00Z"))
            .unwrap();
        db
    }

    #[test]
    fn table_lists_sessions_with_closed_total() {
        let db = seeded_db();
        let mut output = Vec::new();
        run(
            &mut output,
            &db,
            "ana",
            NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            TzOffset::UTC,
            false,
            at("2024-01-01T11:45:00Z"),
        )
        .unwrap();

        let output = String::from_utf8(output).unwrap();
        assert_snapshot!(output, @r"
        Sessions for ana on 2024-01-01 (tz offset 0)
        1  09:00-10:30  1h 30m  manual  standup
        2  11:00-open  0h 45m  auto
        Total (closed): 1h 30m
        ");
    }

    #[test]
    fn empty_date_prints_placeholder() {
        let db = seeded_db();
        let mut output = Vec::new();
        run(
            &mut output,
            &db,
            "ana",
            NaiveDate::from_ymd_opt(2024, 1, 2).unwrap(),
            TzOffset::UTC,
            false,
            at("2024-01-02T08:00:00Z"),
        )
        .unwrap();

        let output = String::from_utf8(output).unwrap();
        assert_snapshot!(output, @r"
        Sessions for ana on 2024-01-02 (tz offset 0)
        No sessions.
        ");
    }

    #[test]
    fn json_output_carries_full_session_records() {
        let db = seeded_db();
        let mut output = Vec::new();
        run(
            &mut output,
            &db,
            "ana",
            NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            TzOffset::UTC,
            true,
            at("2024-01-01T11:45:00Z"),
        )
        .unwrap();

        let value: serde_json::Value = serde_json::from_slice(&output).unwrap();
        assert_eq!(value["user"], "ana");
        assert_eq!(value["sessions"].as_array().unwrap().len(), 2);
        assert_eq!(value["sessions"][0]["note"], "standup");
        assert_eq!(value["sessions"][1]["end"], serde_json::Value::Null);
    }
}
