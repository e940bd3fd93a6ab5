//! Status command: is the user currently clocked in?

use std::io::Write;

use anyhow::Result;
use chrono::{DateTime, Utc};

use wl_core::report::format_duration;
use wl_db::Database;

use super::require_user;

pub fn run<W: Write>(
    writer: &mut W,
    db: &Database,
    user_name: &str,
    now: DateTime<Utc>,
) -> Result<()> {
    let user = require_user(db, user_name)?;
    match db.open_session_for(user.id)? {
        Some(session) => writeln!(
            writer,
            "{}: working since {} UTC ({}, {})",
            user.name,
            session.start.format("%Y-%m-%d %H:%M"),
            format_duration(session.duration(now)),
            session.source
        )?,
        None => writeln!(writer, "{}: not working", user.name)?,
    }
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
    fn status_shows_open_session_with_live_duration() {
        let mut db = Database::open_in_memory().unwrap();
        let user = db.create_user("ana", None).unwrap();
        db.open_session(user.id, SessionSource::Auto, at("2024-01-01T09:00:00Z"))
            .unwrap();

        let mut output = Vec::new();
        run(&mut output, &db, "ana", at("2024-01-01T10:30:00Z")).unwrap();
        let output = String::from_utf8(output).unwrap();
        assert_snapshot!(output, @"ana: working since 2024-01-01 09:00 UTC (1h 30m, auto)");
    }

    #[test]
    fn status_without_open_session() {
        let mut db = Database::open_in_memory().unwrap();
        db.create_user("ana", None).unwrap();

        let mut output = Vec::new();
        run(&mut output, &db, "ana", at("2024-01-01T10:30:00Z")).unwrap();
        let output = String::from_utf8(output).unwrap();
        assert_snapshot!(output, @"ana: not working");
    }
}
