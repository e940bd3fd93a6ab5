//! Manual session stop.

use std::io::Write;

use anyhow::{Result, bail};
use chrono::{DateTime, Utc};

use wl_core::report::format_duration;
use wl_db::{Database, DbError};

use super::require_user;

pub fn run<W: Write>(
    writer: &mut W,
    db: &mut Database,
    user_name: &str,
    now: DateTime<Utc>,
) -> Result<()> {
    let user = require_user(db, user_name)?;
    match db.close_open_session(user.id, None, now) {
        Ok(session) => {
            writeln!(
                writer,
                "Stopped session {} for {} ({})",
                session.id,
                user.name,
                format_duration(session.duration(now))
            )?;
            Ok(())
        }
        // Explicit manual callers get this surfaced as a user error
        Err(DbError::NoOpenSession { .. }) => bail!("no open session for {}", user.name),
        Err(err) => Err(err.into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wl_core::SessionSource;

    fn at(s: &str) -> DateTime<Utc> {
        s.parse().unwrap()
    }

    #[test]
    fn stop_prints_session_duration() {
        let mut db = Database::open_in_memory().unwrap();
        let user = db.create_user("ana", None).unwrap();
        db.open_session(user.id, SessionSource::Manual, at("2024-01-01T09:00:00Z"))
            .unwrap();

        let mut output = Vec::new();
        run(&mut output, &mut db, "ana", at("2024-01-01T10:30:00Z")).unwrap();
        let output = String::from_utf8(output).unwrap();
        assert_eq!(output, "Stopped session 1 for ana (1h 30m)\n");
    }

    #[test]
    fn second_stop_is_a_user_error() {
        let mut db = Database::open_in_memory().unwrap();
        let user = db.create_user("ana", None).unwrap();
        db.open_session(user.id, SessionSource::Manual, at("2024-01-01T09:00:00Z"))
            .unwrap();

        let mut output = Vec::new();
        run(&mut output, &mut db, "ana", at("2024-01-01T10:00:00Z")).unwrap();
        let err = run(&mut output, &mut db, "ana", at("2024-01-01T10:01:00Z")).unwrap_err();
        assert_eq!(err.to_string(), "no open session for ana");
    }
}
