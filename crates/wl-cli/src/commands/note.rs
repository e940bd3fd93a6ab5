//! Session note editing.

use std::io::Write;

use anyhow::Result;

use wl_core::SessionId;
use wl_db::Database;

pub fn run<W: Write>(writer: &mut W, db: &mut Database, session: i64, text: &str) -> Result<()> {
    let session_id = SessionId::new(session);
    db.set_session_note(session_id, text)?;
    writeln!(writer, "Note set on session {session_id}")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, Utc};
    use wl_core::SessionSource;

    fn at(s: &str) -> DateTime<Utc> {
        s.parse().unwrap()
    }

    #[test]
    fn note_is_stored_and_replaceable() {
        let mut db = Database::open_in_memory().unwrap();
        let user = db.create_user("ana", None).unwrap();
        let session = db
            .open_session(user.id, SessionSource::Manual, at("2024-01-01T09:00:00Z"))
            .unwrap();

        let mut output = Vec::new();
        run(&mut output, &mut db, session.id.value(), "standup").unwrap();
        run(&mut output, &mut db, session.id.value(), "standup + retro").unwrap();

        let stored = db.session_by_id(session.id).unwrap().unwrap();
        assert_eq!(stored.note.as_deref(), Some("standup + retro"));
    }

    #[test]
    fn unknown_session_is_an_error() {
        let mut db = Database::open_in_memory().unwrap();
        let mut output = Vec::new();
        assert!(run(&mut output, &mut db, 42, "nope").is_err());
    }
}
