//! Manual session start.

use std::io::Write;

use anyhow::Result;
use chrono::{DateTime, Utc};

use wl_core::SessionSource;
use wl_db::{Database, DbError};

use super::require_user;

pub fn run<W: Write>(
    writer: &mut W,
    db: &mut Database,
    user_name: &str,
    now: DateTime<Utc>,
) -> Result<()> {
    let user = require_user(db, user_name)?;
    match db.open_session(user.id, SessionSource::Manual, now) {
        Ok(session) => {
            writeln!(
                writer,
                "Started session {} for {} at {} UTC",
                session.id,
                user.name,
                session.start.format("%Y-%m-%d %H:%M")
            )?;
        }
        Err(DbError::AlreadyOpen { .. }) => {
            // Not an invariant breach from the user's side: just show what
            // is already running instead of duplicating it.
            let open = db.open_session_for(user.id)?;
            match open {
                Some(session) => writeln!(
                    writer,
                    "{} already has an open session ({}, started {} UTC)",
                    user.name,
                    session.id,
                    session.start.format("%Y-%m-%d %H:%M")
                )?,
                None => writeln!(writer, "{} already has an open session", user.name)?,
            }
        }
        Err(err) => return Err(err.into()),
    }
    Ok(())
}
