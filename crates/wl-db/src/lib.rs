//! Storage layer for the work logger.
//!
//! Provides persistence for users and sessions using `rusqlite`, and is the
//! single enforcement point for the central invariant: **at most one open
//! session per user**, regardless of whether the manual surface or the
//! auto-tracking loop asked for it. The invariant is backed structurally by
//! a partial unique index over open rows, so even a check that races still
//! resolves to exactly one success and one [`DbError::AlreadyOpen`].
//!
//! # Thread Safety
//!
//! The [`Database`] type wraps a `rusqlite::Connection`, which is `Send` but
//! not `Sync`. A `Database` instance can be moved between threads but cannot
//! be shared across threads without external synchronization.
//!
//! For multi-threaded access, either:
//! - Use a `Mutex<Database>` to serialize access
//! - Use separate `Database` instances per thread (the unique index keeps
//!   the open-session invariant intact across connections)
//!
//! # Schema
//!
//! Timestamps are stored as TEXT in ISO 8601 UTC (e.g.
//! `2024-01-15T10:30:00Z`). This format is used by `chrono::DateTime<Utc>`
//! serialization and ensures:
//! - Lexicographic ordering matches chronological ordering
//! - Human-readable values in the database
//! - Timezone-aware (always UTC)

use std::path::Path;

use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{Connection, OptionalExtension, params};
use thiserror::Error;

use wl_core::{DeviceId, Session, SessionId, SessionSource, UserId};

/// Database errors.
///
/// [`AlreadyOpen`](Self::AlreadyOpen) and
/// [`NoOpenSession`](Self::NoOpenSession) are domain outcomes, not faults:
/// they are expected under concurrent manual/auto activity and callers are
/// meant to match on them.
#[derive(Debug, Error)]
pub enum DbError {
    /// An error from the underlying database.
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    /// The user already has an open session.
    #[error("user {user_id} already has an open session")]
    AlreadyOpen { user_id: UserId },
    /// The user has no open session (matching the requested source, if any).
    #[error("user {user_id} has no open session")]
    NoOpenSession { user_id: UserId },
    /// No user with this ID exists.
    #[error("no such user: {user_id}")]
    UnknownUser { user_id: UserId },
    /// The user exists but has been deactivated.
    #[error("user {user_id} is deactivated")]
    InactiveUser { user_id: UserId },
    /// No session with this ID exists.
    #[error("no such session: {session_id}")]
    UnknownSession { session_id: SessionId },
    /// The user name is already taken.
    #[error("user name already taken: {name}")]
    NameTaken { name: String },
    /// The device identifier is already assigned to another user.
    #[error("device {device} is already assigned to another user")]
    DeviceInUse { device: DeviceId },
    /// Failed to parse a stored session timestamp.
    #[error("invalid timestamp for session {session_id}: {timestamp}")]
    TimestampParse {
        session_id: i64,
        timestamp: String,
        #[source]
        source: chrono::ParseError,
    },
    /// A stored value failed validation on the way out.
    #[error("invalid stored value in {table} row {id}: {message}")]
    InvalidStored {
        table: &'static str,
        id: i64,
        message: String,
    },
}

/// A user row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserRecord {
    pub id: UserId,
    pub name: String,
    pub device: Option<DeviceId>,
    pub is_active: bool,
}

/// Database connection wrapper.
///
/// See the [module documentation](self) for thread safety considerations.
pub struct Database {
    conn: Connection,
}

impl Database {
    /// Opens a database at the given path, creating it if necessary.
    ///
    /// The database schema is automatically initialized on first open.
    pub fn open(path: &Path) -> Result<Self, DbError> {
        let conn = Connection::open(path)?;
        let db = Self { conn };
        db.init()?;
        Ok(db)
    }

    /// Opens an in-memory database.
    ///
    /// Useful for testing. The database is destroyed when the connection closes.
    pub fn open_in_memory() -> Result<Self, DbError> {
        let conn = Connection::open_in_memory()?;
        let db = Self { conn };
        db.init()?;
        Ok(db)
    }

    /// Initializes the database schema.
    ///
    /// This is idempotent - safe to call on an already-initialized database.
    fn init(&self) -> Result<(), DbError> {
        self.conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        self.conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS users (
                id INTEGER PRIMARY KEY,
                name TEXT NOT NULL UNIQUE,
                device_id TEXT UNIQUE,
                is_active INTEGER NOT NULL DEFAULT 1
            );

            -- Sessions table: one row per tracked work interval
            -- start_time/end_time: ISO 8601 UTC (e.g. '2024-01-15T10:30:00Z')
            -- end_time NULL = session is open
            -- source: 'manual' or 'auto'
            CREATE TABLE IF NOT EXISTS sessions (
                id INTEGER PRIMARY KEY,
                user_id INTEGER NOT NULL,
                start_time TEXT NOT NULL,
                end_time TEXT,
                source TEXT NOT NULL,
                note TEXT,
                FOREIGN KEY (user_id) REFERENCES users(id) ON DELETE CASCADE
            );

            -- At most one open session per user
            CREATE UNIQUE INDEX IF NOT EXISTS idx_sessions_open_user
                ON sessions(user_id) WHERE end_time IS NULL;

            CREATE INDEX IF NOT EXISTS idx_sessions_user_start
                ON sessions(user_id, start_time);
            ",
        )?;
        Ok(())
    }

    // ========== Users ==========

    /// Creates a user, optionally with a device identifier.
    pub fn create_user(
        &mut self,
        name: &str,
        device: Option<&DeviceId>,
    ) -> Result<UserRecord, DbError> {
        let result = self.conn.execute(
            "INSERT INTO users (name, device_id) VALUES (?, ?)",
            params![name, device.map(DeviceId::as_str)],
        );
        if let Err(err) = result {
            if unique_violation(&err, "users.name") {
                return Err(DbError::NameTaken {
                    name: name.to_string(),
                });
            }
            if let (true, Some(device)) = (unique_violation(&err, "users.device_id"), device) {
                return Err(DbError::DeviceInUse {
                    device: device.clone(),
                });
            }
            return Err(err.into());
        }
        let id = UserId::new(self.conn.last_insert_rowid());
        tracing::debug!(user_id = %id, name, "created user");
        Ok(UserRecord {
            id,
            name: name.to_string(),
            device: device.cloned(),
            is_active: true,
        })
    }

    /// Looks up a user by name.
    pub fn user_by_name(&self, name: &str) -> Result<Option<UserRecord>, DbError> {
        self.conn
            .query_row(
                "SELECT id, name, device_id, is_active FROM users WHERE name = ?",
                params![name],
                user_row,
            )
            .optional()?
            .map(UserRecord::try_from)
            .transpose()
    }

    /// Looks up a user by ID.
    pub fn user_by_id(&self, user_id: UserId) -> Result<Option<UserRecord>, DbError> {
        self.conn
            .query_row(
                "SELECT id, name, device_id, is_active FROM users WHERE id = ?",
                params![user_id.value()],
                user_row,
            )
            .optional()?
            .map(UserRecord::try_from)
            .transpose()
    }

    /// Lists all users ordered by name.
    pub fn list_users(&self) -> Result<Vec<UserRecord>, DbError> {
        let mut stmt = self
            .conn
            .prepare("SELECT id, name, device_id, is_active FROM users ORDER BY name ASC")?;
        let rows = stmt.query_map([], user_row)?;
        let mut users = Vec::new();
        for row in rows {
            users.push(UserRecord::try_from(row?)?);
        }
        Ok(users)
    }

    /// Assigns or clears a user's device identifier.
    pub fn set_user_device(
        &mut self,
        user_id: UserId,
        device: Option<&DeviceId>,
    ) -> Result<(), DbError> {
        let result = self.conn.execute(
            "UPDATE users SET device_id = ? WHERE id = ?",
            params![device.map(DeviceId::as_str), user_id.value()],
        );
        match result {
            Ok(0) => Err(DbError::UnknownUser { user_id }),
            Ok(_) => Ok(()),
            Err(err) => match device {
                Some(device) if unique_violation(&err, "users.device_id") => {
                    Err(DbError::DeviceInUse {
                        device: device.clone(),
                    })
                }
                _ => Err(err.into()),
            },
        }
    }

    /// Activates or deactivates a user.
    ///
    /// Deactivation does not touch the user's sessions; an open session
    /// stays open until closed through the normal paths.
    pub fn set_user_active(&mut self, user_id: UserId, active: bool) -> Result<(), DbError> {
        let updated = self.conn.execute(
            "UPDATE users SET is_active = ? WHERE id = ?",
            params![i32::from(active), user_id.value()],
        )?;
        if updated == 0 {
            return Err(DbError::UnknownUser { user_id });
        }
        Ok(())
    }

    /// Lists `(user, device)` pairs for all active users with a device.
    ///
    /// This is the device directory's source; the loop re-queries it every
    /// tick so assignments take effect without a restart.
    pub fn active_users_with_devices(&self) -> Result<Vec<(UserId, DeviceId)>, DbError> {
        let mut stmt = self.conn.prepare(
            "SELECT id, device_id FROM users WHERE device_id IS NOT NULL AND is_active = 1",
        )?;
        let rows = stmt.query_map([], |row| {
            let id: i64 = row.get(0)?;
            let device: String = row.get(1)?;
            Ok((id, device))
        })?;
        let mut pairs = Vec::new();
        for row in rows {
            let (id, device) = row?;
            let device = DeviceId::new(&device).map_err(|e| DbError::InvalidStored {
                table: "users",
                id,
                message: e.to_string(),
            })?;
            pairs.push((UserId::new(id), device));
        }
        Ok(pairs)
    }

    // ========== Sessions ==========

    /// Opens a session for the user.
    ///
    /// Fails with [`DbError::AlreadyOpen`] if the user already has an open
    /// session of any source. Manual and auto callers share this entry
    /// point; the source tag is informational only. The check and insert run
    /// in one transaction, and the open-row unique index catches whatever a
    /// concurrent connection slips past the check.
    pub fn open_session(
        &mut self,
        user_id: UserId,
        source: SessionSource,
        now: DateTime<Utc>,
    ) -> Result<Session, DbError> {
        let tx = self.conn.transaction()?;

        let user: Option<(i64, bool)> = tx
            .query_row(
                "SELECT id, is_active FROM users WHERE id = ?",
                params![user_id.value()],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?;
        match user {
            None => return Err(DbError::UnknownUser { user_id }),
            Some((_, false)) => return Err(DbError::InactiveUser { user_id }),
            Some((_, true)) => {}
        }

        let open_exists: Option<i64> = tx
            .query_row(
                "SELECT id FROM sessions WHERE user_id = ? AND end_time IS NULL",
                params![user_id.value()],
                |row| row.get(0),
            )
            .optional()?;
        if open_exists.is_some() {
            return Err(DbError::AlreadyOpen { user_id });
        }

        let start = format_timestamp(now);
        let inserted = tx.execute(
            "INSERT INTO sessions (user_id, start_time, source) VALUES (?, ?, ?)",
            params![user_id.value(), start, source.as_str()],
        );
        if let Err(err) = inserted {
            if unique_violation(&err, "sessions.user_id") {
                return Err(DbError::AlreadyOpen { user_id });
            }
            return Err(err.into());
        }
        let id = SessionId::new(tx.last_insert_rowid());
        tx.commit()?;

        tracing::debug!(%user_id, session_id = %id, %source, "opened session");
        Ok(Session {
            id,
            user_id,
            start: now,
            end: None,
            source,
            note: None,
        })
    }

    /// Closes the user's open session, setting its end to `now`.
    ///
    /// With `only_source` set, an open session with a different source tag is
    /// treated as if none existed; the auto loop uses this so a manually
    /// opened session is never closed by presence tracking. Fails with
    /// [`DbError::NoOpenSession`] when nothing matches.
    pub fn close_open_session(
        &mut self,
        user_id: UserId,
        only_source: Option<SessionSource>,
        now: DateTime<Utc>,
    ) -> Result<Session, DbError> {
        let tx = self.conn.transaction()?;

        let row: Option<SessionRow> = match only_source {
            Some(source) => tx
                .query_row(
                    "SELECT id, user_id, start_time, end_time, source, note
                     FROM sessions
                     WHERE user_id = ? AND end_time IS NULL AND source = ?
                     ORDER BY start_time DESC LIMIT 1",
                    params![user_id.value(), source.as_str()],
                    session_row,
                )
                .optional()?,
            None => tx
                .query_row(
                    "SELECT id, user_id, start_time, end_time, source, note
                     FROM sessions
                     WHERE user_id = ? AND end_time IS NULL
                     ORDER BY start_time DESC LIMIT 1",
                    params![user_id.value()],
                    session_row,
                )
                .optional()?,
        };
        let Some(row) = row else {
            return Err(DbError::NoOpenSession { user_id });
        };

        let end = format_timestamp(now);
        let updated = tx.execute(
            "UPDATE sessions SET end_time = ? WHERE id = ? AND end_time IS NULL",
            params![end, row.id],
        )?;
        if updated == 0 {
            // Another connection closed it between the read and the write
            return Err(DbError::NoOpenSession { user_id });
        }
        tx.commit()?;

        let mut session = Session::try_from(row)?;
        session.end = Some(now);
        tracing::debug!(%user_id, session_id = %session.id, source = %session.source, "closed session");
        Ok(session)
    }

    /// Attaches or replaces the note on a session (open or closed).
    ///
    /// Idempotent: setting the same text twice is not an error.
    pub fn set_session_note(&mut self, session_id: SessionId, note: &str) -> Result<(), DbError> {
        let updated = self.conn.execute(
            "UPDATE sessions SET note = ? WHERE id = ?",
            params![note, session_id.value()],
        )?;
        if updated == 0 {
            return Err(DbError::UnknownSession { session_id });
        }
        Ok(())
    }

    /// Looks up a session by ID.
    pub fn session_by_id(&self, session_id: SessionId) -> Result<Option<Session>, DbError> {
        self.conn
            .query_row(
                "SELECT id, user_id, start_time, end_time, source, note
                 FROM sessions WHERE id = ?",
                params![session_id.value()],
                session_row,
            )
            .optional()?
            .map(Session::try_from)
            .transpose()
    }

    /// Returns the user's open session, if any.
    ///
    /// Used by reporting to render an in-progress session without counting
    /// it as closed.
    pub fn open_session_for(&self, user_id: UserId) -> Result<Option<Session>, DbError> {
        self.conn
            .query_row(
                "SELECT id, user_id, start_time, end_time, source, note
                 FROM sessions WHERE user_id = ? AND end_time IS NULL",
                params![user_id.value()],
                session_row,
            )
            .optional()?
            .map(Session::try_from)
            .transpose()
    }

    /// Lists the user's sessions whose start falls in `[start, end)`,
    /// ordered by start ascending.
    pub fn sessions_started_between(
        &self,
        user_id: UserId,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<Session>, DbError> {
        if end <= start {
            return Ok(Vec::new());
        }
        let mut stmt = self.conn.prepare(
            "SELECT id, user_id, start_time, end_time, source, note
             FROM sessions
             WHERE user_id = ? AND start_time >= ? AND start_time < ?
             ORDER BY start_time ASC, id ASC",
        )?;
        let rows = stmt.query_map(
            params![
                user_id.value(),
                format_timestamp(start),
                format_timestamp(end)
            ],
            session_row,
        )?;
        let mut sessions = Vec::new();
        for row in rows {
            sessions.push(Session::try_from(row?)?);
        }
        Ok(sessions)
    }

    /// Lists the user's sessions for one local calendar date.
    ///
    /// A session belongs to the date containing its start instant under the
    /// caller's offset; a session spanning local midnight is listed under
    /// the date it started on.
    pub fn sessions_for_local_date(
        &self,
        user_id: UserId,
        date: chrono::NaiveDate,
        tz: wl_core::TzOffset,
    ) -> Result<Vec<Session>, DbError> {
        let (start, end) = wl_core::report::local_day_bounds(date, tz);
        self.sessions_started_between(user_id, start, end)
    }
}

/// Raw session row before timestamp/source parsing.
#[derive(Debug)]
struct SessionRow {
    id: i64,
    user_id: i64,
    start: String,
    end: Option<String>,
    source: String,
    note: Option<String>,
}

fn session_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<SessionRow> {
    Ok(SessionRow {
        id: row.get(0)?,
        user_id: row.get(1)?,
        start: row.get(2)?,
        end: row.get(3)?,
        source: row.get(4)?,
        note: row.get(5)?,
    })
}

impl TryFrom<SessionRow> for Session {
    type Error = DbError;

    fn try_from(row: SessionRow) -> Result<Self, Self::Error> {
        let start = parse_timestamp(&row.start, row.id)?;
        let end = row
            .end
            .as_deref()
            .map(|ts| parse_timestamp(ts, row.id))
            .transpose()?;
        let source: SessionSource = row.source.parse().map_err(|e: wl_core::ValidationError| {
            DbError::InvalidStored {
                table: "sessions",
                id: row.id,
                message: e.to_string(),
            }
        })?;
        Ok(Self {
            id: SessionId::new(row.id),
            user_id: UserId::new(row.user_id),
            start,
            end,
            source,
            note: row.note,
        })
    }
}

/// Raw user row before device validation.
type UserRow = (i64, String, Option<String>, bool);

fn user_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<UserRow> {
    Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?))
}

impl TryFrom<UserRow> for UserRecord {
    type Error = DbError;

    fn try_from((id, name, device, is_active): UserRow) -> Result<Self, Self::Error> {
        let device = device
            .map(|d| {
                DeviceId::new(&d).map_err(|e| DbError::InvalidStored {
                    table: "users",
                    id,
                    message: e.to_string(),
                })
            })
            .transpose()?;
        Ok(Self {
            id: UserId::new(id),
            name,
            device,
            is_active,
        })
    }
}

fn parse_timestamp(timestamp: &str, session_id: i64) -> Result<DateTime<Utc>, DbError> {
    DateTime::parse_from_rfc3339(timestamp)
        .map(|parsed| parsed.with_timezone(&Utc))
        .map_err(|source| DbError::TimestampParse {
            session_id,
            timestamp: timestamp.to_string(),
            source,
        })
}

fn format_timestamp(timestamp: DateTime<Utc>) -> String {
    timestamp.to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// Whether the error is a UNIQUE violation mentioning the given column/index.
fn unique_violation(err: &rusqlite::Error, needle: &str) -> bool {
    match err {
        rusqlite::Error::SqliteFailure(e, Some(message))
            if e.code == rusqlite::ErrorCode::ConstraintViolation =>
        {
            message.contains(needle)
        }
        _ => false,
    }
}
