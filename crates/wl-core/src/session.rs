//! Session records and duration arithmetic.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::types::{SessionId, SessionSource, UserId};

/// A tracked work session.
///
/// A session with no end timestamp is open. An open session's duration is
/// always computed against a caller-supplied instant and never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub id: SessionId,
    pub user_id: UserId,
    pub start: DateTime<Utc>,
    pub end: Option<DateTime<Utc>>,
    pub source: SessionSource,
    pub note: Option<String>,
}

impl Session {
    /// Whether the session is still running.
    #[must_use]
    pub const fn is_open(&self) -> bool {
        self.end.is_none()
    }

    /// Elapsed time of the session.
    ///
    /// Closed sessions use their own end timestamp; open sessions are
    /// measured up to `now`. A session whose end precedes its start (clock
    /// adjustment between writes) counts as zero rather than negative.
    #[must_use]
    pub fn duration(&self, now: DateTime<Utc>) -> Duration {
        let end = self.end.unwrap_or(now);
        (end - self.start).max(Duration::zero())
    }
}
