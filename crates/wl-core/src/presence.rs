//! Debounced per-user presence tracking.
//!
//! Raw scan results flap: a single missed scan would otherwise end a session
//! and reopen it one tick later, corrupting reported hours. The tracker
//! therefore holds a per-user state machine (`ABSENT` ⇄ `PRESENT`, with a
//! `PENDING_ABSENT` debounce sub-state) and only emits a transition event
//! once a user has been continuously unobserved for the configured absence
//! timeout. The timeout must be materially larger than the scan interval.
//!
//! State is transient and rebuilt from scratch on restart: until a scan says
//! otherwise, every user is assumed absent.

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Duration, Utc};

use crate::types::UserId;

/// A debounced presence transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PresenceEvent {
    /// The user's device appeared after the user was absent.
    BecamePresent(UserId),
    /// The user's device has been unobserved for at least the absence timeout.
    BecameAbsent(UserId),
}

/// Per-user debounce state. Absent users carry no state at all.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum UserState {
    Present,
    /// Unobserved since going present; accumulates confirmed absence time.
    PendingAbsent { missing_for: Duration },
}

/// Converts successive scan snapshots into debounced presence events.
///
/// All methods take `now` explicitly; the tracker never reads the clock.
#[derive(Debug)]
pub struct PresenceTracker {
    absence_timeout: Duration,
    states: HashMap<UserId, UserState>,
    last_scan_at: Option<DateTime<Utc>>,
}

impl PresenceTracker {
    /// Creates a tracker that reports absence after `absence_timeout` of
    /// continuous non-observation.
    #[must_use]
    pub fn new(absence_timeout: Duration) -> Self {
        Self {
            absence_timeout,
            states: HashMap::new(),
            last_scan_at: None,
        }
    }

    /// Feeds one successful scan into the tracker.
    ///
    /// `tracked` is the set of users that currently have a mapped device;
    /// `present` the subset whose device was observed this scan. Users
    /// missing from `tracked` (device unlinked, user deactivated) have any
    /// leftover state dropped without emitting an event.
    ///
    /// Absence accumulates only across successful scans: the time between
    /// this call and the previous [`apply_scan`](Self::apply_scan) or
    /// [`record_scan_failure`](Self::record_scan_failure) call is what gets
    /// added to pending-absence timers. At most one event per user is
    /// produced per scan.
    pub fn apply_scan(
        &mut self,
        tracked: &HashSet<UserId>,
        present: &HashSet<UserId>,
        now: DateTime<Utc>,
    ) -> Vec<PresenceEvent> {
        let elapsed = self
            .last_scan_at
            .map_or_else(Duration::zero, |at| (now - at).max(Duration::zero()));
        self.last_scan_at = Some(now);
        self.states.retain(|user, _| tracked.contains(user));

        let mut events = Vec::new();
        for &user in tracked {
            if present.contains(&user) {
                let previous = self.states.insert(user, UserState::Present);
                if previous.is_none() {
                    tracing::debug!(%user, "became present");
                    events.push(PresenceEvent::BecamePresent(user));
                }
                // A pending absence is simply cancelled; no event fires.
            } else {
                let missing_for = match self.states.get(&user) {
                    None => continue,
                    Some(UserState::Present) => elapsed,
                    Some(UserState::PendingAbsent { missing_for }) => *missing_for + elapsed,
                };
                if missing_for >= self.absence_timeout {
                    self.states.remove(&user);
                    tracing::debug!(%user, missing_secs = missing_for.num_seconds(), "became absent");
                    events.push(PresenceEvent::BecameAbsent(user));
                } else {
                    self.states
                        .insert(user, UserState::PendingAbsent { missing_for });
                }
            }
        }
        events
    }

    /// Records that a scan attempt produced no data.
    ///
    /// Presence state is left exactly as it was and the failed window is
    /// excluded from every absence timer, so a momentarily unavailable
    /// scanner can never close a session on its own.
    pub fn record_scan_failure(&mut self, now: DateTime<Utc>) {
        self.last_scan_at = Some(now);
    }

    /// Whether the user is currently considered present (including the
    /// pending-absent debounce window).
    #[must_use]
    pub fn is_present(&self, user: UserId) -> bool {
        self.states.contains_key(&user)
    }
}
