use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::{Duration, Instant};

use chrono::{Datelike, Local, NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::domain::{ContentKind, UserId};

/// Identifier of a creation-wizard session. Built from the owner, the creation
/// instant, and a process-wide sequence, so two sessions never share an id.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(pub String);

/// Which wizard step the owner is on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WizardStep {
    Date,
    Time,
    Note,
}

/// Month the date picker is showing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CalendarCursor {
    pub year: i32,
    pub month: u32,
}

/// Transient state for the multi-step recruitment creation flow. Reclaimed on
/// completion, cancellation, or expiry.
#[derive(Debug, Clone)]
pub struct Session {
    pub id: SessionId,
    pub owner_id: UserId,
    pub content_kind: ContentKind,
    pub step: WizardStep,
    pub calendar_cursor: CalendarCursor,
    pub selected_date: Option<NaiveDate>,
    pub selected_time: Option<NaiveTime>,
    expires_at: Instant,
}

impl Session {
    fn is_expired(&self) -> bool {
        Instant::now() >= self.expires_at
    }
}

/// Fields a wizard step may merge into its session.
#[derive(Debug, Clone, Copy, Default)]
pub struct SessionUpdate {
    pub step: Option<WizardStep>,
    pub calendar_cursor: Option<CalendarCursor>,
    pub selected_date: Option<NaiveDate>,
    pub selected_time: Option<NaiveTime>,
}

static SESSION_SEQUENCE: AtomicU64 = AtomicU64::new(1);

/// Arena of wizard sessions with a fixed TTL. Lookups evict expired entries
/// lazily; `sweep` reclaims the rest on a fixed period so memory stays bounded
/// even without lookups. The interior mutex keeps the sweep safe to interleave
/// with handler calls.
#[derive(Debug)]
pub struct SessionStore {
    sessions: Mutex<HashMap<SessionId, Session>>,
    ttl: Duration,
}

impl SessionStore {
    pub fn new(ttl: Duration) -> Self {
        Self {
            sessions: Mutex::new(HashMap::new()),
            ttl,
        }
    }

    /// Allocate a session in the date step, with the calendar cursor on the
    /// current month.
    pub fn create(&self, owner_id: UserId, content_kind: ContentKind) -> SessionId {
        let sequence = SESSION_SEQUENCE.fetch_add(1, Ordering::Relaxed);
        let created = Local::now();
        let id = SessionId(format!(
            "session-{}-{}-{sequence}",
            owner_id.0,
            created.timestamp_millis()
        ));

        let today = created.date_naive();
        let session = Session {
            id: id.clone(),
            owner_id,
            content_kind,
            step: WizardStep::Date,
            calendar_cursor: CalendarCursor {
                year: today.year(),
                month: today.month(),
            },
            selected_date: None,
            selected_time: None,
            expires_at: Instant::now() + self.ttl,
        };

        let mut guard = self.sessions.lock().expect("session mutex poisoned");
        guard.insert(id.clone(), session);
        info!(session = %id.0, content = content_kind.label(), "wizard session created");
        id
    }

    /// Returns the session if it exists and has not expired. Finding an expired
    /// entry evicts it before reporting absence.
    pub fn get(&self, id: &SessionId) -> Option<Session> {
        let mut guard = self.sessions.lock().expect("session mutex poisoned");
        match guard.get(id) {
            Some(session) if session.is_expired() => {
                guard.remove(id);
                None
            }
            Some(session) => Some(session.clone()),
            None => None,
        }
    }

    /// Merge fields into an existing, non-expired session. Returns false when the
    /// session is absent or expired.
    pub fn update(&self, id: &SessionId, update: SessionUpdate) -> bool {
        let mut guard = self.sessions.lock().expect("session mutex poisoned");
        let Some(session) = guard.get_mut(id) else {
            return false;
        };
        if session.is_expired() {
            guard.remove(id);
            return false;
        }

        if let Some(step) = update.step {
            session.step = step;
        }
        if let Some(cursor) = update.calendar_cursor {
            session.calendar_cursor = cursor;
        }
        if let Some(date) = update.selected_date {
            session.selected_date = Some(date);
        }
        if let Some(time) = update.selected_time {
            session.selected_time = Some(time);
        }
        true
    }

    pub fn delete(&self, id: &SessionId) -> bool {
        let mut guard = self.sessions.lock().expect("session mutex poisoned");
        guard.remove(id).is_some()
    }

    /// Evict every expired session, returning how many were reclaimed.
    pub fn sweep(&self) -> usize {
        let mut guard = self.sessions.lock().expect("session mutex poisoned");
        let before = guard.len();
        guard.retain(|_, session| !session.is_expired());
        let evicted = before - guard.len();
        if evicted > 0 {
            debug!(evicted, "expired wizard sessions reclaimed");
        }
        evicted
    }

    /// Number of live entries, counting expired-but-unswept ones.
    pub fn len(&self) -> usize {
        self.sessions.lock().expect("session mutex poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
