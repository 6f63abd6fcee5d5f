use std::cmp::Ordering;

use chrono::{DateTime, Utc};
use db::models::class_session::Model as ClassSession;
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    Upcoming,
    Ongoing,
    Completed,
}

impl SessionStatus {
    /// Listing priority: ongoing first, then upcoming, then completed.
    pub fn priority(self) -> u8 {
        match self {
            SessionStatus::Ongoing => 0,
            SessionStatus::Upcoming => 1,
            SessionStatus::Completed => 2,
        }
    }
}

/// Derives a session's temporal status at `now`.
///
/// Both bounds are inclusive for `Ongoing`. When a bound is missing the
/// session stays `Upcoming` until the known bound proves otherwise.
pub fn classify(session: &ClassSession, now: DateTime<Utc>) -> SessionStatus {
    match (session.starts_at(), session.ends_at()) {
        (Some(start), Some(end)) => {
            if now < start {
                SessionStatus::Upcoming
            } else if now <= end {
                SessionStatus::Ongoing
            } else {
                SessionStatus::Completed
            }
        }
        (Some(start), None) if now >= start => SessionStatus::Ongoing,
        (None, Some(end)) if now > end => SessionStatus::Completed,
        _ => SessionStatus::Upcoming,
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClassifiedSession {
    #[serde(flatten)]
    pub session: ClassSession,
    pub status: SessionStatus,
}

impl ClassifiedSession {
    pub fn new(session: ClassSession, now: DateTime<Utc>) -> Self {
        let status = classify(&session, now);
        Self { session, status }
    }
}

/// Total order for session listings: priority, then date, start time and id.
pub fn priority_order(a: &ClassifiedSession, b: &ClassifiedSession) -> Ordering {
    a.status
        .priority()
        .cmp(&b.status.priority())
        .then_with(|| a.session.date.cmp(&b.session.date))
        .then_with(|| a.session.start_time.cmp(&b.session.start_time))
        .then_with(|| a.session.id.cmp(&b.session.id))
}

/// Classifies every session at `now` and sorts by [`priority_order`].
pub fn classify_all(sessions: Vec<ClassSession>, now: DateTime<Utc>) -> Vec<ClassifiedSession> {
    let mut out: Vec<_> = sessions
        .into_iter()
        .map(|s| ClassifiedSession::new(s, now))
        .collect();
    out.sort_by(priority_order);
    out
}
