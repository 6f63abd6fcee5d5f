use chrono::{DateTime, NaiveTime, Utc};
use db::models::class_session::Model as ClassSession;

use crate::error::{AppError, AppResult};

/// Inclusive interval during which a check-in counts as on time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AttendanceWindow {
    pub opens_at: DateTime<Utc>,
    pub closes_at: DateTime<Utc>,
}

impl AttendanceWindow {
    pub fn contains(&self, instant: DateTime<Utc>) -> bool {
        self.opens_at <= instant && instant <= self.closes_at
    }
}

/// Effective window bounds as times of day.
///
/// Each explicit bound falls back to the matching scheduled time when unset.
/// This is a defaulting rule for optional fields; it never hides an error.
pub fn effective_bounds(
    session: &ClassSession,
) -> (Option<NaiveTime>, Option<NaiveTime>) {
    (
        session.window_start.or(session.start_time),
        session.window_end.or(session.end_time),
    )
}

/// `None` when neither an explicit bound nor the schedule pins one side down.
pub fn window_for(session: &ClassSession) -> Option<AttendanceWindow> {
    match effective_bounds(session) {
        (Some(open), Some(close)) => Some(AttendanceWindow {
            opens_at: session.at(open),
            closes_at: session.at(close),
        }),
        _ => None,
    }
}

/// Independent of [`crate::session_status::classify`]: a narrow explicit
/// window can reject a check-in while the session is still ongoing.
pub fn is_within_window(session: &ClassSession, instant: DateTime<Utc>) -> bool {
    window_for(session).is_some_and(|w| w.contains(instant))
}

/// Rejects a schedule or window whose end precedes its start.
pub fn validate_schedule(session: &ClassSession) -> AppResult<()> {
    if let (Some(start), Some(end)) = (session.start_time, session.end_time) {
        if end < start {
            return Err(AppError::validation(format!(
                "session end {end} is before start {start}"
            )));
        }
    }
    if let (Some(open), Some(close)) = effective_bounds(session) {
        if close < open {
            return Err(AppError::validation(format!(
                "attendance window end {close} is before window start {open}"
            )));
        }
    }
    Ok(())
}
