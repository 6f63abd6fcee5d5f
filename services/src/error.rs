use std::fmt;

use common::format_validation_errors;
use sea_orm::{DbErr, SqlErr};
use thiserror::Error;
use validator::ValidationErrors;

/// Why a check-in was refused before any record was written.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectReason {
    /// The session has no beacon, so BLE check-in is unavailable.
    NoBeaconBound,
    /// The scanned beacon isn't the one frozen onto the session.
    BeaconMismatch,
    TokenNotFound,
    TokenExpired,
    /// The QR token was issued for a different course.
    TokenCourseMismatch,
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let msg = match self {
            RejectReason::NoBeaconBound => "no beacon is bound to this session",
            RejectReason::BeaconMismatch => "scanned beacon does not match this session",
            RejectReason::TokenNotFound => "check-in code not recognised",
            RejectReason::TokenExpired => "check-in code has expired",
            RejectReason::TokenCourseMismatch => "check-in code belongs to another course",
        };
        f.write_str(msg)
    }
}

#[derive(Debug, Error)]
pub enum AppError {
    #[error("validation failed: {0}")]
    Validation(String),

    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: String },

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("check-in rejected: {0}")]
    CheckInRejected(RejectReason),

    #[error("database error: {0}")]
    Persistence(DbErr),
}

pub type AppResult<T> = Result<T, AppError>;

impl AppError {
    pub fn not_found(entity: &'static str, id: impl ToString) -> Self {
        AppError::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        AppError::Validation(msg.into())
    }
}

impl From<DbErr> for AppError {
    fn from(err: DbErr) -> Self {
        match err.sql_err() {
            Some(SqlErr::UniqueConstraintViolation(msg)) => AppError::Conflict(msg),
            _ => AppError::Persistence(err),
        }
    }
}

impl From<ValidationErrors> for AppError {
    fn from(errors: ValidationErrors) -> Self {
        AppError::Validation(format_validation_errors(&errors))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejection_reasons_are_distinct_messages() {
        let err = AppError::CheckInRejected(RejectReason::NoBeaconBound);
        assert_eq!(
            err.to_string(),
            "check-in rejected: no beacon is bound to this session"
        );
        assert_ne!(
            RejectReason::TokenExpired.to_string(),
            RejectReason::TokenNotFound.to_string()
        );
    }

    #[test]
    fn plain_db_errors_become_persistence() {
        let err: AppError = DbErr::Custom("disk full".into()).into();
        assert!(matches!(err, AppError::Persistence(_)));
    }

    #[tokio::test]
    async fn duplicate_student_session_row_is_a_conflict() {
        use crate::test_fixtures::{at, day, seed, session};
        use db::models::attendance_record::{self, AttendanceStatus, CheckInMethod};
        use db::models::class_session;
        use db::test_utils::setup_test_db;
        use sea_orm::{ActiveModelTrait, Set};

        let db = setup_test_db().await;
        let seeded = seed(&db).await;
        let mut lecture = session(Some("09:00"), Some("10:30"));
        lecture.course_id = seeded.course.id;
        lecture.created_by = seeded.lecturer.id;
        let lecture = class_session::ActiveModel {
            course_id: Set(lecture.course_id),
            course_name: Set(lecture.course_name),
            created_by: Set(lecture.created_by),
            title: Set(lecture.title),
            date: Set(lecture.date),
            start_time: Set(lecture.start_time),
            end_time: Set(lecture.end_time),
            location: Set(None),
            beacon_id: Set(None),
            window_start: Set(None),
            window_end: Set(None),
            created_at: Set(lecture.created_at),
            updated_at: Set(lecture.updated_at),
            ..Default::default()
        }
        .insert(&db)
        .await
        .unwrap();

        let row = attendance_record::ActiveModel {
            student_id: Set(seeded.student.id),
            course_id: Set(seeded.course.id),
            session_id: Set(Some(lecture.id)),
            check_in_time: Set(Some(at(9, 5))),
            check_out_time: Set(None),
            method: Set(CheckInMethod::Ble),
            status: Set(AttendanceStatus::Verified),
            date: Set(day()),
            overridden_by: Set(None),
            ..Default::default()
        };
        row.clone().insert(&db).await.unwrap();

        let err: AppError = row.insert(&db).await.unwrap_err().into();
        assert!(matches!(err, AppError::Conflict(_)), "{err}");
    }

    #[test]
    fn not_found_names_the_entity() {
        assert_eq!(
            AppError::not_found("session", 42).to_string(),
            "session 42 not found"
        );
    }
}
