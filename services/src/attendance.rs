use chrono::{DateTime, Utc};
use db::models::{attendance_record, class_session, user};
use log::{debug, info, warn};
use sea_orm::{ActiveModelTrait, ConnectionTrait, EntityTrait, Set};

use crate::attendance_window::is_within_window;
use crate::check_in_token::CheckInTokenService;
use crate::error::{AppError, AppResult, RejectReason};

pub use db::models::attendance_record::{AttendanceStatus, CheckInMethod, Model as AttendanceRecord};
use db::models::class_session::Model as ClassSession;

/// Status an automatic check-in earns at `instant`.
pub fn derive_status(session: &ClassSession, instant: DateTime<Utc>) -> AttendanceStatus {
    if is_within_window(session, instant) {
        AttendanceStatus::Verified
    } else {
        AttendanceStatus::Pending
    }
}

pub struct AttendanceService;

impl AttendanceService {
    /// Creates or corrects the single record for `(student, session)`.
    ///
    /// A first check-in is `Verified` inside the window and `Pending` outside
    /// it. A repeat check-in overwrites the method and moves `check_in_time`
    /// earlier only while the student hasn't checked out. Statuses set by a
    /// lecturer are kept. A racing insert on the same pair surfaces as
    /// `Conflict` through the store's unique index.
    pub async fn resolve_check_in<C>(
        db: &C,
        student_id: i64,
        session: &ClassSession,
        method: CheckInMethod,
        instant: DateTime<Utc>,
    ) -> AppResult<AttendanceRecord>
    where
        C: ConnectionTrait,
    {
        let existing =
            attendance_record::Model::find_for_student_session(db, student_id, session.id).await?;

        let Some(existing) = existing else {
            let status = derive_status(session, instant);
            debug!(
                "student {student_id} first check-in for session {} via {method} at {instant}: {status}",
                session.id
            );
            let record = attendance_record::ActiveModel {
                student_id: Set(student_id),
                course_id: Set(session.course_id),
                session_id: Set(Some(session.id)),
                check_in_time: Set(Some(instant)),
                check_out_time: Set(None),
                method: Set(method),
                status: Set(status),
                date: Set(session.date),
                overridden_by: Set(None),
                ..Default::default()
            }
            .insert(db)
            .await?;
            return Ok(record);
        };

        let corrects_time = existing.check_out_time.is_none()
            && existing.check_in_time.is_none_or(|prev| instant < prev);
        let method_changed = existing.method != method;

        if !corrects_time && !method_changed {
            return Ok(existing);
        }

        let mut active: attendance_record::ActiveModel = existing.clone().into();
        if method_changed {
            active.method = Set(method);
        }
        if corrects_time {
            active.check_in_time = Set(Some(instant));
            if !existing.is_manually_set() {
                active.status = Set(derive_status(session, instant));
            }
        }
        debug!(
            "student {student_id} re-check-in for session {}: time corrected={corrects_time}, method={method}",
            session.id
        );
        Ok(active.update(db).await?)
    }

    /// Entry point for any check-in event once the method has been authorized.
    pub async fn submit_check_in<C>(
        db: &C,
        student_id: i64,
        session_id: i64,
        method: CheckInMethod,
        instant: DateTime<Utc>,
    ) -> AppResult<AttendanceRecord>
    where
        C: ConnectionTrait,
    {
        let session = Self::load_participants(db, student_id, session_id).await?;
        Self::resolve_check_in(db, student_id, &session, method, instant).await
    }

    /// BLE scan: the scanned beacon must be the one frozen onto the session.
    pub async fn submit_ble_check_in<C>(
        db: &C,
        student_id: i64,
        session_id: i64,
        scanned_beacon_id: &str,
        instant: DateTime<Utc>,
    ) -> AppResult<AttendanceRecord>
    where
        C: ConnectionTrait,
    {
        let session = Self::load_participants(db, student_id, session_id).await?;

        match session.beacon_id.as_deref() {
            None => {
                warn!("BLE check-in for session {session_id} refused: no beacon bound");
                return Err(AppError::CheckInRejected(RejectReason::NoBeaconBound));
            }
            Some(bound) if bound != scanned_beacon_id.trim() => {
                warn!(
                    "BLE check-in for session {session_id} refused: scanned {scanned_beacon_id}, bound {bound}"
                );
                return Err(AppError::CheckInRejected(RejectReason::BeaconMismatch));
            }
            Some(_) => {}
        }

        Self::resolve_check_in(db, student_id, &session, CheckInMethod::Ble, instant).await
    }

    /// QR scan: the code must be live and issued for the session's course.
    pub async fn submit_qr_check_in<C>(
        db: &C,
        student_id: i64,
        session_id: i64,
        code: &str,
        instant: DateTime<Utc>,
    ) -> AppResult<AttendanceRecord>
    where
        C: ConnectionTrait,
    {
        let session = Self::load_participants(db, student_id, session_id).await?;

        let token = CheckInTokenService::validate_code(db, code, instant)
            .await
            .inspect_err(|e| warn!("QR check-in for session {session_id} refused: {e}"))?;
        if token.course_id != session.course_id {
            warn!(
                "QR check-in for session {session_id} refused: token {} is for course {}",
                token.id, token.course_id
            );
            return Err(AppError::CheckInRejected(RejectReason::TokenCourseMismatch));
        }

        Self::resolve_check_in(db, student_id, &session, CheckInMethod::Qr, instant).await
    }

    /// Lecturer/admin overlay. Creates a MANUAL record without a check-in time
    /// when the student never checked in.
    pub async fn set_status<C>(
        db: &C,
        actor_id: i64,
        student_id: i64,
        session_id: i64,
        status: AttendanceStatus,
    ) -> AppResult<AttendanceRecord>
    where
        C: ConnectionTrait,
    {
        let session = Self::load_participants(db, student_id, session_id).await?;
        if user::Entity::find_by_id(actor_id).one(db).await?.is_none() {
            return Err(AppError::not_found("user", actor_id));
        }

        let record = match attendance_record::Model::find_for_student_session(db, student_id, session_id)
            .await?
        {
            Some(existing) => {
                let mut active: attendance_record::ActiveModel = existing.into();
                active.status = Set(status);
                active.overridden_by = Set(Some(actor_id));
                active.update(db).await?
            }
            None => {
                attendance_record::ActiveModel {
                    student_id: Set(student_id),
                    course_id: Set(session.course_id),
                    session_id: Set(Some(session_id)),
                    check_in_time: Set(None),
                    check_out_time: Set(None),
                    method: Set(CheckInMethod::Manual),
                    status: Set(status),
                    date: Set(session.date),
                    overridden_by: Set(Some(actor_id)),
                    ..Default::default()
                }
                .insert(db)
                .await?
            }
        };

        info!("user {actor_id} set student {student_id} to {status} for session {session_id}");
        Ok(record)
    }

    pub async fn check_out<C>(
        db: &C,
        student_id: i64,
        session_id: i64,
        instant: DateTime<Utc>,
    ) -> AppResult<AttendanceRecord>
    where
        C: ConnectionTrait,
    {
        let record = attendance_record::Model::find_for_student_session(db, student_id, session_id)
            .await?
            .ok_or_else(|| {
                AppError::not_found("attendance record", format!("{student_id}/{session_id}"))
            })?;

        if record.check_out_time.is_some() {
            return Err(AppError::Conflict(format!(
                "student {student_id} already checked out of session {session_id}"
            )));
        }
        if let Some(check_in) = record.check_in_time {
            if instant < check_in {
                return Err(AppError::validation("check-out cannot precede check-in"));
            }
        }

        let mut active: attendance_record::ActiveModel = record.into();
        active.check_out_time = Set(Some(instant));
        Ok(active.update(db).await?)
    }

    async fn load_participants<C>(db: &C, student_id: i64, session_id: i64) -> AppResult<ClassSession>
    where
        C: ConnectionTrait,
    {
        let session = class_session::Entity::find_by_id(session_id)
            .one(db)
            .await?
            .ok_or_else(|| AppError::not_found("session", session_id))?;
        if user::Entity::find_by_id(student_id).one(db).await?.is_none() {
            return Err(AppError::not_found("student", student_id));
        }
        Ok(session)
    }
}
