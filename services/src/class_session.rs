use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use db::models::{attendance_record, beacon_assignment, class_session, course, user};
use log::info;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter, Set,
    TransactionTrait,
};
use validator::Validate;

use crate::attendance_window::validate_schedule;
use crate::beacon_resolution::BeaconService;
use crate::clock::Clock;
use crate::error::{AppError, AppResult};
use crate::session_status::{classify_all, ClassifiedSession};

pub use db::models::class_session::Model as ClassSession;

#[derive(Debug, Clone, Validate)]
pub struct CreateClassSession {
    pub course_id: i64,
    pub created_by: i64,
    #[validate(length(min = 1, message = "title cannot be empty"))]
    pub title: String,
    pub date: NaiveDate,
    pub start_time: Option<NaiveTime>,
    pub end_time: Option<NaiveTime>,
    pub location: Option<String>,
    /// Chosen by hand at creation; otherwise resolved from assignments.
    pub beacon_id: Option<String>,
    pub window_start: Option<NaiveTime>,
    pub window_end: Option<NaiveTime>,
}

/// Partial edit. `Some(None)` clears an optional field.
#[derive(Debug, Clone, Default)]
pub struct UpdateClassSession {
    pub title: Option<String>,
    pub date: Option<NaiveDate>,
    pub start_time: Option<Option<NaiveTime>>,
    pub end_time: Option<Option<NaiveTime>>,
    pub location: Option<Option<String>>,
    pub beacon_id: Option<Option<String>>,
    pub window_start: Option<Option<NaiveTime>>,
    pub window_end: Option<Option<NaiveTime>>,
}

pub struct ClassSessionService;

impl ClassSessionService {
    /// Creates a session and freezes its beacon.
    ///
    /// The returned model is the stored row, so callers never need to patch a
    /// local cache.
    pub async fn create_session<C>(
        db: &C,
        clock: &dyn Clock,
        params: CreateClassSession,
    ) -> AppResult<ClassSession>
    where
        C: ConnectionTrait,
    {
        params.validate()?;
        let now = clock.now();

        let course = course::Entity::find_by_id(params.course_id)
            .one(db)
            .await?
            .ok_or_else(|| AppError::not_found("course", params.course_id))?;
        if user::Entity::find_by_id(params.created_by)
            .one(db)
            .await?
            .is_none()
        {
            return Err(AppError::not_found("user", params.created_by));
        }

        let beacon_id = BeaconService::resolve_for(
            db,
            course.id,
            None,
            params.beacon_id.as_deref().filter(|b| !b.trim().is_empty()),
        )
        .await?;

        let draft = ClassSession {
            id: 0,
            course_id: course.id,
            course_name: Some(course.name),
            created_by: params.created_by,
            title: params.title,
            date: params.date,
            start_time: params.start_time,
            end_time: params.end_time,
            location: params.location,
            beacon_id,
            window_start: params.window_start,
            window_end: params.window_end,
            created_at: now,
            updated_at: now,
        };
        validate_schedule(&draft)?;

        let session = class_session::ActiveModel {
            course_id: Set(draft.course_id),
            course_name: Set(draft.course_name),
            created_by: Set(draft.created_by),
            title: Set(draft.title),
            date: Set(draft.date),
            start_time: Set(draft.start_time),
            end_time: Set(draft.end_time),
            location: Set(draft.location),
            beacon_id: Set(draft.beacon_id),
            window_start: Set(draft.window_start),
            window_end: Set(draft.window_end),
            created_at: Set(now),
            updated_at: Set(now),
            ..Default::default()
        }
        .insert(db)
        .await?;

        info!(
            "created session {} for course {} on {} (beacon {:?})",
            session.id, session.course_id, session.date, session.beacon_id
        );
        Ok(session)
    }

    pub async fn get_session<C>(db: &C, id: i64) -> AppResult<ClassSession>
    where
        C: ConnectionTrait,
    {
        class_session::Entity::find_by_id(id)
            .one(db)
            .await?
            .ok_or_else(|| AppError::not_found("session", id))
    }

    /// Applies a partial edit. The beacon is only changed when the patch says so.
    ///
    /// Moving the session to another day moves its attendance records with it.
    pub async fn update_session<C>(
        db: &C,
        clock: &dyn Clock,
        id: i64,
        patch: UpdateClassSession,
    ) -> AppResult<ClassSession>
    where
        C: ConnectionTrait + TransactionTrait,
    {
        let txn = db.begin().await?;
        let existing = Self::get_session(&txn, id).await?;
        let mut merged = existing.clone();

        if let Some(title) = patch.title {
            if title.trim().is_empty() {
                return Err(AppError::validation("title cannot be empty"));
            }
            merged.title = title;
        }
        if let Some(date) = patch.date {
            merged.date = date;
        }
        if let Some(start_time) = patch.start_time {
            merged.start_time = start_time;
        }
        if let Some(end_time) = patch.end_time {
            merged.end_time = end_time;
        }
        if let Some(location) = patch.location {
            merged.location = location;
        }
        if let Some(beacon_id) = patch.beacon_id {
            merged.beacon_id = beacon_id;
        }
        if let Some(window_start) = patch.window_start {
            merged.window_start = window_start;
        }
        if let Some(window_end) = patch.window_end {
            merged.window_end = window_end;
        }
        validate_schedule(&merged)?;

        if merged.date != existing.date {
            let moved =
                attendance_record::Model::set_date_for_session(&txn, id, merged.date).await?;
            info!(
                "session {id} moved from {} to {}; re-dated {moved} attendance record(s)",
                existing.date, merged.date
            );
        }

        let mut active: class_session::ActiveModel = existing.into();
        active.title = Set(merged.title);
        active.date = Set(merged.date);
        active.start_time = Set(merged.start_time);
        active.end_time = Set(merged.end_time);
        active.location = Set(merged.location);
        active.beacon_id = Set(merged.beacon_id);
        active.window_start = Set(merged.window_start);
        active.window_end = Set(merged.window_end);
        active.updated_at = Set(clock.now());
        let updated = active.update(&txn).await?;

        txn.commit().await?;
        Ok(updated)
    }

    /// Deletes a session after removing its attendance records and beacon
    /// overrides, all in one transaction.
    pub async fn delete_session<C>(db: &C, id: i64) -> AppResult<()>
    where
        C: ConnectionTrait + TransactionTrait,
    {
        let txn = db.begin().await?;

        if class_session::Entity::find_by_id(id).one(&txn).await?.is_none() {
            return Err(AppError::not_found("session", id));
        }

        let removed = attendance_record::Model::delete_for_session(&txn, id).await?;
        beacon_assignment::Entity::delete_many()
            .filter(beacon_assignment::Column::SessionId.eq(id))
            .exec(&txn)
            .await?;
        class_session::Entity::delete_by_id(id).exec(&txn).await?;

        txn.commit().await?;
        info!("deleted session {id} and {removed} attendance record(s)");
        Ok(())
    }

    /// All sessions of a course with derived status, in listing priority order.
    pub async fn list_for_course<C>(
        db: &C,
        course_id: i64,
        now: DateTime<Utc>,
    ) -> AppResult<Vec<ClassifiedSession>>
    where
        C: ConnectionTrait,
    {
        let sessions = class_session::Model::find_for_course(db, course_id).await?;
        Ok(classify_all(sessions, now))
    }
}
