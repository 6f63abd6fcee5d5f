use db::models::{beacon_assignment, class_session, course};
use log::info;
use sea_orm::{ActiveModelTrait, ConnectionTrait, EntityTrait, Set};

use crate::error::{AppError, AppResult};

pub use db::models::beacon_assignment::Model as BeaconAssignment;

/// Picks the beacon that authorizes BLE check-in for a course/session.
///
/// Priority: explicit choice, then the first session-level override, then the
/// first course-level default. Assignments are scanned in slice order.
pub fn resolve_beacon(
    assignments: &[BeaconAssignment],
    course_id: i64,
    session_id: Option<i64>,
    explicit_beacon_id: Option<&str>,
) -> Option<String> {
    if let Some(explicit) = explicit_beacon_id {
        return Some(explicit.to_owned());
    }

    if let Some(session_id) = session_id {
        let hit = assignments
            .iter()
            .find(|a| a.course_id == course_id && a.session_id == Some(session_id));
        if let Some(hit) = hit {
            return Some(hit.beacon_id.clone());
        }
    }

    assignments
        .iter()
        .find(|a| a.course_id == course_id && a.is_course_default())
        .map(|a| a.beacon_id.clone())
}

pub struct BeaconService;

impl BeaconService {
    pub async fn resolve_for<C>(
        db: &C,
        course_id: i64,
        session_id: Option<i64>,
        explicit_beacon_id: Option<&str>,
    ) -> AppResult<Option<String>>
    where
        C: ConnectionTrait,
    {
        if explicit_beacon_id.is_some() {
            return Ok(resolve_beacon(&[], course_id, session_id, explicit_beacon_id));
        }
        let assignments = beacon_assignment::Model::for_course(db, course_id).await?;
        Ok(resolve_beacon(&assignments, course_id, session_id, None))
    }

    /// Binds a beacon to a course, or to one of its sessions.
    ///
    /// A session-level assignment re-freezes that session's beacon immediately.
    /// Course-level defaults only affect sessions created afterwards.
    pub async fn assign<C>(
        db: &C,
        beacon_id: &str,
        course_id: i64,
        session_id: Option<i64>,
    ) -> AppResult<BeaconAssignment>
    where
        C: ConnectionTrait,
    {
        let beacon_id = beacon_id.trim();
        if beacon_id.is_empty() {
            return Err(AppError::validation("beacon id cannot be empty"));
        }
        if course::Entity::find_by_id(course_id).one(db).await?.is_none() {
            return Err(AppError::not_found("course", course_id));
        }

        let session = match session_id {
            Some(id) => {
                let session = class_session::Entity::find_by_id(id)
                    .one(db)
                    .await?
                    .ok_or_else(|| AppError::not_found("session", id))?;
                if session.course_id != course_id {
                    return Err(AppError::validation(format!(
                        "session {id} does not belong to course {course_id}"
                    )));
                }
                Some(session)
            }
            None => None,
        };

        let assignment = beacon_assignment::Model::create(db, beacon_id, course_id, session_id).await?;

        if let Some(session) = session {
            let assignments = beacon_assignment::Model::for_course(db, course_id).await?;
            let resolved = resolve_beacon(&assignments, course_id, Some(session.id), None);
            let mut active: class_session::ActiveModel = session.into();
            active.beacon_id = Set(resolved);
            active.update(db).await?;
        }

        info!(
            "beacon {} assigned to course {} (session {:?})",
            assignment.beacon_id, course_id, session_id
        );
        Ok(assignment)
    }

    pub async fn unassign<C>(db: &C, assignment_id: i64) -> AppResult<()>
    where
        C: ConnectionTrait,
    {
        let res = beacon_assignment::Entity::delete_by_id(assignment_id)
            .exec(db)
            .await?;
        if res.rows_affected == 0 {
            return Err(AppError::not_found("beacon assignment", assignment_id));
        }
        Ok(())
    }

    pub async fn list_for_course<C>(db: &C, course_id: i64) -> AppResult<Vec<BeaconAssignment>>
    where
        C: ConnectionTrait,
    {
        Ok(beacon_assignment::Model::for_course(db, course_id).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_fixtures::{at, day, hm, seed};
    use db::test_utils::setup_test_db;

    fn row(id: i64, beacon: &str, course: i64, session: Option<i64>) -> BeaconAssignment {
        BeaconAssignment {
            id,
            beacon_id: beacon.into(),
            course_id: course,
            session_id: session,
            created_at: at(8, 0),
        }
    }

    #[test]
    fn override_beats_default() {
        let rows = vec![row(1, "B1", 1, None), row(2, "B2", 1, Some(5))];
        assert_eq!(resolve_beacon(&rows, 1, Some(5), None), Some("B2".into()));
        assert_eq!(resolve_beacon(&rows, 1, Some(6), None), Some("B1".into()));
        assert_eq!(resolve_beacon(&rows, 2, Some(5), None), None);
    }

    #[test]
    fn priority_peels_off_layer_by_layer() {
        let all = vec![row(1, "DEFAULT", 1, None), row(2, "OVERRIDE", 1, Some(5))];
        assert_eq!(
            resolve_beacon(&all, 1, Some(5), Some("EXPLICIT")),
            Some("EXPLICIT".into())
        );
        assert_eq!(resolve_beacon(&all, 1, Some(5), None), Some("OVERRIDE".into()));
        assert_eq!(
            resolve_beacon(&all[..1], 1, Some(5), None),
            Some("DEFAULT".into())
        );
        assert_eq!(resolve_beacon(&[], 1, Some(5), None), None);
    }

    #[test]
    fn first_match_wins_among_duplicates() {
        let rows = vec![
            row(1, "B1", 1, Some(5)),
            row(2, "B9", 1, Some(5)),
            row(3, "D1", 1, None),
            row(4, "D9", 1, None),
        ];
        assert_eq!(resolve_beacon(&rows, 1, Some(5), None), Some("B1".into()));
        assert_eq!(resolve_beacon(&rows, 1, None, None), Some("D1".into()));
    }

    #[tokio::test]
    async fn session_assignment_refreezes_that_session_only() {
        let db = setup_test_db().await;
        let seeded = seed(&db).await;

        BeaconService::assign(&db, "B1", seeded.course.id, None)
            .await
            .unwrap();

        let now = at(8, 0);
        let make = |title: &str| class_session::ActiveModel {
            course_id: Set(seeded.course.id),
            course_name: Set(Some(seeded.course.name.clone())),
            created_by: Set(seeded.lecturer.id),
            title: Set(title.to_owned()),
            date: Set(day()),
            start_time: Set(Some(hm("09:00"))),
            end_time: Set(Some(hm("10:00"))),
            location: Set(None),
            beacon_id: Set(Some("B1".into())),
            window_start: Set(None),
            window_end: Set(None),
            created_at: Set(now),
            updated_at: Set(now),
            ..Default::default()
        };
        let s5 = make("S5").insert(&db).await.unwrap();
        let s6 = make("S6").insert(&db).await.unwrap();

        BeaconService::assign(&db, "B2", seeded.course.id, Some(s5.id))
            .await
            .unwrap();

        let s5 = class_session::Entity::find_by_id(s5.id).one(&db).await.unwrap().unwrap();
        let s6 = class_session::Entity::find_by_id(s6.id).one(&db).await.unwrap().unwrap();
        assert_eq!(s5.beacon_id.as_deref(), Some("B2"));
        assert_eq!(s6.beacon_id.as_deref(), Some("B1"));

        let resolved = BeaconService::resolve_for(&db, seeded.course.id, Some(s6.id), None)
            .await
            .unwrap();
        assert_eq!(resolved.as_deref(), Some("B1"));
    }

    #[tokio::test]
    async fn assign_validates_inputs() {
        let db = setup_test_db().await;
        let seeded = seed(&db).await;

        let err = BeaconService::assign(&db, "  ", seeded.course.id, None)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));

        let err = BeaconService::assign(&db, "B1", seeded.course.id, Some(404))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound { entity: "session", .. }));

        let err = BeaconService::unassign(&db, 404).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound { .. }));
    }
}
