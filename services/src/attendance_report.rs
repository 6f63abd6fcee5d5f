use chrono::NaiveDate;
use db::models::attendance_record::{self, AttendanceStatus};
use sea_orm::ConnectionTrait;
use serde::Serialize;

use crate::error::AppResult;

/// Reporting rollup. `verified` counts as present and `pending` as late; every
/// other row, and every expected student without a row, counts as absent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct AttendanceSummary {
    pub present: u64,
    pub late: u64,
    pub absent: u64,
    pub total: u64,
    /// Whole percent of `total` that was present.
    pub rate: u32,
}

/// `present / total * 100` rounded to the nearest integer; 0 when `total` is 0.
pub fn attendance_rate(present: u64, total: u64) -> u32 {
    if total == 0 {
        return 0;
    }
    ((present as f64 / total as f64) * 100.0).round() as u32
}

impl AttendanceSummary {
    /// `expected` is the roster size; missing rows are absences. The total is
    /// never smaller than the number of rows seen.
    pub fn from_statuses<I>(statuses: I, expected: u64) -> Self
    where
        I: IntoIterator<Item = AttendanceStatus>,
    {
        let (mut present, mut late, mut rows) = (0u64, 0u64, 0u64);
        for status in statuses {
            rows += 1;
            match status {
                AttendanceStatus::Verified => present += 1,
                AttendanceStatus::Pending => late += 1,
                AttendanceStatus::Absent => {}
            }
        }
        let total = expected.max(rows);
        Self {
            present,
            late,
            absent: total - present - late,
            total,
            rate: attendance_rate(present, total),
        }
    }
}

pub struct AttendanceReportService;

impl AttendanceReportService {
    pub async fn session_summary<C>(
        db: &C,
        session_id: i64,
        expected: u64,
    ) -> AppResult<AttendanceSummary>
    where
        C: ConnectionTrait,
    {
        let records = attendance_record::Model::for_session(db, session_id).await?;
        Ok(AttendanceSummary::from_statuses(
            records.iter().map(|r| r.status),
            expected,
        ))
    }

    /// One course on one calendar day, across all of that day's sessions.
    pub async fn course_day_summary<C>(
        db: &C,
        course_id: i64,
        date: NaiveDate,
        expected: u64,
    ) -> AppResult<AttendanceSummary>
    where
        C: ConnectionTrait,
    {
        let records = attendance_record::Model::for_course_on(db, course_id, date).await?;
        Ok(AttendanceSummary::from_statuses(
            records.iter().map(|r| r.status),
            expected,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attendance::{AttendanceService, CheckInMethod};
    use crate::class_session::{ClassSessionService, CreateClassSession};
    use crate::clock::FixedClock;
    use crate::test_fixtures::{at, day, hm, seed};
    use db::models::user;
    use db::test_utils::setup_test_db;

    #[test]
    fn empty_total_has_zero_rate() {
        assert_eq!(attendance_rate(0, 0), 0);
        let summary = AttendanceSummary::from_statuses(Vec::new(), 0);
        assert_eq!(summary, AttendanceSummary::default());
    }

    #[test]
    fn rate_rounds_to_nearest() {
        assert_eq!(attendance_rate(1, 3), 33);
        assert_eq!(attendance_rate(2, 3), 67);
        assert_eq!(attendance_rate(1, 8), 13);
        assert_eq!(attendance_rate(5, 5), 100);
    }

    #[test]
    fn missing_students_count_as_absent() {
        use AttendanceStatus::*;
        let summary = AttendanceSummary::from_statuses([Verified, Verified, Pending, Absent], 6);
        assert_eq!(summary.present, 2);
        assert_eq!(summary.late, 1);
        assert_eq!(summary.absent, 3);
        assert_eq!(summary.total, 6);
        assert_eq!(summary.rate, 33);
    }

    #[test]
    fn rows_beyond_roster_still_count() {
        use AttendanceStatus::*;
        let summary = AttendanceSummary::from_statuses([Verified, Verified, Verified], 2);
        assert_eq!(summary.total, 3);
        assert_eq!(summary.rate, 100);
    }

    #[tokio::test]
    async fn summarizes_a_session_from_the_store() {
        let db = setup_test_db().await;
        let seeded = seed(&db).await;
        let clock = FixedClock::new(at(8, 0));
        let session = ClassSessionService::create_session(
            &db,
            &clock,
            CreateClassSession {
                course_id: seeded.course.id,
                created_by: seeded.lecturer.id,
                title: "Tutorial".into(),
                date: day(),
                start_time: Some(hm("09:00")),
                end_time: Some(hm("10:00")),
                location: None,
                beacon_id: None,
                window_start: None,
                window_end: None,
            },
        )
        .await
        .unwrap();
        let late_student = user::Model::create(&db, "u21000002", "Sipho K").await.unwrap();

        AttendanceService::submit_check_in(&db, seeded.student.id, session.id, CheckInMethod::Qr, at(9, 5))
            .await
            .unwrap();
        AttendanceService::submit_check_in(&db, late_student.id, session.id, CheckInMethod::Qr, at(10, 20))
            .await
            .unwrap();

        let summary = AttendanceReportService::session_summary(&db, session.id, 4)
            .await
            .unwrap();
        assert_eq!(
            summary,
            AttendanceSummary {
                present: 1,
                late: 1,
                absent: 2,
                total: 4,
                rate: 25,
            }
        );

        let daily = AttendanceReportService::course_day_summary(&db, seeded.course.id, day(), 0)
            .await
            .unwrap();
        assert_eq!(daily.total, 2);
        assert_eq!(daily.rate, 50);
    }
}
