use chrono::{DateTime, NaiveDate, NaiveTime, TimeZone, Utc};
use db::models::{class_session, course, user};
use sea_orm::DatabaseConnection;

pub struct Seeded {
    pub lecturer: user::Model,
    pub student: user::Model,
    pub course: course::Model,
}

pub async fn seed(db: &DatabaseConnection) -> Seeded {
    let lecturer = user::Model::create(db, "lect01", "Dr. Naidoo").await.unwrap();
    let student = user::Model::create(db, "u21000001", "Thandi M").await.unwrap();
    let course = course::Model::create(db, "COS212", "Algorithms", lecturer.id)
        .await
        .unwrap();
    Seeded {
        lecturer,
        student,
        course,
    }
}

pub fn day() -> NaiveDate {
    NaiveDate::from_ymd_opt(2026, 3, 2).unwrap()
}

pub fn hm(s: &str) -> NaiveTime {
    NaiveTime::parse_from_str(s, "%H:%M").unwrap()
}

/// Instant on the fixture day.
pub fn at(h: u32, m: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 2, h, m, 0).unwrap()
}

/// In-memory session without touching the store.
pub fn session(start: Option<&str>, end: Option<&str>) -> class_session::Model {
    class_session::Model {
        id: 1,
        course_id: 1,
        course_name: Some("Algorithms".into()),
        created_by: 1,
        title: "Lecture".into(),
        date: day(),
        start_time: start.map(hm),
        end_time: end.map(hm),
        location: None,
        beacon_id: None,
        window_start: None,
        window_end: None,
        created_at: at(8, 0),
        updated_at: at(8, 0),
    }
}
