use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use sea_orm::entity::prelude::*;
use sea_orm::QueryOrder;
use serde::{Deserialize, Serialize};

/// A scheduled occurrence of a course.
///
/// Status (upcoming / ongoing / completed) is never stored; it is derived from
/// `date`, `start_time` and `end_time` against the caller's clock. Times of day
/// are interpreted in UTC.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "class_sessions")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub course_id: i64,
    /// Display only. Lookups always go through `course_id`.
    pub course_name: Option<String>,
    pub created_by: i64,
    pub title: String,
    pub date: NaiveDate,
    pub start_time: Option<NaiveTime>,
    pub end_time: Option<NaiveTime>,
    pub location: Option<String>,
    /// Beacon frozen onto the session when it was created.
    pub beacon_id: Option<String>,
    pub window_start: Option<NaiveTime>,
    pub window_end: Option<NaiveTime>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::course::Entity",
        from = "Column::CourseId",
        to = "super::course::Column::Id"
    )]
    Course,
    #[sea_orm(
        belongs_to = "super::user::Entity",
        from = "Column::CreatedBy",
        to = "super::user::Column::Id"
    )]
    Creator,
    #[sea_orm(has_many = "super::attendance_record::Entity")]
    Records,
    #[sea_orm(has_many = "super::beacon_assignment::Entity")]
    BeaconAssignments,
}

impl Related<super::course::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Course.def()
    }
}

impl Related<super::attendance_record::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Records.def()
    }
}

impl Related<super::beacon_assignment::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::BeaconAssignments.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    /// Absolute instant of a time of day on this session's calendar date.
    pub fn at(&self, time: NaiveTime) -> DateTime<Utc> {
        self.date.and_time(time).and_utc()
    }

    pub fn starts_at(&self) -> Option<DateTime<Utc>> {
        self.start_time.map(|t| self.at(t))
    }

    pub fn ends_at(&self) -> Option<DateTime<Utc>> {
        self.end_time.map(|t| self.at(t))
    }

    pub async fn find_for_course<C>(db: &C, course_id: i64) -> Result<Vec<Self>, DbErr>
    where
        C: ConnectionTrait,
    {
        Entity::find()
            .filter(Column::CourseId.eq(course_id))
            .order_by_asc(Column::Date)
            .order_by_asc(Column::StartTime)
            .order_by_asc(Column::Id)
            .all(db)
            .await
    }
}
