use chrono::{DateTime, NaiveDate, Utc};
use sea_orm::QueryOrder;
use sea_orm::sea_query::Expr;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Outcome of a student's check-in for one session.
///
/// At most one row exists per `(student_id, session_id)`; the unique index in
/// the schema backs this up against racing inserts.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "attendance_records")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub student_id: i64,
    pub course_id: i64,
    /// Some legacy flows record by course only.
    pub session_id: Option<i64>,
    /// `None` when a lecturer marked the student without any check-in.
    pub check_in_time: Option<DateTime<Utc>>,
    pub check_out_time: Option<DateTime<Utc>>,
    pub method: CheckInMethod,
    pub status: AttendanceStatus,
    pub date: NaiveDate,
    /// Lecturer or admin who manually set the status, if any.
    pub overridden_by: Option<i64>,
}

/// How the student checked in.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    EnumIter,
    DeriveActiveEnum,
    Display,
    EnumString,
    Serialize,
    Deserialize,
)]
#[serde(rename_all = "UPPERCASE")]
#[sea_orm(rs_type = "String", db_type = "Text")]
#[strum(serialize_all = "UPPERCASE", ascii_case_insensitive)]
pub enum CheckInMethod {
    #[sea_orm(string_value = "BLE")]
    Ble,
    #[sea_orm(string_value = "QR")]
    Qr,
    #[sea_orm(string_value = "MANUAL")]
    Manual,
}

/// `Pending` strictly means "checked in outside the configured window".
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    EnumIter,
    DeriveActiveEnum,
    Display,
    EnumString,
    Serialize,
    Deserialize,
)]
#[serde(rename_all = "lowercase")]
#[sea_orm(rs_type = "String", db_type = "Text")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum AttendanceStatus {
    #[sea_orm(string_value = "verified")]
    Verified,
    #[sea_orm(string_value = "pending")]
    Pending,
    #[sea_orm(string_value = "absent")]
    Absent,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::class_session::Entity",
        from = "Column::SessionId",
        to = "super::class_session::Column::Id"
    )]
    Session,
    #[sea_orm(
        belongs_to = "super::user::Entity",
        from = "Column::StudentId",
        to = "super::user::Column::Id",
        on_delete = "Cascade"
    )]
    Student,
    #[sea_orm(
        belongs_to = "super::course::Entity",
        from = "Column::CourseId",
        to = "super::course::Column::Id",
        on_delete = "Cascade"
    )]
    Course,
}

impl Related<super::class_session::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Session.def()
    }
}

impl Related<super::user::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Student.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    pub fn is_manually_set(&self) -> bool {
        self.overridden_by.is_some()
    }

    pub async fn find_for_student_session<C>(
        db: &C,
        student_id: i64,
        session_id: i64,
    ) -> Result<Option<Self>, DbErr>
    where
        C: ConnectionTrait,
    {
        Entity::find()
            .filter(Column::StudentId.eq(student_id))
            .filter(Column::SessionId.eq(session_id))
            .one(db)
            .await
    }

    pub async fn for_session<C>(db: &C, session_id: i64) -> Result<Vec<Self>, DbErr>
    where
        C: ConnectionTrait,
    {
        Entity::find()
            .filter(Column::SessionId.eq(session_id))
            .order_by_asc(Column::Id)
            .all(db)
            .await
    }

    pub async fn for_course_on<C>(
        db: &C,
        course_id: i64,
        date: NaiveDate,
    ) -> Result<Vec<Self>, DbErr>
    where
        C: ConnectionTrait,
    {
        Entity::find()
            .filter(Column::CourseId.eq(course_id))
            .filter(Column::Date.eq(date))
            .order_by_asc(Column::Id)
            .all(db)
            .await
    }

    /// Re-dates every record tied to the session. Returns the number changed.
    pub async fn set_date_for_session<C>(
        db: &C,
        session_id: i64,
        date: NaiveDate,
    ) -> Result<u64, DbErr>
    where
        C: ConnectionTrait,
    {
        let res = Entity::update_many()
            .col_expr(Column::Date, Expr::value(date))
            .filter(Column::SessionId.eq(session_id))
            .exec(db)
            .await?;
        Ok(res.rows_affected)
    }

    /// Removes every record tied to the session. Returns the number removed.
    pub async fn delete_for_session<C>(db: &C, session_id: i64) -> Result<u64, DbErr>
    where
        C: ConnectionTrait,
    {
        let res = Entity::delete_many()
            .filter(Column::SessionId.eq(session_id))
            .exec(db)
            .await?;
        Ok(res.rows_affected)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn method_round_trips_through_display() {
        assert_eq!(CheckInMethod::Ble.to_string(), "BLE");
        assert_eq!(CheckInMethod::from_str("qr").unwrap(), CheckInMethod::Qr);
    }

    #[test]
    fn status_parses_case_insensitively() {
        assert_eq!(
            AttendanceStatus::from_str("Verified").unwrap(),
            AttendanceStatus::Verified
        );
        assert_eq!(AttendanceStatus::Absent.to_string(), "absent");
    }
}
