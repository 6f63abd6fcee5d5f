use chrono::{DateTime, Utc};
use sea_orm::ActiveValue::Set;
use sea_orm::QueryOrder;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Binds a physical beacon to a course, optionally narrowed to one session.
///
/// A row without `session_id` is the course-level default; a row with one is a
/// session-level override.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "beacon_assignments")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub beacon_id: String,
    pub course_id: i64,
    pub session_id: Option<i64>,
    pub created_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::course::Entity",
        from = "Column::CourseId",
        to = "super::course::Column::Id",
        on_delete = "Cascade"
    )]
    Course,
    #[sea_orm(
        belongs_to = "super::class_session::Entity",
        from = "Column::SessionId",
        to = "super::class_session::Column::Id",
        on_delete = "Cascade"
    )]
    Session,
}

impl Related<super::course::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Course.def()
    }
}

impl Related<super::class_session::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Session.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    pub fn is_course_default(&self) -> bool {
        self.session_id.is_none()
    }

    pub async fn create<C>(
        db: &C,
        beacon_id: &str,
        course_id: i64,
        session_id: Option<i64>,
    ) -> Result<Self, DbErr>
    where
        C: ConnectionTrait,
    {
        ActiveModel {
            beacon_id: Set(beacon_id.to_owned()),
            course_id: Set(course_id),
            session_id: Set(session_id),
            created_at: Set(Utc::now()),
            ..Default::default()
        }
        .insert(db)
        .await
    }

    /// All assignments for a course in insertion order.
    pub async fn for_course<C>(db: &C, course_id: i64) -> Result<Vec<Self>, DbErr>
    where
        C: ConnectionTrait,
    {
        Entity::find()
            .filter(Column::CourseId.eq(course_id))
            .order_by_asc(Column::Id)
            .all(db)
            .await
    }
}
