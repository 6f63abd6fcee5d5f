use chrono::{DateTime, Duration, Utc};
use rand::distributions::Alphanumeric;
use rand::{Rng, thread_rng};
use sea_orm::ActiveValue::Set;
use sea_orm::QueryOrder;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

pub const CODE_LENGTH: usize = 32;

/// A short-lived QR check-in token scoped to one course.
///
/// Tokens are never deleted; expiry is a pure comparison of `expires_at`
/// against the caller's clock.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "check_in_tokens")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub course_id: i64,
    /// Denormalized for display.
    pub course_name: String,
    /// QR payload.
    pub code: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
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
}

impl Related<super::course::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Course.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    pub fn generate_code() -> String {
        thread_rng()
            .sample_iter(&Alphanumeric)
            .take(CODE_LENGTH)
            .map(char::from)
            .collect()
    }

    pub async fn create<C>(
        db: &C,
        course_id: i64,
        course_name: &str,
        issued_at: DateTime<Utc>,
        duration_minutes: i64,
    ) -> Result<Self, DbErr>
    where
        C: ConnectionTrait,
    {
        ActiveModel {
            course_id: Set(course_id),
            course_name: Set(course_name.to_owned()),
            code: Set(Self::generate_code()),
            created_at: Set(issued_at),
            expires_at: Set(issued_at + Duration::minutes(duration_minutes)),
            ..Default::default()
        }
        .insert(db)
        .await
    }

    pub async fn find_by_code<C>(db: &C, code: &str) -> Result<Option<Self>, DbErr>
    where
        C: ConnectionTrait,
    {
        Entity::find().filter(Column::Code.eq(code)).one(db).await
    }

    /// Newest token for the course still live at `now`.
    pub async fn latest_live<C>(
        db: &C,
        course_id: i64,
        now: DateTime<Utc>,
    ) -> Result<Option<Self>, DbErr>
    where
        C: ConnectionTrait,
    {
        Entity::find()
            .filter(Column::CourseId.eq(course_id))
            .filter(Column::ExpiresAt.gt(now))
            .order_by_desc(Column::CreatedAt)
            .order_by_desc(Column::Id)
            .one(db)
            .await
    }

    /// Every token ever issued for the course, newest first.
    pub async fn all_for_course<C>(db: &C, course_id: i64) -> Result<Vec<Self>, DbErr>
    where
        C: ConnectionTrait,
    {
        Entity::find()
            .filter(Column::CourseId.eq(course_id))
            .order_by_desc(Column::CreatedAt)
            .order_by_desc(Column::Id)
            .all(db)
            .await
    }
}
