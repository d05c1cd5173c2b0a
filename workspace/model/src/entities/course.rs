use super::{comment, course_content, course_member};
use chrono::NaiveDateTime;
use common::format_rupiah;
use sea_orm::entity::prelude::*;
use sea_orm::{ConnectionTrait, JoinType, QuerySelect};
use std::fmt;

/// A purchasable course owned by a single teacher.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "courses")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    /// The teaching user. Deleting a user is refused while they still teach a course.
    pub teacher_id: i32,
    pub name: String,
    #[sea_orm(column_type = "Text", default_value = "-")]
    pub description: String,
    /// Price in whole Rupiah.
    #[sea_orm(default_value = 10000)]
    pub price: i64,
    /// Relative path or URL of the cover image.
    pub image: Option<String>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::user::Entity",
        from = "Column::TeacherId",
        to = "super::user::Column::Id"
    )]
    Teacher,
    #[sea_orm(has_many = "super::course_member::Entity")]
    CourseMember,
    #[sea_orm(has_many = "super::course_content::Entity")]
    CourseContent,
}

impl Related<super::user::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Teacher.def()
    }
}

impl Related<super::course_member::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::CourseMember.def()
    }
}

impl Related<super::course_content::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::CourseContent.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl fmt::Display for Model {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} : {}", self.name, format_rupiah(self.price))
    }
}

impl Model {
    /// Number of members enrolled with the student role.
    pub async fn student_count<C: ConnectionTrait>(&self, db: &C) -> Result<u64, DbErr> {
        course_member::Entity::find()
            .filter(course_member::Column::CourseId.eq(self.id))
            .filter(course_member::Column::Roles.eq(course_member::MemberRole::Student))
            .count(db)
            .await
    }

    pub async fn content_count<C: ConnectionTrait>(&self, db: &C) -> Result<u64, DbErr> {
        course_content::Entity::find()
            .filter(course_content::Column::CourseId.eq(self.id))
            .count(db)
            .await
    }

    /// Number of comments across every content item of this course.
    pub async fn comment_count<C: ConnectionTrait>(&self, db: &C) -> Result<u64, DbErr> {
        comment::Entity::find()
            .join(JoinType::InnerJoin, comment::Relation::CourseContent.def())
            .filter(course_content::Column::CourseId.eq(self.id))
            .count(db)
            .await
    }
}
