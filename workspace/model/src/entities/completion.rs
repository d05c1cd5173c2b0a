use chrono::NaiveDateTime;
use sea_orm::entity::prelude::*;

/// Marks that a member finished a content item.
/// Unique per (member, content); see the `idx_completions_member_content` index.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "completions")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub member_id: i32,
    pub content_id: i32,
    pub last_update: NaiveDateTime,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::course_member::Entity",
        from = "Column::MemberId",
        to = "super::course_member::Column::Id"
    )]
    CourseMember,
    #[sea_orm(
        belongs_to = "super::course_content::Entity",
        from = "Column::ContentId",
        to = "super::course_content::Column::Id"
    )]
    CourseContent,
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
