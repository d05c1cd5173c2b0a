use chrono::NaiveDateTime;
use sea_orm::entity::prelude::*;

/// A comment on a content item, attributed to a course membership rather than a bare user.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "comments")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub content_id: i32,
    pub member_id: i32,
    #[sea_orm(column_type = "Text")]
    pub comment: String,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::course_content::Entity",
        from = "Column::ContentId",
        to = "super::course_content::Column::Id"
    )]
    CourseContent,
    #[sea_orm(
        belongs_to = "super::course_member::Entity",
        from = "Column::MemberId",
        to = "super::course_member::Column::Id"
    )]
    CourseMember,
}

impl Related<super::course_content::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::CourseContent.def()
    }
}

impl Related<super::course_member::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::CourseMember.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
