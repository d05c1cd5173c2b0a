use chrono::NaiveDateTime;
use sea_orm::entity::prelude::*;

/// Role a user holds inside a course.
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(3))")]
pub enum MemberRole {
    #[sea_orm(string_value = "std")]
    Student,
    #[sea_orm(string_value = "ast")]
    Assistant,
}

impl MemberRole {
    /// The short code stored in the database and returned by the API.
    pub fn code(&self) -> &'static str {
        match self {
            MemberRole::Student => "std",
            MemberRole::Assistant => "ast",
        }
    }

    pub fn from_code(code: &str) -> Option<Self> {
        match code {
            "std" => Some(MemberRole::Student),
            "ast" => Some(MemberRole::Assistant),
            _ => None,
        }
    }
}

/// Enrollment of a user in a course.
/// At most one row exists per (user, course); the enrollment operation enforces it.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "course_members")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub course_id: i32,
    pub user_id: i32,
    pub roles: MemberRole,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
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
        from = "Column::UserId",
        to = "super::user::Column::Id"
    )]
    User,
    #[sea_orm(has_many = "super::comment::Entity")]
    Comment,
    #[sea_orm(has_many = "super::completion::Entity")]
    Completion,
}

impl Related<super::course::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Course.def()
    }
}

impl Related<super::user::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::User.def()
    }
}

impl Related<super::comment::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Comment.def()
    }
}

impl Related<super::completion::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Completion.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
