use chrono::NaiveDateTime;
use sea_orm::entity::prelude::*;

/// An account that can sign in. Staff and superusers manage users and courses.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "users")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    #[sea_orm(unique)]
    pub username: String,
    /// Salted hash in the form `pbkdf2_sha256$<iterations>$<salt>$<digest>`.
    pub password_hash: String,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    #[sea_orm(default_value = "false")]
    pub is_staff: bool,
    #[sea_orm(default_value = "false")]
    pub is_superuser: bool,
    #[sea_orm(default_value = "true")]
    pub is_active: bool,
    pub date_joined: NaiveDateTime,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// Courses taught by this user.
    #[sea_orm(has_many = "super::course::Entity")]
    Course,
    #[sea_orm(has_many = "super::course_member::Entity")]
    CourseMember,
}

impl Related<super::course::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Course.def()
    }
}

impl Related<super::course_member::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::CourseMember.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    /// Staff and superusers may administer users and courses.
    pub fn is_staff_or_superuser(&self) -> bool {
        self.is_staff || self.is_superuser
    }

    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name).trim().to_string()
    }
}
