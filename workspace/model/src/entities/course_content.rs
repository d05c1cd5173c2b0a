use chrono::NaiveDateTime;
use sea_orm::entity::prelude::*;
use sea_orm::ConnectionTrait;

/// A piece of material inside a course.
/// Contents can be grouped under a parent content of the same course.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "course_contents")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub name: String,
    #[sea_orm(column_type = "Text", default_value = "-")]
    pub description: String,
    pub video_url: Option<String>,
    /// Relative path of an uploaded attachment.
    pub file_attachment: Option<String>,
    pub course_id: i32,
    /// Self-referencing foreign key for grouping.
    pub parent_id: Option<i32>,
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
    #[sea_orm(belongs_to = "Entity", from = "Column::ParentId", to = "Column::Id")]
    Parent,
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

impl Model {
    /// Human readable label, e.g. `"Pengenalan Django (Pemrograman Django)"`.
    pub fn label(&self, course: &super::course::Model) -> String {
        format!("{} ({})", self.name, course.name)
    }

    /// Walks up the parent chain and returns the ancestors, nearest first.
    pub async fn ancestors<C: ConnectionTrait>(&self, db: &C) -> Result<Vec<Model>, DbErr> {
        let mut ancestors = Vec::new();
        let mut current = self.parent_id;

        while let Some(parent_id) = current {
            // A cycle can only come from hand-edited rows; stop instead of looping.
            if parent_id == self.id || ancestors.iter().any(|a: &Model| a.id == parent_id) {
                break;
            }
            match Entity::find_by_id(parent_id).one(db).await? {
                Some(parent) => {
                    current = parent.parent_id;
                    ancestors.push(parent);
                }
                None => break,
            }
        }

        Ok(ancestors)
    }
}
