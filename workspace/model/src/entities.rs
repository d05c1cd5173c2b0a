//! Root of the SeaORM entity modules for the learning-management service.
//! Users teach courses, join them through memberships, read their contents,
//! comment on them and record completions.

pub mod comment;
pub mod completion;
pub mod course;
pub mod course_content;
pub mod course_member;
pub mod user;

pub mod prelude {
    //! A prelude module for easy importing of all entities.
    pub use super::comment::Entity as Comment;
    pub use super::completion::Entity as Completion;
    pub use super::course::Entity as Course;
    pub use super::course_content::Entity as CourseContent;
    pub use super::course_member::Entity as CourseMember;
    pub use super::user::Entity as User;
}
