//! Course contents and the access rules around them.
//!
//! Reading a course's contents requires a membership in the course or a staff
//! account. Changing them is reserved to the course teacher and superusers.

use chrono::Utc;
use model::entities::{comment, completion, course, course_content, course_member, user};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder, Set, TransactionTrait,
};
use tracing::{debug, info, instrument, warn};

use crate::courses::get_course;
use crate::enrollment::find_membership;
use crate::error::{Result, ServiceError};

const MAX_NAME_LEN: usize = 200;

/// Data for a new content item.
#[derive(Debug, Clone, Default)]
pub struct ContentInput {
    pub name: String,
    pub description: Option<String>,
    pub video_url: Option<String>,
    pub file_attachment: Option<String>,
    pub parent_id: Option<i32>,
}

/// Partial update of a content item. The double options distinguish
/// "leave as is" from "clear".
#[derive(Debug, Clone, Default)]
pub struct ContentChanges {
    pub name: Option<String>,
    pub description: Option<String>,
    pub video_url: Option<Option<String>>,
    pub file_attachment: Option<Option<String>>,
    pub parent_id: Option<Option<i32>>,
}

/// Result of a successful access check on a course.
#[derive(Debug, Clone)]
pub struct CourseAccess {
    pub course: course::Model,
    /// The caller's membership, `None` for staff reading a course they are not in.
    pub membership: Option<course_member::Model>,
}

/// Lets members of the course and staff through; everyone else gets `Forbidden`.
#[instrument(skip(db, viewer), fields(viewer_id = viewer.id))]
pub async fn check_access<C: ConnectionTrait>(
    db: &C,
    viewer: &user::Model,
    course_id: i32,
) -> Result<CourseAccess> {
    let course = get_course(db, course_id).await?;
    let membership = find_membership(db, course.id, viewer.id).await?;

    if membership.is_none() && !viewer.is_staff_or_superuser() {
        warn!("User {} is not a member of course {}", viewer.id, course.id);
        return Err(ServiceError::Forbidden(format!(
            "You are not enrolled in course '{}'",
            course.name
        )));
    }

    Ok(CourseAccess { course, membership })
}

/// Only the course teacher and superusers may change its contents.
pub fn can_manage(actor: &user::Model, course: &course::Model) -> bool {
    actor.is_superuser || course.teacher_id == actor.id
}

/// Loads the course and refuses callers that cannot manage it.
pub async fn managed_course<C: ConnectionTrait>(
    db: &C,
    actor: &user::Model,
    course_id: i32,
) -> Result<course::Model> {
    let course = get_course(db, course_id).await?;
    if !can_manage(actor, &course) {
        warn!("User {} may not manage course {}", actor.id, course.id);
        return Err(ServiceError::Forbidden(
            "Only the course teacher or a superuser can manage its contents".to_string(),
        ));
    }
    Ok(course)
}

pub async fn list_all<C: ConnectionTrait>(db: &C) -> Result<Vec<course_content::Model>> {
    Ok(course_content::Entity::find()
        .order_by_asc(course_content::Column::Id)
        .all(db)
        .await?)
}

pub async fn list_for_course<C: ConnectionTrait>(
    db: &C,
    course_id: i32,
) -> Result<Vec<course_content::Model>> {
    Ok(course_content::Entity::find()
        .filter(course_content::Column::CourseId.eq(course_id))
        .order_by_asc(course_content::Column::Id)
        .all(db)
        .await?)
}

/// Members of the course whose accounts are neither staff nor superuser.
pub async fn students_of<C: ConnectionTrait>(
    db: &C,
    course_id: i32,
) -> Result<Vec<(course_member::Model, user::Model)>> {
    let rows = course_member::Entity::find()
        .filter(course_member::Column::CourseId.eq(course_id))
        .find_also_related(user::Entity)
        .filter(user::Column::IsStaff.eq(false))
        .filter(user::Column::IsSuperuser.eq(false))
        .order_by_asc(course_member::Column::Id)
        .all(db)
        .await?;

    Ok(rows
        .into_iter()
        .filter_map(|(member, user)| user.map(|u| (member, u)))
        .collect())
}

pub async fn get_content<C: ConnectionTrait>(db: &C, content_id: i32) -> Result<course_content::Model> {
    course_content::Entity::find_by_id(content_id)
        .one(db)
        .await?
        .ok_or_else(|| ServiceError::not_found("Content", content_id))
}

/// A content item that must belong to `course_id`; content of another course is not found.
pub async fn get_in_course<C: ConnectionTrait>(
    db: &C,
    course_id: i32,
    content_id: i32,
) -> Result<course_content::Model> {
    match get_content(db, content_id).await {
        Ok(content) if content.course_id == course_id => Ok(content),
        Ok(_) => {
            debug!("Content {} is not part of course {}", content_id, course_id);
            Err(ServiceError::not_found("Content", content_id))
        }
        Err(e) => Err(e),
    }
}

fn validate_name(name: &str) -> Result<String> {
    let name = name.trim();
    if name.is_empty() {
        return Err(ServiceError::Validation("Content name must not be empty".to_string()));
    }
    if name.chars().count() > MAX_NAME_LEN {
        return Err(ServiceError::Validation(format!(
            "Content name must be at most {} characters",
            MAX_NAME_LEN
        )));
    }
    Ok(name.to_string())
}

/// Checks that `parent_id` exists in the same course and, when `child_id` is
/// given, that linking would not create a cycle.
async fn validate_parent<C: ConnectionTrait>(
    db: &C,
    course_id: i32,
    parent_id: i32,
    child_id: Option<i32>,
) -> Result<()> {
    let parent = match course_content::Entity::find_by_id(parent_id).one(db).await? {
        Some(parent) if parent.course_id == course_id => parent,
        _ => {
            return Err(ServiceError::Validation(format!(
                "Parent content {} does not exist in this course",
                parent_id
            )));
        }
    };

    if let Some(child_id) = child_id {
        let ancestors = parent.ancestors(db).await?;
        if parent.id == child_id || ancestors.iter().any(|a| a.id == child_id) {
            return Err(ServiceError::Validation(
                "A content item cannot be nested under itself".to_string(),
            ));
        }
    }
    Ok(())
}

#[instrument(skip(db, course, input), fields(course_id = course.id))]
pub async fn create_content<C: ConnectionTrait>(
    db: &C,
    course: &course::Model,
    input: ContentInput,
) -> Result<course_content::Model> {
    let name = validate_name(&input.name)?;
    if let Some(parent_id) = input.parent_id {
        validate_parent(db, course.id, parent_id, None).await?;
    }

    let now = Utc::now().naive_utc();
    let created = course_content::ActiveModel {
        name: Set(name),
        description: Set(input.description.unwrap_or_else(|| "-".to_string())),
        video_url: Set(input.video_url.filter(|v| !v.trim().is_empty())),
        file_attachment: Set(input.file_attachment),
        course_id: Set(course.id),
        parent_id: Set(input.parent_id),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    }
    .insert(db)
    .await?;

    info!("Created content {} in course {}", created.id, course.id);
    Ok(created)
}

#[instrument(skip(db, changes))]
pub async fn update_content<C: ConnectionTrait>(
    db: &C,
    course_id: i32,
    content_id: i32,
    changes: ContentChanges,
) -> Result<course_content::Model> {
    let existing = get_in_course(db, course_id, content_id).await?;

    if let Some(Some(parent_id)) = changes.parent_id {
        validate_parent(db, course_id, parent_id, Some(existing.id)).await?;
    }

    let mut active: course_content::ActiveModel = existing.into();
    if let Some(name) = changes.name {
        active.name = Set(validate_name(&name)?);
    }
    if let Some(description) = changes.description {
        active.description = Set(description);
    }
    if let Some(video_url) = changes.video_url {
        active.video_url = Set(video_url.filter(|v| !v.trim().is_empty()));
    }
    if let Some(file_attachment) = changes.file_attachment {
        active.file_attachment = Set(file_attachment);
    }
    if let Some(parent_id) = changes.parent_id {
        active.parent_id = Set(parent_id);
    }
    active.updated_at = Set(Utc::now().naive_utc());

    let updated = active.update(db).await?;
    info!("Updated content {}", updated.id);
    Ok(updated)
}

/// Deletes a content item with its comments and completions. Refused while
/// other contents are nested under it.
#[instrument(skip(db))]
pub async fn delete_content<C>(db: &C, course_id: i32, content_id: i32) -> Result<course_content::Model>
where
    C: ConnectionTrait + TransactionTrait,
{
    let txn = db.begin().await?;
    let existing = get_in_course(&txn, course_id, content_id).await?;

    let children = course_content::Entity::find()
        .filter(course_content::Column::ParentId.eq(existing.id))
        .count(&txn)
        .await?;
    if children > 0 {
        warn!("Content {} still has {} children", existing.id, children);
        return Err(ServiceError::Conflict(format!(
            "Content '{}' still has {} nested content item(s)",
            existing.name, children
        )));
    }

    completion::Entity::delete_many()
        .filter(completion::Column::ContentId.eq(existing.id))
        .exec(&txn)
        .await?;
    comment::Entity::delete_many()
        .filter(comment::Column::ContentId.eq(existing.id))
        .exec(&txn)
        .await?;
    course_content::Entity::delete_by_id(existing.id).exec(&txn).await?;

    txn.commit().await?;
    info!("Deleted content {} from course {}", existing.id, course_id);
    Ok(existing)
}

pub async fn count_contents<C: ConnectionTrait>(db: &C) -> Result<u64> {
    Ok(course_content::Entity::find().count(db).await?)
}
