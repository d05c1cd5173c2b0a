use chrono::Utc;
use model::entities::{completion, course_content, course_member, user};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, JoinType, PaginatorTrait,
    QueryFilter, QuerySelect, RelationTrait, Set, SqlErr,
};
use tracing::{debug, info, instrument, warn};

use crate::enrollment::find_membership;
use crate::error::{Result, ServiceError};

/// Marks a content item as completed for the user's membership.
///
/// Get-or-create: the boolean is `true` only when this call recorded the
/// completion. Unknown content and callers outside the course are both
/// reported as not found.
#[instrument(skip(db, user), fields(user_id = user.id))]
pub async fn mark_complete<C: ConnectionTrait>(
    db: &C,
    user: &user::Model,
    content_id: i32,
) -> Result<(completion::Model, bool)> {
    let content = course_content::Entity::find_by_id(content_id)
        .one(db)
        .await?
        .ok_or_else(|| ServiceError::not_found("Content", content_id))?;

    let Some(member) = find_membership(db, content.course_id, user.id).await? else {
        warn!("User {} is not a member of course {}", user.id, content.course_id);
        return Err(ServiceError::NotFound(format!(
            "You are not enrolled in the course of content {}",
            content_id
        )));
    };

    if let Some(existing) = find_completion(db, member.id, content.id).await? {
        debug!("Content {} already completed by member {}", content.id, member.id);
        return Ok((existing, false));
    }

    let inserted = completion::ActiveModel {
        member_id: Set(member.id),
        content_id: Set(content.id),
        last_update: Set(Utc::now().naive_utc()),
        ..Default::default()
    }
    .insert(db)
    .await;

    match inserted {
        Ok(created) => {
            info!("Member {} completed content {}", member.id, content.id);
            Ok((created, true))
        }
        // A concurrent request recorded it between the lookup and the insert
        Err(e) if matches!(e.sql_err(), Some(SqlErr::UniqueConstraintViolation(_))) => {
            debug!("Completion of content {} by member {} raced: {}", content.id, member.id, e);
            match find_completion(db, member.id, content.id).await? {
                Some(existing) => Ok((existing, false)),
                None => Err(e.into()),
            }
        }
        Err(e) => Err(e.into()),
    }
}

async fn find_completion<C: ConnectionTrait>(
    db: &C,
    member_id: i32,
    content_id: i32,
) -> Result<Option<completion::Model>> {
    Ok(completion::Entity::find()
        .filter(completion::Column::MemberId.eq(member_id))
        .filter(completion::Column::ContentId.eq(content_id))
        .one(db)
        .await?)
}

/// Whether the user has completed the content item in any membership.
pub async fn is_completed<C: ConnectionTrait>(db: &C, user_id: i32, content_id: i32) -> Result<bool> {
    let found = completion::Entity::find()
        .join(JoinType::InnerJoin, completion::Relation::CourseMember.def())
        .filter(course_member::Column::UserId.eq(user_id))
        .filter(completion::Column::ContentId.eq(content_id))
        .count(db)
        .await?;
    Ok(found > 0)
}

pub async fn count_completions<C: ConnectionTrait>(db: &C) -> Result<u64> {
    Ok(completion::Entity::find().count(db).await?)
}
