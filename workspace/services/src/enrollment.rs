use chrono::Utc;
use model::entities::{comment, completion, course, course_member, user};
use model::entities::course_member::MemberRole;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter, QueryOrder, Set,
    TransactionTrait,
};
use tracing::{debug, info, instrument, warn};

use crate::error::{Result, ServiceError};

/// The membership of `user_id` in `course_id`, if any.
pub async fn find_membership<C: ConnectionTrait>(
    db: &C,
    course_id: i32,
    user_id: i32,
) -> Result<Option<course_member::Model>> {
    Ok(course_member::Entity::find()
        .filter(course_member::Column::CourseId.eq(course_id))
        .filter(course_member::Column::UserId.eq(user_id))
        .one(db)
        .await?)
}

/// Enrolls the user as a student. Enrolling twice is refused.
#[instrument(skip(db, user), fields(user_id = user.id))]
pub async fn enroll<C: ConnectionTrait>(
    db: &C,
    user: &user::Model,
    course_id: i32,
) -> Result<(course::Model, course_member::Model)> {
    let course = course::Entity::find_by_id(course_id)
        .one(db)
        .await?
        .ok_or_else(|| ServiceError::not_found("Course", course_id))?;

    if find_membership(db, course.id, user.id).await?.is_some() {
        warn!("User {} is already enrolled in course {}", user.id, course.id);
        return Err(ServiceError::AlreadyEnrolled(course.name));
    }

    let now = Utc::now().naive_utc();
    let member = course_member::ActiveModel {
        course_id: Set(course.id),
        user_id: Set(user.id),
        roles: Set(MemberRole::Student),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    }
    .insert(db)
    .await?;

    info!("User {} enrolled in course {} as member {}", user.id, course.id, member.id);
    Ok((course, member))
}

/// Removes the user's membership together with its comments and completions.
/// Returns `false` when there was nothing to remove.
#[instrument(skip(db, user), fields(user_id = user.id))]
pub async fn exit<C>(db: &C, user: &user::Model, course_id: i32) -> Result<bool>
where
    C: ConnectionTrait + TransactionTrait,
{
    let txn = db.begin().await?;

    let Some(member) = find_membership(&txn, course_id, user.id).await? else {
        debug!("User {} holds no membership in course {}", user.id, course_id);
        return Ok(false);
    };

    completion::Entity::delete_many()
        .filter(completion::Column::MemberId.eq(member.id))
        .exec(&txn)
        .await?;
    comment::Entity::delete_many()
        .filter(comment::Column::MemberId.eq(member.id))
        .exec(&txn)
        .await?;
    course_member::Entity::delete_by_id(member.id).exec(&txn).await?;

    txn.commit().await?;
    info!("User {} left course {}", user.id, course_id);
    Ok(true)
}

/// The user's memberships with their courses, oldest enrollment first.
pub async fn memberships_of<C: ConnectionTrait>(
    db: &C,
    user_id: i32,
) -> Result<Vec<(course_member::Model, course::Model)>> {
    let rows = course_member::Entity::find()
        .filter(course_member::Column::UserId.eq(user_id))
        .find_also_related(course::Entity)
        .order_by_asc(course_member::Column::Id)
        .all(db)
        .await?;

    Ok(rows
        .into_iter()
        .filter_map(|(member, course)| course.map(|c| (member, c)))
        .collect())
}

pub async fn all_members<C: ConnectionTrait>(db: &C) -> Result<Vec<course_member::Model>> {
    Ok(course_member::Entity::find()
        .order_by_asc(course_member::Column::Id)
        .all(db)
        .await?)
}
