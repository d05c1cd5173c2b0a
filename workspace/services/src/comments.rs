use chrono::Utc;
use model::entities::{comment, course_content, course_member, user};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, JoinType, PaginatorTrait,
    QueryFilter, QueryOrder, QuerySelect, RelationTrait, Set,
};
use tracing::{debug, info, instrument, warn};

use crate::contents::get_content;
use crate::enrollment::find_membership;
use crate::error::{Result, ServiceError};

/// A comment with the username of the member who wrote it.
#[derive(Debug, Clone)]
pub struct CommentWithAuthor {
    pub comment: comment::Model,
    pub user_id: i32,
    pub username: String,
}

fn validate_text(text: &str) -> Result<String> {
    let text = text.trim();
    if text.is_empty() {
        return Err(ServiceError::Validation("Comment must not be empty".to_string()));
    }
    Ok(text.to_string())
}

/// Posts a comment as the author's membership in the content's course.
#[instrument(skip(db, author, text), fields(author_id = author.id))]
pub async fn post_comment<C: ConnectionTrait>(
    db: &C,
    author: &user::Model,
    content_id: i32,
    text: &str,
) -> Result<comment::Model> {
    let content = get_content(db, content_id).await?;

    let Some(member) = find_membership(db, content.course_id, author.id).await? else {
        warn!("User {} commented on content {} without membership", author.id, content.id);
        return Err(ServiceError::Forbidden(
            "You must be enrolled in this course to comment".to_string(),
        ));
    };
    let text = validate_text(text)?;

    let now = Utc::now().naive_utc();
    let created = comment::ActiveModel {
        content_id: Set(content.id),
        member_id: Set(member.id),
        comment: Set(text),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    }
    .insert(db)
    .await?;

    info!("Comment {} posted on content {}", created.id, content.id);
    Ok(created)
}

/// Comments visible to `viewer`, optionally narrowed to one content item.
/// Staff see everything; others only see comments in courses they belong to.
#[instrument(skip(db, viewer), fields(viewer_id = viewer.id))]
pub async fn list_comments<C: ConnectionTrait>(
    db: &C,
    viewer: &user::Model,
    content_id: Option<i32>,
) -> Result<Vec<comment::Model>> {
    let mut query = comment::Entity::find();

    if let Some(content_id) = content_id {
        query = query.filter(comment::Column::ContentId.eq(content_id));
    }

    if !viewer.is_staff_or_superuser() {
        let course_ids: Vec<i32> = course_member::Entity::find()
            .filter(course_member::Column::UserId.eq(viewer.id))
            .all(db)
            .await?
            .into_iter()
            .map(|m| m.course_id)
            .collect();
        query = query
            .join(JoinType::InnerJoin, comment::Relation::CourseContent.def())
            .filter(course_content::Column::CourseId.is_in(course_ids));
    }

    let comments = query.order_by_asc(comment::Column::Id).all(db).await?;
    debug!("Found {} comments visible to user {}", comments.len(), viewer.id);
    Ok(comments)
}

/// Comments on a content item with their authors, newest first.
pub async fn comments_for_content<C: ConnectionTrait>(
    db: &C,
    content_id: i32,
) -> Result<Vec<CommentWithAuthor>> {
    let rows = comment::Entity::find()
        .filter(comment::Column::ContentId.eq(content_id))
        .find_also_related(course_member::Entity)
        .order_by_desc(comment::Column::CreatedAt)
        .order_by_desc(comment::Column::Id)
        .all(db)
        .await?;

    let mut comments = Vec::with_capacity(rows.len());
    for (comment, member) in rows {
        let Some(member) = member else { continue };
        let username = user::Entity::find_by_id(member.user_id)
            .one(db)
            .await?
            .map(|u| u.username)
            .unwrap_or_default();
        comments.push(CommentWithAuthor {
            comment,
            user_id: member.user_id,
            username,
        });
    }
    Ok(comments)
}

/// Loads a comment and checks that `actor` wrote it.
async fn authored_comment<C: ConnectionTrait>(
    db: &C,
    actor: &user::Model,
    comment_id: i32,
) -> Result<comment::Model> {
    let (found, member) = comment::Entity::find_by_id(comment_id)
        .find_also_related(course_member::Entity)
        .one(db)
        .await?
        .ok_or_else(|| ServiceError::not_found("Comment", comment_id))?;

    match member {
        Some(member) if member.user_id == actor.id => Ok(found),
        _ => {
            warn!("User {} does not own comment {}", actor.id, comment_id);
            Err(ServiceError::Forbidden(
                "You can only change your own comments".to_string(),
            ))
        }
    }
}

#[instrument(skip(db, actor, text), fields(actor_id = actor.id))]
pub async fn edit_comment<C: ConnectionTrait>(
    db: &C,
    actor: &user::Model,
    comment_id: i32,
    text: &str,
) -> Result<comment::Model> {
    let existing = authored_comment(db, actor, comment_id).await?;
    let text = validate_text(text)?;

    let mut active: comment::ActiveModel = existing.into();
    active.comment = Set(text);
    active.updated_at = Set(Utc::now().naive_utc());
    let updated = active.update(db).await?;

    info!("Comment {} edited", updated.id);
    Ok(updated)
}

#[instrument(skip(db, actor), fields(actor_id = actor.id))]
pub async fn delete_comment<C: ConnectionTrait>(
    db: &C,
    actor: &user::Model,
    comment_id: i32,
) -> Result<comment::Model> {
    let existing = authored_comment(db, actor, comment_id).await?;
    comment::Entity::delete_by_id(existing.id).exec(db).await?;
    info!("Comment {} deleted", existing.id);
    Ok(existing)
}

pub async fn count_comments<C: ConnectionTrait>(db: &C) -> Result<u64> {
    Ok(comment::Entity::find().count(db).await?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{self, setup_db};
    use model::entities::course_member::MemberRole;

    #[tokio::test]
    async fn test_post_comment_rules() {
        let db = setup_db().await;
        let teacher = testing::new_user(&db).await.unwrap();
        let student = testing::new_user(&db).await.unwrap();
        let outsider = testing::new_user(&db).await.unwrap();
        let course = testing::new_course(&db, &teacher, "Rust").await.unwrap();
        let content = testing::new_content(&db, &course, "Traits").await.unwrap();
        let member = testing::new_member(&db, &course, &student, MemberRole::Student).await.unwrap();

        let posted = post_comment(&db, &student, content.id, "  Keren sekali  ").await.unwrap();
        assert_eq!(posted.comment, "Keren sekali");
        assert_eq!(posted.member_id, member.id);

        let err = post_comment(&db, &outsider, content.id, "Halo").await.unwrap_err();
        assert!(matches!(err, ServiceError::Forbidden(_)));
        let err = post_comment(&db, &student, 999, "Halo").await.unwrap_err();
        assert!(matches!(err, ServiceError::NotFound(_)));
        let err = post_comment(&db, &student, content.id, "   ").await.unwrap_err();
        assert!(matches!(err, ServiceError::Validation(_)));
    }

    #[tokio::test]
    async fn test_list_comments_visibility() {
        let db = setup_db().await;
        let teacher = testing::new_user(&db).await.unwrap();
        let alice = testing::new_user(&db).await.unwrap();
        let bob = testing::new_user(&db).await.unwrap();
        let staff = testing::new_staff(&db, "staff01").await.unwrap();
        let rust = testing::new_course(&db, &teacher, "Rust").await.unwrap();
        let go = testing::new_course(&db, &teacher, "Go").await.unwrap();
        let traits = testing::new_content(&db, &rust, "Traits").await.unwrap();
        let channels = testing::new_content(&db, &go, "Channels").await.unwrap();
        testing::new_member(&db, &rust, &alice, MemberRole::Student).await.unwrap();
        testing::new_member(&db, &go, &bob, MemberRole::Student).await.unwrap();
        post_comment(&db, &alice, traits.id, "Rust!").await.unwrap();
        post_comment(&db, &bob, channels.id, "Go!").await.unwrap();

        assert_eq!(list_comments(&db, &staff, None).await.unwrap().len(), 2);

        let seen = list_comments(&db, &alice, None).await.unwrap();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].comment, "Rust!");

        assert!(list_comments(&db, &alice, Some(channels.id)).await.unwrap().is_empty());
        assert_eq!(list_comments(&db, &staff, Some(channels.id)).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_comments_for_content_newest_first() {
        let db = setup_db().await;
        let teacher = testing::new_user(&db).await.unwrap();
        let student = testing::new_named_user(&db, "siswa01").await.unwrap();
        let course = testing::new_course(&db, &teacher, "Rust").await.unwrap();
        let content = testing::new_content(&db, &course, "Traits").await.unwrap();
        testing::new_member(&db, &course, &student, MemberRole::Student).await.unwrap();
        post_comment(&db, &student, content.id, "Pertama").await.unwrap();
        post_comment(&db, &student, content.id, "Kedua").await.unwrap();

        let listed = comments_for_content(&db, content.id).await.unwrap();
        let texts: Vec<_> = listed.iter().map(|c| c.comment.comment.as_str()).collect();
        assert_eq!(texts, vec!["Kedua", "Pertama"]);
        assert_eq!(listed[0].username, "siswa01");
    }

    #[tokio::test]
    async fn test_only_author_can_edit_or_delete() {
        let db = setup_db().await;
        let teacher = testing::new_user(&db).await.unwrap();
        let alice = testing::new_user(&db).await.unwrap();
        let bob = testing::new_user(&db).await.unwrap();
        let course = testing::new_course(&db, &teacher, "Rust").await.unwrap();
        let content = testing::new_content(&db, &course, "Traits").await.unwrap();
        testing::new_member(&db, &course, &alice, MemberRole::Student).await.unwrap();
        testing::new_member(&db, &course, &bob, MemberRole::Student).await.unwrap();
        let posted = post_comment(&db, &alice, content.id, "Asli").await.unwrap();

        let err = edit_comment(&db, &bob, posted.id, "Ubah").await.unwrap_err();
        assert!(matches!(err, ServiceError::Forbidden(_)));
        let err = delete_comment(&db, &bob, posted.id).await.unwrap_err();
        assert!(matches!(err, ServiceError::Forbidden(_)));

        let edited = edit_comment(&db, &alice, posted.id, "Revisi").await.unwrap();
        assert_eq!(edited.comment, "Revisi");

        delete_comment(&db, &alice, posted.id).await.unwrap();
        assert_eq!(count_comments(&db).await.unwrap(), 0);
        let err = delete_comment(&db, &alice, posted.id).await.unwrap_err();
        assert!(matches!(err, ServiceError::NotFound(_)));
    }
}
