use chrono::Utc;
use common::{CourseFilter, Page};
use model::entities::{comment, completion, course, course_content, course_member, user};
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, ConnectionTrait, EntityTrait, PaginatorTrait,
    QueryFilter, QueryOrder, Set, TransactionTrait,
};
use tracing::{debug, info, instrument, warn};

use crate::error::{Result, ServiceError};
use crate::search::icontains;

/// Courses shown per page in the filtered course listing.
pub const COURSE_PAGE_SIZE: u64 = 5;

const MAX_NAME_LEN: usize = 100;

/// Data for a new course.
#[derive(Debug, Clone)]
pub struct CourseInput {
    pub teacher_id: i32,
    pub name: String,
    pub description: Option<String>,
    pub price: Option<i64>,
    pub image: Option<String>,
}

/// Partial update of a course. `None` leaves the field untouched.
#[derive(Debug, Clone, Default)]
pub struct CourseChanges {
    pub teacher_id: Option<i32>,
    pub name: Option<String>,
    pub description: Option<String>,
    pub price: Option<i64>,
    pub image: Option<Option<String>>,
}

/// A course together with its membership and content totals.
#[derive(Debug, Clone)]
pub struct CourseWithCounts {
    pub course: course::Model,
    pub num_members: u64,
    pub num_contents: u64,
}

fn validate_name(name: &str) -> Result<String> {
    let name = name.trim();
    if name.is_empty() {
        return Err(ServiceError::Validation("Course name must not be empty".to_string()));
    }
    if name.chars().count() > MAX_NAME_LEN {
        return Err(ServiceError::Validation(format!(
            "Course name must be at most {} characters",
            MAX_NAME_LEN
        )));
    }
    Ok(name.to_string())
}

fn validate_price(price: i64) -> Result<i64> {
    if price < 0 {
        return Err(ServiceError::Validation("Price must not be negative".to_string()));
    }
    Ok(price)
}

async fn ensure_teacher<C: ConnectionTrait>(db: &C, teacher_id: i32) -> Result<()> {
    match user::Entity::find_by_id(teacher_id).one(db).await? {
        Some(_) => Ok(()),
        None => {
            warn!("Teacher {} does not exist", teacher_id);
            Err(ServiceError::Validation(format!(
                "Teacher with id {} does not exist",
                teacher_id
            )))
        }
    }
}

#[instrument(skip(db, input), fields(name = %input.name))]
pub async fn create_course<C: ConnectionTrait>(db: &C, input: CourseInput) -> Result<course::Model> {
    let name = validate_name(&input.name)?;
    let price = validate_price(input.price.unwrap_or(10000))?;
    ensure_teacher(db, input.teacher_id).await?;

    let now = Utc::now().naive_utc();
    let created = course::ActiveModel {
        teacher_id: Set(input.teacher_id),
        name: Set(name),
        description: Set(input.description.unwrap_or_else(|| "-".to_string())),
        price: Set(price),
        image: Set(input.image),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    }
    .insert(db)
    .await?;

    info!("Created course {}: {}", created.id, created);
    Ok(created)
}

pub async fn get_course<C: ConnectionTrait>(db: &C, course_id: i32) -> Result<course::Model> {
    course::Entity::find_by_id(course_id)
        .one(db)
        .await?
        .ok_or_else(|| ServiceError::not_found("Course", course_id))
}

/// A course with its teacher, for listings that show who teaches it.
pub async fn get_course_with_teacher<C: ConnectionTrait>(
    db: &C,
    course_id: i32,
) -> Result<(course::Model, Option<user::Model>)> {
    course::Entity::find_by_id(course_id)
        .find_also_related(user::Entity)
        .one(db)
        .await?
        .ok_or_else(|| ServiceError::not_found("Course", course_id))
}

#[instrument(skip(db, changes))]
pub async fn update_course<C: ConnectionTrait>(
    db: &C,
    course_id: i32,
    changes: CourseChanges,
) -> Result<course::Model> {
    let existing = get_course(db, course_id).await?;
    let mut active: course::ActiveModel = existing.into();

    if let Some(teacher_id) = changes.teacher_id {
        ensure_teacher(db, teacher_id).await?;
        active.teacher_id = Set(teacher_id);
    }
    if let Some(name) = changes.name {
        active.name = Set(validate_name(&name)?);
    }
    if let Some(description) = changes.description {
        active.description = Set(description);
    }
    if let Some(price) = changes.price {
        active.price = Set(validate_price(price)?);
    }
    if let Some(image) = changes.image {
        active.image = Set(image);
    }
    active.updated_at = Set(Utc::now().naive_utc());

    let updated = active.update(db).await?;
    info!("Updated course {}", updated.id);
    Ok(updated)
}

/// Deletes a course with its contents and their comments and completions
/// in a single transaction. A course that still has members is refused.
#[instrument(skip(db))]
pub async fn delete_course<C>(db: &C, course_id: i32) -> Result<course::Model>
where
    C: ConnectionTrait + TransactionTrait,
{
    let txn = db.begin().await?;

    let existing = course::Entity::find_by_id(course_id)
        .one(&txn)
        .await?
        .ok_or_else(|| ServiceError::not_found("Course", course_id))?;

    let members = course_member::Entity::find()
        .filter(course_member::Column::CourseId.eq(course_id))
        .count(&txn)
        .await?;
    if members > 0 {
        warn!("Refusing to delete course {} with {} members", course_id, members);
        return Err(ServiceError::Conflict(format!(
            "Course '{}' still has {} member(s)",
            existing.name, members
        )));
    }

    let content_ids: Vec<i32> = course_content::Entity::find()
        .filter(course_content::Column::CourseId.eq(course_id))
        .all(&txn)
        .await?
        .into_iter()
        .map(|c| c.id)
        .collect();

    let completions = completion::Entity::delete_many()
        .filter(completion::Column::ContentId.is_in(content_ids.clone()))
        .exec(&txn)
        .await?;
    let comments = comment::Entity::delete_many()
        .filter(comment::Column::ContentId.is_in(content_ids))
        .exec(&txn)
        .await?;

    // Parent links are restricted, so detach the tree before removing it
    course_content::Entity::update_many()
        .col_expr(course_content::Column::ParentId, Expr::value(Option::<i32>::None))
        .filter(course_content::Column::CourseId.eq(course_id))
        .exec(&txn)
        .await?;
    let contents = course_content::Entity::delete_many()
        .filter(course_content::Column::CourseId.eq(course_id))
        .exec(&txn)
        .await?;
    course::Entity::delete_by_id(course_id).exec(&txn).await?;

    txn.commit().await?;

    info!(
        "Deleted course {} with {} contents, {} comments, {} completions",
        course_id, contents.rows_affected, comments.rows_affected, completions.rows_affected
    );
    Ok(existing)
}

/// Every course with its teacher, newest first.
#[instrument(skip(db))]
pub async fn list_public<C: ConnectionTrait>(
    db: &C,
) -> Result<Vec<(course::Model, Option<user::Model>)>> {
    let courses = course::Entity::find()
        .find_also_related(user::Entity)
        .order_by_desc(course::Column::CreatedAt)
        .order_by_desc(course::Column::Id)
        .all(db)
        .await?;
    debug!("Found {} public courses", courses.len());
    Ok(courses)
}

/// Courses matching the filter, newest first, five per page, each with
/// member and content totals.
#[instrument(skip(db))]
pub async fn filter_courses<C: ConnectionTrait>(
    db: &C,
    filter: &CourseFilter,
) -> Result<Page<CourseWithCounts>> {
    let mut query = course::Entity::find();

    if let Some(min) = filter.min_price() {
        query = query.filter(course::Column::Price.gte(min));
    }
    if let Some(max) = filter.max_price() {
        query = query.filter(course::Column::Price.lte(max));
    }
    if let Some(from) = filter.created_gte {
        query = query.filter(course::Column::CreatedAt.gte(from));
    }
    if let Some(until) = filter.created_lte {
        query = query.filter(course::Column::CreatedAt.lte(until));
    }
    if let Some(term) = filter.search_term() {
        query = query.filter(
            Condition::any()
                .add(icontains(course::Column::Name, term))
                .add(icontains(course::Column::Description, term)),
        );
    }

    let page = filter.page();
    let paginator = query
        .order_by_desc(course::Column::CreatedAt)
        .order_by_desc(course::Column::Id)
        .paginate(db, COURSE_PAGE_SIZE);
    let count = paginator.num_items().await?;
    let courses = paginator.fetch_page(page - 1).await?;

    let mut items = Vec::with_capacity(courses.len());
    for course in courses {
        let num_members = course_member::Entity::find()
            .filter(course_member::Column::CourseId.eq(course.id))
            .count(db)
            .await?;
        let num_contents = course.content_count(db).await?;
        items.push(CourseWithCounts {
            course,
            num_members,
            num_contents,
        });
    }

    debug!("Filtered {} of {} courses for page {}", items.len(), count, page);
    Ok(Page::new(items, count, page, COURSE_PAGE_SIZE))
}

pub async fn count_courses<C: ConnectionTrait>(db: &C) -> Result<u64> {
    Ok(course::Entity::find().count(db).await?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{self, setup_db};
    use chrono::Duration;
    use model::entities::course_member::MemberRole;

    fn input(teacher: &user::Model, name: &str, price: i64) -> CourseInput {
        CourseInput {
            teacher_id: teacher.id,
            name: name.to_string(),
            description: Some(format!("Belajar {}", name)),
            price: Some(price),
            image: None,
        }
    }

    #[tokio::test]
    async fn test_create_course_display() {
        let db = setup_db().await;
        let teacher = testing::new_user(&db).await.unwrap();
        let created = create_course(&db, input(&teacher, "Pemrograman Django", 150000))
            .await
            .unwrap();
        assert_eq!(created.to_string(), "Pemrograman Django : Rp150,000");
    }

    #[tokio::test]
    async fn test_create_course_defaults_and_validation() {
        let db = setup_db().await;
        let teacher = testing::new_user(&db).await.unwrap();
        let created = create_course(
            &db,
            CourseInput {
                teacher_id: teacher.id,
                name: "Dasar".to_string(),
                description: None,
                price: None,
                image: None,
            },
        )
        .await
        .unwrap();
        assert_eq!(created.price, 10000);
        assert_eq!(created.description, "-");

        let err = create_course(&db, input(&teacher, "   ", 1)).await.unwrap_err();
        assert!(matches!(err, ServiceError::Validation(_)));
        let err = create_course(&db, input(&teacher, &"x".repeat(101), 1)).await.unwrap_err();
        assert!(matches!(err, ServiceError::Validation(_)));
        let err = create_course(&db, input(&teacher, "Minus", -5)).await.unwrap_err();
        assert!(matches!(err, ServiceError::Validation(_)));

        let mut unknown = input(&teacher, "Ghost", 1);
        unknown.teacher_id = 9999;
        let err = create_course(&db, unknown).await.unwrap_err();
        assert!(matches!(err, ServiceError::Validation(_)));
    }

    #[tokio::test]
    async fn test_update_course() {
        let db = setup_db().await;
        let teacher = testing::new_user(&db).await.unwrap();
        let course = testing::new_course(&db, &teacher, "Rust").await.unwrap();

        let updated = update_course(
            &db,
            course.id,
            CourseChanges {
                name: Some("Rust Lanjutan".to_string()),
                price: Some(250000),
                ..Default::default()
            },
        )
        .await
        .unwrap();
        assert_eq!(updated.name, "Rust Lanjutan");
        assert_eq!(updated.price, 250000);
        assert_eq!(updated.description, course.description);

        let err = update_course(&db, 4242, CourseChanges::default()).await.unwrap_err();
        assert!(matches!(err, ServiceError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_delete_course_removes_contents() {
        let db = setup_db().await;
        let teacher = testing::new_user(&db).await.unwrap();
        let course = testing::new_course(&db, &teacher, "Rust").await.unwrap();
        let other = testing::new_course(&db, &teacher, "Go").await.unwrap();
        let parent = testing::new_content(&db, &course, "Bab 1").await.unwrap();
        let mut child: course_content::ActiveModel =
            testing::new_content(&db, &course, "Bab 1.1").await.unwrap().into();
        child.parent_id = Set(Some(parent.id));
        child.update(&db).await.unwrap();
        let kept = testing::new_content(&db, &other, "Intro").await.unwrap();

        let deleted = delete_course(&db, course.id).await.unwrap();
        assert_eq!(deleted.id, course.id);

        assert!(course::Entity::find_by_id(course.id).one(&db).await.unwrap().is_none());
        let remaining = course_content::Entity::find().all(&db).await.unwrap();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].id, kept.id);
    }

    #[tokio::test]
    async fn test_delete_course_with_members_is_refused() {
        let db = setup_db().await;
        let teacher = testing::new_user(&db).await.unwrap();
        let student = testing::new_user(&db).await.unwrap();
        let course = testing::new_course(&db, &teacher, "Rust").await.unwrap();
        let member = testing::new_member(&db, &course, &student, MemberRole::Student).await.unwrap();
        let content = testing::new_content(&db, &course, "Bab 1").await.unwrap();
        crate::comments::post_comment(&db, &student, content.id, "Mantap").await.unwrap();
        crate::completion::mark_complete(&db, &student, content.id).await.unwrap();

        let err = delete_course(&db, course.id).await.unwrap_err();
        assert!(matches!(err, ServiceError::Conflict(_)));

        assert!(course::Entity::find_by_id(course.id).one(&db).await.unwrap().is_some());
        assert!(course_member::Entity::find_by_id(member.id).one(&db).await.unwrap().is_some());
        assert_eq!(course_content::Entity::find().count(&db).await.unwrap(), 1);
        assert_eq!(comment::Entity::find().count(&db).await.unwrap(), 1);
        assert_eq!(completion::Entity::find().count(&db).await.unwrap(), 1);

        assert!(crate::enrollment::exit(&db, &student, course.id).await.unwrap());
        delete_course(&db, course.id).await.unwrap();
        assert_eq!(course_content::Entity::find().count(&db).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_filter_courses() {
        let db = setup_db().await;
        let teacher = testing::new_user(&db).await.unwrap();
        let student = testing::new_user(&db).await.unwrap();
        let cheap = create_course(&db, input(&teacher, "Python Dasar", 50000)).await.unwrap();
        create_course(&db, input(&teacher, "Django", 150000)).await.unwrap();
        create_course(&db, input(&teacher, "Kubernetes", 500000)).await.unwrap();
        testing::new_member(&db, &cheap, &student, MemberRole::Student).await.unwrap();
        testing::new_content(&db, &cheap, "Intro").await.unwrap();

        let all = filter_courses(&db, &CourseFilter::default()).await.unwrap();
        assert_eq!(all.count, 3);
        // Newest first
        assert_eq!(all.items[0].course.name, "Kubernetes");

        let ranged = filter_courses(
            &db,
            &CourseFilter {
                price_gte: Some(100000),
                price_lte: Some(200000),
                ..Default::default()
            },
        )
        .await
        .unwrap();
        assert_eq!(ranged.items.len(), 1);
        assert_eq!(ranged.items[0].course.name, "Django");

        let zero_bounds = filter_courses(
            &db,
            &CourseFilter {
                price_gte: Some(0),
                price_lte: Some(0),
                ..Default::default()
            },
        )
        .await
        .unwrap();
        assert_eq!(zero_bounds.count, 3);

        let searched = filter_courses(
            &db,
            &CourseFilter {
                search: Some("PYTHON".to_string()),
                ..Default::default()
            },
        )
        .await
        .unwrap();
        assert_eq!(searched.items.len(), 1);
        assert_eq!(searched.items[0].num_members, 1);
        assert_eq!(searched.items[0].num_contents, 1);

        let future = filter_courses(
            &db,
            &CourseFilter {
                created_gte: Some(Utc::now().naive_utc() + Duration::days(1)),
                ..Default::default()
            },
        )
        .await
        .unwrap();
        assert_eq!(future.count, 0);
    }

    #[tokio::test]
    async fn test_search_matches_wildcards_literally() {
        let db = setup_db().await;
        let teacher = testing::new_user(&db).await.unwrap();
        create_course(&db, input(&teacher, "Rust", 10000)).await.unwrap();
        create_course(&db, input(&teacher, "Go", 10000)).await.unwrap();

        for term in ["%", "_"] {
            let found = filter_courses(
                &db,
                &CourseFilter {
                    search: Some(term.to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
            assert_eq!(found.count, 0, "term {:?}", term);
        }

        create_course(&db, input(&teacher, "Diskon 50%", 10000)).await.unwrap();
        let found = filter_courses(
            &db,
            &CourseFilter {
                search: Some("50%".to_string()),
                ..Default::default()
            },
        )
        .await
        .unwrap();
        assert_eq!(found.count, 1);
        assert_eq!(found.items[0].course.name, "Diskon 50%");
    }

    #[tokio::test]
    async fn test_filter_courses_pages_by_five() {
        let db = setup_db().await;
        let teacher = testing::new_user(&db).await.unwrap();
        for i in 0..7 {
            testing::new_course(&db, &teacher, &format!("Kelas {}", i)).await.unwrap();
        }

        let second = filter_courses(
            &db,
            &CourseFilter {
                page: Some(2),
                ..Default::default()
            },
        )
        .await
        .unwrap();
        assert_eq!(second.items.len(), 2);
        assert_eq!(second.num_pages, 2);
        assert_eq!(second.page, 2);
    }

    #[tokio::test]
    async fn test_list_public_includes_teacher() {
        let db = setup_db().await;
        let teacher = testing::new_named_user(&db, "pakguru").await.unwrap();
        testing::new_course(&db, &teacher, "Rust").await.unwrap();

        let listed = list_public(&db).await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].1.as_ref().map(|t| t.username.as_str()), Some("pakguru"));
    }
}
