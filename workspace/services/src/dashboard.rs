use model::entities::{completion, course, course_content, course_member, user};
use rust_decimal::prelude::*;
use sea_orm::{
    ColumnTrait, ConnectionTrait, EntityTrait, JoinType, PaginatorTrait, QueryFilter, QueryOrder,
    QuerySelect, RelationTrait,
};
use tracing::{debug, instrument};

use crate::enrollment::memberships_of;
use crate::error::Result;

/// Figures for the landing page of a signed-in user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HomeSummary {
    pub username: String,
    /// Number of courses the user is enrolled in
    pub course_count: u64,
    /// Total number of users, only computed for staff
    pub total_users: Option<u64>,
}

#[instrument(skip(db, viewer), fields(viewer_id = viewer.id))]
pub async fn home_summary<C: ConnectionTrait>(db: &C, viewer: &user::Model) -> Result<HomeSummary> {
    let course_count = course_member::Entity::find()
        .filter(course_member::Column::UserId.eq(viewer.id))
        .count(db)
        .await?;
    let total_users = if viewer.is_staff_or_superuser() {
        Some(user::Entity::find().count(db).await?)
    } else {
        None
    };

    Ok(HomeSummary {
        username: viewer.username.clone(),
        course_count,
        total_users,
    })
}

/// Which tab of the student dashboard to show.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DashboardView {
    #[default]
    OnProgress,
    Complete,
}

impl DashboardView {
    /// Anything other than `complete` falls back to the in-progress view.
    pub fn from_query(view: Option<&str>) -> Self {
        match view {
            Some("complete") => DashboardView::Complete,
            _ => DashboardView::OnProgress,
        }
    }
}

/// Progress of one membership through its course.
#[derive(Debug, Clone)]
pub struct CourseProgress {
    pub member: course_member::Model,
    pub course: course::Model,
    pub total_contents: u64,
    pub completed_contents: u64,
    /// The course has contents and every one of them is completed.
    pub is_fully_completed: bool,
}

/// A completion with the content and course it belongs to.
#[derive(Debug, Clone)]
pub struct CompletedContent {
    pub completion: completion::Model,
    pub content: course_content::Model,
    pub course_id: i32,
}

#[derive(Debug, Clone)]
pub enum Dashboard {
    /// Staff see the courses they are attached to.
    Teaching(Vec<(course_member::Model, course::Model)>),
    OnProgress(Vec<CourseProgress>),
    Complete(Vec<CompletedContent>),
}

#[instrument(skip(db, viewer), fields(viewer_id = viewer.id))]
pub async fn dashboard<C: ConnectionTrait>(
    db: &C,
    viewer: &user::Model,
    view: DashboardView,
) -> Result<Dashboard> {
    if viewer.is_staff {
        return Ok(Dashboard::Teaching(memberships_of(db, viewer.id).await?));
    }

    match view {
        DashboardView::Complete => Ok(Dashboard::Complete(completions_of(db, viewer.id).await?)),
        DashboardView::OnProgress => Ok(Dashboard::OnProgress(progress(db, viewer.id).await?)),
    }
}

/// Every membership of the user with its completion progress.
pub async fn progress<C: ConnectionTrait>(db: &C, user_id: i32) -> Result<Vec<CourseProgress>> {
    let mut rows = Vec::new();

    for (member, course) in memberships_of(db, user_id).await? {
        let total_contents = course.content_count(db).await?;
        let completed_contents = completion::Entity::find()
            .join(JoinType::InnerJoin, completion::Relation::CourseContent.def())
            .filter(completion::Column::MemberId.eq(member.id))
            .filter(course_content::Column::CourseId.eq(course.id))
            .count(db)
            .await?;

        debug!(
            "Member {} completed {}/{} contents of course {}",
            member.id, completed_contents, total_contents, course.id
        );
        rows.push(CourseProgress {
            is_fully_completed: total_contents > 0 && completed_contents == total_contents,
            member,
            course,
            total_contents,
            completed_contents,
        });
    }

    Ok(rows)
}

/// Completions recorded for any of the user's memberships, oldest first.
pub async fn completions_of<C: ConnectionTrait>(db: &C, user_id: i32) -> Result<Vec<CompletedContent>> {
    let rows = completion::Entity::find()
        .join(JoinType::InnerJoin, completion::Relation::CourseMember.def())
        .filter(course_member::Column::UserId.eq(user_id))
        .find_also_related(course_content::Entity)
        .order_by_asc(completion::Column::LastUpdate)
        .order_by_asc(completion::Column::Id)
        .all(db)
        .await?;

    Ok(rows
        .into_iter()
        .filter_map(|(completion, content)| {
            content.map(|content| CompletedContent {
                course_id: content.course_id,
                completion,
                content,
            })
        })
        .collect())
}

/// Platform-wide totals for the staff statistics page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlatformStats {
    pub total_users: u64,
    pub total_courses: u64,
    pub total_members: u64,
    pub total_contents: u64,
    pub total_comments: u64,
    pub total_completions: u64,
    pub members_per_course: Decimal,
    pub completions_per_member: Decimal,
}

/// `numerator / denominator` rounded to two places, zero when nothing to divide by.
fn ratio(numerator: u64, denominator: u64) -> Decimal {
    if denominator == 0 {
        return Decimal::ZERO;
    }
    (Decimal::from(numerator) / Decimal::from(denominator)).round_dp(2)
}

#[instrument(skip(db))]
pub async fn platform_stats<C: ConnectionTrait>(db: &C) -> Result<PlatformStats> {
    let total_users = user::Entity::find().count(db).await?;
    let total_courses = crate::courses::count_courses(db).await?;
    let total_members = course_member::Entity::find().count(db).await?;
    let total_contents = crate::contents::count_contents(db).await?;
    let total_comments = crate::comments::count_comments(db).await?;
    let total_completions = crate::completion::count_completions(db).await?;

    let stats = PlatformStats {
        total_users,
        total_courses,
        total_members,
        total_contents,
        total_comments,
        total_completions,
        members_per_course: ratio(total_members, total_courses),
        completions_per_member: ratio(total_completions, total_members),
    };
    debug!("Computed platform stats: {:?}", stats);
    Ok(stats)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{self, setup_db};
    use model::entities::course_member::MemberRole;

    #[test]
    fn test_ratio() {
        assert_eq!(ratio(0, 0), Decimal::ZERO);
        assert_eq!(ratio(5, 0), Decimal::ZERO);
        assert_eq!(ratio(2, 3), Decimal::new(67, 2));
        assert_eq!(ratio(6, 3), Decimal::from(2));
    }

    #[test]
    fn test_view_from_query() {
        assert_eq!(DashboardView::from_query(None), DashboardView::OnProgress);
        assert_eq!(DashboardView::from_query(Some("complete")), DashboardView::Complete);
        assert_eq!(DashboardView::from_query(Some("anything")), DashboardView::OnProgress);
    }

    #[tokio::test]
    async fn test_home_summary() {
        let db = setup_db().await;
        let teacher = testing::new_user(&db).await.unwrap();
        let student = testing::new_named_user(&db, "siswa01").await.unwrap();
        let staff = testing::new_staff(&db, "staff01").await.unwrap();
        let course = testing::new_course(&db, &teacher, "Rust").await.unwrap();
        testing::new_member(&db, &course, &student, MemberRole::Student).await.unwrap();

        let summary = home_summary(&db, &student).await.unwrap();
        assert_eq!(summary.username, "siswa01");
        assert_eq!(summary.course_count, 1);
        assert_eq!(summary.total_users, None);

        let summary = home_summary(&db, &staff).await.unwrap();
        assert_eq!(summary.total_users, Some(3));
    }

    #[tokio::test]
    async fn test_progress_and_completions() {
        let db = setup_db().await;
        let teacher = testing::new_user(&db).await.unwrap();
        let student = testing::new_user(&db).await.unwrap();
        let rust = testing::new_course(&db, &teacher, "Rust").await.unwrap();
        let empty = testing::new_course(&db, &teacher, "Kosong").await.unwrap();
        let a = testing::new_content(&db, &rust, "A").await.unwrap();
        let b = testing::new_content(&db, &rust, "B").await.unwrap();
        testing::new_member(&db, &rust, &student, MemberRole::Student).await.unwrap();
        testing::new_member(&db, &empty, &student, MemberRole::Student).await.unwrap();

        crate::completion::mark_complete(&db, &student, a.id).await.unwrap();
        let rows = progress(&db, student.id).await.unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].completed_contents, 1);
        assert!(!rows[0].is_fully_completed);
        // A course without contents never counts as completed
        assert!(!rows[1].is_fully_completed);

        crate::completion::mark_complete(&db, &student, b.id).await.unwrap();
        let rows = progress(&db, student.id).await.unwrap();
        assert!(rows[0].is_fully_completed);

        let done = completions_of(&db, student.id).await.unwrap();
        let names: Vec<_> = done.iter().map(|c| c.content.name.as_str()).collect();
        assert_eq!(names, vec!["A", "B"]);
        assert!(done.iter().all(|c| c.course_id == rust.id));
    }

    #[tokio::test]
    async fn test_dashboard_for_staff_lists_memberships() {
        let db = setup_db().await;
        let teacher = testing::new_staff(&db, "guru01").await.unwrap();
        let course = testing::new_course(&db, &teacher, "Rust").await.unwrap();
        testing::new_member(&db, &course, &teacher, MemberRole::Assistant).await.unwrap();

        match dashboard(&db, &teacher, DashboardView::Complete).await.unwrap() {
            Dashboard::Teaching(rows) => assert_eq!(rows.len(), 1),
            other => panic!("unexpected dashboard {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_platform_stats() {
        let db = setup_db().await;
        let teacher = testing::new_user(&db).await.unwrap();
        let alice = testing::new_user(&db).await.unwrap();
        let bob = testing::new_user(&db).await.unwrap();
        let rust = testing::new_course(&db, &teacher, "Rust").await.unwrap();
        testing::new_course(&db, &teacher, "Go").await.unwrap();
        testing::new_course(&db, &teacher, "Zig").await.unwrap();
        let content = testing::new_content(&db, &rust, "Intro").await.unwrap();
        testing::new_member(&db, &rust, &alice, MemberRole::Student).await.unwrap();
        testing::new_member(&db, &rust, &bob, MemberRole::Student).await.unwrap();
        crate::completion::mark_complete(&db, &alice, content.id).await.unwrap();

        let stats = platform_stats(&db).await.unwrap();
        assert_eq!(stats.total_users, 3);
        assert_eq!(stats.total_courses, 3);
        assert_eq!(stats.total_members, 2);
        assert_eq!(stats.total_completions, 1);
        assert_eq!(stats.members_per_course, Decimal::new(67, 2));
        assert_eq!(stats.completions_per_member, Decimal::new(50, 2));
    }
}
