use crate::auth::AuthUser;
use crate::schemas::{ApiError, ApiResponse, AppState, CachedData, service_error};
use axum::{
    extract::{Query, State},
    response::Json,
};
use chrono::NaiveDateTime;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use services::dashboard::{CompletedContent, CourseProgress, Dashboard, DashboardView, PlatformStats};
use tracing::{debug, instrument, trace};
use utoipa::{IntoParams, ToSchema};

const STATS_CACHE_KEY: &str = "platform_stats";

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct HomeResponse {
    pub username: String,
    /// Courses the caller is enrolled in
    pub course_count: u64,
    /// Only present for staff
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_users: Option<u64>,
}

/// A course on the dashboard, with progress for students
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct DashboardCourse {
    pub member_id: i32,
    pub course_id: i32,
    pub course_name: String,
    pub roles: String,
    pub total_contents: Option<u64>,
    pub completed_contents: Option<u64>,
    pub is_fully_completed: Option<bool>,
}

impl From<CourseProgress> for DashboardCourse {
    fn from(progress: CourseProgress) -> Self {
        Self {
            member_id: progress.member.id,
            course_id: progress.course.id,
            course_name: progress.course.name,
            roles: progress.member.roles.code().to_string(),
            total_contents: Some(progress.total_contents),
            completed_contents: Some(progress.completed_contents),
            is_fully_completed: Some(progress.is_fully_completed),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct CompletedContentResponse {
    pub completion_id: i32,
    pub content_id: i32,
    pub content_name: String,
    pub course_id: i32,
    pub completed_at: NaiveDateTime,
}

impl From<CompletedContent> for CompletedContentResponse {
    fn from(item: CompletedContent) -> Self {
        Self {
            completion_id: item.completion.id,
            content_id: item.content.id,
            content_name: item.content.name,
            course_id: item.course_id,
            completed_at: item.completion.last_update,
        }
    }
}

/// The caller's dashboard. `view` is `teaching` for staff.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct DashboardResponse {
    pub view: String,
    pub courses: Vec<DashboardCourse>,
    pub completions: Vec<CompletedContentResponse>,
}

impl From<Dashboard> for DashboardResponse {
    fn from(dashboard: Dashboard) -> Self {
        match dashboard {
            Dashboard::Teaching(memberships) => Self {
                view: "teaching".to_string(),
                courses: memberships
                    .into_iter()
                    .map(|(member, course)| DashboardCourse {
                        member_id: member.id,
                        course_id: course.id,
                        course_name: course.name,
                        roles: member.roles.code().to_string(),
                        total_contents: None,
                        completed_contents: None,
                        is_fully_completed: None,
                    })
                    .collect(),
                completions: Vec::new(),
            },
            Dashboard::OnProgress(progress) => Self {
                view: "onprogress".to_string(),
                courses: progress.into_iter().map(DashboardCourse::from).collect(),
                completions: Vec::new(),
            },
            Dashboard::Complete(completions) => Self {
                view: "complete".to_string(),
                courses: Vec::new(),
                completions: completions.into_iter().map(CompletedContentResponse::from).collect(),
            },
        }
    }
}

/// Platform totals
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct StatsResponse {
    pub total_users: u64,
    pub total_courses: u64,
    pub total_members: u64,
    pub total_contents: u64,
    pub total_comments: u64,
    pub total_completions: u64,
    /// Two decimal places, `0` when there are no courses
    #[schema(value_type = String)]
    pub members_per_course: Decimal,
    /// Two decimal places, `0` when there are no members
    #[schema(value_type = String)]
    pub completions_per_member: Decimal,
}

impl From<PlatformStats> for StatsResponse {
    fn from(stats: PlatformStats) -> Self {
        Self {
            total_users: stats.total_users,
            total_courses: stats.total_courses,
            total_members: stats.total_members,
            total_contents: stats.total_contents,
            total_comments: stats.total_comments,
            total_completions: stats.total_completions,
            members_per_course: stats.members_per_course,
            completions_per_member: stats.completions_per_member,
        }
    }
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct DashboardQuery {
    /// `onprogress` (default) or `complete`
    pub view: Option<String>,
}

/// Landing summary for the caller
#[utoipa::path(
    get,
    path = "/api/v1/home",
    tag = "dashboard",
    responses(
        (status = 200, description = "Summary", body = ApiResponse<HomeResponse>),
        (status = 401, description = "Not authenticated", body = ErrorResponse)
    )
)]
#[instrument(skip(state, auth), fields(user_id = auth.0.id))]
pub async fn home(
    State(state): State<AppState>,
    auth: AuthUser,
) -> Result<Json<ApiResponse<HomeResponse>>, ApiError> {
    trace!("Entering home function");

    match services::dashboard::home_summary(&state.db, &auth.0).await {
        Ok(summary) => Ok(ApiResponse::ok(
            HomeResponse {
                username: summary.username,
                course_count: summary.course_count,
                total_users: summary.total_users,
            },
            "Welcome",
        )),
        Err(e) => Err(service_error(e)),
    }
}

/// The caller's courses and progress
#[utoipa::path(
    get,
    path = "/api/v1/dashboard",
    tag = "dashboard",
    params(DashboardQuery),
    responses(
        (status = 200, description = "Dashboard", body = ApiResponse<DashboardResponse>),
        (status = 401, description = "Not authenticated", body = ErrorResponse)
    )
)]
#[instrument(skip(state, auth), fields(user_id = auth.0.id))]
pub async fn dashboard(
    State(state): State<AppState>,
    auth: AuthUser,
    Query(query): Query<DashboardQuery>,
) -> Result<Json<ApiResponse<DashboardResponse>>, ApiError> {
    trace!("Entering dashboard function");

    let view = DashboardView::from_query(query.view.as_deref());
    match services::dashboard::dashboard(&state.db, &auth.0, view).await {
        Ok(dashboard) => {
            let response = DashboardResponse::from(dashboard);
            debug!("Dashboard view {} for user {}", response.view, auth.0.id);
            Ok(ApiResponse::ok(response, "Dashboard retrieved successfully"))
        }
        Err(e) => Err(service_error(e)),
    }
}

/// Platform statistics
#[utoipa::path(
    get,
    path = "/api/v1/stats",
    tag = "dashboard",
    responses(
        (status = 200, description = "Totals and ratios", body = ApiResponse<StatsResponse>),
        (status = 401, description = "Not authenticated", body = ErrorResponse),
        (status = 403, description = "Staff only", body = ErrorResponse)
    )
)]
#[instrument(skip(state, auth))]
pub async fn stats(
    State(state): State<AppState>,
    auth: AuthUser,
) -> Result<Json<ApiResponse<StatsResponse>>, ApiError> {
    trace!("Entering stats function");
    auth.require_staff()?;

    if let Some(CachedData::Stats(stats)) = state.cache.get(STATS_CACHE_KEY).await {
        debug!("Serving platform stats from cache");
        return Ok(ApiResponse::ok(StatsResponse::from(stats), "Statistics retrieved from cache"));
    }

    let stats = services::dashboard::platform_stats(&state.db)
        .await
        .map_err(service_error)?;
    state
        .cache
        .insert(STATS_CACHE_KEY.to_string(), CachedData::Stats(stats.clone()))
        .await;

    Ok(ApiResponse::ok(StatsResponse::from(stats), "Statistics retrieved successfully"))
}
