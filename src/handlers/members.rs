use crate::auth::AuthUser;
use crate::schemas::{ApiError, ApiResponse, AppState, service_error};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::Json,
};
use chrono::NaiveDateTime;
use model::entities::{course, course_member};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, trace};
use utoipa::ToSchema;

/// Course membership
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct MemberResponse {
    pub id: i32,
    pub user_id: i32,
    pub course_id: i32,
    /// `std` for students, `ast` for assistants
    pub roles: String,
}

impl From<course_member::Model> for MemberResponse {
    fn from(model: course_member::Model) -> Self {
        Self {
            id: model.id,
            user_id: model.user_id,
            course_id: model.course_id,
            roles: model.roles.code().to_string(),
        }
    }
}

/// One of the caller's memberships
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct MyCourseResponse {
    pub id: i32,
    pub course_id: i32,
    pub course_name: String,
    pub roles: String,
    pub joined_at: NaiveDateTime,
}

impl From<(course_member::Model, course::Model)> for MyCourseResponse {
    fn from((member, course): (course_member::Model, course::Model)) -> Self {
        Self {
            id: member.id,
            course_id: course.id,
            course_name: course.name,
            roles: member.roles.code().to_string(),
            joined_at: member.created_at,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ExitResponse {
    /// False when the caller was not enrolled
    pub left: bool,
}

/// Enroll in a course as a student
#[utoipa::path(
    post,
    path = "/api/v1/courses/{course_id}/enroll",
    tag = "members",
    params(("course_id" = i32, Path, description = "Course ID")),
    responses(
        (status = 201, description = "Enrolled", body = ApiResponse<MemberResponse>),
        (status = 400, description = "Already enrolled", body = ErrorResponse),
        (status = 401, description = "Not authenticated", body = ErrorResponse),
        (status = 404, description = "Course not found", body = ErrorResponse)
    )
)]
#[instrument(skip(state, auth), fields(user_id = auth.0.id))]
pub async fn enroll(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(course_id): Path<i32>,
) -> Result<(StatusCode, Json<ApiResponse<MemberResponse>>), ApiError> {
    trace!("Entering enroll function for course_id: {}", course_id);

    match services::enrollment::enroll(&state.db, &auth.0, course_id).await {
        Ok((course, member)) => {
            info!("User {} enrolled in course {}", auth.0.id, course.id);
            let message = format!("You have enrolled in course '{}'", course.name);
            Ok((StatusCode::CREATED, ApiResponse::ok(MemberResponse::from(member), message)))
        }
        Err(e) => Err(service_error(e)),
    }
}

/// Leave a course
#[utoipa::path(
    post,
    path = "/api/v1/courses/{course_id}/exit",
    tag = "members",
    params(("course_id" = i32, Path, description = "Course ID")),
    responses(
        (status = 200, description = "Membership removed, or there was none", body = ApiResponse<ExitResponse>),
        (status = 401, description = "Not authenticated", body = ErrorResponse)
    )
)]
#[instrument(skip(state, auth), fields(user_id = auth.0.id))]
pub async fn exit_course(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(course_id): Path<i32>,
) -> Result<Json<ApiResponse<ExitResponse>>, ApiError> {
    trace!("Entering exit_course function for course_id: {}", course_id);

    match services::enrollment::exit(&state.db, &auth.0, course_id).await {
        Ok(left) => {
            let message = if left {
                "You have left the course"
            } else {
                "You are not enrolled in this course"
            };
            debug!("Exit from course {}: {}", course_id, left);
            Ok(ApiResponse::ok(ExitResponse { left }, message))
        }
        Err(e) => Err(service_error(e)),
    }
}

/// The caller's memberships
#[utoipa::path(
    get,
    path = "/api/v1/mycourses",
    tag = "members",
    responses(
        (status = 200, description = "Memberships with course names", body = ApiResponse<Vec<MyCourseResponse>>),
        (status = 401, description = "Not authenticated", body = ErrorResponse)
    )
)]
#[instrument(skip(state, auth), fields(user_id = auth.0.id))]
pub async fn my_courses(
    State(state): State<AppState>,
    auth: AuthUser,
) -> Result<Json<ApiResponse<Vec<MyCourseResponse>>>, ApiError> {
    trace!("Entering my_courses function");

    match services::enrollment::memberships_of(&state.db, auth.0.id).await {
        Ok(memberships) => {
            debug!("User {} has {} memberships", auth.0.id, memberships.len());
            let data = memberships.into_iter().map(MyCourseResponse::from).collect();
            Ok(ApiResponse::ok(data, "Courses retrieved successfully"))
        }
        Err(e) => Err(service_error(e)),
    }
}

/// Every membership
#[utoipa::path(
    get,
    path = "/api/v1/members",
    tag = "members",
    responses(
        (status = 200, description = "All memberships", body = ApiResponse<Vec<MemberResponse>>),
        (status = 401, description = "Not authenticated", body = ErrorResponse)
    )
)]
#[instrument(skip(state, _auth))]
pub async fn list_members(
    State(state): State<AppState>,
    _auth: AuthUser,
) -> Result<Json<ApiResponse<Vec<MemberResponse>>>, ApiError> {
    trace!("Entering list_members function");

    match services::enrollment::all_members(&state.db).await {
        Ok(members) => {
            debug!("Returning {} memberships", members.len());
            let data = members.into_iter().map(MemberResponse::from).collect();
            Ok(ApiResponse::ok(data, "Members retrieved successfully"))
        }
        Err(e) => Err(service_error(e)),
    }
}
