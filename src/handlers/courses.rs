use crate::auth::{AuthUser, MaybeAuthUser};
use crate::schemas::{ApiError, ApiResponse, AppState, double_option, service_error, validation_error};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::Json,
};
use axum_valid::Valid;
use chrono::NaiveDateTime;
use common::{CourseFilter, Page};
use model::entities::{course, user};
use serde::{Deserialize, Serialize};
use services::courses::{CourseChanges, CourseInput, CourseWithCounts};
use tracing::{debug, error, info, instrument, trace};
use utoipa::ToSchema;
use validator::Validate;

/// Course response model
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct CourseResponse {
    pub id: i32,
    pub teacher_id: i32,
    pub name: String,
    pub description: String,
    /// Price in whole Rupiah
    pub price: i64,
    pub image: Option<String>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

impl From<course::Model> for CourseResponse {
    fn from(model: course::Model) -> Self {
        Self {
            id: model.id,
            teacher_id: model.teacher_id,
            name: model.name,
            description: model.description,
            price: model.price,
            image: model.image,
            created_at: model.created_at,
            updated_at: model.updated_at,
        }
    }
}

/// Public view of a course teacher
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct TeacherResponse {
    pub id: i32,
    pub username: String,
    pub first_name: String,
    pub last_name: String,
}

impl From<user::Model> for TeacherResponse {
    fn from(model: user::Model) -> Self {
        Self {
            id: model.id,
            username: model.username,
            first_name: model.first_name,
            last_name: model.last_name,
        }
    }
}

/// Entry of the anonymous catalogue
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct PublicCourseResponse {
    pub id: i32,
    pub name: String,
    pub description: String,
    pub price: i64,
    pub teacher: Option<TeacherResponse>,
}

/// Entry of the filtered course listing
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct CourseListItem {
    #[serde(flatten)]
    pub course: CourseResponse,
    pub num_members: u64,
    pub num_contents: u64,
}

impl From<CourseWithCounts> for CourseListItem {
    fn from(item: CourseWithCounts) -> Self {
        Self {
            course: CourseResponse::from(item.course),
            num_members: item.num_members,
            num_contents: item.num_contents,
        }
    }
}

/// Course detail with totals
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct CourseDetailResponse {
    #[serde(flatten)]
    pub course: CourseResponse,
    /// Display label, e.g. `Rust Basics : Rp150,000`
    pub label: String,
    pub teacher: Option<TeacherResponse>,
    pub num_students: u64,
    pub num_contents: u64,
    pub num_comments: u64,
    /// Whether the caller is enrolled; always false for anonymous callers
    pub is_joined: bool,
}

/// Request body for creating a course
#[derive(Debug, Deserialize, Serialize, ToSchema, Validate)]
pub struct CreateCourseRequest {
    pub teacher_id: i32,
    #[validate(length(min = 1, max = 100))]
    pub name: String,
    pub description: Option<String>,
    /// Defaults to 10000
    #[validate(range(min = 0))]
    pub price: Option<i64>,
    pub image: Option<String>,
}

/// Request body for updating a course. Absent fields stay unchanged.
#[derive(Debug, Deserialize, Serialize, ToSchema, Validate)]
pub struct UpdateCourseRequest {
    pub teacher_id: Option<i32>,
    #[validate(length(min = 1, max = 100))]
    pub name: Option<String>,
    pub description: Option<String>,
    #[validate(range(min = 0))]
    pub price: Option<i64>,
    /// `null` removes the image
    #[serde(default, deserialize_with = "double_option")]
    #[schema(value_type = Option<String>)]
    pub image: Option<Option<String>>,
}

/// List every course with its teacher
#[utoipa::path(
    get,
    path = "/api/v1/courses-public",
    tag = "courses",
    responses(
        (status = 200, description = "All courses, newest first", body = ApiResponse<Vec<PublicCourseResponse>>),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    )
)]
#[instrument(skip(state))]
pub async fn list_public_courses(
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<Vec<PublicCourseResponse>>>, ApiError> {
    trace!("Entering list_public_courses function");

    match services::courses::list_public(&state.db).await {
        Ok(courses) => {
            debug!("Returning {} public courses", courses.len());
            let data = courses
                .into_iter()
                .map(|(course, teacher)| PublicCourseResponse {
                    id: course.id,
                    name: course.name,
                    description: course.description,
                    price: course.price,
                    teacher: teacher.map(TeacherResponse::from),
                })
                .collect();
            Ok(ApiResponse::ok(data, "Courses retrieved successfully"))
        }
        Err(e) => Err(service_error(e)),
    }
}

/// Filter courses
#[utoipa::path(
    get,
    path = "/api/v1/courses",
    tag = "courses",
    params(CourseFilter),
    responses(
        (status = 200, description = "One page of matching courses", body = ApiResponse<Page<CourseListItem>>),
        (status = 400, description = "Invalid filter", body = ErrorResponse),
        (status = 401, description = "Not authenticated", body = ErrorResponse)
    )
)]
#[instrument(skip(state, _auth))]
pub async fn list_courses(
    State(state): State<AppState>,
    _auth: AuthUser,
    Valid(Query(filter)): Valid<Query<CourseFilter>>,
) -> Result<Json<ApiResponse<Page<CourseListItem>>>, ApiError> {
    trace!("Entering list_courses function");

    match services::courses::filter_courses(&state.db, &filter).await {
        Ok(page) => {
            debug!("Returning {} of {} courses", page.items.len(), page.count);
            Ok(ApiResponse::ok(page.map(CourseListItem::from), "Courses retrieved successfully"))
        }
        Err(e) => Err(service_error(e)),
    }
}

/// Create a course
#[utoipa::path(
    post,
    path = "/api/v1/courses",
    tag = "courses",
    request_body = CreateCourseRequest,
    responses(
        (status = 201, description = "Course created successfully", body = ApiResponse<CourseResponse>),
        (status = 400, description = "Invalid request or unknown teacher", body = ErrorResponse),
        (status = 403, description = "Staff only", body = ErrorResponse)
    )
)]
#[instrument(skip(state, auth, request), fields(name = %request.name))]
pub async fn create_course(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(request): Json<CreateCourseRequest>,
) -> Result<(StatusCode, Json<ApiResponse<CourseResponse>>), ApiError> {
    trace!("Entering create_course function");
    auth.require_staff()?;
    request.validate().map_err(validation_error)?;

    let input = CourseInput {
        teacher_id: request.teacher_id,
        name: request.name,
        description: request.description,
        price: request.price,
        image: request.image,
    };

    match services::courses::create_course(&state.db, input).await {
        Ok(course) => {
            info!("Course created successfully with ID: {}", course.id);
            Ok((
                StatusCode::CREATED,
                ApiResponse::ok(CourseResponse::from(course), "Course created successfully"),
            ))
        }
        Err(e) => Err(service_error(e)),
    }
}

/// Course detail
#[utoipa::path(
    get,
    path = "/api/v1/courses/{course_id}",
    tag = "courses",
    params(("course_id" = i32, Path, description = "Course ID")),
    responses(
        (status = 200, description = "Course found", body = ApiResponse<CourseDetailResponse>),
        (status = 404, description = "Course not found", body = ErrorResponse)
    )
)]
#[instrument(skip(state, viewer))]
pub async fn get_course(
    State(state): State<AppState>,
    MaybeAuthUser(viewer): MaybeAuthUser,
    Path(course_id): Path<i32>,
) -> Result<Json<ApiResponse<CourseDetailResponse>>, ApiError> {
    trace!("Entering get_course function for course_id: {}", course_id);

    let (course, teacher) = services::courses::get_course_with_teacher(&state.db, course_id)
        .await
        .map_err(service_error)?;

    let counts = async {
        let students = course.student_count(&state.db).await?;
        let contents = course.content_count(&state.db).await?;
        let comments = course.comment_count(&state.db).await?;
        Ok::<_, sea_orm::DbErr>((students, contents, comments))
    };
    let (num_students, num_contents, num_comments) = match counts.await {
        Ok(counts) => counts,
        Err(e) => {
            error!("Failed to count course {} totals: {}", course_id, e);
            return Err(service_error(e.into()));
        }
    };

    let is_joined = match &viewer {
        Some(user) => services::enrollment::find_membership(&state.db, course.id, user.id)
            .await
            .map_err(service_error)?
            .is_some(),
        None => false,
    };

    debug!("Course {} has {} students, joined: {}", course_id, num_students, is_joined);
    let detail = CourseDetailResponse {
        label: course.to_string(),
        course: CourseResponse::from(course),
        teacher: teacher.map(TeacherResponse::from),
        num_students,
        num_contents,
        num_comments,
        is_joined,
    };
    Ok(ApiResponse::ok(detail, "Course retrieved successfully"))
}

/// Update a course
#[utoipa::path(
    put,
    path = "/api/v1/courses/{course_id}",
    tag = "courses",
    params(("course_id" = i32, Path, description = "Course ID")),
    request_body = UpdateCourseRequest,
    responses(
        (status = 200, description = "Course updated successfully", body = ApiResponse<CourseResponse>),
        (status = 400, description = "Invalid request", body = ErrorResponse),
        (status = 403, description = "Staff only", body = ErrorResponse),
        (status = 404, description = "Course not found", body = ErrorResponse)
    )
)]
#[instrument(skip(state, auth, request))]
pub async fn update_course(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(course_id): Path<i32>,
    Json(request): Json<UpdateCourseRequest>,
) -> Result<Json<ApiResponse<CourseResponse>>, ApiError> {
    trace!("Entering update_course function for course_id: {}", course_id);
    auth.require_staff()?;
    request.validate().map_err(validation_error)?;

    let changes = CourseChanges {
        teacher_id: request.teacher_id,
        name: request.name,
        description: request.description,
        price: request.price,
        image: request.image,
    };

    match services::courses::update_course(&state.db, course_id, changes).await {
        Ok(course) => {
            info!("Course {} updated successfully", course.id);
            Ok(ApiResponse::ok(CourseResponse::from(course), "Course updated successfully"))
        }
        Err(e) => Err(service_error(e)),
    }
}

/// Delete a course together with its contents, comments and completions
#[utoipa::path(
    delete,
    path = "/api/v1/courses/{course_id}",
    tag = "courses",
    params(("course_id" = i32, Path, description = "Course ID")),
    responses(
        (status = 200, description = "Course deleted successfully", body = ApiResponse<CourseResponse>),
        (status = 403, description = "Staff only", body = ErrorResponse),
        (status = 404, description = "Course not found", body = ErrorResponse),
        (status = 409, description = "Course still has members", body = ErrorResponse)
    )
)]
#[instrument(skip(state, auth))]
pub async fn delete_course(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(course_id): Path<i32>,
) -> Result<Json<ApiResponse<CourseResponse>>, ApiError> {
    trace!("Entering delete_course function for course_id: {}", course_id);
    auth.require_staff()?;

    match services::courses::delete_course(&state.db, course_id).await {
        Ok(course) => {
            info!("Course {} deleted by user {}", course.id, auth.0.id);
            Ok(ApiResponse::ok(CourseResponse::from(course), "Course deleted successfully"))
        }
        Err(e) => Err(service_error(e)),
    }
}
