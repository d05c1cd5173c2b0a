use crate::auth::AuthUser;
use crate::schemas::{ApiError, ApiResponse, AppState, double_option, service_error, validation_error};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::Json,
};
use chrono::NaiveDateTime;
use model::entities::{course_content, course_member, user};
use serde::{Deserialize, Serialize};
use services::comments::CommentWithAuthor;
use services::contents::{ContentChanges, ContentInput};
use tracing::{debug, info, instrument, trace, warn};
use utoipa::ToSchema;
use validator::Validate;

use super::courses::CourseResponse;

/// Content response model
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ContentResponse {
    pub id: i32,
    pub course_id: i32,
    pub name: String,
    pub description: String,
    pub video_url: Option<String>,
    pub file_attachment: Option<String>,
    pub parent_id: Option<i32>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

impl From<course_content::Model> for ContentResponse {
    fn from(model: course_content::Model) -> Self {
        Self {
            id: model.id,
            course_id: model.course_id,
            name: model.name,
            description: model.description,
            video_url: model.video_url,
            file_attachment: model.file_attachment,
            parent_id: model.parent_id,
            created_at: model.created_at,
            updated_at: model.updated_at,
        }
    }
}

/// A student of a course
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct StudentResponse {
    pub member_id: i32,
    pub user_id: i32,
    pub username: String,
    pub full_name: String,
}

impl From<(course_member::Model, user::Model)> for StudentResponse {
    fn from((member, user): (course_member::Model, user::Model)) -> Self {
        Self {
            member_id: member.id,
            user_id: user.id,
            full_name: user.full_name(),
            username: user.username,
        }
    }
}

/// A comment shown under a content item
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct CommentView {
    pub id: i32,
    pub user_id: i32,
    pub username: String,
    pub comment: String,
    pub created_at: NaiveDateTime,
}

impl From<CommentWithAuthor> for CommentView {
    fn from(item: CommentWithAuthor) -> Self {
        Self {
            id: item.comment.id,
            user_id: item.user_id,
            username: item.username,
            comment: item.comment.comment,
            created_at: item.comment.created_at,
        }
    }
}

/// A course with its contents and students
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct CourseContentsResponse {
    pub course: CourseResponse,
    pub contents: Vec<ContentResponse>,
    pub is_member: bool,
    pub students: Vec<StudentResponse>,
    pub student_count: usize,
}

/// One content item with its comments
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ContentDetailResponse {
    pub course: CourseResponse,
    pub content: ContentResponse,
    /// Newest first
    pub comments: Vec<CommentView>,
    /// Whether the caller has completed this content
    pub completed: bool,
}

/// Request body for creating a content item
#[derive(Debug, Deserialize, Serialize, ToSchema, Validate)]
pub struct CreateContentRequest {
    #[validate(length(min = 1, max = 200))]
    pub name: String,
    pub description: Option<String>,
    #[validate(length(max = 200))]
    pub video_url: Option<String>,
    pub file_attachment: Option<String>,
    /// Parent content in the same course
    pub parent_id: Option<i32>,
}

/// Request body for updating a content item. `null` clears an optional field.
#[derive(Debug, Deserialize, Serialize, ToSchema, Validate)]
pub struct UpdateContentRequest {
    #[validate(length(min = 1, max = 200))]
    pub name: Option<String>,
    pub description: Option<String>,
    #[serde(default, deserialize_with = "double_option")]
    #[schema(value_type = Option<String>)]
    pub video_url: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    #[schema(value_type = Option<String>)]
    pub file_attachment: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    #[schema(value_type = Option<i32>)]
    pub parent_id: Option<Option<i32>>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ImportResponse {
    pub imported: u64,
}

/// List every content item
#[utoipa::path(
    get,
    path = "/api/v1/contents",
    tag = "contents",
    responses(
        (status = 200, description = "All contents", body = ApiResponse<Vec<ContentResponse>>),
        (status = 401, description = "Not authenticated", body = ErrorResponse),
        (status = 403, description = "Staff only", body = ErrorResponse)
    )
)]
#[instrument(skip(state, auth))]
pub async fn list_all_contents(
    State(state): State<AppState>,
    auth: AuthUser,
) -> Result<Json<ApiResponse<Vec<ContentResponse>>>, ApiError> {
    trace!("Entering list_all_contents function");
    auth.require_staff()?;

    match services::contents::list_all(&state.db).await {
        Ok(contents) => {
            debug!("Returning {} contents", contents.len());
            let data = contents.into_iter().map(ContentResponse::from).collect();
            Ok(ApiResponse::ok(data, "Contents retrieved successfully"))
        }
        Err(e) => Err(service_error(e)),
    }
}

/// Contents and students of a course
#[utoipa::path(
    get,
    path = "/api/v1/courses/{course_id}/contents",
    tag = "contents",
    params(("course_id" = i32, Path, description = "Course ID")),
    responses(
        (status = 200, description = "Course contents", body = ApiResponse<CourseContentsResponse>),
        (status = 403, description = "Not a member of the course", body = ErrorResponse),
        (status = 404, description = "Course not found", body = ErrorResponse)
    )
)]
#[instrument(skip(state, auth), fields(user_id = auth.0.id))]
pub async fn list_course_contents(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(course_id): Path<i32>,
) -> Result<Json<ApiResponse<CourseContentsResponse>>, ApiError> {
    trace!("Entering list_course_contents function for course_id: {}", course_id);

    let access = services::contents::check_access(&state.db, &auth.0, course_id)
        .await
        .map_err(service_error)?;
    let contents = services::contents::list_for_course(&state.db, course_id)
        .await
        .map_err(service_error)?;
    let students = services::contents::students_of(&state.db, course_id)
        .await
        .map_err(service_error)?;

    debug!("Course {} has {} contents and {} students", course_id, contents.len(), students.len());
    let response = CourseContentsResponse {
        course: CourseResponse::from(access.course),
        contents: contents.into_iter().map(ContentResponse::from).collect(),
        is_member: access.membership.is_some(),
        student_count: students.len(),
        students: students.into_iter().map(StudentResponse::from).collect(),
    };
    Ok(ApiResponse::ok(response, "Contents retrieved successfully"))
}

/// One content item with its comments
#[utoipa::path(
    get,
    path = "/api/v1/courses/{course_id}/contents/{content_id}",
    tag = "contents",
    params(
        ("course_id" = i32, Path, description = "Course ID"),
        ("content_id" = i32, Path, description = "Content ID"),
    ),
    responses(
        (status = 200, description = "Content found", body = ApiResponse<ContentDetailResponse>),
        (status = 403, description = "Not a member of the course", body = ErrorResponse),
        (status = 404, description = "Course or content not found", body = ErrorResponse)
    )
)]
#[instrument(skip(state, auth), fields(user_id = auth.0.id))]
pub async fn get_course_content(
    State(state): State<AppState>,
    auth: AuthUser,
    Path((course_id, content_id)): Path<(i32, i32)>,
) -> Result<Json<ApiResponse<ContentDetailResponse>>, ApiError> {
    trace!("Entering get_course_content function for content {} in course {}", content_id, course_id);

    let access = services::contents::check_access(&state.db, &auth.0, course_id)
        .await
        .map_err(service_error)?;
    let content = services::contents::get_in_course(&state.db, course_id, content_id)
        .await
        .map_err(service_error)?;
    let comments = services::comments::comments_for_content(&state.db, content.id)
        .await
        .map_err(service_error)?;
    let completed = services::completion::is_completed(&state.db, auth.0.id, content.id)
        .await
        .map_err(service_error)?;

    let response = ContentDetailResponse {
        course: CourseResponse::from(access.course),
        content: ContentResponse::from(content),
        comments: comments.into_iter().map(CommentView::from).collect(),
        completed,
    };
    Ok(ApiResponse::ok(response, "Content retrieved successfully"))
}

/// Add a content item to a course
#[utoipa::path(
    post,
    path = "/api/v1/courses/{course_id}/contents",
    tag = "contents",
    params(("course_id" = i32, Path, description = "Course ID")),
    request_body = CreateContentRequest,
    responses(
        (status = 201, description = "Content created successfully", body = ApiResponse<ContentResponse>),
        (status = 400, description = "Invalid request or parent", body = ErrorResponse),
        (status = 403, description = "Not the course teacher", body = ErrorResponse),
        (status = 404, description = "Course not found", body = ErrorResponse)
    )
)]
#[instrument(skip(state, auth, request), fields(user_id = auth.0.id))]
pub async fn create_content(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(course_id): Path<i32>,
    Json(request): Json<CreateContentRequest>,
) -> Result<(StatusCode, Json<ApiResponse<ContentResponse>>), ApiError> {
    trace!("Entering create_content function for course_id: {}", course_id);
    request.validate().map_err(validation_error)?;

    let course = services::contents::managed_course(&state.db, &auth.0, course_id)
        .await
        .map_err(service_error)?;

    let input = ContentInput {
        name: request.name,
        description: request.description,
        video_url: request.video_url,
        file_attachment: request.file_attachment,
        parent_id: request.parent_id,
    };

    match services::contents::create_content(&state.db, &course, input).await {
        Ok(content) => {
            info!("Content created successfully with ID: {}", content.id);
            Ok((
                StatusCode::CREATED,
                ApiResponse::ok(ContentResponse::from(content), "Content created successfully"),
            ))
        }
        Err(e) => Err(service_error(e)),
    }
}

/// Update a content item
#[utoipa::path(
    put,
    path = "/api/v1/courses/{course_id}/contents/{content_id}",
    tag = "contents",
    params(
        ("course_id" = i32, Path, description = "Course ID"),
        ("content_id" = i32, Path, description = "Content ID"),
    ),
    request_body = UpdateContentRequest,
    responses(
        (status = 200, description = "Content updated successfully", body = ApiResponse<ContentResponse>),
        (status = 400, description = "Invalid request or parent", body = ErrorResponse),
        (status = 403, description = "Not the course teacher", body = ErrorResponse),
        (status = 404, description = "Course or content not found", body = ErrorResponse)
    )
)]
#[instrument(skip(state, auth, request), fields(user_id = auth.0.id))]
pub async fn update_content(
    State(state): State<AppState>,
    auth: AuthUser,
    Path((course_id, content_id)): Path<(i32, i32)>,
    Json(request): Json<UpdateContentRequest>,
) -> Result<Json<ApiResponse<ContentResponse>>, ApiError> {
    trace!("Entering update_content function for content {} in course {}", content_id, course_id);
    request.validate().map_err(validation_error)?;

    services::contents::managed_course(&state.db, &auth.0, course_id)
        .await
        .map_err(service_error)?;

    let changes = ContentChanges {
        name: request.name,
        description: request.description,
        video_url: request.video_url,
        file_attachment: request.file_attachment,
        parent_id: request.parent_id,
    };

    match services::contents::update_content(&state.db, course_id, content_id, changes).await {
        Ok(content) => {
            info!("Content {} updated successfully", content.id);
            Ok(ApiResponse::ok(ContentResponse::from(content), "Content updated successfully"))
        }
        Err(e) => Err(service_error(e)),
    }
}

/// Delete a content item
#[utoipa::path(
    delete,
    path = "/api/v1/courses/{course_id}/contents/{content_id}",
    tag = "contents",
    params(
        ("course_id" = i32, Path, description = "Course ID"),
        ("content_id" = i32, Path, description = "Content ID"),
    ),
    responses(
        (status = 200, description = "Content deleted successfully", body = ApiResponse<ContentResponse>),
        (status = 403, description = "Not the course teacher", body = ErrorResponse),
        (status = 404, description = "Course or content not found", body = ErrorResponse),
        (status = 409, description = "Other contents are nested under it", body = ErrorResponse)
    )
)]
#[instrument(skip(state, auth), fields(user_id = auth.0.id))]
pub async fn delete_content(
    State(state): State<AppState>,
    auth: AuthUser,
    Path((course_id, content_id)): Path<(i32, i32)>,
) -> Result<Json<ApiResponse<ContentResponse>>, ApiError> {
    trace!("Entering delete_content function for content {} in course {}", content_id, course_id);

    services::contents::managed_course(&state.db, &auth.0, course_id)
        .await
        .map_err(service_error)?;

    match services::contents::delete_content(&state.db, course_id, content_id).await {
        Ok(content) => {
            info!("Content {} deleted successfully", content.id);
            Ok(ApiResponse::ok(ContentResponse::from(content), "Content deleted successfully"))
        }
        Err(e) => Err(service_error(e)),
    }
}

/// Import contents from CSV
///
/// The body is CSV text whose header names `name`, `description` and `video_url`.
/// Either every row is imported or none is.
#[utoipa::path(
    post,
    path = "/api/v1/courses/{course_id}/contents/import",
    tag = "contents",
    params(("course_id" = i32, Path, description = "Course ID")),
    request_body(content = String, content_type = "text/csv"),
    responses(
        (status = 201, description = "All rows imported", body = ApiResponse<ImportResponse>),
        (status = 400, description = "Header or row errors; nothing imported", body = ErrorResponse),
        (status = 403, description = "Not the course teacher", body = ErrorResponse),
        (status = 404, description = "Course not found", body = ErrorResponse)
    )
)]
#[instrument(skip(state, auth, body), fields(user_id = auth.0.id, bytes = body.len()))]
pub async fn import_contents(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(course_id): Path<i32>,
    body: String,
) -> Result<(StatusCode, Json<ApiResponse<ImportResponse>>), ApiError> {
    trace!("Entering import_contents function for course_id: {}", course_id);

    let course = services::contents::managed_course(&state.db, &auth.0, course_id)
        .await
        .map_err(service_error)?;

    let outcome = services::importer::import_csv(&state.db, &course, body.as_bytes())
        .await
        .map_err(service_error)?;

    match outcome.into_result() {
        Ok(imported) => {
            info!("Imported {} contents into course {}", imported, course.id);
            Ok((
                StatusCode::CREATED,
                ApiResponse::ok(
                    ImportResponse { imported },
                    format!("Successfully imported {} contents", imported),
                ),
            ))
        }
        Err(e) => {
            warn!("Import into course {} failed", course.id);
            Err(service_error(e))
        }
    }
}
