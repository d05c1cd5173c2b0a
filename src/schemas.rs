use axum::{http::StatusCode, response::Json};
use moka::future::Cache;
use sea_orm::DatabaseConnection;
use serde::{Deserialize, Deserializer, Serialize};
use services::ServiceError;
use services::dashboard::PlatformStats;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, warn};
use utoipa::{OpenApi, ToSchema};
use validator::ValidationErrors;

use crate::auth::AuthKeys;
use crate::handlers::{
    auth::{AccessTokenResponse, RefreshRequest, SignInRequest, TokenPairResponse},
    comments::{CommentResponse, CreateCommentRequest, UpdateCommentRequest},
    completions::CompletionResponse,
    contents::{
        CommentView, ContentDetailResponse, ContentResponse, CourseContentsResponse,
        CreateContentRequest, ImportResponse, StudentResponse, UpdateContentRequest,
    },
    courses::{
        CourseDetailResponse, CourseListItem, CourseResponse, CreateCourseRequest,
        PublicCourseResponse, TeacherResponse, UpdateCourseRequest,
    },
    dashboard::{
        CompletedContentResponse, DashboardCourse, DashboardResponse, HomeResponse, StatsResponse,
    },
    demo::{CalcRequest, CalcResponse, HelloForm},
    members::{ExitResponse, MemberResponse, MyCourseResponse},
    users::{CreateUserRequest, RegisterRequest, UpdateUserRequest, UserResponse},
};
use crate::throttle::Throttles;

/// Application state shared across handlers
#[derive(Clone, Debug)]
pub struct AppState {
    /// Database connection
    pub db: DatabaseConnection,
    /// Cache for expensive operations
    pub cache: Cache<String, CachedData>,
    /// JWT signing keys
    pub auth: Arc<AuthKeys>,
    /// Rate limiters
    pub throttles: Arc<Throttles>,
    pub request_timeout: Duration,
}

/// Cached data types
#[derive(Clone, Debug)]
pub enum CachedData {
    Stats(PlatformStats),
}

/// API response wrapper
#[derive(Serialize, Deserialize, ToSchema)]
pub struct ApiResponse<T> {
    /// Response data
    pub data: T,
    /// Response message
    pub message: String,
    /// Success status
    pub success: bool,
}

impl<T> ApiResponse<T> {
    pub fn ok(data: T, message: impl Into<String>) -> Json<Self> {
        Json(Self {
            data,
            message: message.into(),
            success: true,
        })
    }
}

/// Error response
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ErrorResponse {
    /// Error message
    pub error: String,
    /// Error code
    pub code: String,
    /// Success status (always false for errors)
    pub success: bool,
}

/// Health check response
#[derive(Serialize, ToSchema)]
pub struct HealthResponse {
    /// Service status
    pub status: String,
    /// Service version
    pub version: String,
    /// Database connection status
    pub database: String,
}

/// Error half of every handler result
pub type ApiError = (StatusCode, Json<ErrorResponse>);

pub fn error_response(status: StatusCode, code: &str, message: &str) -> ApiError {
    (
        status,
        Json(ErrorResponse {
            error: message.to_string(),
            code: code.to_string(),
            success: false,
        }),
    )
}

/// Maps a service failure onto its HTTP status and stable error code.
pub fn service_error(err: ServiceError) -> ApiError {
    let (status, code) = match &err {
        ServiceError::Database(db_err) => {
            error!("Database error: {}", db_err);
            return error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                "DATABASE_ERROR",
                "Internal server error",
            );
        }
        ServiceError::NotFound(_) => (StatusCode::NOT_FOUND, "NOT_FOUND"),
        ServiceError::Forbidden(_) => (StatusCode::FORBIDDEN, "FORBIDDEN"),
        ServiceError::Conflict(_) => (StatusCode::CONFLICT, "CONFLICT"),
        ServiceError::Validation(_) => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR"),
        ServiceError::AlreadyEnrolled(_) => (StatusCode::BAD_REQUEST, "ALREADY_ENROLLED"),
        ServiceError::UsernameTaken(_) => (StatusCode::BAD_REQUEST, "USERNAME_TAKEN"),
        ServiceError::CannotDeleteSelf => (StatusCode::BAD_REQUEST, "CANNOT_DELETE_SELF"),
        ServiceError::Import(_) => (StatusCode::BAD_REQUEST, "IMPORT_FAILED"),
    };
    warn!("Request rejected with {}: {}", code, err);
    error_response(status, code, &err.to_string())
}

/// Flattens validator output into `field: message` pairs, sorted by field.
pub fn validation_error(errors: ValidationErrors) -> ApiError {
    let mut messages: Vec<String> = errors
        .field_errors()
        .into_iter()
        .flat_map(|(field, errs)| {
            errs.iter().map(move |e| {
                let message = e
                    .message
                    .as_ref()
                    .map(|m| m.to_string())
                    .unwrap_or_else(|| e.code.to_string());
                format!("{}: {}", field, message)
            })
        })
        .collect();
    messages.sort();
    warn!("Validation failed: {:?}", messages);
    error_response(StatusCode::BAD_REQUEST, "VALIDATION_ERROR", &messages.join("; "))
}

/// Distinguishes an absent field (`None`) from an explicit `null` (`Some(None)`).
pub fn double_option<'de, T, D>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    T: Deserialize<'de>,
    D: Deserializer<'de>,
{
    Deserialize::deserialize(deserializer).map(Some)
}

/// OpenAPI documentation
#[derive(OpenApi)]
#[openapi(
    paths(
        crate::handlers::health::health_check,
        crate::handlers::auth::sign_in,
        crate::handlers::auth::token_refresh,
        crate::handlers::demo::hello,
        crate::handlers::demo::hello_post,
        crate::handlers::demo::calc_path,
        crate::handlers::demo::calc_post,
        crate::handlers::users::register,
        crate::handlers::users::get_users,
        crate::handlers::users::create_user,
        crate::handlers::users::get_user,
        crate::handlers::users::update_user,
        crate::handlers::users::delete_user,
        crate::handlers::courses::list_public_courses,
        crate::handlers::courses::list_courses,
        crate::handlers::courses::create_course,
        crate::handlers::courses::get_course,
        crate::handlers::courses::update_course,
        crate::handlers::courses::delete_course,
        crate::handlers::members::enroll,
        crate::handlers::members::exit_course,
        crate::handlers::members::my_courses,
        crate::handlers::members::list_members,
        crate::handlers::contents::list_all_contents,
        crate::handlers::contents::list_course_contents,
        crate::handlers::contents::get_course_content,
        crate::handlers::contents::create_content,
        crate::handlers::contents::update_content,
        crate::handlers::contents::delete_content,
        crate::handlers::contents::import_contents,
        crate::handlers::comments::list_comments,
        crate::handlers::comments::create_comment,
        crate::handlers::comments::update_comment,
        crate::handlers::comments::delete_comment,
        crate::handlers::completions::complete_content,
        crate::handlers::dashboard::home,
        crate::handlers::dashboard::dashboard,
        crate::handlers::dashboard::stats,
    ),
    components(
        schemas(
            ErrorResponse,
            HealthResponse,
            SignInRequest,
            TokenPairResponse,
            RefreshRequest,
            AccessTokenResponse,
            HelloForm,
            CalcRequest,
            CalcResponse,
            RegisterRequest,
            CreateUserRequest,
            UpdateUserRequest,
            UserResponse,
            CourseResponse,
            TeacherResponse,
            PublicCourseResponse,
            CourseListItem,
            CourseDetailResponse,
            CreateCourseRequest,
            UpdateCourseRequest,
            MemberResponse,
            MyCourseResponse,
            ExitResponse,
            ContentResponse,
            StudentResponse,
            CommentView,
            CourseContentsResponse,
            ContentDetailResponse,
            CreateContentRequest,
            UpdateContentRequest,
            ImportResponse,
            CommentResponse,
            CreateCommentRequest,
            UpdateCommentRequest,
            CompletionResponse,
            HomeResponse,
            DashboardCourse,
            CompletedContentResponse,
            DashboardResponse,
            StatsResponse,
        )
    ),
    tags(
        (name = "health", description = "Health check endpoints"),
        (name = "auth", description = "JWT sign-in and token refresh"),
        (name = "demo", description = "Greeting and calculator endpoints"),
        (name = "users", description = "Registration and user administration"),
        (name = "courses", description = "Course catalogue and management"),
        (name = "members", description = "Course enrollment"),
        (name = "contents", description = "Course contents and CSV import"),
        (name = "comments", description = "Comments on course contents"),
        (name = "completions", description = "Content completion tracking"),
        (name = "dashboard", description = "Home, dashboard and platform statistics"),
    ),
    info(
        title = "LMS API",
        description = "Learning management API - courses, enrollment, contents, comments and completion tracking",
        version = "0.1.0",
        license(
            name = "MIT",
            url = "https://opensource.org/licenses/MIT"
        )
    )
)]
pub struct ApiDoc;

#[cfg(test)]
mod tests {
    use super::*;
    use validator::Validate;

    #[derive(Validate)]
    struct Sample {
        #[validate(length(min = 5, message = "too short"))]
        name: String,
        #[validate(email)]
        email: String,
    }

    #[test]
    fn test_service_error_mapping() {
        let cases = [
            (ServiceError::NotFound("x".into()), StatusCode::NOT_FOUND, "NOT_FOUND"),
            (ServiceError::Forbidden("x".into()), StatusCode::FORBIDDEN, "FORBIDDEN"),
            (ServiceError::Conflict("x".into()), StatusCode::CONFLICT, "CONFLICT"),
            (ServiceError::AlreadyEnrolled("Rust".into()), StatusCode::BAD_REQUEST, "ALREADY_ENROLLED"),
            (ServiceError::CannotDeleteSelf, StatusCode::BAD_REQUEST, "CANNOT_DELETE_SELF"),
            (ServiceError::Import("bad".into()), StatusCode::BAD_REQUEST, "IMPORT_FAILED"),
        ];
        for (err, status, code) in cases {
            let (got_status, Json(body)) = service_error(err);
            assert_eq!(got_status, status);
            assert_eq!(body.code, code);
            assert!(!body.success);
        }

        let (status, Json(body)) = service_error(ServiceError::Database(sea_orm::DbErr::Custom(
            "secret detail".into(),
        )));
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(!body.error.contains("secret detail"));
    }

    #[test]
    fn test_validation_error_lists_fields() {
        let sample = Sample {
            name: "abc".to_string(),
            email: "nope".to_string(),
        };
        let (status, Json(body)) = validation_error(sample.validate().unwrap_err());
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body.code, "VALIDATION_ERROR");
        assert_eq!(body.error, "email: email; name: too short");
    }

    #[test]
    fn test_double_option() {
        #[derive(Deserialize)]
        struct Patch {
            #[serde(default, deserialize_with = "double_option")]
            parent_id: Option<Option<i32>>,
        }
        let absent: Patch = serde_json::from_str("{}").unwrap();
        let cleared: Patch = serde_json::from_str(r#"{"parent_id": null}"#).unwrap();
        let set: Patch = serde_json::from_str(r#"{"parent_id": 3}"#).unwrap();
        assert_eq!(absent.parent_id, None);
        assert_eq!(cleared.parent_id, Some(None));
        assert_eq!(set.parent_id, Some(Some(3)));
    }
}
