use crate::auth::AuthUser;
use crate::schemas::{ApiError, ApiResponse, AppState, service_error, validation_error};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::Json,
};
use axum_valid::Valid;
use chrono::NaiveDateTime;
use common::Page;
use model::entities::user;
use serde::{Deserialize, Serialize};
use services::users::{NewUser, UserChanges};
use tracing::{debug, info, instrument, trace};
use utoipa::{IntoParams, ToSchema};
use validator::{Validate, ValidationError};

/// Passwords need at least one letter and one digit.
fn validate_password(password: &str) -> Result<(), ValidationError> {
    let has_letter = password.chars().any(|c| c.is_alphabetic());
    let has_digit = password.chars().any(|c| c.is_ascii_digit());
    if has_letter && has_digit {
        Ok(())
    } else {
        let mut err = ValidationError::new("password_strength");
        err.message = Some("Password must contain at least one letter and one digit".into());
        Err(err)
    }
}

/// Self-registration payload
#[derive(Debug, Deserialize, Serialize, ToSchema, Validate)]
pub struct RegisterRequest {
    /// At least 5 characters
    #[validate(length(min = 5, max = 150, message = "Username must be between 5 and 150 characters"))]
    pub username: String,
    /// At least 8 characters with a letter and a digit
    #[validate(
        length(min = 8, message = "Password must be at least 8 characters"),
        custom(function = "validate_password")
    )]
    pub password: String,
    #[validate(email(message = "Enter a valid email address"))]
    pub email: String,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
}

/// Request body for creating a user as staff
#[derive(Debug, Deserialize, Serialize, ToSchema, Validate)]
pub struct CreateUserRequest {
    #[validate(length(min = 1, max = 150))]
    pub username: String,
    #[validate(length(min = 8, message = "Password must be at least 8 characters"))]
    pub password: String,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    #[validate(email(message = "Enter a valid email address"))]
    pub email: String,
    #[serde(default)]
    pub is_staff: bool,
}

/// Request body for updating a user. The username cannot be changed.
#[derive(Debug, Deserialize, Serialize, ToSchema, Validate)]
pub struct UpdateUserRequest {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    #[validate(email(message = "Enter a valid email address"))]
    pub email: Option<String>,
    pub is_active: Option<bool>,
    pub is_staff: Option<bool>,
}

/// User response model
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct UserResponse {
    pub id: i32,
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub is_staff: bool,
    pub is_superuser: bool,
    pub is_active: bool,
    pub date_joined: NaiveDateTime,
}

impl From<user::Model> for UserResponse {
    fn from(model: user::Model) -> Self {
        Self {
            id: model.id,
            username: model.username,
            first_name: model.first_name,
            last_name: model.last_name,
            email: model.email,
            is_staff: model.is_staff,
            is_superuser: model.is_superuser,
            is_active: model.is_active,
            date_joined: model.date_joined,
        }
    }
}

/// Query parameters of the user listing
#[derive(Debug, Deserialize, IntoParams, Validate)]
pub struct UserListQuery {
    /// Case-insensitive match on username, names or email
    pub search: Option<String>,
    /// Page number (default: 1)
    #[validate(range(min = 1, max = 100000))]
    pub page: Option<u64>,
}

/// Register a new account
#[utoipa::path(
    post,
    path = "/api/v1/register",
    tag = "users",
    request_body = RegisterRequest,
    responses(
        (status = 201, description = "Account created", body = ApiResponse<UserResponse>),
        (status = 400, description = "Invalid data or username taken", body = ErrorResponse),
        (status = 429, description = "Throttled", body = ErrorResponse)
    )
)]
#[instrument(skip(state, request), fields(username = %request.username))]
pub async fn register(
    State(state): State<AppState>,
    Json(request): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<ApiResponse<UserResponse>>), ApiError> {
    trace!("Entering register function");
    request.validate().map_err(validation_error)?;

    let new_user = NewUser {
        username: request.username,
        password: request.password,
        email: request.email,
        first_name: request.first_name,
        last_name: request.last_name,
        ..Default::default()
    };

    match services::users::create_user(&state.db, new_user).await {
        Ok(user) => {
            info!("Registered user {} with ID {}", user.username, user.id);
            Ok((
                StatusCode::CREATED,
                ApiResponse::ok(UserResponse::from(user), "Registration successful"),
            ))
        }
        Err(e) => Err(service_error(e)),
    }
}

/// List users
#[utoipa::path(
    get,
    path = "/api/v1/users",
    tag = "users",
    params(UserListQuery),
    responses(
        (status = 200, description = "One page of users", body = ApiResponse<Page<UserResponse>>),
        (status = 401, description = "Not authenticated", body = ErrorResponse),
        (status = 403, description = "Staff only", body = ErrorResponse)
    )
)]
#[instrument(skip(state, auth))]
pub async fn get_users(
    State(state): State<AppState>,
    auth: AuthUser,
    Valid(Query(query)): Valid<Query<UserListQuery>>,
) -> Result<Json<ApiResponse<Page<UserResponse>>>, ApiError> {
    trace!("Entering get_users function");
    auth.require_staff()?;

    let search = query.search.as_deref().map(str::trim).filter(|s| !s.is_empty());
    let page = query.page.unwrap_or(1).max(1);

    match services::users::list_users(&state.db, search, page).await {
        Ok(users) => {
            debug!("Returning {} of {} users", users.items.len(), users.count);
            Ok(ApiResponse::ok(users.map(UserResponse::from), "Users retrieved successfully"))
        }
        Err(e) => Err(service_error(e)),
    }
}

/// Create a user
#[utoipa::path(
    post,
    path = "/api/v1/users",
    tag = "users",
    request_body = CreateUserRequest,
    responses(
        (status = 201, description = "User created successfully", body = ApiResponse<UserResponse>),
        (status = 400, description = "Invalid request", body = ErrorResponse),
        (status = 403, description = "Staff only", body = ErrorResponse)
    )
)]
#[instrument(skip(state, auth, request), fields(username = %request.username))]
pub async fn create_user(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(request): Json<CreateUserRequest>,
) -> Result<(StatusCode, Json<ApiResponse<UserResponse>>), ApiError> {
    trace!("Entering create_user function");
    auth.require_staff()?;
    request.validate().map_err(validation_error)?;

    let new_user = NewUser {
        username: request.username,
        password: request.password,
        email: request.email,
        first_name: request.first_name,
        last_name: request.last_name,
        is_staff: request.is_staff,
        is_superuser: false,
    };

    match services::users::create_user(&state.db, new_user).await {
        Ok(user) => {
            info!("User created successfully with ID: {}, username: {}", user.id, user.username);
            Ok((
                StatusCode::CREATED,
                ApiResponse::ok(UserResponse::from(user), "User created successfully"),
            ))
        }
        Err(e) => Err(service_error(e)),
    }
}

/// Get a user by ID
#[utoipa::path(
    get,
    path = "/api/v1/users/{user_id}",
    tag = "users",
    params(("user_id" = i32, Path, description = "User ID")),
    responses(
        (status = 200, description = "User found", body = ApiResponse<UserResponse>),
        (status = 403, description = "Staff only", body = ErrorResponse),
        (status = 404, description = "User not found", body = ErrorResponse)
    )
)]
#[instrument(skip(state, auth))]
pub async fn get_user(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(user_id): Path<i32>,
) -> Result<Json<ApiResponse<UserResponse>>, ApiError> {
    trace!("Entering get_user function for user_id: {}", user_id);
    auth.require_staff()?;

    match services::users::get_user(&state.db, user_id).await {
        Ok(user) => Ok(ApiResponse::ok(UserResponse::from(user), "User retrieved successfully")),
        Err(e) => Err(service_error(e)),
    }
}

/// Update a user
#[utoipa::path(
    put,
    path = "/api/v1/users/{user_id}",
    tag = "users",
    params(("user_id" = i32, Path, description = "User ID")),
    request_body = UpdateUserRequest,
    responses(
        (status = 200, description = "User updated successfully", body = ApiResponse<UserResponse>),
        (status = 400, description = "Invalid request", body = ErrorResponse),
        (status = 403, description = "Not allowed to edit this user", body = ErrorResponse),
        (status = 404, description = "User not found", body = ErrorResponse)
    )
)]
#[instrument(skip(state, auth, request))]
pub async fn update_user(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(user_id): Path<i32>,
    Json(request): Json<UpdateUserRequest>,
) -> Result<Json<ApiResponse<UserResponse>>, ApiError> {
    trace!("Entering update_user function for user_id: {}", user_id);
    auth.require_staff()?;
    request.validate().map_err(validation_error)?;

    let changes = UserChanges {
        first_name: request.first_name,
        last_name: request.last_name,
        email: request.email,
        is_active: request.is_active,
        is_staff: request.is_staff,
    };

    match services::users::update_user(&state.db, &auth.0, user_id, changes).await {
        Ok(user) => {
            info!("User {} updated by {}", user.id, auth.0.id);
            Ok(ApiResponse::ok(UserResponse::from(user), "User updated successfully"))
        }
        Err(e) => Err(service_error(e)),
    }
}

/// Delete a user
#[utoipa::path(
    delete,
    path = "/api/v1/users/{user_id}",
    tag = "users",
    params(("user_id" = i32, Path, description = "User ID")),
    responses(
        (status = 200, description = "User deleted successfully", body = ApiResponse<UserResponse>),
        (status = 400, description = "Cannot delete your own account", body = ErrorResponse),
        (status = 403, description = "Not allowed to delete this user", body = ErrorResponse),
        (status = 404, description = "User not found", body = ErrorResponse),
        (status = 409, description = "User still teaches or attends a course", body = ErrorResponse)
    )
)]
#[instrument(skip(state, auth))]
pub async fn delete_user(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(user_id): Path<i32>,
) -> Result<Json<ApiResponse<UserResponse>>, ApiError> {
    trace!("Entering delete_user function for user_id: {}", user_id);
    auth.require_staff()?;

    match services::users::delete_user(&state.db, &auth.0, user_id).await {
        Ok(user) => {
            info!("User {} deleted by {}", user.id, auth.0.id);
            Ok(ApiResponse::ok(UserResponse::from(user), "User deleted successfully"))
        }
        Err(e) => Err(service_error(e)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn register_request(username: &str, password: &str, email: &str) -> RegisterRequest {
        RegisterRequest {
            username: username.to_string(),
            password: password.to_string(),
            email: email.to_string(),
            first_name: String::new(),
            last_name: String::new(),
        }
    }

    #[test]
    fn test_register_validation() {
        assert!(register_request("student1", "secret123", "s1@example.com").validate().is_ok());

        let errors = register_request("abc", "secret123", "s1@example.com").validate().unwrap_err();
        assert!(errors.field_errors().contains_key("username"));

        let errors = register_request("student1", "onlyletters", "s1@example.com").validate().unwrap_err();
        assert!(errors.field_errors().contains_key("password"));

        let errors = register_request("student1", "12345678", "s1@example.com").validate().unwrap_err();
        assert!(errors.field_errors().contains_key("password"));

        let errors = register_request("student1", "secret123", "not-an-email").validate().unwrap_err();
        assert!(errors.field_errors().contains_key("email"));
    }
}
