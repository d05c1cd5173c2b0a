use crate::auth::AuthUser;
use crate::schemas::{ApiError, ApiResponse, AppState, service_error};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::Json,
};
use chrono::NaiveDateTime;
use model::entities::comment;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, trace};
use utoipa::{IntoParams, ToSchema};

/// Comment response model
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct CommentResponse {
    pub id: i32,
    pub content_id: i32,
    pub member_id: i32,
    pub comment: String,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

impl From<comment::Model> for CommentResponse {
    fn from(model: comment::Model) -> Self {
        Self {
            id: model.id,
            content_id: model.content_id,
            member_id: model.member_id,
            comment: model.comment,
            created_at: model.created_at,
            updated_at: model.updated_at,
        }
    }
}

#[derive(Debug, Deserialize, Serialize, ToSchema)]
pub struct CreateCommentRequest {
    pub content_id: i32,
    pub comment: String,
}

#[derive(Debug, Deserialize, Serialize, ToSchema)]
pub struct UpdateCommentRequest {
    pub comment: String,
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct CommentQuery {
    /// Only comments on this content item
    pub content_id: Option<i32>,
}

/// List comments visible to the caller
#[utoipa::path(
    get,
    path = "/api/v1/comments",
    tag = "comments",
    params(CommentQuery),
    responses(
        (status = 200, description = "Comments", body = ApiResponse<Vec<CommentResponse>>),
        (status = 401, description = "Not authenticated", body = ErrorResponse)
    )
)]
#[instrument(skip(state, auth), fields(user_id = auth.0.id))]
pub async fn list_comments(
    State(state): State<AppState>,
    auth: AuthUser,
    Query(query): Query<CommentQuery>,
) -> Result<Json<ApiResponse<Vec<CommentResponse>>>, ApiError> {
    trace!("Entering list_comments function");

    match services::comments::list_comments(&state.db, &auth.0, query.content_id).await {
        Ok(comments) => {
            debug!("Returning {} comments", comments.len());
            let data = comments.into_iter().map(CommentResponse::from).collect();
            Ok(ApiResponse::ok(data, "Comments retrieved successfully"))
        }
        Err(e) => Err(service_error(e)),
    }
}

/// Post a comment on a content item
#[utoipa::path(
    post,
    path = "/api/v1/comments",
    tag = "comments",
    request_body = CreateCommentRequest,
    responses(
        (status = 201, description = "Comment posted", body = ApiResponse<CommentResponse>),
        (status = 400, description = "Empty comment", body = ErrorResponse),
        (status = 403, description = "Not a member of the course", body = ErrorResponse),
        (status = 404, description = "Content not found", body = ErrorResponse)
    )
)]
#[instrument(skip(state, auth, request), fields(user_id = auth.0.id, content_id = request.content_id))]
pub async fn create_comment(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(request): Json<CreateCommentRequest>,
) -> Result<(StatusCode, Json<ApiResponse<CommentResponse>>), ApiError> {
    trace!("Entering create_comment function");

    match services::comments::post_comment(&state.db, &auth.0, request.content_id, &request.comment).await {
        Ok(comment) => {
            info!("Comment {} posted by user {}", comment.id, auth.0.id);
            Ok((
                StatusCode::CREATED,
                ApiResponse::ok(CommentResponse::from(comment), "Comment posted successfully"),
            ))
        }
        Err(e) => Err(service_error(e)),
    }
}

/// Edit one of your comments
#[utoipa::path(
    put,
    path = "/api/v1/comments/{comment_id}",
    tag = "comments",
    params(("comment_id" = i32, Path, description = "Comment ID")),
    request_body = UpdateCommentRequest,
    responses(
        (status = 200, description = "Comment updated", body = ApiResponse<CommentResponse>),
        (status = 400, description = "Empty comment", body = ErrorResponse),
        (status = 403, description = "Not the author", body = ErrorResponse),
        (status = 404, description = "Comment not found", body = ErrorResponse)
    )
)]
#[instrument(skip(state, auth, request), fields(user_id = auth.0.id))]
pub async fn update_comment(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(comment_id): Path<i32>,
    Json(request): Json<UpdateCommentRequest>,
) -> Result<Json<ApiResponse<CommentResponse>>, ApiError> {
    trace!("Entering update_comment function for comment_id: {}", comment_id);

    match services::comments::edit_comment(&state.db, &auth.0, comment_id, &request.comment).await {
        Ok(comment) => Ok(ApiResponse::ok(CommentResponse::from(comment), "Comment updated successfully")),
        Err(e) => Err(service_error(e)),
    }
}

/// Delete one of your comments
#[utoipa::path(
    delete,
    path = "/api/v1/comments/{comment_id}",
    tag = "comments",
    params(("comment_id" = i32, Path, description = "Comment ID")),
    responses(
        (status = 200, description = "Comment deleted", body = ApiResponse<CommentResponse>),
        (status = 403, description = "Not the author", body = ErrorResponse),
        (status = 404, description = "Comment not found", body = ErrorResponse)
    )
)]
#[instrument(skip(state, auth), fields(user_id = auth.0.id))]
pub async fn delete_comment(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(comment_id): Path<i32>,
) -> Result<Json<ApiResponse<CommentResponse>>, ApiError> {
    trace!("Entering delete_comment function for comment_id: {}", comment_id);

    match services::comments::delete_comment(&state.db, &auth.0, comment_id).await {
        Ok(comment) => {
            info!("Comment {} deleted by user {}", comment.id, auth.0.id);
            Ok(ApiResponse::ok(CommentResponse::from(comment), "Comment deleted successfully"))
        }
        Err(e) => Err(service_error(e)),
    }
}
