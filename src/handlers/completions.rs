use crate::auth::AuthUser;
use crate::schemas::{ApiError, ApiResponse, AppState, service_error};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::Json,
};
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use tracing::{info, instrument, trace};
use utoipa::ToSchema;

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct CompletionResponse {
    pub id: i32,
    pub member_id: i32,
    pub content_id: i32,
    pub last_update: NaiveDateTime,
    /// True only for the call that recorded the completion
    pub created: bool,
}

/// Mark a content item as completed
///
/// Repeating the call is harmless and reports `created: false`.
#[utoipa::path(
    post,
    path = "/api/v1/contents/{content_id}/complete",
    tag = "completions",
    params(("content_id" = i32, Path, description = "Content ID")),
    responses(
        (status = 201, description = "Completion recorded", body = ApiResponse<CompletionResponse>),
        (status = 200, description = "Already completed", body = ApiResponse<CompletionResponse>),
        (status = 401, description = "Not authenticated", body = ErrorResponse),
        (status = 404, description = "Unknown content or not enrolled in its course", body = ErrorResponse)
    )
)]
#[instrument(skip(state, auth), fields(user_id = auth.0.id))]
pub async fn complete_content(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(content_id): Path<i32>,
) -> Result<(StatusCode, Json<ApiResponse<CompletionResponse>>), ApiError> {
    trace!("Entering complete_content function for content_id: {}", content_id);

    let (completion, created) = services::completion::mark_complete(&state.db, &auth.0, content_id)
        .await
        .map_err(service_error)?;

    let response = CompletionResponse {
        id: completion.id,
        member_id: completion.member_id,
        content_id: completion.content_id,
        last_update: completion.last_update,
        created,
    };

    if created {
        info!("User {} completed content {}", auth.0.id, content_id);
        Ok((StatusCode::CREATED, ApiResponse::ok(response, "Content marked as completed")))
    } else {
        Ok((StatusCode::OK, ApiResponse::ok(response, "Content already completed")))
    }
}
