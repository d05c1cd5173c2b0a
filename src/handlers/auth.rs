use crate::auth::TokenType;
use crate::schemas::{ApiError, ApiResponse, AppState, error_response, service_error};
use axum::{extract::State, http::StatusCode, response::Json};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, instrument, trace, warn};
use utoipa::ToSchema;

/// Credentials for signing in
#[derive(Debug, Deserialize, Serialize, ToSchema)]
pub struct SignInRequest {
    pub username: String,
    pub password: String,
}

/// Access and refresh token pair
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct TokenPairResponse {
    /// Short-lived token for the `Authorization: Bearer` header
    pub access: String,
    /// Long-lived token accepted by the refresh endpoint
    pub refresh: String,
}

#[derive(Debug, Deserialize, Serialize, ToSchema)]
pub struct RefreshRequest {
    pub refresh: String,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct AccessTokenResponse {
    pub access: String,
}

fn token_error(e: jsonwebtoken::errors::Error) -> ApiError {
    error!("Failed to sign token: {}", e);
    error_response(StatusCode::INTERNAL_SERVER_ERROR, "TOKEN_ERROR", "Failed to issue token")
}

/// Exchange credentials for a JWT pair
#[utoipa::path(
    post,
    path = "/api/v1/auth/sign-in",
    tag = "auth",
    request_body = SignInRequest,
    responses(
        (status = 200, description = "Signed in", body = ApiResponse<TokenPairResponse>),
        (status = 401, description = "Wrong credentials or inactive account", body = ErrorResponse),
        (status = 429, description = "Throttled", body = ErrorResponse)
    )
)]
#[instrument(skip(state, request), fields(username = %request.username))]
pub async fn sign_in(
    State(state): State<AppState>,
    Json(request): Json<SignInRequest>,
) -> Result<Json<ApiResponse<TokenPairResponse>>, ApiError> {
    trace!("Entering sign_in function");

    let user = match services::users::authenticate(&state.db, &request.username, &request.password).await {
        Ok(Some(user)) => user,
        Ok(None) => {
            warn!("Sign-in failed for {}", request.username);
            return Err(error_response(
                StatusCode::UNAUTHORIZED,
                "INVALID_CREDENTIALS",
                "No active account found with the given credentials",
            ));
        }
        Err(e) => return Err(service_error(e)),
    };

    let access = state.auth.access_token(user.id).map_err(token_error)?;
    let refresh = state.auth.refresh_token(user.id).map_err(token_error)?;

    info!("User {} signed in", user.id);
    Ok(ApiResponse::ok(TokenPairResponse { access, refresh }, "Signed in successfully"))
}

/// Trade a refresh token for a new access token
#[utoipa::path(
    post,
    path = "/api/v1/auth/token-refresh",
    tag = "auth",
    request_body = RefreshRequest,
    responses(
        (status = 200, description = "New access token", body = ApiResponse<AccessTokenResponse>),
        (status = 401, description = "Invalid or expired refresh token", body = ErrorResponse)
    )
)]
#[instrument(skip(state, request))]
pub async fn token_refresh(
    State(state): State<AppState>,
    Json(request): Json<RefreshRequest>,
) -> Result<Json<ApiResponse<AccessTokenResponse>>, ApiError> {
    trace!("Entering token_refresh function");

    let Some(user_id) = state
        .auth
        .validate(&request.refresh, TokenType::Refresh)
        .and_then(|claims| claims.user_id())
    else {
        warn!("Rejected refresh token");
        return Err(error_response(
            StatusCode::UNAUTHORIZED,
            "INVALID_TOKEN",
            "Token is invalid or expired",
        ));
    };

    // The account may have been disabled since the refresh token was issued
    match services::users::get_user(&state.db, user_id).await {
        Ok(user) if user.is_active => {}
        Ok(_) | Err(services::ServiceError::NotFound(_)) => {
            warn!("Refresh for unavailable user {}", user_id);
            return Err(error_response(
                StatusCode::UNAUTHORIZED,
                "INVALID_TOKEN",
                "Token is invalid or expired",
            ));
        }
        Err(e) => return Err(service_error(e)),
    }

    let access = state.auth.access_token(user_id).map_err(token_error)?;
    debug!("Issued new access token for user {}", user_id);
    Ok(ApiResponse::ok(AccessTokenResponse { access }, "Token refreshed successfully"))
}
