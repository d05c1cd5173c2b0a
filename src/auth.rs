//! JWT authentication
//!
//! Access tokens authenticate API calls; refresh tokens can only be traded
//! for a new access token. Both are HS256 tokens whose subject is the user id.

use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{HeaderMap, StatusCode, header::AUTHORIZATION, request::Parts},
};
use chrono::{Duration, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use model::entities::user;
use sea_orm::EntityTrait;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, warn};

use crate::schemas::{ApiError, AppState, error_response};

/// JWT claims structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Subject (user ID)
    pub sub: String,
    /// Issued at
    pub iat: i64,
    /// Expiration time
    pub exp: i64,
    /// Token type (access or refresh)
    pub token_type: TokenType,
}

impl Claims {
    pub fn user_id(&self) -> Option<i32> {
        self.sub.parse().ok()
    }
}

/// Token type
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TokenType {
    Access,
    Refresh,
}

/// Signing keys and token lifetimes.
pub struct AuthKeys {
    encoding: EncodingKey,
    decoding: DecodingKey,
    access_token_minutes: i64,
    refresh_token_days: i64,
}

impl std::fmt::Debug for AuthKeys {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthKeys")
            .field("access_token_minutes", &self.access_token_minutes)
            .field("refresh_token_days", &self.refresh_token_days)
            .finish_non_exhaustive()
    }
}

impl AuthKeys {
    pub fn new(secret: &str, access_token_minutes: i64, refresh_token_days: i64) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            access_token_minutes,
            refresh_token_days,
        }
    }

    fn issue(&self, user_id: i32, token_type: TokenType, lifetime: Duration) -> jsonwebtoken::errors::Result<String> {
        let now = Utc::now();
        let claims = Claims {
            sub: user_id.to_string(),
            iat: now.timestamp(),
            exp: (now + lifetime).timestamp(),
            token_type,
        };
        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
    }

    pub fn access_token(&self, user_id: i32) -> jsonwebtoken::errors::Result<String> {
        self.issue(user_id, TokenType::Access, Duration::minutes(self.access_token_minutes))
    }

    pub fn refresh_token(&self, user_id: i32) -> jsonwebtoken::errors::Result<String> {
        self.issue(user_id, TokenType::Refresh, Duration::days(self.refresh_token_days))
    }

    /// Decodes a token and checks its signature, expiry and type.
    pub fn validate(&self, token: &str, expected: TokenType) -> Option<Claims> {
        let validation = Validation::new(Algorithm::HS256);
        match decode::<Claims>(token, &self.decoding, &validation) {
            Ok(data) if data.claims.token_type == expected => Some(data.claims),
            Ok(data) => {
                debug!("Rejected {:?} token where {:?} was expected", data.claims.token_type, expected);
                None
            }
            Err(e) => {
                debug!("Invalid token: {}", e);
                None
            }
        }
    }
}

/// The bearer token of a request, if any.
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(AUTHORIZATION)
        .and_then(|header| header.to_str().ok())
        .and_then(|header| header.strip_prefix("Bearer "))
        .map(str::trim)
}

fn unauthorized(message: &str) -> ApiError {
    error_response(StatusCode::UNAUTHORIZED, "UNAUTHORIZED", message)
}

async fn load_user(state: &AppState, claims: &Claims) -> Result<user::Model, ApiError> {
    let Some(user_id) = claims.user_id() else {
        return Err(unauthorized("Invalid token subject"));
    };

    match user::Entity::find_by_id(user_id).one(&state.db).await {
        Ok(Some(user)) if user.is_active => Ok(user),
        Ok(Some(_)) => {
            warn!("Token presented for inactive user {}", user_id);
            Err(unauthorized("User account is disabled"))
        }
        Ok(None) => {
            warn!("Token presented for unknown user {}", user_id);
            Err(unauthorized("User no longer exists"))
        }
        Err(e) => {
            error!("Failed to load user {}: {}", user_id, e);
            Err(error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                "DATABASE_ERROR",
                "Failed to load user",
            ))
        }
    }
}

/// The authenticated caller. Rejects the request with 401 otherwise.
#[derive(Debug, Clone)]
pub struct AuthUser(pub user::Model);

impl AuthUser {
    /// Staff and superusers pass; everyone else gets 403.
    pub fn require_staff(&self) -> Result<(), ApiError> {
        if self.0.is_staff_or_superuser() {
            Ok(())
        } else {
            warn!("User {} is not staff", self.0.id);
            Err(error_response(
                StatusCode::FORBIDDEN,
                "FORBIDDEN",
                "Staff permission required",
            ))
        }
    }
}

#[async_trait]
impl FromRequestParts<AppState> for AuthUser {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let Some(token) = bearer_token(&parts.headers) else {
            return Err(unauthorized("Authentication credentials were not provided"));
        };
        let Some(claims) = state.auth.validate(token, TokenType::Access) else {
            return Err(unauthorized("Invalid or expired token"));
        };
        load_user(state, &claims).await.map(AuthUser)
    }
}

/// The caller when a valid access token is present, `None` for anonymous requests.
#[derive(Debug, Clone)]
pub struct MaybeAuthUser(pub Option<user::Model>);

#[async_trait]
impl FromRequestParts<AppState> for MaybeAuthUser {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let Some(claims) = bearer_token(&parts.headers).and_then(|t| state.auth.validate(t, TokenType::Access)) else {
            return Ok(MaybeAuthUser(None));
        };
        match load_user(state, &claims).await {
            Ok(user) => Ok(MaybeAuthUser(Some(user))),
            Err((status, _)) if status == StatusCode::UNAUTHORIZED => Ok(MaybeAuthUser(None)),
            Err(e) => Err(e),
        }
    }
}
