use axum::{
    async_trait,
    body::Body,
    extract::{rejection::JsonRejection, FromRequestParts, State},
    http::{request::Parts, HeaderMap, Request},
    middleware::Next,
    response::Response,
    Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use super::error::{ApiError, ValidationErrorBuilder};
use super::response::Envelope;
use super::validation::{validate_email, validate_password};
use crate::auth::{self, Authenticated};
use crate::db::UserResponse;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct TokenData {
    pub token: String,
}

/// Extract the bearer token from request headers
fn extract_token(headers: &HeaderMap) -> Option<&str> {
    let header = headers.get("Authorization")?.to_str().ok()?;
    let token = header.strip_prefix("Bearer ")?.trim();
    if token.is_empty() {
        None
    } else {
        Some(token)
    }
}

/// Login endpoint
pub async fn login(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> Result<Envelope<TokenData>, ApiError> {
    let Json(request) = payload?;

    let mut errors = ValidationErrorBuilder::new();
    if let Err(e) = validate_email(&request.email) {
        errors.add("email", e);
    }
    if let Err(e) = validate_password(&request.password) {
        errors.add("password", e);
    }
    errors.finish()?;

    let issued = auth::login(
        &state.db,
        &request.email,
        &request.password,
        state.config.auth.token_lifetime_months,
    )
    .await
    .map_err(|e| {
        if matches!(e, auth::AuthError::InvalidCredentials) {
            tracing::warn!("Failed login attempt for {}", request.email);
        }
        ApiError::from(e)
    })?;

    Ok(Envelope::ok(
        "Authenticated",
        TokenData {
            token: issued.plain_text,
        },
    ))
}

/// Revoke the token used for this request
pub async fn logout(
    State(state): State<Arc<AppState>>,
    CurrentUser(current): CurrentUser,
) -> Result<Envelope<()>, ApiError> {
    auth::logout(&state.db, &current.token).await?;
    Ok(Envelope::message("Logged out"))
}

/// The authenticated user
pub async fn me(CurrentUser(current): CurrentUser) -> Json<UserResponse> {
    Json(UserResponse::from(current.user))
}

/// Auth middleware that resolves the bearer token and stores the caller in
/// request extensions for [`CurrentUser`].
pub async fn auth_middleware(
    State(state): State<Arc<AppState>>,
    mut request: Request<Body>,
    next: Next,
) -> Result<Response, ApiError> {
    let token = extract_token(request.headers())
        .ok_or_else(|| ApiError::unauthorized("Unauthenticated."))?;

    let current = auth::resolve(&state.db, token).await?;
    request.extensions_mut().insert(current);

    Ok(next.run(request).await)
}

/// Extractor for the caller resolved by [`auth_middleware`]
#[derive(Debug, Clone)]
pub struct CurrentUser(pub Authenticated);

impl CurrentUser {
    pub fn user_id(&self) -> i64 {
        self.0.user.id
    }

    /// Fail with 403 unless the token used for this request carries `ability`
    pub fn authorize(&self, ability: &str) -> Result<(), ApiError> {
        if self.0.token.can(ability) {
            Ok(())
        } else {
            tracing::warn!(
                user_id = self.user_id(),
                token_id = self.0.token.id,
                ability,
                "Token lacks required ability"
            );
            Err(ApiError::forbidden("This action is unauthorized."))
        }
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for CurrentUser
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<Authenticated>()
            .cloned()
            .map(CurrentUser)
            .ok_or_else(|| ApiError::unauthorized("Unauthenticated."))
    }
}
