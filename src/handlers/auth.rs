use axum::{extract::State, Extension};
use serde::Deserialize;

use crate::app::AppState;
use crate::database::models::Principal;
use crate::handlers::invalidate_dashboard;
use crate::middleware::{ApiJson, ApiResponse, ApiResult};
use crate::services::AuthSession;
use crate::validation::{validate_login, validate_register};

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
}

/// POST /api/auth/register
pub async fn register(
    State(state): State<AppState>,
    ApiJson(body): ApiJson<RegisterRequest>,
) -> ApiResult<AuthSession> {
    let username = body.username.trim();
    let email = body.email.trim();
    validate_register(username, email, &body.password)?;

    let session = state.auth.register(username, email, &body.password).await?;
    invalidate_dashboard(&state);
    Ok(ApiResponse::created(session))
}

/// POST /api/auth/login
pub async fn login(
    State(state): State<AppState>,
    ApiJson(body): ApiJson<LoginRequest>,
) -> ApiResult<AuthSession> {
    let username = body.username.trim();
    validate_login(username, &body.password)?;

    let session = state.auth.login(username, &body.password).await?;
    Ok(ApiResponse::success(session))
}

/// GET /api/auth/verify
pub async fn verify(Extension(principal): Extension<Principal>) -> ApiResult<Principal> {
    Ok(ApiResponse::success(principal))
}
