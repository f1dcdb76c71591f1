use axum::{extract::State, Extension};

use crate::app::AppState;
use crate::database::models::{PasswordChange, Principal, ProfileUpdate, User};
use crate::middleware::{ApiJson, ApiResponse, ApiResult};
use crate::validation::{validate_password_change, validate_profile};

pub async fn show(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
) -> ApiResult<User> {
    Ok(ApiResponse::success(state.users.get(principal.id).await?))
}

pub async fn update(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    ApiJson(input): ApiJson<ProfileUpdate>,
) -> ApiResult<User> {
    validate_profile(&input)?;
    Ok(ApiResponse::success(state.users.update_profile(principal.id, &input).await?))
}

pub async fn change_password(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    ApiJson(input): ApiJson<PasswordChange>,
) -> ApiResult<()> {
    validate_password_change(&input)?;
    state.users.change_password(principal.id, &input).await?;
    Ok(ApiResponse::no_content())
}
