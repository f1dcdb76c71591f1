use axum::extract::State;

use crate::app::AppState;
use crate::database::models::{NewRole, Permission, Role, RoleOption, RoleUpdate};
use crate::middleware::{ApiJson, ApiPath, ApiResponse, ApiResult};
use crate::validation::{validate_new_role, validate_role_update};

pub async fn list(State(state): State<AppState>) -> ApiResult<Vec<Role>> {
    Ok(ApiResponse::success(state.roles.list().await?))
}

/// GET /api/roles/options, the `{value, label}` list used by user forms.
pub async fn options(State(state): State<AppState>) -> ApiResult<Vec<RoleOption>> {
    Ok(ApiResponse::success(state.roles.options().await?))
}

pub async fn get(State(state): State<AppState>, ApiPath(id): ApiPath<i32>) -> ApiResult<Role> {
    Ok(ApiResponse::success(state.roles.get(id).await?))
}

pub async fn create(
    State(state): State<AppState>,
    ApiJson(input): ApiJson<NewRole>,
) -> ApiResult<Role> {
    validate_new_role(&input)?;
    Ok(ApiResponse::created(state.roles.create(&input).await?))
}

pub async fn update(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<i32>,
    ApiJson(input): ApiJson<RoleUpdate>,
) -> ApiResult<Role> {
    validate_role_update(&input)?;
    Ok(ApiResponse::success(state.roles.update(id, &input).await?))
}

pub async fn delete(State(state): State<AppState>, ApiPath(id): ApiPath<i32>) -> ApiResult<()> {
    state.roles.delete(id).await?;
    Ok(ApiResponse::no_content())
}

/// GET /api/permissions
pub async fn permissions(State(state): State<AppState>) -> ApiResult<Vec<Permission>> {
    Ok(ApiResponse::success(state.roles.permissions().await?))
}
