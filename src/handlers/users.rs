use axum::{extract::State, Extension};

use crate::app::AppState;
use crate::database::models::{NewUser, Principal, User, UserFilter, UserUpdate};
use crate::database::pagination::Paginated;
use crate::handlers::{invalidate_dashboard, page_request};
use crate::middleware::{ApiJson, ApiPath, ApiQuery, ApiResponse, ApiResult};
use crate::validation::{validate_new_user, validate_user_update};

/// GET /api/users?page=&pageSize=&keyword=&role=
pub async fn list(
    State(state): State<AppState>,
    ApiQuery(filter): ApiQuery<UserFilter>,
) -> ApiResult<Paginated<User>> {
    let page = page_request(&state, filter.page, filter.page_size)?;
    Ok(ApiResponse::success(state.users.list(&filter, page).await?))
}

pub async fn get(State(state): State<AppState>, ApiPath(id): ApiPath<i32>) -> ApiResult<User> {
    Ok(ApiResponse::success(state.users.get(id).await?))
}

pub async fn create(
    State(state): State<AppState>,
    ApiJson(input): ApiJson<NewUser>,
) -> ApiResult<User> {
    validate_new_user(&input)?;
    let user = state.users.create(&input).await?;
    invalidate_dashboard(&state);
    Ok(ApiResponse::created(user))
}

pub async fn update(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    ApiPath(id): ApiPath<i32>,
    ApiJson(input): ApiJson<UserUpdate>,
) -> ApiResult<User> {
    validate_user_update(&input)?;
    Ok(ApiResponse::success(state.users.update(id, &input, principal.id).await?))
}

pub async fn delete(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    ApiPath(id): ApiPath<i32>,
) -> ApiResult<()> {
    state.users.delete(id, principal.id).await?;
    invalidate_dashboard(&state);
    Ok(ApiResponse::no_content())
}
