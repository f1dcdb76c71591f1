use axum::extract::State;

use crate::app::AppState;
use crate::database::models::{Memory, MemoryInput};
use crate::database::pagination::{PageQuery, Paginated};
use crate::error::ApiError;
use crate::handlers::{invalidate_dashboard, page_request};
use crate::middleware::{ApiJson, ApiPath, ApiQuery, ApiResponse, ApiResult};
use crate::validation::validate_memory;

/// GET /api/memories, newest date first.
pub async fn list(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<PageQuery>,
) -> ApiResult<Paginated<Memory>> {
    let page = page_request(&state, query.page, query.page_size)?;
    Ok(ApiResponse::success(state.memories.find_all(page).await?))
}

pub async fn get(State(state): State<AppState>, ApiPath(id): ApiPath<i32>) -> ApiResult<Memory> {
    let memory = state
        .memories
        .find_by_id(id)
        .await?
        .ok_or_else(|| ApiError::not_found("Memory not found"))?;
    Ok(ApiResponse::success(memory))
}

pub async fn create(
    State(state): State<AppState>,
    ApiJson(input): ApiJson<MemoryInput>,
) -> ApiResult<Memory> {
    validate_memory(&input)?;
    let memory = state.memories.create(&input).await?;
    invalidate_dashboard(&state);
    Ok(ApiResponse::created(memory))
}

pub async fn update(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<i32>,
    ApiJson(input): ApiJson<MemoryInput>,
) -> ApiResult<Memory> {
    validate_memory(&input)?;
    let memory = state
        .memories
        .update(id, &input)
        .await?
        .ok_or_else(|| ApiError::not_found("Memory not found"))?;
    Ok(ApiResponse::success(memory))
}

pub async fn delete(State(state): State<AppState>, ApiPath(id): ApiPath<i32>) -> ApiResult<()> {
    if !state.memories.delete(id).await? {
        return Err(ApiError::not_found("Memory not found"));
    }
    invalidate_dashboard(&state);
    Ok(ApiResponse::no_content())
}
