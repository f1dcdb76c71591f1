use axum::extract::State;

use crate::app::AppState;
use crate::database::models::{Message, MessageApproval, MessageFilter, NewMessage};
use crate::database::pagination::Paginated;
use crate::error::ApiError;
use crate::handlers::{invalidate_dashboard, page_request};
use crate::middleware::{ApiJson, ApiPath, ApiQuery, ApiResponse, ApiResult};
use crate::validation::validate_message;

/// POST /api/messages, public guestbook submission.
pub async fn submit(
    State(state): State<AppState>,
    ApiJson(mut input): ApiJson<NewMessage>,
) -> ApiResult<Message> {
    validate_message(&input)?;
    input.name = input.name.trim().to_string();
    input.email = input.email.map(|e| e.trim().to_string()).filter(|e| !e.is_empty());

    let message = state.messages.create(&input).await?;
    tracing::info!("Message {} received from {}", message.id, message.name);
    invalidate_dashboard(&state);
    Ok(ApiResponse::created(message))
}

/// GET /api/messages?page=&pageSize=&approved=
pub async fn list(
    State(state): State<AppState>,
    ApiQuery(filter): ApiQuery<MessageFilter>,
) -> ApiResult<Paginated<Message>> {
    let page = page_request(&state, filter.page, filter.page_size)?;
    Ok(ApiResponse::success(state.messages.find_all(&filter, page).await?))
}

pub async fn set_approval(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<i32>,
    ApiJson(input): ApiJson<MessageApproval>,
) -> ApiResult<Message> {
    let message = state
        .messages
        .set_approval(id, input.is_approved)
        .await?
        .ok_or_else(|| ApiError::not_found("Message not found"))?;
    invalidate_dashboard(&state);
    Ok(ApiResponse::success(message))
}

pub async fn delete(State(state): State<AppState>, ApiPath(id): ApiPath<i32>) -> ApiResult<()> {
    if !state.messages.delete(id).await? {
        return Err(ApiError::not_found("Message not found"));
    }
    invalidate_dashboard(&state);
    Ok(ApiResponse::no_content())
}
