use std::time::Duration;

use axum::extract::State;
use serde_json::Value;

use crate::app::AppState;
use crate::database::models::DashboardSummary;
use crate::error::ApiError;
use crate::handlers::{to_cached, DASHBOARD_KEY};
use crate::middleware::{ApiResponse, ApiResult};

const DASHBOARD_TTL: Duration = Duration::from_secs(60);

/// GET /api/dashboard
pub async fn summary(State(state): State<AppState>) -> ApiResult<Value> {
    let summary = state
        .cache
        .get_or_set(DASHBOARD_KEY, Some(DASHBOARD_TTL), || async {
            let (visits, messages, memories, users) = tokio::try_join!(
                async { state.visits.counts().await.map_err(ApiError::from) },
                async { state.messages.counts().await.map_err(ApiError::from) },
                async { state.memories.count().await.map_err(ApiError::from) },
                async { state.users.count().await.map_err(ApiError::from) },
            )?;
            let (total_visits, today_visits, unique_visitors) = visits;
            let (total_messages, pending_messages) = messages;

            to_cached(&DashboardSummary {
                total_visits,
                today_visits,
                unique_visitors,
                total_messages,
                pending_messages,
                total_memories: memories,
                total_users: users,
            })
        })
        .await?;
    Ok(ApiResponse::success(summary))
}
