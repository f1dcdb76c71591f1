//! Route handlers grouped by resource. Guards are attached in `app`;
//! handlers behind a guard receive the caller as `Extension<Principal>`.

pub mod auth;
pub mod dashboard;
pub mod memories;
pub mod messages;
pub mod profile;
pub mod roles;
pub mod system;
pub mod users;
pub mod visits;

use serde::Serialize;
use serde_json::Value;

use crate::app::AppState;
use crate::database::pagination::{PageQuery, PageRequest};
use crate::error::ApiError;

pub const DASHBOARD_KEY: &str = "dashboard";
pub const VISIT_STATS_PREFIX: &str = "visits:stats:";

pub(crate) fn page_request(
    state: &AppState,
    page: Option<i64>,
    page_size: Option<i64>,
) -> Result<PageRequest, ApiError> {
    let query = PageQuery { page, page_size };
    Ok(PageRequest::from_query(
        &query,
        state.pagination.default_page_size,
        state.pagination.max_page_size,
    )?)
}

/// Serialized form stored in the aggregate cache.
pub(crate) fn to_cached<T: Serialize>(value: &T) -> Result<Value, ApiError> {
    serde_json::to_value(value).map_err(|e| {
        tracing::error!("Failed to serialize cached value: {}", e);
        ApiError::internal_server_error("Internal server error")
    })
}

/// Drop cached aggregates after a write that changes their counts.
pub(crate) fn invalidate_dashboard(state: &AppState) {
    state.cache.delete(DASHBOARD_KEY);
}
