use axum::extract::State;
use serde_json::{json, Value};

use crate::app::AppState;
use crate::database::manager::health_check;
use crate::error::ApiError;
use crate::middleware::metrics::MetricsSnapshot;
use crate::middleware::{ApiResponse, ApiResult};

pub async fn root() -> ApiResult<Value> {
    Ok(ApiResponse::success(json!({
        "name": "Birthday Admin API",
        "version": env!("CARGO_PKG_VERSION"),
        "endpoints": {
            "auth": "/api/auth/{register,login,verify}",
            "users": "/api/users[/:id]",
            "roles": "/api/roles[/:id], /api/roles/options, /api/permissions",
            "profile": "/api/user/{profile,password}",
            "messages": "/api/messages[/:id]",
            "visits": "/api/visits, /api/visits/stats",
            "memories": "/api/memories[/:id]",
            "dashboard": "/api/dashboard",
            "metrics": "/api/metrics",
        }
    })))
}

/// 200 when the database answers, 503 otherwise.
pub async fn health(State(state): State<AppState>) -> ApiResult<Value> {
    if let Err(e) = health_check(&state.pool).await {
        tracing::error!("Health check failed: {}", e);
        return Err(ApiError::service_unavailable("Database unavailable"));
    }

    Ok(ApiResponse::success(json!({
        "status": "ok",
        "timestamp": chrono::Utc::now(),
        "database": "ok",
        "cache_entries": state.cache.len(),
    })))
}

/// GET /api/metrics: request counters since startup.
pub async fn metrics(State(state): State<AppState>) -> ApiResult<MetricsSnapshot> {
    Ok(ApiResponse::success(state.metrics.snapshot()))
}

pub async fn not_found() -> ApiError {
    ApiError::not_found("Route not found")
}
