use std::net::SocketAddr;

use axum::{
    extract::{ConnectInfo, State},
    http::HeaderMap,
};
use serde::Deserialize;
use serde_json::Value;

use crate::app::AppState;
use crate::database::models::{NewVisit, Visit, VisitFilter};
use crate::database::pagination::Paginated;
use crate::error::ApiError;
use crate::handlers::{invalidate_dashboard, page_request, to_cached, VISIT_STATS_PREFIX};
use crate::middleware::{ApiQuery, ApiResponse, ApiResult, OptionalJson};
use crate::validation::validate_stats_days;

const DEFAULT_STATS_DAYS: i32 = 30;

/// POST /api/visits. The body may be empty; body fields win and missing
/// ones come from the request.
pub async fn record(
    State(state): State<AppState>,
    connect: Option<ConnectInfo<SocketAddr>>,
    headers: HeaderMap,
    OptionalJson(body): OptionalJson<NewVisit>,
) -> ApiResult<Visit> {
    let mut visit = body.unwrap_or_default();
    let peer = connect.map(|ConnectInfo(addr)| addr);

    if visit.ip_address.is_none() {
        visit.ip_address = client_ip(&headers, peer);
    }
    if visit.user_agent.is_none() {
        visit.user_agent = header_string(&headers, "user-agent");
    }
    if visit.referrer.is_none() {
        visit.referrer = header_string(&headers, "referer");
    }

    let visit = state.visits.record(&visit).await?;
    state.cache.delete_prefix(VISIT_STATS_PREFIX);
    invalidate_dashboard(&state);
    Ok(ApiResponse::created(visit))
}

/// GET /api/visits?page=&pageSize=&start_date=&end_date=
pub async fn list(
    State(state): State<AppState>,
    ApiQuery(filter): ApiQuery<VisitFilter>,
) -> ApiResult<Paginated<Visit>> {
    if let (Some(start), Some(end)) = (filter.start_date, filter.end_date) {
        if start > end {
            return Err(ApiError::field_error("start_date", "start_date must not be after end_date"));
        }
    }
    let page = page_request(&state, filter.page, filter.page_size)?;
    Ok(ApiResponse::success(state.visits.find_all(&filter, page).await?))
}

#[derive(Debug, Deserialize)]
pub struct StatsQuery {
    pub days: Option<i32>,
}

/// GET /api/visits/stats?days=, memoised per window.
pub async fn stats(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<StatsQuery>,
) -> ApiResult<Value> {
    let days = query.days.unwrap_or(DEFAULT_STATS_DAYS);
    validate_stats_days(days)?;

    let key = format!("{}{}", VISIT_STATS_PREFIX, days);
    let stats = state
        .cache
        .get_or_set(&key, None, || async {
            let stats = state.visits.stats(days).await?;
            to_cached(&stats)
        })
        .await?;
    Ok(ApiResponse::success(stats))
}

fn header_string(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(String::from)
}

/// First `X-Forwarded-For` hop, then `X-Real-IP`, then the socket peer.
fn client_ip(headers: &HeaderMap, peer: Option<SocketAddr>) -> Option<String> {
    header_string(headers, "x-forwarded-for")
        .and_then(|v| v.split(',').next().map(|ip| ip.trim().to_string()))
        .filter(|ip| !ip.is_empty())
        .or_else(|| header_string(headers, "x-real-ip"))
        .or_else(|| peer.map(|addr| addr.ip().to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn forwarded_for_wins() {
        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", HeaderValue::from_static("203.0.113.7, 10.0.0.1"));
        headers.insert("x-real-ip", HeaderValue::from_static("10.0.0.2"));
        let peer: SocketAddr = "127.0.0.1:5000".parse().unwrap();
        assert_eq!(client_ip(&headers, Some(peer)).as_deref(), Some("203.0.113.7"));
    }

    #[test]
    fn falls_back_to_peer() {
        let peer: SocketAddr = "192.0.2.1:443".parse().unwrap();
        assert_eq!(client_ip(&HeaderMap::new(), Some(peer)).as_deref(), Some("192.0.2.1"));
        assert_eq!(client_ip(&HeaderMap::new(), None), None);
    }

    #[test]
    fn blank_headers_are_ignored() {
        let mut headers = HeaderMap::new();
        headers.insert("user-agent", HeaderValue::from_static("  "));
        assert_eq!(header_string(&headers, "user-agent"), None);
    }
}
