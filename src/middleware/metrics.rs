//! In-process request counters: totals, mean response time, and the same
//! per endpoint keyed by method and route pattern.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use axum::{
    extract::{MatchedPath, Request, State},
    http::{Method, StatusCode},
    middleware::Next,
    response::Response,
};
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::cache::lock;

/// Endpoint key for requests that matched no route.
const UNMATCHED: &str = "(unmatched)";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RequestCounts {
    pub total: u64,
    pub success: u64,
    pub error: u64,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ResponseTime {
    /// Milliseconds.
    pub total: f64,
    pub count: u64,
    pub avg: f64,
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EndpointStats {
    pub count: u64,
    pub success: u64,
    pub error: u64,
    pub avg_response_time: f64,
    pub total_response_time: f64,
}

#[derive(Debug, Clone, Default)]
struct Totals {
    requests: RequestCounts,
    response_time: ResponseTime,
    endpoints: BTreeMap<String, EndpointStats>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricsSnapshot {
    pub requests: RequestCounts,
    pub response_time: ResponseTime,
    pub endpoints: BTreeMap<String, EndpointStats>,
    /// Seconds since the collector was created.
    pub uptime: u64,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug)]
pub struct RequestMetrics {
    started: Instant,
    totals: Mutex<Totals>,
}

impl Default for RequestMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl RequestMetrics {
    pub fn new() -> Self {
        Self {
            started: Instant::now(),
            totals: Mutex::new(Totals::default()),
        }
    }

    /// 2xx and 3xx count as success.
    pub fn record(&self, method: &Method, route: &str, status: StatusCode, elapsed: Duration) {
        let ok = status.is_success() || status.is_redirection();
        let ms = elapsed.as_secs_f64() * 1000.0;
        let mut totals = lock(&self.totals);

        totals.requests.total += 1;
        if ok {
            totals.requests.success += 1;
        } else {
            totals.requests.error += 1;
        }

        let time = &mut totals.response_time;
        time.total += ms;
        time.count += 1;
        time.avg = time.total / time.count as f64;

        let endpoint = totals.endpoints.entry(format!("{} {}", method, route)).or_default();
        endpoint.count += 1;
        endpoint.total_response_time += ms;
        endpoint.avg_response_time = endpoint.total_response_time / endpoint.count as f64;
        if ok {
            endpoint.success += 1;
        } else {
            endpoint.error += 1;
        }
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        let totals = lock(&self.totals).clone();
        MetricsSnapshot {
            requests: totals.requests,
            response_time: totals.response_time,
            endpoints: totals.endpoints,
            uptime: self.started.elapsed().as_secs(),
            timestamp: Utc::now(),
        }
    }
}

/// Records every response against its route pattern, so `/api/users/7` and
/// `/api/users/8` share one `GET /api/users/:id` entry.
pub async fn track_metrics(
    State(metrics): State<Arc<RequestMetrics>>,
    request: Request,
    next: Next,
) -> Response {
    let method = request.method().clone();
    let route = request
        .extensions()
        .get::<MatchedPath>()
        .map(|path| path.as_str().to_owned())
        .unwrap_or_else(|| UNMATCHED.to_owned());
    let started = Instant::now();

    let response = next.run(request).await;
    metrics.record(&method, &route, response.status(), started.elapsed());
    response
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_splits_success_and_error() {
        let metrics = RequestMetrics::new();
        metrics.record(&Method::GET, "/api/users", StatusCode::OK, Duration::from_millis(10));
        metrics.record(&Method::GET, "/api/users", StatusCode::FOUND, Duration::from_millis(30));
        metrics.record(&Method::GET, "/api/users", StatusCode::FORBIDDEN, Duration::from_millis(20));
        metrics.record(&Method::POST, "/api/messages", StatusCode::CREATED, Duration::from_millis(40));

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.requests, RequestCounts { total: 4, success: 3, error: 1 });
        assert_eq!(snapshot.response_time.count, 4);
        assert!((snapshot.response_time.avg - 25.0).abs() < 1e-9);

        let users = &snapshot.endpoints["GET /api/users"];
        assert_eq!((users.count, users.success, users.error), (3, 2, 1));
        assert!((users.avg_response_time - 20.0).abs() < 1e-9);
        assert_eq!(snapshot.endpoints["POST /api/messages"].count, 1);
    }

    #[test]
    fn snapshot_uses_camel_case_keys() {
        let metrics = RequestMetrics::new();
        metrics.record(&Method::GET, "/", StatusCode::OK, Duration::from_millis(1));
        let json = serde_json::to_value(metrics.snapshot()).unwrap();
        assert!(json["responseTime"]["avg"].is_number());
        assert!(json["endpoints"]["GET /"]["avgResponseTime"].is_number());
        assert!(json["uptime"].is_u64());
    }
}
