//! Per-client fixed-window rate limiting.
//!
//! Each client IP gets `limit` requests per window. The window starts with
//! the client's first request and resets once it has elapsed. Responses carry
//! `RateLimit-Limit`, `RateLimit-Remaining` and `RateLimit-Reset`; rejected
//! requests also get `Retry-After`.

use std::collections::HashMap;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::{
    extract::{ConnectInfo, Request, State},
    http::{HeaderMap, HeaderName, HeaderValue},
    middleware::Next,
    response::{IntoResponse, Response},
};
use tokio::time::Instant;

use crate::cache::lock;
use crate::config::ApiConfig;
use crate::error::ApiError;

/// Windows tracked before expired ones are pruned.
const PRUNE_THRESHOLD: usize = 16_384;

#[derive(Debug, Clone, Copy)]
struct Window {
    started: Instant,
    count: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateDecision {
    Allowed { remaining: u32, reset: Duration },
    Limited { reset: Duration },
}

#[derive(Debug)]
pub struct RateLimiter {
    limit: u32,
    window: Duration,
    windows: Mutex<HashMap<IpAddr, Window>>,
}

impl RateLimiter {
    pub fn new(limit: u32, window: Duration) -> Self {
        Self {
            limit: limit.max(1),
            window: window.max(Duration::from_secs(1)),
            windows: Mutex::new(HashMap::new()),
        }
    }

    /// `None` when rate limiting is switched off.
    pub fn from_config(api: &ApiConfig) -> Option<Self> {
        api.enable_rate_limiting.then(|| {
            Self::new(api.rate_limit_requests, Duration::from_secs(api.rate_limit_window_secs))
        })
    }

    pub fn limit(&self) -> u32 {
        self.limit
    }

    /// Count one request from `client` against its window.
    pub fn check(&self, client: IpAddr) -> RateDecision {
        let now = Instant::now();
        let mut windows = lock(&self.windows);

        if windows.len() >= PRUNE_THRESHOLD {
            let span = self.window;
            windows.retain(|_, w| now.duration_since(w.started) < span);
        }

        let window = windows.entry(client).or_insert(Window { started: now, count: 0 });
        if now.duration_since(window.started) >= self.window {
            *window = Window { started: now, count: 0 };
        }
        let reset = self.window.saturating_sub(now.duration_since(window.started));

        if window.count >= self.limit {
            return RateDecision::Limited { reset };
        }
        window.count += 1;
        RateDecision::Allowed { remaining: self.limit - window.count, reset }
    }

    #[cfg(test)]
    fn tracked(&self) -> usize {
        lock(&self.windows).len()
    }
}

/// The peer address when the server was started with connect info.
/// Forwarding headers are ignored so clients cannot pick their own bucket.
fn client_key(request: &Request) -> IpAddr {
    request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip())
        .unwrap_or(IpAddr::V4(Ipv4Addr::UNSPECIFIED))
}

fn set_rate_headers(headers: &mut HeaderMap, limit: u32, remaining: u32, reset: Duration) {
    // round up so clients never retry a second early
    let reset_secs = reset.as_secs() + u64::from(reset.subsec_nanos() > 0);
    let pairs = [
        ("ratelimit-limit", u64::from(limit)),
        ("ratelimit-remaining", u64::from(remaining)),
        ("ratelimit-reset", reset_secs),
    ];
    for (name, value) in pairs {
        headers.insert(HeaderName::from_static(name), HeaderValue::from(value));
    }
}

pub async fn rate_limit(
    State(limiter): State<Arc<RateLimiter>>,
    request: Request,
    next: Next,
) -> Response {
    let client = client_key(&request);

    match limiter.check(client) {
        RateDecision::Allowed { remaining, reset } => {
            let mut response = next.run(request).await;
            set_rate_headers(response.headers_mut(), limiter.limit(), remaining, reset);
            response
        }
        RateDecision::Limited { reset } => {
            tracing::warn!(%client, "Rate limit exceeded for {} {}", request.method(), request.uri().path());
            let mut response = ApiError::too_many_requests(
                "Too many requests from this IP, please try again later.",
            )
            .into_response();
            let headers = response.headers_mut();
            set_rate_headers(headers, limiter.limit(), 0, reset);
            if let Some(retry_after) = headers.get("ratelimit-reset").cloned() {
                headers.insert(axum::http::header::RETRY_AFTER, retry_after);
            }
            response
        }
    }
}
