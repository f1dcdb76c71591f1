use std::sync::Arc;

use axum::{
    extract::DefaultBodyLimit,
    http::{header, HeaderName, HeaderValue, Method},
    middleware::from_fn_with_state,
    routing::{get, post, put},
    Router,
};
use serde_json::Value;
use sqlx::PgPool;
use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    set_header::SetResponseHeaderLayer,
    trace::TraceLayer,
};

use crate::auth::{AuthGate, JwtError, PasswordHasher, PgPermissionResolver, TokenCodec};
use crate::cache::{CacheOptions, TtlCache};
use crate::config::{AppConfig, Environment, PaginationConfig};
use crate::database::repository::{
    MemoryRepository, MessageRepository, RoleRepository, UserRepository, VisitRepository,
};
use crate::handlers;
use crate::middleware::{
    authenticated, permitted, rate_limit, track_metrics, RateLimiter, RequestMetrics,
};
use crate::services::{AuthService, RoleService, UserService};

/// Everything a handler needs, cloned per request.
#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub gate: AuthGate,
    pub cache: Arc<TtlCache<Value>>,
    pub metrics: Arc<RequestMetrics>,
    pub pagination: PaginationConfig,
    pub auth: AuthService,
    pub users: UserService,
    pub roles: RoleService,
    pub messages: MessageRepository,
    pub memories: MemoryRepository,
    pub visits: VisitRepository,
}

impl AppState {
    pub fn new(pool: PgPool, config: &AppConfig) -> Result<Self, JwtError> {
        let codec = TokenCodec::from_config(&config.security)?;
        let hasher = PasswordHasher::new(config.security.bcrypt_cost);
        let user_repo = UserRepository::new(pool.clone());
        let role_repo = RoleRepository::new(pool.clone());

        let gate = AuthGate::new(
            codec.clone(),
            Arc::new(user_repo.clone()),
            Arc::new(PgPermissionResolver::new(pool.clone())),
        );

        Ok(Self {
            gate,
            cache: Arc::new(TtlCache::new(CacheOptions::from(&config.cache))),
            metrics: Arc::new(RequestMetrics::new()),
            pagination: config.pagination.clone(),
            auth: AuthService::new(user_repo.clone(), role_repo.clone(), hasher, codec),
            users: UserService::new(user_repo, role_repo.clone(), hasher),
            roles: RoleService::new(role_repo),
            messages: MessageRepository::new(pool.clone()),
            memories: MemoryRepository::new(pool.clone()),
            visits: VisitRepository::new(pool.clone()),
            pool,
        })
    }
}

/// The full HTTP surface. Outermost first: tracing, CORS, security headers,
/// per-client rate limiting, request metrics, body size limit.
pub fn app(state: AppState, config: &AppConfig) -> Router {
    let metrics = state.metrics.clone();

    let mut router = Router::new()
        // Public
        .route("/", get(handlers::system::root))
        .route("/health", get(handlers::system::health))
        .merge(auth_routes(&state))
        .merge(user_routes(&state))
        .merge(role_routes(&state))
        .merge(profile_routes(&state))
        .merge(content_routes(&state))
        .route(
            "/api/dashboard",
            permitted(get(handlers::dashboard::summary), &state, "dashboard:view"),
        )
        .route(
            "/api/metrics",
            permitted(get(handlers::system::metrics), &state, "dashboard:view"),
        )
        .fallback(handlers::system::not_found)
        .with_state(state)
        .layer(DefaultBodyLimit::max(config.api.max_request_size_bytes))
        .layer(from_fn_with_state(metrics, track_metrics));

    if let Some(limiter) = RateLimiter::from_config(&config.api) {
        router = router.layer(from_fn_with_state(Arc::new(limiter), rate_limit));
    }
    if config.api.enable_security_headers {
        let csp = config.environment == Environment::Production;
        router = security_headers(csp)
            .into_iter()
            .fold(router, |router, (name, value)| {
                router.layer(SetResponseHeaderLayer::if_not_present(name, value))
            });
    }

    // Global middleware
    router.layer(
        ServiceBuilder::new()
            .layer(TraceLayer::new_for_http())
            .layer(cors_layer(&config.security.cors_origins)),
    )
}

fn auth_routes(state: &AppState) -> Router<AppState> {
    use handlers::auth;

    Router::new()
        .route("/api/auth/register", post(auth::register))
        .route("/api/auth/login", post(auth::login))
        .route("/api/auth/verify", authenticated(get(auth::verify), state))
}

fn user_routes(state: &AppState) -> Router<AppState> {
    use handlers::users;

    Router::new()
        .route(
            "/api/users",
            permitted(get(users::list), state, "users:view")
                .merge(permitted(post(users::create), state, "users:edit")),
        )
        .route(
            "/api/users/:id",
            permitted(get(users::get), state, "users:view")
                .merge(permitted(put(users::update), state, "users:edit"))
                .merge(permitted(axum::routing::delete(users::delete), state, "users:delete")),
        )
}

fn role_routes(state: &AppState) -> Router<AppState> {
    use handlers::roles;

    Router::new()
        .route(
            "/api/roles",
            permitted(get(roles::list), state, "roles:view")
                .merge(permitted(post(roles::create), state, "roles:edit")),
        )
        .route("/api/roles/options", permitted(get(roles::options), state, "users:view"))
        .route(
            "/api/roles/:id",
            permitted(get(roles::get), state, "roles:view")
                .merge(permitted(put(roles::update), state, "roles:edit"))
                .merge(permitted(axum::routing::delete(roles::delete), state, "roles:edit")),
        )
        .route("/api/permissions", permitted(get(roles::permissions), state, "roles:view"))
}

fn profile_routes(state: &AppState) -> Router<AppState> {
    use handlers::profile;

    Router::new()
        .route(
            "/api/user/profile",
            permitted(get(profile::show), state, "profile:view")
                .merge(permitted(put(profile::update), state, "profile:edit")),
        )
        .route(
            "/api/user/password",
            permitted(put(profile::change_password), state, "profile:edit"),
        )
}

fn content_routes(state: &AppState) -> Router<AppState> {
    use handlers::{memories, messages, visits};

    Router::new()
        .route(
            "/api/messages",
            post(messages::submit).merge(permitted(get(messages::list), state, "messages:view")),
        )
        .route(
            "/api/messages/:id",
            permitted(put(messages::set_approval), state, "messages:delete")
                .merge(permitted(axum::routing::delete(messages::delete), state, "messages:delete")),
        )
        .route(
            "/api/visits",
            post(visits::record).merge(permitted(get(visits::list), state, "visits:view")),
        )
        .route("/api/visits/stats", permitted(get(visits::stats), state, "visits:view"))
        .route(
            "/api/memories",
            get(memories::list).merge(permitted(post(memories::create), state, "memories:create")),
        )
        .route(
            "/api/memories/:id",
            get(memories::get)
                .merge(permitted(put(memories::update), state, "memories:edit"))
                .merge(permitted(axum::routing::delete(memories::delete), state, "memories:delete")),
        )
}

const CONTENT_SECURITY_POLICY: &str = "default-src 'self';base-uri 'self';\
font-src 'self' https: data:;form-action 'self';frame-ancestors 'self';\
img-src 'self' data:;object-src 'none';script-src 'self';script-src-attr 'none';\
style-src 'self' https: 'unsafe-inline';upgrade-insecure-requests";

/// Hardening headers added to every response that does not set them itself.
/// The content security policy is only sent in production.
fn security_headers(content_security_policy: bool) -> Vec<(HeaderName, HeaderValue)> {
    let mut headers = vec![
        (header::X_CONTENT_TYPE_OPTIONS, HeaderValue::from_static("nosniff")),
        (header::X_FRAME_OPTIONS, HeaderValue::from_static("SAMEORIGIN")),
        (header::REFERRER_POLICY, HeaderValue::from_static("no-referrer")),
        (
            header::STRICT_TRANSPORT_SECURITY,
            HeaderValue::from_static("max-age=15552000; includeSubDomains"),
        ),
        (header::X_DNS_PREFETCH_CONTROL, HeaderValue::from_static("off")),
        (header::X_XSS_PROTECTION, HeaderValue::from_static("0")),
        (
            HeaderName::from_static("cross-origin-opener-policy"),
            HeaderValue::from_static("same-origin"),
        ),
        (
            HeaderName::from_static("cross-origin-resource-policy"),
            HeaderValue::from_static("same-origin"),
        ),
        (HeaderName::from_static("origin-agent-cluster"), HeaderValue::from_static("?1")),
        (HeaderName::from_static("x-download-options"), HeaderValue::from_static("noopen")),
        (
            HeaderName::from_static("x-permitted-cross-domain-policies"),
            HeaderValue::from_static("none"),
        ),
    ];
    if content_security_policy {
        headers.push((
            header::CONTENT_SECURITY_POLICY,
            HeaderValue::from_static(CONTENT_SECURITY_POLICY),
        ));
    }
    headers
}

/// `*` allows any origin; otherwise only the listed ones (none when empty).
fn cors_layer(origins: &[String]) -> CorsLayer {
    let base = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE, Method::OPTIONS])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE]);

    if origins.iter().any(|o| o == "*") {
        return base.allow_origin(Any);
    }

    let allowed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!("Ignoring invalid CORS origin: {}", origin);
                None
            }
        })
        .collect();
    base.allow_origin(allowed)
}
