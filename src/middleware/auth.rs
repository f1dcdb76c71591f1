use axum::{
    extract::{Request, State},
    http::request::Parts,
    middleware::{from_fn_with_state, Next},
    response::Response,
    routing::MethodRouter,
};

use crate::app::AppState;
use crate::auth::AuthError;
use crate::error::ApiError;

/// Authenticated gate: verifies the bearer token, loads the principal and
/// injects it as an `Extension<Principal>`. Any failure ends the request
/// with 401 before the handler runs.
pub async fn require_auth(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let (mut parts, body) = request.into_parts();

    let principal = match state.gate.authenticate_headers(&parts.headers).await {
        Ok(principal) => principal,
        Err(e) => return Err(rejected(&parts, e)),
    };

    parts.extensions.insert(principal);
    Ok(next.run(Request::from_parts(parts, body)).await)
}

/// Authenticated gate followed by the permission gate for `permission`
/// (403 when the principal's role lacks it).
pub async fn require_permission(
    State(state): State<AppState>,
    permission: &'static str,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let (mut parts, body) = request.into_parts();

    let principal = match state.gate.authenticate_headers(&parts.headers).await {
        Ok(principal) => principal,
        Err(e) => return Err(rejected(&parts, e)),
    };

    if let Err(e) = state.gate.authorize(&principal, permission).await {
        tracing::warn!(
            user = principal.id,
            permission,
            "Permission denied for {} {}",
            parts.method,
            parts.uri.path()
        );
        return Err(e.into());
    }

    parts.extensions.insert(principal);
    Ok(next.run(Request::from_parts(parts, body)).await)
}

fn rejected(parts: &Parts, e: AuthError) -> ApiError {
    if e.is_unauthenticated() {
        tracing::warn!("Rejected {} {}: {}", parts.method, parts.uri.path(), e);
    }
    ApiError::from(e)
}

/// Wrap `route` so it only runs for authenticated callers.
pub fn authenticated(route: MethodRouter<AppState>, state: &AppState) -> MethodRouter<AppState> {
    route.route_layer(from_fn_with_state(state.clone(), require_auth))
}

/// Wrap `route` so it only runs for callers whose role grants `permission`.
pub fn permitted(
    route: MethodRouter<AppState>,
    state: &AppState,
    permission: &'static str,
) -> MethodRouter<AppState> {
    route.route_layer(from_fn_with_state(
        state.clone(),
        move |state: State<AppState>, request: Request, next: Next| {
            require_permission(state, permission, request, next)
        },
    ))
}
