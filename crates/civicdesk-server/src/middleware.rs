//! Bearer-token authentication and the login throttle key.

use std::net::SocketAddr;

use axum::extract::{Request, State};
use axum::http::HeaderMap;
use axum::http::header::AUTHORIZATION;
use axum::middleware::Next;
use axum::response::Response;
use civicdesk_core::error::CivicError;

use crate::error::ApiError;
use crate::extract::CurrentUser;
use crate::state::AppState;

/// Resolve the bearer token to an active user and stash it in the
/// request extensions. Rejects with 401 when the token is missing or
/// invalid, 403 when the account is deactivated.
pub async fn require_auth(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let token = bearer_token(request.headers()).ok_or_else(|| CivicError::Unauthenticated {
        reason: "not authorized to access this route".into(),
    })?;
    let user = state.identity.resolve(token).await?;
    tracing::debug!(user_id = %user.id, role = %user.role, "Request authenticated");
    request.extensions_mut().insert(CurrentUser(user));
    Ok(next.run(request).await)
}

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

/// Login throttle key for a request. The peer address is used unless
/// the server sits behind a trusted proxy, in which case the first hop
/// of `X-Forwarded-For` identifies the client.
pub fn client_key(
    headers: &HeaderMap,
    peer: Option<SocketAddr>,
    trust_proxy: bool,
) -> Option<String> {
    let forwarded = trust_proxy.then(|| forwarded_for(headers)).flatten();
    forwarded.or_else(|| peer.map(|addr| addr.ip().to_string()))
}

fn forwarded_for(headers: &HeaderMap) -> Option<String> {
    headers
        .get("x-forwarded-for")?
        .to_str()
        .ok()?
        .split(',')
        .next()
        .map(str::trim)
        .filter(|ip| !ip.is_empty())
        .map(String::from)
}
