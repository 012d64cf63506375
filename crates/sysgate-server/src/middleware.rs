//! Access gates applied to route groups.

use std::net::SocketAddr;

use axum::extract::{ConnectInfo, Request, State};
use axum::http::HeaderMap;
use axum::middleware::Next;
use axum::response::Response;
use sysgate_auth::{AUTHORIZATION_HEADER, Credentials, SESSION_TOKEN_HEADER, X_API_KEY_HEADER};
use sysgate_query::{ApiError, ErrorCode};
use tracing::debug;

use crate::error::ServerError;
use crate::state::SharedState;

/// Reads both credential kinds from request headers.
pub fn credentials_from(headers: &HeaderMap) -> Credentials {
    let header = |name: &str| headers.get(name).and_then(|v| v.to_str().ok());
    Credentials::from_headers(
        header(SESSION_TOKEN_HEADER),
        header(AUTHORIZATION_HEADER),
        header(X_API_KEY_HEADER),
    )
}

/// Admits read-only keys and admin sessions. The resolved role is stored
/// in the request extensions.
pub async fn require_read_only(
    State(state): State<SharedState>,
    mut request: Request,
    next: Next,
) -> Result<Response, ServerError> {
    let creds = credentials_from(request.headers());
    let role = state.resolver().require_read_only(&creds).map_err(|_| {
        debug!(path = %request.uri().path(), "rejected unauthenticated read");
        ApiError::new(ErrorCode::Unauthorized, "Authentication required")
            .with_details("Provide X-API-Key header or X-Session-Token header")
    })?;
    request.extensions_mut().insert(role);
    Ok(next.run(request).await)
}

/// Admits only live admin sessions.
pub async fn require_admin(
    State(state): State<SharedState>,
    request: Request,
    next: Next,
) -> Result<Response, ServerError> {
    let creds = credentials_from(request.headers());
    state.resolver().require_admin(&creds).map_err(|_| {
        debug!(path = %request.uri().path(), "rejected admin request");
        ApiError::new(ErrorCode::Unauthorized, "Admin authentication required")
            .with_details("Provide a valid X-Session-Token header")
    })?;
    Ok(next.run(request).await)
}

/// Admits only loopback peers. Forwarding headers are ignored.
pub async fn require_localhost(request: Request, next: Next) -> Result<Response, ServerError> {
    let peer = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.to_string());
    sysgate_auth::require_localhost(peer.as_deref())?;
    Ok(next.run(request).await)
}
