//! services/api/src/web/middleware.rs
//!
//! Authentication middleware for protecting routes.

use axum::{
    extract::Request,
    http::{header, HeaderMap, HeaderValue},
    middleware::Next,
    response::Response,
};
use case_desk_core::domain::{AuthSession, Role};
use tracing::{debug, Instrument};
use uuid::Uuid;

use crate::error::ApiError;

pub const USER_ID_HEADER: &str = "x-user-id";
pub const USER_ROLE_HEADER: &str = "x-user-role";
pub const REQUEST_ID_HEADER: &str = "x-request-id";

fn header_text<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
}

/// Builds the caller's session from the request headers.
///
/// The bearer token is not validated here; it is forwarded to the backend,
/// which rejects it if it is stale.
pub fn session_from_headers(headers: &HeaderMap) -> Result<AuthSession, ApiError> {
    let token = header_text(headers, header::AUTHORIZATION.as_str())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .ok_or(ApiError::Unauthorized)?;
    let user_id = header_text(headers, USER_ID_HEADER).ok_or(ApiError::Unauthorized)?;
    let role = header_text(headers, USER_ROLE_HEADER)
        .and_then(Role::parse)
        .ok_or(ApiError::Unauthorized)?;

    Ok(AuthSession {
        token: token.to_string(),
        user_id: user_id.to_string(),
        role,
    })
}

/// Middleware that requires a complete session on every protected route.
///
/// If valid, inserts the `AuthSession` into request extensions for handlers to use
/// and tags the request with an id, echoed back in `x-request-id`.
/// If anything is missing, returns 401 Unauthorized.
pub async fn require_auth(mut req: Request, next: Next) -> Result<Response, ApiError> {
    let session = session_from_headers(req.headers()).map_err(|e| {
        debug!(path = %req.uri().path(), "Rejected request without a session");
        e
    })?;

    let request_id = Uuid::new_v4();
    let span = tracing::info_span!(
        "session",
        %request_id,
        user_id = %session.user_id,
        role = %session.role
    );
    req.extensions_mut().insert(session);

    let mut response = next.run(req).instrument(span).await;
    if let Ok(value) = HeaderValue::from_str(&request_id.to_string()) {
        response.headers_mut().insert(REQUEST_ID_HEADER, value);
    }
    Ok(response)
}
