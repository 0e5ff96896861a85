//! Session Middleware
//!
//! Extracts the session token from the HTTP-only cookie (preferred) or the
//! Authorization header, validates it, and loads the requester's current
//! user row into request extensions. Loading fresh means role changes and
//! reference-list updates take effect immediately, and the stored password
//! hash is available for re-confirmation on destructive requests.

use axum::{
    extract::{Request, State},
    http::{header, HeaderMap},
    middleware::Next,
    response::Response,
};
use bugtrack_db::entities::user;
use sea_orm::EntityTrait;
use std::sync::Arc;

use crate::error::ApiError;
use crate::AppState;

/// Name of the session cookie
pub const SESSION_COOKIE: &str = "bugtrack_session";

/// The authenticated requester, as stored in the database right now
#[derive(Clone)]
pub struct CurrentUser(pub user::Model);

fn token_from_headers(headers: &HeaderMap) -> Option<String> {
    // Cookie first (web clients), then Bearer (API clients).
    let from_cookie = headers
        .get(header::COOKIE)
        .and_then(|h| h.to_str().ok())
        .and_then(|cookies| {
            cookies
                .split(';')
                .map(str::trim)
                .find_map(|c| c.strip_prefix(SESSION_COOKIE).and_then(|c| c.strip_prefix('=')))
        })
        .filter(|t| !t.is_empty())
        .map(str::to_string);

    from_cookie.or_else(|| {
        headers
            .get(header::AUTHORIZATION)
            .and_then(|h| h.to_str().ok())
            .and_then(|h| h.strip_prefix("Bearer "))
            .map(str::to_string)
    })
}

/// Reject the request with 401 unless it carries a valid session whose user
/// still exists.
pub async fn require_session(
    State(state): State<Arc<AppState>>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let token = token_from_headers(request.headers()).ok_or(ApiError::AuthRequired)?;

    let claims = state.sessions.validate(&token)?;

    let user = user::Entity::find_by_id(claims.sub)
        .one(&state.db)
        .await?
        .ok_or(ApiError::AuthRequired)?;

    request.extensions_mut().insert(CurrentUser(user));

    Ok(next.run(request).await)
}
