//! Signin / signout / current-session handlers

use axum::{
    extract::State,
    http::header,
    response::AppendHeaders,
    Extension, Json,
};
use bugtrack_auth::{SessionClaims, SessionValidator};
use chrono::Duration;
use serde_json::Value;
use std::sync::Arc;
use tracing::info;

use crate::error::ApiError;
use crate::middleware::{CurrentUser, SESSION_COOKIE};
use crate::models::{ErrorResponse, SigninRequest};
use crate::AppState;

pub(crate) fn session_cookie(token: &str, hours: i64) -> String {
    format!(
        "{}={}; HttpOnly; SameSite=Lax; Path=/; Max-Age={}",
        SESSION_COOKIE,
        token,
        hours * 3600
    )
}

pub(crate) fn clear_session_cookie() -> String {
    format!("{}=; HttpOnly; SameSite=Lax; Path=/; Max-Age=0", SESSION_COOKIE)
}

pub(crate) fn issue_token(state: &AppState, user_id: uuid::Uuid) -> Result<String, ApiError> {
    let claims = SessionClaims::new(user_id, Duration::hours(state.session_hours));
    SessionValidator::encode(state.session_secret.as_bytes(), &claims)
        .map_err(|e| ApiError::Server(e.into()))
}

/// Sign in with email and password
#[utoipa::path(
    post,
    path = "/",
    request_body = SigninRequest,
    responses(
        (status = 200, description = "Signed in; session cookie set"),
        (status = 400, description = "Incorrect email or password", body = ErrorResponse)
    ),
    tag = "session"
)]
pub async fn signin(
    State(state): State<Arc<AppState>>,
    Json(body): Json<SigninRequest>,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    let user = bugtrack_db::find_user_by_email(&state.db, &body.email)
        .await?
        .ok_or_else(|| ApiError::validation("Incorrect email or password"))?;

    if !bugtrack_auth::verify_password(&body.password, &user.password_hash)? {
        return Err(ApiError::validation("Incorrect email or password"));
    }

    let token = issue_token(&state, user.id)?;
    info!(user = %user.id, "signed in");

    let body = super::envelope("Signed in", Some(&user));
    Ok((
        AppendHeaders([(header::SET_COOKIE, session_cookie(&token, state.session_hours))]),
        Json(Value::Object(body)),
    ))
}

/// Sign out, clearing the session cookie
#[utoipa::path(
    delete,
    path = "/",
    responses(
        (status = 200, description = "Signed out; session cookie cleared")
    ),
    tag = "session"
)]
pub async fn signout() -> impl axum::response::IntoResponse {
    let body = super::envelope("Signed out", None);
    (
        AppendHeaders([(header::SET_COOKIE, clear_session_cookie())]),
        Json(Value::Object(body)),
    )
}

/// Current session details
#[utoipa::path(
    get,
    path = "/",
    responses(
        (status = 200, description = "Current session user"),
        (status = 401, description = "Not signed in", body = ErrorResponse)
    ),
    tag = "session"
)]
pub async fn current_session(
    Extension(CurrentUser(user)): Extension<CurrentUser>,
) -> Json<Value> {
    Json(Value::Object(super::envelope("Authorized", Some(&user))))
}
