//! User handlers: signup plus user CRUD

use axum::{
    extract::{Path, State},
    http::header,
    response::{AppendHeaders, IntoResponse, Response},
    Extension, Json,
};
use bugtrack_auth::hash_password;
use bugtrack_db::entities::user;
use bugtrack_db::{cascade, IdList};
use chrono::Utc;
use sea_orm::{ActiveModelTrait, EntityTrait, Set, TransactionTrait};
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

use crate::error::ApiError;
use crate::middleware::CurrentUser;
use crate::models::{
    parse_role, required_password, ErrorResponse, SignupRequest, UserEditRequest, UserView,
};
use crate::policy;
use crate::AppState;

use super::session::{clear_session_cookie, issue_token, session_cookie};

/// Sign up a new account; a fresh session is established
#[utoipa::path(
    post,
    path = "/users",
    request_body = SignupRequest,
    responses(
        (status = 200, description = "Signed up; session cookie set"),
        (status = 400, description = "Validation failure or duplicate email", body = ErrorResponse)
    ),
    tag = "users"
)]
pub async fn signup(
    State(state): State<Arc<AppState>>,
    Json(body): Json<SignupRequest>,
) -> Result<impl IntoResponse, ApiError> {
    body.validate()?;

    let txn = state.db.begin().await?;

    if bugtrack_db::find_user_by_email(&txn, &body.email)
        .await?
        .is_some()
    {
        return Err(ApiError::validation("User already exists"));
    }

    let user = user::ActiveModel {
        id: Set(Uuid::new_v4()),
        email: Set(body.email.trim().to_string()),
        password_hash: Set(hash_password(body.password.trim())?),
        first_name: Set(body.first_name.trim().to_string()),
        last_name: Set(body.last_name.trim().to_string()),
        role: Set(user::Role::User),
        registered: Set(Utc::now()),
        projects: Set(IdList::default()),
        tickets: Set(IdList::default()),
        comments: Set(IdList::default()),
    }
    .insert(&txn)
    .await?;

    txn.commit().await?;

    let token = issue_token(&state, user.id)?;
    info!(user = %user.id, "signed up");

    let body = super::envelope("Signed up", Some(&user));
    Ok((
        AppendHeaders([(header::SET_COOKIE, session_cookie(&token, state.session_hours))]),
        Json(Value::Object(body)),
    ))
}

/// List all users (Admin and Project Manager only)
#[utoipa::path(
    get,
    path = "/users",
    responses(
        (status = 200, description = "Users list"),
        (status = 403, description = "Access denied", body = ErrorResponse)
    ),
    tag = "users"
)]
pub async fn list(
    State(state): State<Arc<AppState>>,
    Extension(CurrentUser(requester)): Extension<CurrentUser>,
) -> Result<Json<Value>, ApiError> {
    if !policy::can_list_users(&requester) {
        return Err(ApiError::denied());
    }

    let users = user::Entity::find().all(&state.db).await?;
    let views: Vec<UserView> = users.iter().map(UserView::from).collect();

    let mut body = super::envelope("Users list retrieved", Some(&requester));
    body.insert("users".to_string(), json!(views));
    Ok(Json(Value::Object(body)))
}

/// User details
#[utoipa::path(
    get,
    path = "/users/{id}",
    params(("id" = String, Path, description = "User id")),
    responses(
        (status = 200, description = "User details"),
        (status = 404, description = "User not found", body = ErrorResponse)
    ),
    tag = "users"
)]
pub async fn details(
    State(state): State<Arc<AppState>>,
    Extension(CurrentUser(requester)): Extension<CurrentUser>,
    Path(id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let id = super::parse_id(&id, "Invalid user id")?;

    let user = user::Entity::find_by_id(id)
        .one(&state.db)
        .await?
        .ok_or(ApiError::NotFound("User"))?;

    let mut body = super::envelope("User details retrieved", Some(&requester));
    body.insert("user".to_string(), json!(UserView::from(&user)));
    Ok(Json(Value::Object(body)))
}

/// Edit a user profile; role changes are Admin-only and never on self
#[utoipa::path(
    put,
    path = "/users/{id}",
    params(("id" = String, Path, description = "User id")),
    request_body = UserEditRequest,
    responses(
        (status = 200, description = "User updated"),
        (status = 403, description = "Access denied", body = ErrorResponse),
        (status = 404, description = "User not found", body = ErrorResponse)
    ),
    tag = "users"
)]
pub async fn edit(
    State(state): State<Arc<AppState>>,
    Extension(CurrentUser(requester)): Extension<CurrentUser>,
    Path(id): Path<String>,
    Json(body): Json<UserEditRequest>,
) -> Result<Json<Value>, ApiError> {
    let id = super::parse_id(&id, "Invalid user id")?;
    body.validate()?;

    if !policy::can_edit_user(&requester, id) {
        return Err(ApiError::denied());
    }

    let role = match body.role.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        Some(raw) => {
            if !policy::can_edit_role(&requester, id) {
                return Err(ApiError::denied());
            }
            // validate() already vetted the name
            parse_role(raw)
        }
        None => None,
    };

    let txn = state.db.begin().await?;

    let target = user::Entity::find_by_id(id)
        .one(&txn)
        .await?
        .ok_or(ApiError::NotFound("User"))?;

    let mut active: user::ActiveModel = target.clone().into();

    if let Some(email) = body.email.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        if !email.eq_ignore_ascii_case(&target.email) {
            if bugtrack_db::find_user_by_email(&txn, email).await?.is_some() {
                return Err(ApiError::validation("User already exists"));
            }
        }
        active.email = Set(email.to_string());
    }
    if let Some(password) = body
        .password
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
    {
        active.password_hash = Set(hash_password(password)?);
    }
    if let Some(first_name) = body
        .first_name
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
    {
        active.first_name = Set(first_name.to_string());
    }
    if let Some(last_name) = body
        .last_name
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
    {
        active.last_name = Set(last_name.to_string());
    }
    if let Some(role) = role {
        active.role = Set(role);
    }

    let updated = active.update(&txn).await?;
    txn.commit().await?;

    let session = if requester.id == id { &updated } else { &requester };
    let mut body = super::envelope("User details updated", Some(session));
    body.insert("user".to_string(), json!(UserView::from(&updated)));
    Ok(Json(Value::Object(body)))
}

/// Delete a user. Admin accounts can never be deleted; the user's projects,
/// tickets, and comments outlive them with references nulled or pruned.
#[utoipa::path(
    delete,
    path = "/users/{id}",
    params(("id" = String, Path, description = "User id")),
    responses(
        (status = 200, description = "User deleted"),
        (status = 400, description = "Password not confirmed", body = ErrorResponse),
        (status = 403, description = "Access denied", body = ErrorResponse),
        (status = 404, description = "User not found", body = ErrorResponse)
    ),
    tag = "users"
)]
pub async fn delete(
    State(state): State<Arc<AppState>>,
    Extension(CurrentUser(requester)): Extension<CurrentUser>,
    Path(id): Path<String>,
    Json(body): Json<Value>,
) -> Result<Response, ApiError> {
    let id = super::parse_id(&id, "Invalid user id")?;
    let password = required_password(&body)?;
    super::confirm_password(&requester, &password)?;

    if !policy::can_delete_user(&requester, id) {
        return Err(ApiError::denied());
    }

    let txn = state.db.begin().await?;

    let target = user::Entity::find_by_id(id)
        .one(&txn)
        .await?
        .ok_or(ApiError::NotFound("User"))?;

    if target.role == user::Role::Admin {
        return Err(ApiError::AccessDenied("Cannot delete admin".to_string()));
    }

    cascade::delete_user(&txn, target)
        .await
        .map_err(|e| ApiError::from_cascade(e, "id"))?;
    txn.commit().await?;
    info!(user = %id, "user deleted");

    if requester.id == id {
        // Self-deletion ends the session.
        let body = super::envelope("User deleted", None);
        Ok((
            AppendHeaders([(header::SET_COOKIE, clear_session_cookie())]),
            Json(Value::Object(body)),
        )
            .into_response())
    } else {
        let body = super::envelope("User deleted", Some(&requester));
        Ok(Json(Value::Object(body)).into_response())
    }
}
