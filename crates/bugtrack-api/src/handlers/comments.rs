//! Comment handlers

use axum::{
    extract::{Path, Query, State},
    Extension, Json,
};
use bugtrack_db::cascade;
use bugtrack_db::entities::{comment, ticket};
use chrono::Utc;
use sea_orm::{ActiveModelTrait, EntityTrait, Set, TransactionTrait};
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

use crate::error::ApiError;
use crate::middleware::CurrentUser;
use crate::models::{required_password, CommentCreate, CommentEdit, ErrorResponse};
use crate::policy;
use crate::shape::{self, Shape, ShapeQuery, COMMENT_FIELDS, COMMENT_RELATIONS};
use crate::AppState;

const INVALID_ID: &str = "id: Comment id must be a valid id string";

async fn find_comment<C: sea_orm::ConnectionTrait>(
    conn: &C,
    id: Uuid,
) -> Result<comment::Model, ApiError> {
    comment::Entity::find_by_id(id)
        .one(conn)
        .await?
        .ok_or(ApiError::NotFound("Comment"))
}

/// Comment on a ticket the requester is linked to
#[utoipa::path(
    post,
    path = "/comments",
    responses(
        (status = 200, description = "Comment created"),
        (status = 403, description = "Access denied", body = ErrorResponse),
        (status = 404, description = "Ticket not found", body = ErrorResponse)
    ),
    tag = "comments"
)]
pub async fn create(
    State(state): State<Arc<AppState>>,
    Extension(CurrentUser(requester)): Extension<CurrentUser>,
    Json(body): Json<Value>,
) -> Result<Json<Value>, ApiError> {
    let payload = CommentCreate::from_value(&body)?;

    if !policy::can_create_comment(&requester, payload.ticket) {
        return Err(ApiError::denied());
    }

    let txn = state.db.begin().await?;

    ticket::Entity::find_by_id(payload.ticket)
        .one(&txn)
        .await?
        .ok_or(ApiError::NotFound("Ticket"))?;

    let comment = comment::ActiveModel {
        id: Set(Uuid::new_v4()),
        content: Set(payload.content),
        created: Set(Utc::now()),
        ticket: Set(payload.ticket),
        submitter: Set(Some(requester.id)),
    }
    .insert(&txn)
    .await?;

    cascade::comment_created(&txn, &comment)
        .await
        .map_err(|e| ApiError::from_cascade(e, "ticket"))?;
    txn.commit().await?;
    info!(comment = %comment.id, ticket = %payload.ticket, "comment created");

    let mut body = super::envelope("Comment created", Some(&requester));
    body.insert("url".to_string(), json!(format!("/comments/{}", comment.id)));
    Ok(Json(Value::Object(body)))
}

/// List comments, shaped by `select` / `populate`
#[utoipa::path(
    get,
    path = "/comments",
    params(ShapeQuery),
    responses((status = 200, description = "Comments list")),
    tag = "comments"
)]
pub async fn list(
    State(state): State<Arc<AppState>>,
    Extension(CurrentUser(requester)): Extension<CurrentUser>,
    Query(query): Query<ShapeQuery>,
) -> Result<Json<Value>, ApiError> {
    let shape = Shape::parse(&query, COMMENT_FIELDS, COMMENT_RELATIONS);
    let comments = comment::Entity::find().all(&state.db).await?;
    let values = shape::comment_values(&state.db, &comments, &shape).await?;

    let mut body = super::envelope("Comments list retrieved", Some(&requester));
    body.insert("comments".to_string(), Value::Array(values));
    Ok(Json(Value::Object(body)))
}

/// Comment details, shaped by `select` / `populate`
#[utoipa::path(
    get,
    path = "/comments/{id}",
    params(("id" = String, Path, description = "Comment id"), ShapeQuery),
    responses(
        (status = 200, description = "Comment details"),
        (status = 404, description = "Comment not found", body = ErrorResponse)
    ),
    tag = "comments"
)]
pub async fn details(
    State(state): State<Arc<AppState>>,
    Extension(CurrentUser(requester)): Extension<CurrentUser>,
    Path(id): Path<String>,
    Query(query): Query<ShapeQuery>,
) -> Result<Json<Value>, ApiError> {
    let id = super::parse_id(&id, INVALID_ID)?;
    let shape = Shape::parse(&query, COMMENT_FIELDS, COMMENT_RELATIONS);

    let comment = find_comment(&state.db, id).await?;
    let mut values =
        shape::comment_values(&state.db, std::slice::from_ref(&comment), &shape).await?;

    let mut body = super::envelope("Comment details retrieved", Some(&requester));
    body.insert("comment".to_string(), values.remove(0));
    Ok(Json(Value::Object(body)))
}

/// Edit a comment; only the original submitter may
#[utoipa::path(
    put,
    path = "/comments/{id}",
    responses(
        (status = 200, description = "Comment updated"),
        (status = 400, description = "Validation failure", body = ErrorResponse),
        (status = 403, description = "Access denied", body = ErrorResponse),
        (status = 404, description = "Comment not found", body = ErrorResponse)
    ),
    tag = "comments"
)]
pub async fn edit(
    State(state): State<Arc<AppState>>,
    Extension(CurrentUser(requester)): Extension<CurrentUser>,
    Path(id): Path<String>,
    Json(body): Json<Value>,
) -> Result<Json<Value>, ApiError> {
    let id = super::parse_id(&id, INVALID_ID)?;
    let payload = CommentEdit::from_value(&body)?;
    super::confirm_password(&requester, &payload.password)?;

    let txn = state.db.begin().await?;
    let comment = find_comment(&txn, id).await?;

    if !policy::can_edit_comment(&requester, &comment) {
        return Err(ApiError::denied());
    }

    let mut active: comment::ActiveModel = comment.into();
    active.content = Set(payload.content);
    active.update(&txn).await?;
    txn.commit().await?;
    info!(comment = %id, "comment updated");

    Ok(Json(Value::Object(super::envelope(
        "Comment details updated",
        Some(&requester),
    ))))
}

/// Delete a comment; Admin or the original submitter
#[utoipa::path(
    delete,
    path = "/comments/{id}",
    responses(
        (status = 200, description = "Comment deleted"),
        (status = 400, description = "Password not confirmed", body = ErrorResponse),
        (status = 403, description = "Access denied", body = ErrorResponse),
        (status = 404, description = "Comment not found", body = ErrorResponse)
    ),
    tag = "comments"
)]
pub async fn delete(
    State(state): State<Arc<AppState>>,
    Extension(CurrentUser(requester)): Extension<CurrentUser>,
    Path(id): Path<String>,
    Json(body): Json<Value>,
) -> Result<Json<Value>, ApiError> {
    let id = super::parse_id(&id, INVALID_ID)?;
    let password = required_password(&body)?;
    super::confirm_password(&requester, &password)?;

    let txn = state.db.begin().await?;
    let comment = find_comment(&txn, id).await?;

    if !policy::can_delete_comment(&requester, &comment) {
        return Err(ApiError::denied());
    }

    cascade::delete_comment(&txn, comment)
        .await
        .map_err(|e| ApiError::from_cascade(e, "id"))?;
    txn.commit().await?;
    info!(comment = %id, "comment deleted");

    Ok(Json(Value::Object(super::envelope(
        "Comment deleted",
        Some(&requester),
    ))))
}
