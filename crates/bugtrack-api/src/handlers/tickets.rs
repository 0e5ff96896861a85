//! Ticket handlers

use axum::{
    extract::{Path, Query, State},
    Extension, Json,
};
use bugtrack_db::entities::{project, ticket};
use bugtrack_db::{cascade, IdList};
use chrono::Utc;
use sea_orm::{ActiveModelTrait, EntityTrait, Set, TransactionTrait};
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

use crate::error::ApiError;
use crate::middleware::CurrentUser;
use crate::models::{required_password, ErrorResponse, TicketCreate, TicketEdit};
use crate::policy;
use crate::shape::{self, Shape, ShapeQuery, TICKET_FIELDS, TICKET_RELATIONS};
use crate::AppState;

const INVALID_ID: &str = "id: Ticket id must be a valid id string";

async fn find_ticket<C: sea_orm::ConnectionTrait>(
    conn: &C,
    id: Uuid,
) -> Result<ticket::Model, ApiError> {
    ticket::Entity::find_by_id(id)
        .one(conn)
        .await?
        .ok_or(ApiError::NotFound("Ticket"))
}

/// Create a ticket in a project the requester belongs to
#[utoipa::path(
    post,
    path = "/tickets",
    responses(
        (status = 200, description = "Ticket created"),
        (status = 403, description = "Access denied", body = ErrorResponse),
        (status = 404, description = "Project not found", body = ErrorResponse)
    ),
    tag = "tickets"
)]
pub async fn create(
    State(state): State<Arc<AppState>>,
    Extension(CurrentUser(requester)): Extension<CurrentUser>,
    Json(body): Json<Value>,
) -> Result<Json<Value>, ApiError> {
    let payload = TicketCreate::from_value(&body)?;

    if !policy::can_create_ticket(&requester, payload.project) {
        return Err(ApiError::denied());
    }

    let txn = state.db.begin().await?;

    project::Entity::find_by_id(payload.project)
        .one(&txn)
        .await?
        .ok_or(ApiError::NotFound("Project"))?;

    let ticket = ticket::ActiveModel {
        id: Set(Uuid::new_v4()),
        title: Set(payload.title),
        description: Set(payload.description),
        status: Set(true),
        project: Set(payload.project),
        submitter: Set(Some(requester.id)),
        devs: Set(IdList::default()),
        comments: Set(IdList::default()),
        created: Set(Utc::now()),
    }
    .insert(&txn)
    .await?;

    cascade::ticket_created(&txn, &ticket)
        .await
        .map_err(|e| ApiError::from_cascade(e, "project"))?;
    txn.commit().await?;
    info!(ticket = %ticket.id, project = %payload.project, "ticket created");

    let mut body = super::envelope("Ticket created", Some(&requester));
    body.insert("url".to_string(), json!(format!("/tickets/{}", ticket.id)));
    Ok(Json(Value::Object(body)))
}

/// List tickets, shaped by `select` / `populate`
#[utoipa::path(
    get,
    path = "/tickets",
    params(ShapeQuery),
    responses((status = 200, description = "Tickets list")),
    tag = "tickets"
)]
pub async fn list(
    State(state): State<Arc<AppState>>,
    Extension(CurrentUser(requester)): Extension<CurrentUser>,
    Query(query): Query<ShapeQuery>,
) -> Result<Json<Value>, ApiError> {
    let shape = Shape::parse(&query, TICKET_FIELDS, TICKET_RELATIONS);
    let tickets = ticket::Entity::find().all(&state.db).await?;
    let values = shape::ticket_values(&state.db, &tickets, &shape).await?;

    let mut body = super::envelope("Tickets list retrieved", Some(&requester));
    body.insert("tickets".to_string(), Value::Array(values));
    Ok(Json(Value::Object(body)))
}

/// Ticket details, shaped by `select` / `populate`
#[utoipa::path(
    get,
    path = "/tickets/{id}",
    params(("id" = String, Path, description = "Ticket id"), ShapeQuery),
    responses(
        (status = 200, description = "Ticket details"),
        (status = 404, description = "Ticket not found", body = ErrorResponse)
    ),
    tag = "tickets"
)]
pub async fn details(
    State(state): State<Arc<AppState>>,
    Extension(CurrentUser(requester)): Extension<CurrentUser>,
    Path(id): Path<String>,
    Query(query): Query<ShapeQuery>,
) -> Result<Json<Value>, ApiError> {
    let id = super::parse_id(&id, INVALID_ID)?;
    let shape = Shape::parse(&query, TICKET_FIELDS, TICKET_RELATIONS);

    let ticket = find_ticket(&state.db, id).await?;
    let mut values = shape::ticket_values(&state.db, std::slice::from_ref(&ticket), &shape).await?;

    let mut body = super::envelope("Ticket details retrieved", Some(&requester));
    body.insert("ticket".to_string(), values.remove(0));
    Ok(Json(Value::Object(body)))
}

/// Edit a ticket. Field-level permissions: text for submitter/manager/Admin,
/// status for devs/manager/Admin, dev assignment for manager/Admin.
#[utoipa::path(
    put,
    path = "/tickets/{id}",
    responses(
        (status = 200, description = "Ticket updated"),
        (status = 400, description = "Validation failure", body = ErrorResponse),
        (status = 403, description = "Access denied", body = ErrorResponse),
        (status = 404, description = "Ticket not found", body = ErrorResponse)
    ),
    tag = "tickets"
)]
pub async fn edit(
    State(state): State<Arc<AppState>>,
    Extension(CurrentUser(requester)): Extension<CurrentUser>,
    Path(id): Path<String>,
    Json(body): Json<Value>,
) -> Result<Json<Value>, ApiError> {
    let id = super::parse_id(&id, INVALID_ID)?;
    let payload = TicketEdit::from_value(&body)?;
    super::confirm_password(&requester, &payload.password)?;

    let txn = state.db.begin().await?;
    let ticket = find_ticket(&txn, id).await?;
    let project = project::Entity::find_by_id(ticket.project)
        .one(&txn)
        .await?
        .ok_or(ApiError::NotFound("Project"))?;

    if !policy::can_touch_ticket(&requester, project.manager, &ticket) {
        return Err(ApiError::denied());
    }

    let mut active: ticket::ActiveModel = ticket.clone().into();

    if let Some(title) = payload.title {
        if !policy::can_edit_ticket_text(&requester, project.manager, &ticket) {
            return Err(ApiError::AccessDenied(
                "Only admin, project manager and ticket submitter can edit ticket title"
                    .to_string(),
            ));
        }
        active.title = Set(title);
    }
    if let Some(description) = payload.description {
        if !policy::can_edit_ticket_text(&requester, project.manager, &ticket) {
            return Err(ApiError::AccessDenied(
                "Only admin, project manager and ticket submitter can edit ticket description"
                    .to_string(),
            ));
        }
        active.description = Set(description);
    }
    if let Some(status) = payload.status {
        if !policy::can_edit_ticket_status(&requester, project.manager, &ticket) {
            return Err(ApiError::AccessDenied(
                "Only admin, project manager and ticket devs can edit ticket status".to_string(),
            ));
        }
        active.status = Set(status);
    }
    if let Some(devs) = payload.devs.as_deref() {
        if !policy::can_manage_ticket(&requester, project.manager) {
            return Err(ApiError::AccessDenied(
                "Only admin and project manager can edit devs list".to_string(),
            ));
        }
        let resulting = cascade::update_ticket_devs(&txn, &ticket, &project, devs)
            .await
            .map_err(|e| ApiError::from_cascade(e, "devs"))?;
        active.devs = Set(resulting);
    }

    active.update(&txn).await?;
    txn.commit().await?;
    info!(ticket = %id, "ticket updated");

    Ok(Json(Value::Object(super::envelope(
        "Ticket details updated",
        Some(&requester),
    ))))
}

/// Delete a ticket, cascading into its comments
#[utoipa::path(
    delete,
    path = "/tickets/{id}",
    responses(
        (status = 200, description = "Ticket deleted"),
        (status = 400, description = "Password not confirmed", body = ErrorResponse),
        (status = 403, description = "Access denied", body = ErrorResponse),
        (status = 404, description = "Ticket not found", body = ErrorResponse)
    ),
    tag = "tickets"
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
    let ticket = find_ticket(&txn, id).await?;
    let project = project::Entity::find_by_id(ticket.project)
        .one(&txn)
        .await?
        .ok_or(ApiError::NotFound("Project"))?;

    if !policy::can_manage_ticket(&requester, project.manager) {
        return Err(ApiError::denied());
    }

    cascade::delete_ticket(&txn, ticket)
        .await
        .map_err(|e| ApiError::from_cascade(e, "id"))?;
    txn.commit().await?;
    info!(ticket = %id, "ticket deleted");

    Ok(Json(Value::Object(super::envelope(
        "Ticket deleted",
        Some(&requester),
    ))))
}
