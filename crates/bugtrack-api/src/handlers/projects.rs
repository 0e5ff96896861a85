//! Project handlers

use axum::{
    extract::{Path, Query, State},
    Extension, Json,
};
use bugtrack_db::entities::{project, ticket};
use bugtrack_db::{cascade, IdList};
use chrono::Utc;
use sea_orm::{ActiveModelTrait, ColumnTrait, EntityTrait, QueryFilter, Set, TransactionTrait};
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

use crate::error::ApiError;
use crate::middleware::CurrentUser;
use crate::models::{ErrorResponse, ProjectCreate, ProjectEdit};
use crate::policy;
use crate::shape::{
    self, Shape, ShapeQuery, PROJECT_FIELDS, PROJECT_RELATIONS, TICKET_FIELDS, TICKET_RELATIONS,
};
use crate::AppState;

const INVALID_ID: &str = "id: Project id must be a valid id string";

async fn find_project<C: sea_orm::ConnectionTrait>(
    conn: &C,
    id: Uuid,
) -> Result<project::Model, ApiError> {
    project::Entity::find_by_id(id)
        .one(conn)
        .await?
        .ok_or(ApiError::NotFound("Project"))
}

/// Create a project; the creator becomes its manager and first member
#[utoipa::path(
    post,
    path = "/projects",
    responses(
        (status = 200, description = "Project created"),
        (status = 403, description = "Access denied", body = ErrorResponse)
    ),
    tag = "projects"
)]
pub async fn create(
    State(state): State<Arc<AppState>>,
    Extension(CurrentUser(requester)): Extension<CurrentUser>,
    Json(body): Json<Value>,
) -> Result<Json<Value>, ApiError> {
    let payload = ProjectCreate::from_value(&body)?;

    if !policy::can_create_project(&requester) {
        return Err(ApiError::denied());
    }

    let txn = state.db.begin().await?;

    let project = project::ActiveModel {
        id: Set(Uuid::new_v4()),
        title: Set(payload.title),
        description: Set(payload.description),
        created: Set(Utc::now()),
        manager: Set(Some(requester.id)),
        users: Set(IdList::new(vec![requester.id])),
        tickets: Set(IdList::default()),
    }
    .insert(&txn)
    .await?;

    cascade::project_created(&txn, &project)
        .await
        .map_err(|e| ApiError::from_cascade(e, "manager"))?;
    txn.commit().await?;
    info!(project = %project.id, manager = %requester.id, "project created");

    let mut body = super::envelope("Project created", Some(&requester));
    body.insert("url".to_string(), json!(format!("/projects/{}", project.id)));
    Ok(Json(Value::Object(body)))
}

/// List projects, shaped by `select` / `populate`
#[utoipa::path(
    get,
    path = "/projects",
    params(ShapeQuery),
    responses((status = 200, description = "Projects list")),
    tag = "projects"
)]
pub async fn list(
    State(state): State<Arc<AppState>>,
    Extension(CurrentUser(requester)): Extension<CurrentUser>,
    Query(query): Query<ShapeQuery>,
) -> Result<Json<Value>, ApiError> {
    let shape = Shape::parse(&query, PROJECT_FIELDS, PROJECT_RELATIONS);
    let projects = project::Entity::find().all(&state.db).await?;
    let values = shape::project_values(&state.db, &projects, &shape).await?;

    let mut body = super::envelope("Projects list retrieved", Some(&requester));
    body.insert("projects".to_string(), Value::Array(values));
    Ok(Json(Value::Object(body)))
}

/// Project details, shaped by `select` / `populate`
#[utoipa::path(
    get,
    path = "/projects/{id}",
    params(("id" = String, Path, description = "Project id"), ShapeQuery),
    responses(
        (status = 200, description = "Project details"),
        (status = 404, description = "Project not found", body = ErrorResponse)
    ),
    tag = "projects"
)]
pub async fn details(
    State(state): State<Arc<AppState>>,
    Extension(CurrentUser(requester)): Extension<CurrentUser>,
    Path(id): Path<String>,
    Query(query): Query<ShapeQuery>,
) -> Result<Json<Value>, ApiError> {
    let id = super::parse_id(&id, INVALID_ID)?;
    let shape = Shape::parse(&query, PROJECT_FIELDS, PROJECT_RELATIONS);

    let project = find_project(&state.db, id).await?;
    let mut values = shape::project_values(&state.db, std::slice::from_ref(&project), &shape).await?;

    let mut body = super::envelope("Project details retrieved", Some(&requester));
    body.insert("project".to_string(), values.remove(0));
    Ok(Json(Value::Object(body)))
}

/// Edit a project: title, description, member list, manager reassignment
#[utoipa::path(
    put,
    path = "/projects/{id}",
    responses(
        (status = 200, description = "Project updated"),
        (status = 400, description = "Validation failure", body = ErrorResponse),
        (status = 403, description = "Access denied", body = ErrorResponse),
        (status = 404, description = "Project not found", body = ErrorResponse)
    ),
    tag = "projects"
)]
pub async fn edit(
    State(state): State<Arc<AppState>>,
    Extension(CurrentUser(requester)): Extension<CurrentUser>,
    Path(id): Path<String>,
    Json(body): Json<Value>,
) -> Result<Json<Value>, ApiError> {
    let id = super::parse_id(&id, INVALID_ID)?;
    let payload = ProjectEdit::from_value(&body)?;
    super::confirm_password(&requester, &payload.password)?;

    let txn = state.db.begin().await?;
    let project = find_project(&txn, id).await?;

    if !policy::can_manage_project(&requester, project.manager) {
        return Err(ApiError::denied());
    }

    let mut active: project::ActiveModel = project.clone().into();
    let mut pending_users: Option<IdList> = None;

    if let Some(users) = payload.users.as_deref() {
        let resulting = cascade::update_project_users(&txn, &project, users)
            .await
            .map_err(|e| ApiError::from_cascade(e, "users"))?;
        pending_users = Some(resulting);
    }

    if let Some(new_manager) = payload.manager {
        if Some(new_manager) != project.manager {
            let resulting =
                cascade::update_project_manager(&txn, &project, new_manager, pending_users.as_ref())
                    .await
                    .map_err(|e| ApiError::from_cascade(e, "manager"))?;
            active.manager = Set(Some(new_manager));
            pending_users = Some(resulting);
        }
    }

    if let Some(users) = pending_users {
        active.users = Set(users);
    }
    if let Some(title) = payload.title {
        active.title = Set(title);
    }
    if let Some(description) = payload.description {
        active.description = Set(description);
    }

    active.update(&txn).await?;
    txn.commit().await?;
    info!(project = %id, "project updated");

    Ok(Json(Value::Object(super::envelope(
        "Project details updated",
        Some(&requester),
    ))))
}

/// Delete a project, cascading into its tickets and their comments
#[utoipa::path(
    delete,
    path = "/projects/{id}",
    responses(
        (status = 200, description = "Project deleted"),
        (status = 400, description = "Password not confirmed", body = ErrorResponse),
        (status = 403, description = "Access denied", body = ErrorResponse),
        (status = 404, description = "Project not found", body = ErrorResponse)
    ),
    tag = "projects"
)]
pub async fn delete(
    State(state): State<Arc<AppState>>,
    Extension(CurrentUser(requester)): Extension<CurrentUser>,
    Path(id): Path<String>,
    Json(body): Json<Value>,
) -> Result<Json<Value>, ApiError> {
    let id = super::parse_id(&id, INVALID_ID)?;
    let password = crate::models::required_password(&body)?;
    super::confirm_password(&requester, &password)?;

    let txn = state.db.begin().await?;
    let project = find_project(&txn, id).await?;

    if !policy::can_manage_project(&requester, project.manager) {
        return Err(ApiError::denied());
    }

    cascade::delete_project(&txn, project)
        .await
        .map_err(|e| ApiError::from_cascade(e, "id"))?;
    txn.commit().await?;
    info!(project = %id, "project deleted");

    Ok(Json(Value::Object(super::envelope(
        "Project deleted",
        Some(&requester),
    ))))
}

/// Tickets under a project, submitters populated
#[utoipa::path(
    get,
    path = "/projects/{id}/tickets",
    params(("id" = String, Path, description = "Project id")),
    responses(
        (status = 200, description = "Project tickets"),
        (status = 404, description = "Project not found", body = ErrorResponse)
    ),
    tag = "projects"
)]
pub async fn tickets(
    State(state): State<Arc<AppState>>,
    Extension(CurrentUser(requester)): Extension<CurrentUser>,
    Path(id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let id = super::parse_id(&id, INVALID_ID)?;
    let project = find_project(&state.db, id).await?;

    let tickets = ticket::Entity::find()
        .filter(ticket::Column::Project.eq(project.id))
        .all(&state.db)
        .await?;

    let query = ShapeQuery {
        select: None,
        populate: Some("submitter".to_string()),
    };
    let shape = Shape::parse(&query, TICKET_FIELDS, TICKET_RELATIONS);
    let values = shape::ticket_values(&state.db, &tickets, &shape).await?;

    let mut body = super::envelope("Project tickets retrieved", Some(&requester));
    body.insert("tickets".to_string(), Value::Array(values));
    Ok(Json(Value::Object(body)))
}
