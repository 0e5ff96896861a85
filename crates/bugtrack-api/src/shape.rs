//! Response shaping for the `select` / `populate` query parameters
//!
//! Both parameters are space-separated token lists. `select` limits which
//! entity fields appear; `populate` replaces id references with embedded
//! DTOs. Unknown tokens are ignored. `id` is always present.

use std::collections::{HashMap, HashSet};

use bugtrack_db::entities::{comment, project, ticket, user};
use bugtrack_db::IdList;
use sea_orm::{ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter};
use serde::Deserialize;
use serde_json::{json, Map, Value};
use utoipa::IntoParams;
use uuid::Uuid;

use crate::error::ApiError;
use crate::models::UserSummary;

pub const PROJECT_FIELDS: &[&str] =
    &["title", "description", "manager", "users", "tickets", "created"];
pub const PROJECT_RELATIONS: &[&str] = &["manager", "users", "tickets"];

pub const TICKET_FIELDS: &[&str] = &[
    "title",
    "description",
    "status",
    "project",
    "submitter",
    "devs",
    "comments",
    "created",
];
pub const TICKET_RELATIONS: &[&str] = &["project", "submitter", "devs", "comments"];

pub const COMMENT_FIELDS: &[&str] = &["content", "ticket", "submitter", "created"];
pub const COMMENT_RELATIONS: &[&str] = &["ticket", "submitter"];

/// Raw `select` / `populate` query string parameters
#[derive(Debug, Default, Deserialize, IntoParams)]
pub struct ShapeQuery {
    pub select: Option<String>,
    pub populate: Option<String>,
}

/// Parsed response shape for one entity kind
#[derive(Debug)]
pub struct Shape {
    select: HashSet<String>,
    populate: HashSet<String>,
}

impl Shape {
    pub fn parse(query: &ShapeQuery, fields: &[&str], relations: &[&str]) -> Self {
        let select = match query.select.as_deref() {
            Some(raw) => raw
                .split_whitespace()
                .filter(|token| fields.contains(token))
                .map(str::to_string)
                .collect(),
            None => fields.iter().map(|f| f.to_string()).collect(),
        };

        let populate = query
            .populate
            .as_deref()
            .unwrap_or_default()
            .split_whitespace()
            .filter(|token| relations.contains(token))
            .map(str::to_string)
            .collect();

        Self { select, populate }
    }

    fn selected(&self, field: &str) -> bool {
        self.select.contains(field)
    }

    fn populated(&self, field: &str) -> bool {
        self.populate.contains(field)
    }
}

fn ids_value(list: &IdList) -> Value {
    json!(list.iter().collect::<Vec<Uuid>>())
}

fn summary_value(summaries: &HashMap<Uuid, Value>, id: Uuid) -> Value {
    summaries.get(&id).cloned().unwrap_or(Value::Null)
}

fn summaries_value(summaries: &HashMap<Uuid, Value>, list: &IdList) -> Value {
    Value::Array(
        list.iter()
            .filter_map(|id| summaries.get(&id).cloned())
            .collect(),
    )
}

async fn load_user_summaries<C: ConnectionTrait>(
    conn: &C,
    ids: HashSet<Uuid>,
) -> Result<HashMap<Uuid, Value>, ApiError> {
    if ids.is_empty() {
        return Ok(HashMap::new());
    }
    let users = user::Entity::find()
        .filter(user::Column::Id.is_in(ids))
        .all(conn)
        .await?;
    Ok(users
        .iter()
        .map(|u| (u.id, json!(UserSummary::from(u))))
        .collect())
}

async fn load_tickets<C: ConnectionTrait>(
    conn: &C,
    ids: HashSet<Uuid>,
) -> Result<HashMap<Uuid, ticket::Model>, ApiError> {
    if ids.is_empty() {
        return Ok(HashMap::new());
    }
    let rows = ticket::Entity::find()
        .filter(ticket::Column::Id.is_in(ids))
        .all(conn)
        .await?;
    Ok(rows.into_iter().map(|t| (t.id, t)).collect())
}

async fn load_comments<C: ConnectionTrait>(
    conn: &C,
    ids: HashSet<Uuid>,
) -> Result<HashMap<Uuid, comment::Model>, ApiError> {
    if ids.is_empty() {
        return Ok(HashMap::new());
    }
    let rows = comment::Entity::find()
        .filter(comment::Column::Id.is_in(ids))
        .all(conn)
        .await?;
    Ok(rows.into_iter().map(|c| (c.id, c)).collect())
}

async fn load_projects<C: ConnectionTrait>(
    conn: &C,
    ids: HashSet<Uuid>,
) -> Result<HashMap<Uuid, project::Model>, ApiError> {
    if ids.is_empty() {
        return Ok(HashMap::new());
    }
    let rows = project::Entity::find()
        .filter(project::Column::Id.is_in(ids))
        .all(conn)
        .await?;
    Ok(rows.into_iter().map(|p| (p.id, p)).collect())
}

/// Ticket embedded under a populated project: everything but the project
/// reference, submitter replaced with a summary.
fn embedded_ticket(ticket: &ticket::Model, summaries: &HashMap<Uuid, Value>) -> Value {
    json!({
        "id": ticket.id,
        "title": ticket.title,
        "description": ticket.description,
        "status": ticket.status,
        "submitter": ticket.submitter.map(|id| summary_value(summaries, id)),
        "devs": ids_value(&ticket.devs),
        "comments": ids_value(&ticket.comments),
        "created": ticket.created,
    })
}

/// Comment embedded under a populated ticket: everything but the ticket
/// reference, submitter replaced with a summary.
fn embedded_comment(comment: &comment::Model, summaries: &HashMap<Uuid, Value>) -> Value {
    json!({
        "id": comment.id,
        "content": comment.content,
        "submitter": comment.submitter.map(|id| summary_value(summaries, id)),
        "created": comment.created,
    })
}

/// Shape a batch of projects. Related rows are loaded once for the whole
/// batch; detail endpoints pass a single-element slice.
pub async fn project_values<C: ConnectionTrait>(
    conn: &C,
    projects: &[project::Model],
    shape: &Shape,
) -> Result<Vec<Value>, ApiError> {
    let populate_tickets = shape.selected("tickets") && shape.populated("tickets");

    let tickets = if populate_tickets {
        load_tickets(
            conn,
            projects.iter().flat_map(|p| p.tickets.iter()).collect(),
        )
        .await?
    } else {
        HashMap::new()
    };

    let mut user_ids: HashSet<Uuid> = HashSet::new();
    if shape.selected("manager") && shape.populated("manager") {
        user_ids.extend(projects.iter().filter_map(|p| p.manager));
    }
    if shape.selected("users") && shape.populated("users") {
        user_ids.extend(projects.iter().flat_map(|p| p.users.iter()));
    }
    user_ids.extend(tickets.values().filter_map(|t| t.submitter));
    let summaries = load_user_summaries(conn, user_ids).await?;

    let mut values = Vec::with_capacity(projects.len());
    for project in projects {
        let mut obj = Map::new();
        obj.insert("id".to_string(), json!(project.id));
        if shape.selected("title") {
            obj.insert("title".to_string(), json!(project.title));
        }
        if shape.selected("description") {
            obj.insert("description".to_string(), json!(project.description));
        }
        if shape.selected("manager") {
            let value = match project.manager {
                Some(id) if shape.populated("manager") => summary_value(&summaries, id),
                other => json!(other),
            };
            obj.insert("manager".to_string(), value);
        }
        if shape.selected("users") {
            let value = if shape.populated("users") {
                summaries_value(&summaries, &project.users)
            } else {
                ids_value(&project.users)
            };
            obj.insert("users".to_string(), value);
        }
        if shape.selected("tickets") {
            let value = if populate_tickets {
                Value::Array(
                    project
                        .tickets
                        .iter()
                        .filter_map(|id| tickets.get(&id))
                        .map(|t| embedded_ticket(t, &summaries))
                        .collect(),
                )
            } else {
                ids_value(&project.tickets)
            };
            obj.insert("tickets".to_string(), value);
        }
        if shape.selected("created") {
            obj.insert("created".to_string(), json!(project.created));
        }
        values.push(Value::Object(obj));
    }

    Ok(values)
}

/// Shape a batch of tickets.
pub async fn ticket_values<C: ConnectionTrait>(
    conn: &C,
    tickets: &[ticket::Model],
    shape: &Shape,
) -> Result<Vec<Value>, ApiError> {
    let populate_project = shape.selected("project") && shape.populated("project");
    let populate_comments = shape.selected("comments") && shape.populated("comments");

    let projects = if populate_project {
        load_projects(conn, tickets.iter().map(|t| t.project).collect()).await?
    } else {
        HashMap::new()
    };
    let comments = if populate_comments {
        load_comments(
            conn,
            tickets.iter().flat_map(|t| t.comments.iter()).collect(),
        )
        .await?
    } else {
        HashMap::new()
    };

    let mut user_ids: HashSet<Uuid> = HashSet::new();
    if shape.selected("submitter") && shape.populated("submitter") {
        user_ids.extend(tickets.iter().filter_map(|t| t.submitter));
    }
    if shape.selected("devs") && shape.populated("devs") {
        user_ids.extend(tickets.iter().flat_map(|t| t.devs.iter()));
    }
    user_ids.extend(projects.values().filter_map(|p| p.manager));
    user_ids.extend(comments.values().filter_map(|c| c.submitter));
    let summaries = load_user_summaries(conn, user_ids).await?;

    let mut values = Vec::with_capacity(tickets.len());
    for ticket in tickets {
        let mut obj = Map::new();
        obj.insert("id".to_string(), json!(ticket.id));
        if shape.selected("title") {
            obj.insert("title".to_string(), json!(ticket.title));
        }
        if shape.selected("description") {
            obj.insert("description".to_string(), json!(ticket.description));
        }
        if shape.selected("status") {
            obj.insert("status".to_string(), json!(ticket.status));
        }
        if shape.selected("project") {
            let value = match projects.get(&ticket.project) {
                Some(project) if populate_project => json!({
                    "id": project.id,
                    "title": project.title,
                    "description": project.description,
                    "manager": project.manager.map(|id| summary_value(&summaries, id)),
                    "users": ids_value(&project.users),
                    "tickets": ids_value(&project.tickets),
                    "created": project.created,
                }),
                _ => json!(ticket.project),
            };
            obj.insert("project".to_string(), value);
        }
        if shape.selected("submitter") {
            let value = match ticket.submitter {
                Some(id) if shape.populated("submitter") => summary_value(&summaries, id),
                other => json!(other),
            };
            obj.insert("submitter".to_string(), value);
        }
        if shape.selected("devs") {
            let value = if shape.populated("devs") {
                summaries_value(&summaries, &ticket.devs)
            } else {
                ids_value(&ticket.devs)
            };
            obj.insert("devs".to_string(), value);
        }
        if shape.selected("comments") {
            let value = if populate_comments {
                Value::Array(
                    ticket
                        .comments
                        .iter()
                        .filter_map(|id| comments.get(&id))
                        .map(|c| embedded_comment(c, &summaries))
                        .collect(),
                )
            } else {
                ids_value(&ticket.comments)
            };
            obj.insert("comments".to_string(), value);
        }
        if shape.selected("created") {
            obj.insert("created".to_string(), json!(ticket.created));
        }
        values.push(Value::Object(obj));
    }

    Ok(values)
}

/// Shape a batch of comments.
pub async fn comment_values<C: ConnectionTrait>(
    conn: &C,
    comments: &[comment::Model],
    shape: &Shape,
) -> Result<Vec<Value>, ApiError> {
    let populate_ticket = shape.selected("ticket") && shape.populated("ticket");

    let tickets = if populate_ticket {
        load_tickets(conn, comments.iter().map(|c| c.ticket).collect()).await?
    } else {
        HashMap::new()
    };
    let projects = if populate_ticket {
        load_projects(conn, tickets.values().map(|t| t.project).collect()).await?
    } else {
        HashMap::new()
    };

    let mut user_ids: HashSet<Uuid> = HashSet::new();
    if shape.selected("submitter") && shape.populated("submitter") {
        user_ids.extend(comments.iter().filter_map(|c| c.submitter));
    }
    user_ids.extend(tickets.values().filter_map(|t| t.submitter));
    let summaries = load_user_summaries(conn, user_ids).await?;

    let mut values = Vec::with_capacity(comments.len());
    for comment in comments {
        let mut obj = Map::new();
        obj.insert("id".to_string(), json!(comment.id));
        if shape.selected("content") {
            obj.insert("content".to_string(), json!(comment.content));
        }
        if shape.selected("ticket") {
            let value = match tickets.get(&comment.ticket) {
                Some(ticket) if populate_ticket => {
                    let project = projects.get(&ticket.project).map(|p| {
                        json!({ "id": p.id, "title": p.title })
                    });
                    json!({
                        "id": ticket.id,
                        "title": ticket.title,
                        "description": ticket.description,
                        "status": ticket.status,
                        "project": project,
                        "submitter": ticket.submitter.map(|id| summary_value(&summaries, id)),
                        "devs": ids_value(&ticket.devs),
                        "comments": ids_value(&ticket.comments),
                        "created": ticket.created,
                    })
                }
                _ => json!(comment.ticket),
            };
            obj.insert("ticket".to_string(), value);
        }
        if shape.selected("submitter") {
            let value = match comment.submitter {
                Some(id) if shape.populated("submitter") => summary_value(&summaries, id),
                other => json!(other),
            };
            obj.insert("submitter".to_string(), value);
        }
        if shape.selected("created") {
            obj.insert("created".to_string(), json!(comment.created));
        }
        values.push(Value::Object(obj));
    }

    Ok(values)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn select_defaults_to_all_fields() {
        let shape = Shape::parse(&ShapeQuery::default(), PROJECT_FIELDS, PROJECT_RELATIONS);
        for field in PROJECT_FIELDS {
            assert!(shape.selected(field));
        }
        assert!(!shape.populated("manager"));
    }

    #[test]
    fn unknown_tokens_are_ignored() {
        let query = ShapeQuery {
            select: Some("title bogus manager".to_string()),
            populate: Some("manager nonsense".to_string()),
        };
        let shape = Shape::parse(&query, PROJECT_FIELDS, PROJECT_RELATIONS);

        assert!(shape.selected("title"));
        assert!(shape.selected("manager"));
        assert!(!shape.selected("description"));
        assert!(!shape.selected("bogus"));
        assert!(shape.populated("manager"));
        assert!(!shape.populated("nonsense"));
    }

    #[test]
    fn populate_never_widens_select() {
        let query = ShapeQuery {
            select: Some("title".to_string()),
            populate: Some("tickets".to_string()),
        };
        let shape = Shape::parse(&query, PROJECT_FIELDS, PROJECT_RELATIONS);
        assert!(!shape.selected("tickets"));
        assert!(shape.populated("tickets"));
    }
}
