//! API data models and request validation
//!
//! Entity payloads arrive as loose JSON and are validated field by field so
//! rejections report the first failing rule in the `field: message` format.
//! User/session payloads use typed DTOs with unprefixed messages.

use bugtrack_db::entities::user;
use sea_orm::ActiveEnum;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::error::ApiError;

/// Error envelope returned by every failing request
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ErrorResponse {
    pub status: u16,
    pub message: String,
}

/// Health check response
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

/// Full user representation (password hash never leaves the server)
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UserView {
    pub id: Uuid,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub role: String,
    pub registered: chrono::DateTime<chrono::Utc>,
    pub projects: Vec<Uuid>,
    pub tickets: Vec<Uuid>,
    pub comments: Vec<Uuid>,
}

impl From<&user::Model> for UserView {
    fn from(user: &user::Model) -> Self {
        Self {
            id: user.id,
            email: user.email.clone(),
            first_name: user.first_name.clone(),
            last_name: user.last_name.clone(),
            role: user.role.to_value(),
            registered: user.registered,
            projects: user.projects.iter().collect(),
            tickets: user.tickets.iter().collect(),
            comments: user.comments.iter().collect(),
        }
    }
}

/// Short user representation used when populating references
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UserSummary {
    pub id: Uuid,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub role: String,
}

impl From<&user::Model> for UserSummary {
    fn from(user: &user::Model) -> Self {
        Self {
            id: user.id,
            email: user.email.clone(),
            first_name: user.first_name.clone(),
            last_name: user.last_name.clone(),
            role: user.role.to_value(),
        }
    }
}

/// Signin payload
#[derive(Debug, Deserialize, ToSchema)]
pub struct SigninRequest {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

/// Signup payload
#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SignupRequest {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
}

impl SignupRequest {
    pub fn validate(&self) -> Result<(), ApiError> {
        let email = self.email.trim();
        if email.is_empty() {
            return Err(ApiError::validation("Email is required"));
        }
        if !email_is_valid(email) {
            return Err(ApiError::validation("Email is not valid"));
        }
        let password = self.password.trim();
        if password.is_empty() {
            return Err(ApiError::validation("Password is required"));
        }
        if password.chars().count() < 8 {
            return Err(ApiError::validation("Password is less than 8 characters"));
        }
        if self.first_name.trim().is_empty() {
            return Err(ApiError::validation("First name is required"));
        }
        if self.last_name.trim().is_empty() {
            return Err(ApiError::validation("Last name is required"));
        }
        Ok(())
    }
}

/// User edit payload; all fields optional, role changes are Admin-gated
#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UserEditRequest {
    pub email: Option<String>,
    pub password: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub role: Option<String>,
}

impl UserEditRequest {
    pub fn validate(&self) -> Result<(), ApiError> {
        if let Some(email) = self.email.as_deref() {
            if !email.trim().is_empty() && !email_is_valid(email.trim()) {
                return Err(ApiError::validation("Email is not valid"));
            }
        }
        if let Some(password) = self.password.as_deref() {
            if !password.trim().is_empty() && password.trim().chars().count() < 8 {
                return Err(ApiError::validation("Password is less than 8 characters"));
            }
        }
        if let Some(role) = self.role.as_deref() {
            if parse_role(role.trim()).is_none() {
                return Err(ApiError::validation("Invalid user role"));
            }
        }
        Ok(())
    }
}

pub fn parse_role(value: &str) -> Option<user::Role> {
    match value {
        "Admin" => Some(user::Role::Admin),
        "Project Manager" => Some(user::Role::ProjectManager),
        "Developer" => Some(user::Role::Developer),
        "User" => Some(user::Role::User),
        _ => None,
    }
}

/// Minimal RFC-ish shape check: local part, @, domain with a dot.
fn email_is_valid(email: &str) -> bool {
    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };
    !local.is_empty()
        && !domain.is_empty()
        && !domain.starts_with('.')
        && !domain.ends_with('.')
        && domain.contains('.')
        && !email.contains(char::is_whitespace)
}

// Loose-JSON field accessors for the project/ticket/comment payloads.

fn string_field(
    body: &Value,
    field: &str,
    label: &str,
) -> Result<Option<String>, ApiError> {
    match body.get(field) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s.trim().to_string())),
        Some(_) => Err(ApiError::Validation(format!(
            "{}: {} must be of type String",
            field, label
        ))),
    }
}

fn required_string(body: &Value, field: &str, label: &str) -> Result<String, ApiError> {
    let value = string_field(body, field, label)?;
    match value {
        Some(s) if !s.is_empty() => Ok(s),
        _ => Err(ApiError::Validation(format!(
            "{}: {} is required",
            field, label
        ))),
    }
}

fn id_field(body: &Value, field: &str, label: &str) -> Result<Option<Uuid>, ApiError> {
    match string_field(body, field, label)? {
        None => Ok(None),
        Some(s) => Uuid::parse_str(&s).map(Some).map_err(|_| {
            ApiError::Validation(format!(
                "{}: {} must be a valid id string",
                field, label
            ))
        }),
    }
}

fn id_list_field(body: &Value, field: &str, label: &str) -> Result<Option<Vec<Uuid>>, ApiError> {
    match body.get(field) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Array(entries)) => {
            let mut ids = Vec::with_capacity(entries.len());
            for entry in entries {
                let Value::String(s) = entry else {
                    return Err(ApiError::Validation(format!(
                        "{}: {} entries must be of type String",
                        field, label
                    )));
                };
                let id = Uuid::parse_str(s.trim()).map_err(|_| {
                    ApiError::Validation(format!(
                        "{}: {} must consist of valid id strings",
                        field, label
                    ))
                })?;
                ids.push(id);
            }
            Ok(Some(ids))
        }
        Some(_) => Err(ApiError::Validation(format!(
            "{}: {} must be an Array",
            field, label
        ))),
    }
}

fn bool_field(body: &Value, field: &str, label: &str) -> Result<Option<bool>, ApiError> {
    match body.get(field) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Bool(b)) => Ok(Some(*b)),
        Some(_) => Err(ApiError::Validation(format!(
            "{}: {} must be of type Boolean",
            field, label
        ))),
    }
}

/// Password re-confirmation carried by every destructive request body.
pub fn required_password(body: &Value) -> Result<String, ApiError> {
    required_string(body, "password", "Password")
}

#[derive(Debug)]
pub struct ProjectCreate {
    pub title: String,
    pub description: String,
}

impl ProjectCreate {
    pub fn from_value(body: &Value) -> Result<Self, ApiError> {
        Ok(Self {
            title: required_string(body, "title", "Title")?,
            description: string_field(body, "description", "Description")?.unwrap_or_default(),
        })
    }
}

pub struct ProjectEdit {
    pub password: String,
    pub title: Option<String>,
    pub description: Option<String>,
    pub manager: Option<Uuid>,
    pub users: Option<Vec<Uuid>>,
}

impl ProjectEdit {
    pub fn from_value(body: &Value) -> Result<Self, ApiError> {
        Ok(Self {
            password: required_password(body)?,
            title: string_field(body, "title", "Title")?.filter(|s| !s.is_empty()),
            description: string_field(body, "description", "Description")?
                .filter(|s| !s.is_empty()),
            manager: id_field(body, "manager", "Manager")?,
            users: id_list_field(body, "users", "Users")?,
        })
    }
}

pub struct TicketCreate {
    pub title: String,
    pub description: String,
    pub project: Uuid,
}

impl TicketCreate {
    pub fn from_value(body: &Value) -> Result<Self, ApiError> {
        let title = required_string(body, "title", "Title")?;
        let description = required_string(body, "description", "Description")?;
        let project = id_field(body, "project", "Project")?.ok_or_else(|| {
            ApiError::validation("project: Project must be a valid id string")
        })?;
        Ok(Self {
            title,
            description,
            project,
        })
    }
}

#[derive(Debug)]
pub struct TicketEdit {
    pub password: String,
    pub title: Option<String>,
    pub description: Option<String>,
    pub status: Option<bool>,
    pub devs: Option<Vec<Uuid>>,
}

impl TicketEdit {
    pub fn from_value(body: &Value) -> Result<Self, ApiError> {
        Ok(Self {
            password: required_password(body)?,
            title: string_field(body, "title", "Title")?.filter(|s| !s.is_empty()),
            description: string_field(body, "description", "Description")?
                .filter(|s| !s.is_empty()),
            status: bool_field(body, "status", "Status")?,
            devs: id_list_field(body, "devs", "Devs")?,
        })
    }
}

pub struct CommentCreate {
    pub content: String,
    pub ticket: Uuid,
}

impl CommentCreate {
    pub fn from_value(body: &Value) -> Result<Self, ApiError> {
        let content = required_string(body, "content", "Content")?;
        let ticket = id_field(body, "ticket", "Ticket")?.ok_or_else(|| {
            ApiError::validation("ticket: Ticket must be a valid id string")
        })?;
        Ok(Self { content, ticket })
    }
}

pub struct CommentEdit {
    pub password: String,
    pub content: String,
}

impl CommentEdit {
    pub fn from_value(body: &Value) -> Result<Self, ApiError> {
        Ok(Self {
            password: required_password(body)?,
            content: required_string(body, "content", "Content")?,
        })
    }
}
