//! Request handlers
//!
//! Handlers stay thin: validate the payload, check policy, run the entity
//! write plus its reference cascade inside one transaction, and shape the
//! response envelope.

pub mod comments;
pub mod projects;
pub mod session;
pub mod tickets;
pub mod users;

use axum::Json;
use bugtrack_auth::verify_password;
use bugtrack_db::entities::user;
use serde_json::{json, Map, Value};
use uuid::Uuid;

use crate::error::ApiError;
use crate::models::{HealthResponse, UserView};

/// Success envelope: `{status, message, session, ...}`. Callers add payload
/// keys before wrapping in `Json`.
pub(crate) fn envelope(message: &str, session: Option<&user::Model>) -> Map<String, Value> {
    let mut body = Map::new();
    body.insert("status".to_string(), json!(200));
    body.insert("message".to_string(), json!(message));
    body.insert(
        "session".to_string(),
        match session {
            Some(user) => json!(UserView::from(user)),
            None => Value::Null,
        },
    );
    body
}

pub(crate) fn parse_id(raw: &str, message: &'static str) -> Result<Uuid, ApiError> {
    Uuid::parse_str(raw).map_err(|_| ApiError::validation(message))
}

/// Verify the re-submitted password on a destructive request.
pub(crate) fn confirm_password(user: &user::Model, password: &str) -> Result<(), ApiError> {
    if verify_password(password, &user.password_hash)? {
        Ok(())
    } else {
        Err(ApiError::validation("password: Incorrect password"))
    }
}

/// Service health
#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "Service is healthy", body = HealthResponse)
    ),
    tag = "system"
)]
pub async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}
