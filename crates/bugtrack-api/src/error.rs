//! Error boundary for the REST layer
//!
//! Every handler failure funnels through [`ApiError`], which maps to the
//! `{status, message}` JSON envelope. Server errors are masked outside of
//! dev mode; the full error always goes to tracing.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use bugtrack_db::CascadeError;
use sea_orm::DbErr;
use serde_json::json;
use std::sync::atomic::{AtomicBool, Ordering};
use thiserror::Error;

static DEV_MODE: AtomicBool = AtomicBool::new(false);

/// Enable unmasked 500 messages (development only).
pub fn set_dev_mode(enabled: bool) {
    DEV_MODE.store(enabled, Ordering::Relaxed);
}

pub fn dev_mode() -> bool {
    DEV_MODE.load(Ordering::Relaxed)
}

#[derive(Debug, Error)]
pub enum ApiError {
    /// 400: first failing validation rule
    #[error("{0}")]
    Validation(String),

    /// 401: no valid session
    #[error("Authentication required")]
    AuthRequired,

    /// 403: role/ownership denial
    #[error("{0}")]
    AccessDenied(String),

    /// 404: entity kind that was not found ("User", "Project", ...)
    #[error("{0} not found")]
    NotFound(&'static str),

    /// 500: anything unexpected
    #[error("{0}")]
    Server(#[from] anyhow::Error),
}

impl ApiError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub fn denied() -> Self {
        Self::AccessDenied("Access denied".to_string())
    }

    /// Map a cascade failure into the API envelope. Validation messages get
    /// the `field: message` prefix of the request field that caused them.
    pub fn from_cascade(err: CascadeError, field: &str) -> Self {
        match err {
            CascadeError::Db(e) => Self::Server(e.into()),
            CascadeError::NotFound(kind) => Self::NotFound(kind),
            CascadeError::ManagerNotQualified
            | CascadeError::NotProjectMember
            | CascadeError::NotDeveloper => Self::Validation(format!("{}: {}", field, err)),
        }
    }

    fn status(&self) -> StatusCode {
        match self {
            Self::Validation(_) => StatusCode::BAD_REQUEST,
            Self::AuthRequired => StatusCode::UNAUTHORIZED,
            Self::AccessDenied(_) => StatusCode::FORBIDDEN,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Server(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<DbErr> for ApiError {
    fn from(err: DbErr) -> Self {
        Self::Server(err.into())
    }
}

impl From<bugtrack_auth::PasswordError> for ApiError {
    fn from(err: bugtrack_auth::PasswordError) -> Self {
        Self::Server(err.into())
    }
}

impl From<bugtrack_auth::SessionError> for ApiError {
    fn from(_: bugtrack_auth::SessionError) -> Self {
        Self::AuthRequired
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();

        let message = if status == StatusCode::INTERNAL_SERVER_ERROR {
            tracing::error!(error = %self, "request failed");
            if dev_mode() {
                self.to_string()
            } else {
                "Server error".to_string()
            }
        } else {
            tracing::debug!(status = %status, error = %self, "request rejected");
            self.to_string()
        };

        let body = json!({
            "status": status.as_u16(),
            "message": message,
        });

        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cascade_validation_errors_carry_field_prefix() {
        let err = ApiError::from_cascade(CascadeError::NotDeveloper, "devs");
        assert!(matches!(
            &err,
            ApiError::Validation(msg) if msg == "devs: User is not a developer"
        ));

        let err = ApiError::from_cascade(CascadeError::ManagerNotQualified, "manager");
        assert_eq!(err.to_string(), "manager: User is not a project manager");
    }

    #[test]
    fn cascade_not_found_maps_to_404() {
        let err = ApiError::from_cascade(CascadeError::NotFound("User"), "users");
        assert_eq!(err.status(), StatusCode::NOT_FOUND);
        assert_eq!(err.to_string(), "User not found");
    }
}
