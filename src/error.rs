use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::db::room::ModifyError;
use crate::models::RoomError;
use crate::validation::ValidationErrors;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Invalid input: {0}")]
    Validation(ValidationErrors),

    #[error("{0}")]
    BadRequest(String),

    #[error("You need to sign in first")]
    Unauthorized,

    #[error("You are not allowed to {0}")]
    Forbidden(&'static str),

    #[error("{0}")]
    NotFound(&'static str),

    #[error("{0}")]
    Conflict(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

pub type AppResult<T> = Result<T, AppError>;

impl From<ValidationErrors> for AppError {
    fn from(errors: ValidationErrors) -> Self {
        AppError::Validation(errors)
    }
}

impl From<RoomError> for AppError {
    fn from(error: RoomError) -> Self {
        match error {
            RoomError::RoomNotFound => AppError::NotFound("Room not found"),
            RoomError::PanelNotFound => AppError::NotFound("Panel not found"),
            RoomError::LastPanel => AppError::Conflict(RoomError::LastPanel.to_string()),
            RoomError::InvalidConfiguration(msg) => AppError::BadRequest(msg),
        }
    }
}

impl From<ModifyError> for AppError {
    fn from(error: ModifyError) -> Self {
        match error {
            ModifyError::Room(e) => e.into(),
            ModifyError::Database(e) => AppError::Database(e),
        }
    }
}

/// Postgres unique_violation.
const UNIQUE_VIOLATION: &str = "23505";

impl AppError {
    /// Map a unique-constraint failure to a conflict; everything else stays a database error.
    pub fn from_write(error: sqlx::Error, conflict_message: &str) -> Self {
        if let sqlx::Error::Database(ref db) = error {
            if db.code().as_deref() == Some(UNIQUE_VIOLATION) {
                return AppError::Conflict(conflict_message.to_string());
            }
        }
        AppError::Database(error)
    }

    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Validation(_) | AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::Unauthorized => StatusCode::UNAUTHORIZED,
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::Database(_) | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();

        let body = match self {
            AppError::Validation(errors) => json!({
                "success": false,
                "error": "Please fix the highlighted fields",
                "fields": errors,
            }),
            AppError::Database(ref e) => {
                tracing::error!("Database error: {}", e);
                json!({ "success": false, "error": "Something went wrong, please try again" })
            }
            AppError::Internal(ref e) => {
                tracing::error!("Internal error: {:#}", e);
                json!({ "success": false, "error": "Something went wrong, please try again" })
            }
            other => json!({ "success": false, "error": other.to_string() }),
        };

        (status, Json(body)).into_response()
    }
}
