//! Error handling module for the projects backend.
//!
//! Provides the centralized error taxonomy with stable error codes and the
//! mapping onto the tagged result outcomes returned to callers.

use serde::{Deserialize, Serialize};

use crate::models::ProjectStatus;

/// Error codes as constants to avoid stringly-typed errors.
pub mod codes {
    pub const VALIDATION_ERROR: &str = "VALIDATION_ERROR";
    pub const INVALID_TRANSITION: &str = "INVALID_TRANSITION";
    pub const ALREADY_IN_STATUS: &str = "ALREADY_IN_STATUS";
    pub const ALREADY_FINALIZED: &str = "ALREADY_FINALIZED";
    pub const UNAUTHORIZED_FIELDS: &str = "UNAUTHORIZED_FIELDS";
    pub const UNAUTHORIZED: &str = "UNAUTHORIZED";
    pub const NOT_DRAFT: &str = "NOT_DRAFT";
    pub const NOT_FOUND: &str = "NOT_FOUND";
    pub const DEPENDENCY_ERROR: &str = "DEPENDENCY_ERROR";
    pub const DUPLICATE_TITLE: &str = "DUPLICATE_TITLE";
    pub const VERSION_MISMATCH: &str = "VERSION_MISMATCH";
    pub const DATABASE_ERROR: &str = "DATABASE_ERROR";
}

/// Tag attached to every result handed back to the transport layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Outcome {
    Success,
    ClientError,
    Unauthorized,
    ServerError,
}

/// Application error type.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// Malformed or missing input
    #[error("{0}")]
    Validation(String),

    /// Status change not present in the transition table
    #[error("Cannot move project from '{from}' to '{to}'")]
    InvalidTransition {
        from: ProjectStatus,
        to: ProjectStatus,
    },

    #[error("Project is already in status '{0}'")]
    AlreadyInStatus(ProjectStatus),

    /// Project sits in a terminal status
    #[error("Project is already finalized with status '{0}'")]
    AlreadyFinalized(ProjectStatus),

    /// Acting member lacks the permission for one or more requested fields
    #[error("Not allowed to edit fields: {}", .0.join(", "))]
    UnauthorizedFields(Vec<String>),

    /// Acting member may not perform this operation at all
    #[error("{0}")]
    Unauthorized(String),

    #[error("Project {0} is not a draft")]
    NotDraft(String),

    #[error("{0}")]
    NotFound(String),

    /// External collaborator (email, category catalog, user directory) failed
    #[error("{0}")]
    Dependency(String),

    #[error("A project titled '{0}' already exists")]
    DuplicateTitle(String),

    /// Optimistic concurrency conflict
    #[error("{message}")]
    Conflict {
        message: String,
        current_version: i64,
    },

    #[error("{0}")]
    Database(String),
}

impl AppError {
    /// Get the result outcome for this error.
    pub fn outcome(&self) -> Outcome {
        match self {
            AppError::UnauthorizedFields(_) | AppError::Unauthorized(_) => Outcome::Unauthorized,
            AppError::Dependency(_) | AppError::Database(_) => Outcome::ServerError,
            _ => Outcome::ClientError,
        }
    }

    /// Get the error code for this error.
    pub fn error_code(&self) -> &'static str {
        match self {
            AppError::Validation(_) => codes::VALIDATION_ERROR,
            AppError::InvalidTransition { .. } => codes::INVALID_TRANSITION,
            AppError::AlreadyInStatus(_) => codes::ALREADY_IN_STATUS,
            AppError::AlreadyFinalized(_) => codes::ALREADY_FINALIZED,
            AppError::UnauthorizedFields(_) => codes::UNAUTHORIZED_FIELDS,
            AppError::Unauthorized(_) => codes::UNAUTHORIZED,
            AppError::NotDraft(_) => codes::NOT_DRAFT,
            AppError::NotFound(_) => codes::NOT_FOUND,
            AppError::Dependency(_) => codes::DEPENDENCY_ERROR,
            AppError::DuplicateTitle(_) => codes::DUPLICATE_TITLE,
            AppError::Conflict { .. } => codes::VERSION_MISMATCH,
            AppError::Database(_) => codes::DATABASE_ERROR,
        }
    }

    /// Structured details for variants that carry more than a message.
    pub fn details(&self) -> Option<serde_json::Value> {
        match self {
            AppError::InvalidTransition { from, to } => {
                Some(serde_json::json!({ "from": from, "to": to }))
            }
            AppError::UnauthorizedFields(fields) => {
                Some(serde_json::json!({ "fields": fields }))
            }
            AppError::Conflict {
                current_version, ..
            } => Some(serde_json::json!({ "currentVersion": current_version })),
            _ => None,
        }
    }
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        if let sqlx::Error::Database(db_err) = &err {
            if db_err.is_unique_violation() && db_err.message().contains("title_key") {
                return AppError::DuplicateTitle(db_err.message().to_string());
            }
        }
        tracing::error!("Database error: {:?}", err);
        AppError::Database(format!("Database error: {}", err))
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        tracing::error!("JSON error: {:?}", err);
        AppError::Database(format!("Corrupt stored JSON: {}", err))
    }
}

/// Error details in the response envelope.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorDetails {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl From<&AppError> for ErrorDetails {
    fn from(error: &AppError) -> Self {
        Self {
            code: error.error_code().to_string(),
            message: error.to_string(),
            details: error.details(),
        }
    }
}
