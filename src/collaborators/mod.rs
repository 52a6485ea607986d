//! Narrow interfaces to services owned outside this crate.
//!
//! User accounts, the category catalog and email delivery are consumed
//! through these traits; the transport layer wires in real implementations.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::errors::AppError;

/// Error type for external collaborator failures.
#[derive(Debug, Clone, thiserror::Error)]
pub enum CollaboratorError {
    /// The collaborator answered, and the entity does not exist.
    #[error("{0} not found")]
    NotFound(String),

    /// The collaborator could not be reached or failed.
    #[error("{0}")]
    Unavailable(String),
}

impl From<CollaboratorError> for AppError {
    fn from(err: CollaboratorError) -> Self {
        match err {
            CollaboratorError::NotFound(what) => AppError::NotFound(format!("{} not found", what)),
            CollaboratorError::Unavailable(msg) => {
                tracing::error!("Collaborator failure: {}", msg);
                AppError::Dependency(msg)
            }
        }
    }
}

/// An account from the user directory.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: String,
    pub display_name: String,
    pub email: String,
}

#[async_trait]
pub trait UserDirectory: Send + Sync {
    async fn retrieve_user_by_id(&self, id: &str) -> Result<Option<User>, CollaboratorError>;

    /// Look a user up by email or username.
    async fn get_user_by_identifier(
        &self,
        identifier: &str,
    ) -> Result<Option<User>, CollaboratorError>;
}

#[async_trait]
pub trait CategoryCatalog: Send + Sync {
    /// `Err(NotFound)` when the category, or the sub-category within it, is unknown.
    async fn verify_category_and_sub_category_exist(
        &self,
        category_id: &str,
        sub_category: Option<&str>,
    ) -> Result<(), CollaboratorError>;
}

/// Sent to the administrators when a project is submitted for review.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmissionEmail {
    pub to: String,
    pub project_id: String,
    pub title: String,
    pub category: String,
    pub submitter: String,
    pub summary: String,
    pub submitted_at: String,
}

/// Sent to the project creator once an admin has decided.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApprovalEmail {
    pub to: String,
    pub recipient_name: String,
    pub project_id: String,
    pub title: String,
    pub approved: bool,
    pub reason: String,
}

/// Fire-and-await email delivery, no delivery guarantee.
#[async_trait]
pub trait NotificationService: Send + Sync {
    async fn send_project_submission_email(
        &self,
        email: &SubmissionEmail,
    ) -> Result<(), CollaboratorError>;

    async fn send_project_approval_email(
        &self,
        email: &ApprovalEmail,
    ) -> Result<(), CollaboratorError>;
}

/// Result of the notification that follows a committed transition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "camelCase")]
pub enum NotificationStatus {
    Sent,
    Failed { reason: String },
}

impl NotificationStatus {
    pub fn from_result(result: Result<(), CollaboratorError>) -> Self {
        match result {
            Ok(()) => NotificationStatus::Sent,
            Err(e) => NotificationStatus::Failed {
                reason: e.to_string(),
            },
        }
    }
}

/// Resolve a user or fail with `NotFound`.
pub async fn require_user(
    users: &dyn UserDirectory,
    user_id: &str,
) -> Result<User, AppError> {
    users
        .retrieve_user_by_id(user_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("User {} not found", user_id)))
}
