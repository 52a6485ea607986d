//! Logical operations exposed to the transport layer.
//!
//! Every call takes the caller's identity and returns an [`ApiResponse`]
//! envelope tagged with its [`Outcome`].

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::errors::{AppError, ErrorDetails, Outcome};
use crate::lifecycle::{ApprovalDecision, ProjectLifecycle, TransitionReceipt};
use crate::models::{
    JoinProjectRequest, Member, PermissionSet, Project, ProjectRights, ProjectStatus,
    StatusHistoryEntry,
};

/// Scope granted to the caller by the authentication layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CallerScope {
    User,
    Admin,
}

/// Identity of the user behind a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Caller {
    pub user_id: String,
    pub scope: CallerScope,
}

impl Caller {
    pub fn user(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            scope: CallerScope::User,
        }
    }

    pub fn admin(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            scope: CallerScope::Admin,
        }
    }
}

/// Response envelope.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiResponse<T: Serialize> {
    pub outcome: Outcome,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorDetails>,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn is_success(&self) -> bool {
        self.outcome == Outcome::Success
    }

    /// Error code, if this is an error response.
    pub fn error_code(&self) -> Option<&str> {
        self.error.as_ref().map(|e| e.code.as_str())
    }
}

/// Create a successful API response.
pub fn success<T: Serialize>(data: T) -> ApiResponse<T> {
    ApiResponse {
        outcome: Outcome::Success,
        data: Some(data),
        error: None,
    }
}

/// Create an error API response.
pub fn error<T: Serialize>(err: AppError) -> ApiResponse<T> {
    if err.outcome() == Outcome::ServerError {
        tracing::error!(code = err.error_code(), "{}", err);
    } else {
        tracing::debug!(code = err.error_code(), "{}", err);
    }
    ApiResponse {
        outcome: err.outcome(),
        data: None,
        error: Some(ErrorDetails::from(&err)),
    }
}

fn respond<T: Serialize>(result: Result<T, AppError>) -> ApiResponse<T> {
    match result {
        Ok(data) => success(data),
        Err(e) => error(e),
    }
}

/// Facade over [`ProjectLifecycle`] for the transport layer.
#[derive(Clone)]
pub struct ProjectApi {
    lifecycle: Arc<ProjectLifecycle>,
}

impl ProjectApi {
    pub fn new(lifecycle: Arc<ProjectLifecycle>) -> Self {
        Self { lifecycle }
    }

    pub fn lifecycle(&self) -> &ProjectLifecycle {
        &self.lifecycle
    }

    pub async fn get_project(&self, _caller: &Caller, project_id: &str) -> ApiResponse<Project> {
        respond(self.lifecycle.get_project(project_id).await)
    }

    pub async fn get_status_history(
        &self,
        _caller: &Caller,
        project_id: &str,
    ) -> ApiResponse<Vec<StatusHistoryEntry>> {
        respond(self.lifecycle.get_status_history(project_id).await)
    }

    pub async fn list_members(&self, _caller: &Caller, project_id: &str) -> ApiResponse<Vec<Member>> {
        respond(self.lifecycle.list_members(project_id).await)
    }

    pub async fn create_draft(
        &self,
        caller: &Caller,
        fields: &Map<String, Value>,
    ) -> ApiResponse<Project> {
        respond(self.lifecycle.create_draft(&caller.user_id, fields).await)
    }

    pub async fn update_draft(
        &self,
        caller: &Caller,
        project_id: &str,
        fields: &Map<String, Value>,
    ) -> ApiResponse<Project> {
        respond(
            self.lifecycle
                .update_draft(project_id, &caller.user_id, fields)
                .await,
        )
    }

    pub async fn remove_draft(&self, caller: &Caller, project_id: &str) -> ApiResponse<()> {
        respond(self.lifecycle.remove_draft(project_id, &caller.user_id).await)
    }

    pub async fn submit(
        &self,
        caller: &Caller,
        project_id: Option<&str>,
        fields: &Map<String, Value>,
    ) -> ApiResponse<TransitionReceipt> {
        respond(
            self.lifecycle
                .submit(project_id, &caller.user_id, fields)
                .await,
        )
    }

    /// Admin-scoped callers only.
    pub async fn process_approval(
        &self,
        caller: &Caller,
        project_id: &str,
        decision: ApprovalDecision,
    ) -> ApiResponse<TransitionReceipt> {
        if caller.scope != CallerScope::Admin {
            return error(AppError::Unauthorized(
                "Only administrators can approve projects".to_string(),
            ));
        }
        respond(
            self.lifecycle
                .process_approval(project_id, &caller.user_id, decision)
                .await,
        )
    }

    pub async fn update_published(
        &self,
        caller: &Caller,
        project_id: &str,
        fields: &Map<String, Value>,
    ) -> ApiResponse<Project> {
        respond(
            self.lifecycle
                .update_published(project_id, &caller.user_id, fields)
                .await,
        )
    }

    pub async fn update_status(
        &self,
        caller: &Caller,
        project_id: &str,
        status: ProjectStatus,
        reason: &str,
    ) -> ApiResponse<Project> {
        respond(
            self.lifecycle
                .update_status(project_id, &caller.user_id, status, reason)
                .await,
        )
    }

    /// Rights of `user_id`, or of the caller when `None`.
    pub async fn get_effective_rights(
        &self,
        caller: &Caller,
        project_id: &str,
        user_id: Option<&str>,
    ) -> ApiResponse<PermissionSet> {
        let user_id = user_id.unwrap_or(&caller.user_id);
        respond(
            self.lifecycle
                .get_effective_rights(user_id, project_id)
                .await,
        )
    }

    pub async fn set_rights(
        &self,
        caller: &Caller,
        project_id: &str,
        target_user_id: &str,
        permissions: PermissionSet,
    ) -> ApiResponse<ProjectRights> {
        respond(
            self.lifecycle
                .set_rights(&caller.user_id, project_id, target_user_id, permissions)
                .await,
        )
    }

    pub async fn send_join_request(
        &self,
        caller: &Caller,
        project_id: &str,
        talent: Option<String>,
    ) -> ApiResponse<JoinProjectRequest> {
        respond(
            self.lifecycle
                .send_join_request(&caller.user_id, project_id, talent)
                .await,
        )
    }

    pub async fn invite_member(
        &self,
        caller: &Caller,
        project_id: &str,
        identifier: &str,
        talent: Option<String>,
    ) -> ApiResponse<JoinProjectRequest> {
        respond(
            self.lifecycle
                .invite_member(&caller.user_id, project_id, identifier, talent)
                .await,
        )
    }

    pub async fn list_join_requests(
        &self,
        caller: &Caller,
        project_id: &str,
    ) -> ApiResponse<Vec<JoinProjectRequest>> {
        respond(
            self.lifecycle
                .list_join_requests(&caller.user_id, project_id)
                .await,
        )
    }

    pub async fn mark_join_request_read(
        &self,
        caller: &Caller,
        request_id: &str,
    ) -> ApiResponse<JoinProjectRequest> {
        respond(
            self.lifecycle
                .mark_join_request_read(&caller.user_id, request_id)
                .await,
        )
    }

    pub async fn answer_join_request(
        &self,
        caller: &Caller,
        request_id: &str,
        accept: bool,
    ) -> ApiResponse<JoinProjectRequest> {
        respond(
            self.lifecycle
                .answer_join_request(&caller.user_id, request_id, accept)
                .await,
        )
    }

    pub async fn cancel_join_request(
        &self,
        caller: &Caller,
        request_id: &str,
    ) -> ApiResponse<JoinProjectRequest> {
        respond(
            self.lifecycle
                .cancel_join_request(&caller.user_id, request_id)
                .await,
        )
    }

    pub async fn remove_member(
        &self,
        caller: &Caller,
        project_id: &str,
        target_user_id: &str,
    ) -> ApiResponse<()> {
        respond(
            self.lifecycle
                .remove_member(&caller.user_id, project_id, target_user_id)
                .await,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_envelope() {
        let resp: ApiResponse<()> = error(AppError::UnauthorizedFields(vec!["title".into()]));
        assert!(!resp.is_success());
        assert_eq!(resp.outcome, Outcome::Unauthorized);
        assert_eq!(resp.error_code(), Some("UNAUTHORIZED_FIELDS"));

        let json = serde_json::to_value(&resp).unwrap();
        assert_eq!(json["outcome"], "unauthorized");
        assert!(json.get("data").is_none());
        assert_eq!(json["error"]["details"]["fields"][0], "title");
    }

    #[test]
    fn test_success_envelope() {
        let json = serde_json::to_value(success(vec![1, 2])).unwrap();
        assert_eq!(json["outcome"], "success");
        assert_eq!(json["data"][1], 2);
        assert!(json.get("error").is_none());
    }

    #[test]
    fn test_server_errors_are_tagged() {
        let resp: ApiResponse<()> = error(AppError::Dependency("catalog down".into()));
        assert_eq!(resp.outcome, Outcome::ServerError);
    }
}
