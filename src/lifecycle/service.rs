//! Project lifecycle orchestration.
//!
//! Every write follows the same shape: load a snapshot, normalize the input,
//! check rights and the requested transition, then commit the row (guarded by
//! its version) and any history entry in one transaction. Notifications go out
//! only after the commit.

use std::sync::Arc;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use sqlx::sqlite::SqliteConnection;

use super::field_filter::filter_for_update;
use super::rights::RightsResolver;
use super::transitions::validate_transition;
use super::validation::{apply_updates, validate_field_shapes, validate_submission_ready};
use crate::collaborators::{
    require_user, ApprovalEmail, CategoryCatalog, NotificationService, NotificationStatus,
    SubmissionEmail, UserDirectory,
};
use crate::config::Config;
use crate::db::{self, NewProject, ProjectWrite, Repository};
use crate::errors::AppError;
use crate::models::{
    JoinKind, JoinProjectRequest, JoinRequestStatus, Member, MemberRole, Permission,
    PermissionSet, Project, ProjectFields, ProjectRights, ProjectStatus, StatusHistoryEntry,
};

const REASON_CREATION: &str = "project creation";
const REASON_CREATION_BEFORE_SUBMISSION: &str = "creation before submission";
const REASON_SUBMITTED: &str = "submitted for review";
const REASON_APPROVED: &str = "project approved";
const REASON_REJECTED: &str = "project rejected";

/// Admin verdict on a submitted project.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Approval {
    Approved,
    Rejected,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApprovalDecision {
    pub approval: Approval,
    #[serde(default)]
    pub reason: Option<String>,
}

/// A committed transition and the fate of its follow-up email.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TransitionReceipt {
    pub project: Project,
    pub notification: NotificationStatus,
}

pub struct ProjectLifecycle {
    repo: Repository,
    rights: RightsResolver,
    users: Arc<dyn UserDirectory>,
    categories: Arc<dyn CategoryCatalog>,
    notifier: Arc<dyn NotificationService>,
    config: Arc<Config>,
}

impl ProjectLifecycle {
    pub fn new(
        repo: Repository,
        users: Arc<dyn UserDirectory>,
        categories: Arc<dyn CategoryCatalog>,
        notifier: Arc<dyn NotificationService>,
        config: Arc<Config>,
    ) -> Self {
        Self {
            rights: RightsResolver::new(repo.clone()),
            repo,
            users,
            categories,
            notifier,
            config,
        }
    }

    pub fn rights(&self) -> &RightsResolver {
        &self.rights
    }

    // ==================== READS ====================

    pub async fn get_project(&self, project_id: &str) -> Result<Project, AppError> {
        self.repo
            .get_project(project_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Project {} not found", project_id)))
    }

    pub async fn get_status_history(
        &self,
        project_id: &str,
    ) -> Result<Vec<StatusHistoryEntry>, AppError> {
        Ok(self.get_project(project_id).await?.status_history)
    }

    pub async fn list_members(&self, project_id: &str) -> Result<Vec<Member>, AppError> {
        Ok(self.get_project(project_id).await?.members)
    }

    pub async fn get_effective_rights(
        &self,
        user_id: &str,
        project_id: &str,
    ) -> Result<PermissionSet, AppError> {
        self.rights.effective_rights(user_id, project_id).await
    }

    pub async fn set_rights(
        &self,
        updater_id: &str,
        project_id: &str,
        target_user_id: &str,
        permissions: PermissionSet,
    ) -> Result<ProjectRights, AppError> {
        self.rights
            .set_rights(updater_id, project_id, target_user_id, permissions)
            .await
    }

    // ==================== DRAFTS ====================

    /// Create a project in `draft` owned by its creator.
    pub async fn create_draft(
        &self,
        creator_id: &str,
        raw: &Map<String, Value>,
    ) -> Result<Project, AppError> {
        require_user(self.users.as_ref(), creator_id).await?;

        let updates = filter_for_update(raw);
        let fields = apply_updates(&ProjectFields::default(), &updates)?;
        validate_field_shapes(&fields, self.config.max_title_length)?;
        if touches_category(&updates) {
            self.verify_category(&fields).await?;
        }

        let id = self
            .insert_draft(creator_id, &fields, REASON_CREATION)
            .await?;
        self.get_project(&id).await
    }

    /// Edit a draft. Only its creator may do so.
    pub async fn update_draft(
        &self,
        project_id: &str,
        updater_id: &str,
        raw: &Map<String, Value>,
    ) -> Result<Project, AppError> {
        let project = self.get_project(project_id).await?;
        require_owner(&project, updater_id, "edit this draft")?;
        if project.status != ProjectStatus::Draft {
            return Err(AppError::NotDraft(project.id));
        }

        let updates = non_empty(filter_for_update(raw))?;
        let draft = apply_updates(&project.draft, &updates)?;
        validate_field_shapes(&draft, self.config.max_title_length)?;
        if touches_category(&updates) {
            self.verify_category(&draft).await?;
        }

        let mut tx = self.repo.begin().await?;
        ensure_title_free(&mut *tx, Some(&project.id), &draft).await?;
        db::update_project(
            &mut *tx,
            &ProjectWrite {
                id: &project.id,
                expected_version: project.version,
                status: project.status,
                status_reason: &project.status_reason,
                fields: &project.fields,
                draft: &draft,
            },
        )
        .await?;
        tx.commit().await?;

        tracing::info!(project_id, updater_id, "Draft updated");
        self.get_project(project_id).await
    }

    /// Delete a draft and everything attached to it.
    pub async fn remove_draft(&self, project_id: &str, updater_id: &str) -> Result<(), AppError> {
        let project = self.get_project(project_id).await?;
        require_owner(&project, updater_id, "remove this draft")?;
        if project.status != ProjectStatus::Draft {
            return Err(AppError::NotDraft(project.id));
        }

        let mut tx = self.repo.begin().await?;
        db::delete_project(&mut *tx, &project.id, project.version).await?;
        tx.commit().await?;

        tracing::info!(project_id, updater_id, "Draft removed");
        Ok(())
    }

    // ==================== TRANSITIONS ====================

    /// Submit a draft for review, creating it first when `project_id` is `None`.
    pub async fn submit(
        &self,
        project_id: Option<&str>,
        updater_id: &str,
        raw: &Map<String, Value>,
    ) -> Result<TransitionReceipt, AppError> {
        let submitter = require_user(self.users.as_ref(), updater_id).await?;
        let updates = filter_for_update(raw);

        let project = match project_id {
            Some(id) => self.get_project(id).await?,
            None => {
                let fields = apply_updates(&ProjectFields::default(), &updates)?;
                validate_field_shapes(&fields, self.config.max_title_length)?;
                let id = self
                    .insert_draft(updater_id, &fields, REASON_CREATION_BEFORE_SUBMISSION)
                    .await?;
                self.get_project(&id).await?
            }
        };

        require_owner(&project, updater_id, "submit this project")?;
        validate_transition(project.status, ProjectStatus::Submitted)?;

        let fields = apply_updates(&project.draft, &updates)?;
        validate_field_shapes(&fields, self.config.max_title_length)?;
        validate_submission_ready(&fields)?;
        self.verify_category(&fields).await?;

        let mut tx = self.repo.begin().await?;
        ensure_title_free(&mut *tx, Some(&project.id), &fields).await?;
        write_transition(
            &mut *tx,
            &project,
            ProjectStatus::Submitted,
            REASON_SUBMITTED,
            updater_id,
            &fields,
            &fields,
        )
        .await?;
        tx.commit().await?;

        tracing::info!(
            project_id = %project.id,
            updater_id,
            from = %project.status,
            to = %ProjectStatus::Submitted,
            "Project submitted"
        );

        let project = self.get_project(&project.id).await?;
        let email = SubmissionEmail {
            to: self.config.admin_email.clone(),
            project_id: project.id.clone(),
            title: fields.title.clone().unwrap_or_default(),
            category: fields.category.clone().unwrap_or_default(),
            submitter: submitter.display_name,
            summary: fields.summary.clone().unwrap_or_default(),
            submitted_at: project.updated_at.clone(),
        };
        let notification = NotificationStatus::from_result(
            self.notifier.send_project_submission_email(&email).await,
        );
        log_notification(&project.id, &notification);

        Ok(TransitionReceipt {
            project,
            notification,
        })
    }

    /// Approve or reject a submitted project. Callers must be admin-scoped.
    pub async fn process_approval(
        &self,
        project_id: &str,
        admin_id: &str,
        decision: ApprovalDecision,
    ) -> Result<TransitionReceipt, AppError> {
        let project = self.get_project(project_id).await?;
        let (target, default_reason) = match decision.approval {
            Approval::Approved => (ProjectStatus::Active, REASON_APPROVED),
            Approval::Rejected => (ProjectStatus::Rejected, REASON_REJECTED),
        };

        validate_transition(project.status, target)?;
        if project.status != ProjectStatus::Submitted {
            return Err(AppError::InvalidTransition {
                from: project.status,
                to: target,
            });
        }

        let reason = decision
            .reason
            .filter(|r| !r.trim().is_empty())
            .unwrap_or_else(|| default_reason.to_string());

        let mut tx = self.repo.begin().await?;
        write_transition(
            &mut *tx,
            &project,
            target,
            &reason,
            admin_id,
            &project.fields,
            &project.draft,
        )
        .await?;
        if target == ProjectStatus::Active {
            RightsResolver::stamp_owner(&mut *tx, &project, admin_id).await?;
        }
        tx.commit().await?;

        tracing::info!(
            project_id,
            admin_id,
            from = %project.status,
            to = %target,
            "Approval processed"
        );

        let notification = match self
            .approval_email(&project, target == ProjectStatus::Active, &reason)
            .await
        {
            Ok(email) => NotificationStatus::from_result(
                self.notifier.send_project_approval_email(&email).await,
            ),
            Err(e) => NotificationStatus::Failed {
                reason: e.to_string(),
            },
        };
        log_notification(project_id, &notification);

        Ok(TransitionReceipt {
            project: self.get_project(project_id).await?,
            notification,
        })
    }

    /// Edit a published project. All requested fields must be allowed, or
    /// nothing is written.
    pub async fn update_published(
        &self,
        project_id: &str,
        updater_id: &str,
        raw: &Map<String, Value>,
    ) -> Result<Project, AppError> {
        let project = self.get_project(project_id).await?;
        if project.status.is_terminal() {
            return Err(AppError::AlreadyFinalized(project.status));
        }
        if project.status == ProjectStatus::Draft {
            return Err(AppError::Validation(format!(
                "Project {} is still a draft",
                project.id
            )));
        }

        let updates = non_empty(filter_for_update(raw))?;
        self.rights
            .ensure_can_edit(&project, updater_id, updates.keys().map(String::as_str))
            .await?;

        let fields = apply_updates(&project.fields, &updates)?;
        validate_field_shapes(&fields, self.config.max_title_length)?;
        validate_submission_ready(&fields)?;
        if touches_category(&updates) {
            self.verify_category(&fields).await?;
        }

        let mut tx = self.repo.begin().await?;
        ensure_title_free(&mut *tx, Some(&project.id), &fields).await?;
        db::update_project(
            &mut *tx,
            &ProjectWrite {
                id: &project.id,
                expected_version: project.version,
                status: project.status,
                status_reason: &project.status_reason,
                fields: &fields,
                draft: &project.draft,
            },
        )
        .await?;
        tx.commit().await?;

        tracing::info!(project_id, updater_id, fields = ?updates.keys().collect::<Vec<_>>(), "Project updated");
        self.get_project(project_id).await
    }

    /// Move a project to another status on behalf of a member.
    pub async fn update_status(
        &self,
        project_id: &str,
        updater_id: &str,
        new_status: ProjectStatus,
        reason: &str,
    ) -> Result<Project, AppError> {
        let project = self.get_project(project_id).await?;
        if reason.trim().is_empty() {
            return Err(AppError::Validation(
                "A reason is required to change status".to_string(),
            ));
        }

        if project.status == ProjectStatus::Draft {
            require_owner(&project, updater_id, "change the status of this draft")?;
        } else {
            self.rights
                .ensure_can_edit(&project, updater_id, ["status"])
                .await?;
        }

        validate_transition(project.status, new_status)?;
        match (project.status, new_status) {
            (ProjectStatus::Draft, ProjectStatus::Submitted) => {
                return Err(AppError::Validation(
                    "Drafts are submitted through submission, not a status change".to_string(),
                ))
            }
            (ProjectStatus::Submitted, ProjectStatus::Active)
            | (ProjectStatus::Submitted, ProjectStatus::Rejected) => {
                return Err(AppError::Validation(
                    "Submitted projects are approved or rejected by an administrator".to_string(),
                ))
            }
            _ => {}
        }

        let mut tx = self.repo.begin().await?;
        write_transition(
            &mut *tx,
            &project,
            new_status,
            reason.trim(),
            updater_id,
            &project.fields,
            &project.draft,
        )
        .await?;
        tx.commit().await?;

        tracing::info!(
            project_id,
            updater_id,
            from = %project.status,
            to = %new_status,
            "Status changed"
        );
        self.get_project(project_id).await
    }

    // ==================== MEMBERSHIP ====================

    /// Ask to join an open project.
    pub async fn send_join_request(
        &self,
        user_id: &str,
        project_id: &str,
        talent: Option<String>,
    ) -> Result<JoinProjectRequest, AppError> {
        require_user(self.users.as_ref(), user_id).await?;
        let project = self.get_project(project_id).await?;
        ensure_open_for_members(&project)?;

        self.insert_join(&project, user_id, user_id, JoinKind::Request, talent)
            .await
    }

    /// Invite a user, looked up by email or username.
    pub async fn invite_member(
        &self,
        inviter_id: &str,
        project_id: &str,
        identifier: &str,
        talent: Option<String>,
    ) -> Result<JoinProjectRequest, AppError> {
        let project = self.get_project(project_id).await?;
        ensure_open_for_members(&project)?;
        self.rights
            .ensure_permission(&project, inviter_id, Permission::SendJoinProjectInvitations)
            .await?;

        let invitee = self
            .users
            .get_user_by_identifier(identifier)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("User {} not found", identifier)))?;

        self.insert_join(&project, &invitee.id, inviter_id, JoinKind::Invitation, talent)
            .await
    }

    pub async fn list_join_requests(
        &self,
        viewer_id: &str,
        project_id: &str,
    ) -> Result<Vec<JoinProjectRequest>, AppError> {
        let project = self.get_project(project_id).await?;
        self.rights
            .ensure_permission(&project, viewer_id, Permission::SeeJoinProjectRequests)
            .await?;
        self.repo.list_join_requests(project_id).await
    }

    pub async fn mark_join_request_read(
        &self,
        reader_id: &str,
        request_id: &str,
    ) -> Result<JoinProjectRequest, AppError> {
        let (request, project) = self.load_join(request_id).await?;
        self.ensure_recipient(&request, &project, reader_id, Permission::SeeJoinProjectRequests)
            .await?;
        self.move_join(request, JoinRequestStatus::Read).await
    }

    /// Accept or decline. Accepting adds the member with all-denied rights.
    pub async fn answer_join_request(
        &self,
        answerer_id: &str,
        request_id: &str,
        accept: bool,
    ) -> Result<JoinProjectRequest, AppError> {
        let (request, project) = self.load_join(request_id).await?;
        self.ensure_recipient(
            &request,
            &project,
            answerer_id,
            Permission::AnswerJoinProjectRequests,
        )
        .await?;
        if accept {
            ensure_open_for_members(&project)?;
            if project.is_member(&request.user_id) {
                return Err(AppError::Validation(format!(
                    "User {} is already a member",
                    request.user_id
                )));
            }
        }

        let from = request.status;
        let answered = answered_join(request, answerer_id, accept)?;

        let mut tx = self.repo.begin().await?;
        db::update_join_request(&mut *tx, &answered, from).await?;
        if accept {
            db::insert_member(
                &mut *tx,
                &Member {
                    project_id: project.id.clone(),
                    user_id: answered.user_id.clone(),
                    role: MemberRole::Member,
                    talent: answered.talent.clone(),
                    joined_at: answered.updated_at.clone(),
                },
            )
            .await?;
            RightsResolver::create_default_rights(
                &mut *tx,
                &project.id,
                &answered.user_id,
                answerer_id,
            )
            .await?;
        }
        tx.commit().await?;

        tracing::info!(
            project_id = %project.id,
            request_id,
            answerer_id,
            accept,
            "Join request answered"
        );
        Ok(answered)
    }

    /// Withdraw a request or invitation. Only its creator may.
    pub async fn cancel_join_request(
        &self,
        actor_id: &str,
        request_id: &str,
    ) -> Result<JoinProjectRequest, AppError> {
        let (request, _) = self.load_join(request_id).await?;
        if request.created_by != actor_id {
            return Err(AppError::Unauthorized(
                "Only the sender can cancel this request".to_string(),
            ));
        }
        self.move_join(request, JoinRequestStatus::Cancelled).await
    }

    /// Remove a member. Members may always remove themselves.
    pub async fn remove_member(
        &self,
        updater_id: &str,
        project_id: &str,
        target_user_id: &str,
    ) -> Result<(), AppError> {
        let project = self.get_project(project_id).await?;
        if project.is_owner(target_user_id) {
            return Err(AppError::Validation(
                "The project owner cannot be removed".to_string(),
            ));
        }
        if updater_id != target_user_id {
            self.rights
                .ensure_permission(&project, updater_id, Permission::RemoveMembers)
                .await?;
        }

        let mut tx = self.repo.begin().await?;
        if !db::delete_member(&mut *tx, project_id, target_user_id).await? {
            return Err(AppError::NotFound(format!(
                "User {} is not a member of project {}",
                target_user_id, project_id
            )));
        }
        db::delete_rights(&mut *tx, project_id, target_user_id).await?;
        tx.commit().await?;

        tracing::info!(project_id, updater_id, target_user_id, "Member removed");
        Ok(())
    }

    // ==================== HELPERS ====================

    async fn insert_draft(
        &self,
        creator_id: &str,
        fields: &ProjectFields,
        reason: &str,
    ) -> Result<String, AppError> {
        let id = uuid::Uuid::new_v4().to_string();
        let now = Utc::now().to_rfc3339();

        let mut tx = self.repo.begin().await?;
        ensure_title_free(&mut *tx, None, fields).await?;
        db::insert_project(
            &mut *tx,
            &NewProject {
                id: &id,
                owner_id: creator_id,
                status: ProjectStatus::Draft,
                status_reason: reason,
                draft: fields,
                created_at: &now,
            },
        )
        .await?;
        db::insert_member(
            &mut *tx,
            &Member {
                project_id: id.clone(),
                user_id: creator_id.to_string(),
                role: MemberRole::Owner,
                talent: None,
                joined_at: now.clone(),
            },
        )
        .await?;
        db::append_history(
            &mut *tx,
            &id,
            &StatusHistoryEntry {
                status: ProjectStatus::Draft,
                reason: reason.to_string(),
                actor_id: creator_id.to_string(),
                created_at: now,
            },
        )
        .await?;
        tx.commit().await?;

        tracing::info!(project_id = %id, creator_id, "Draft created");
        Ok(id)
    }

    async fn verify_category(&self, fields: &ProjectFields) -> Result<(), AppError> {
        let Some(category) = fields.category.as_deref() else {
            return Ok(());
        };
        self.categories
            .verify_category_and_sub_category_exist(category, fields.sub_category.as_deref())
            .await?;
        Ok(())
    }

    async fn approval_email(
        &self,
        project: &Project,
        approved: bool,
        reason: &str,
    ) -> Result<ApprovalEmail, AppError> {
        let owner = require_user(self.users.as_ref(), &project.owner_id).await?;
        Ok(ApprovalEmail {
            to: owner.email,
            recipient_name: owner.display_name,
            project_id: project.id.clone(),
            title: project.fields.title.clone().unwrap_or_default(),
            approved,
            reason: reason.to_string(),
        })
    }

    async fn insert_join(
        &self,
        project: &Project,
        user_id: &str,
        created_by: &str,
        kind: JoinKind,
        talent: Option<String>,
    ) -> Result<JoinProjectRequest, AppError> {
        if project.is_member(user_id) {
            return Err(AppError::Validation(format!(
                "User {} is already a member",
                user_id
            )));
        }

        let now = Utc::now().to_rfc3339();
        let request = JoinProjectRequest {
            id: uuid::Uuid::new_v4().to_string(),
            project_id: project.id.clone(),
            user_id: user_id.to_string(),
            kind,
            talent: talent.filter(|t| !t.trim().is_empty()),
            status: JoinRequestStatus::Sent,
            created_by: created_by.to_string(),
            answered_by: None,
            accepted: None,
            created_at: now.clone(),
            updated_at: now,
        };

        let mut tx = self.repo.begin().await?;
        if db::has_pending_join(&mut *tx, &project.id, user_id).await? {
            return Err(AppError::Validation(format!(
                "User {} already has a pending request for project {}",
                user_id, project.id
            )));
        }
        db::insert_join_request(&mut *tx, &request).await?;
        tx.commit().await?;

        tracing::info!(project_id = %project.id, user_id, kind = kind.as_str(), "Join request sent");
        Ok(request)
    }

    async fn load_join(&self, request_id: &str) -> Result<(JoinProjectRequest, Project), AppError> {
        let request = self
            .repo
            .get_join_request(request_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Join request {} not found", request_id)))?;
        let project = self.get_project(&request.project_id).await?;
        Ok((request, project))
    }

    /// Invitations are handled by the invitee; requests by members holding `permission`.
    async fn ensure_recipient(
        &self,
        request: &JoinProjectRequest,
        project: &Project,
        actor_id: &str,
        permission: Permission,
    ) -> Result<(), AppError> {
        match request.kind {
            JoinKind::Invitation if request.user_id == actor_id => Ok(()),
            JoinKind::Invitation => Err(AppError::Unauthorized(
                "Only the invited user can handle this invitation".to_string(),
            )),
            JoinKind::Request => {
                self.rights
                    .ensure_permission(project, actor_id, permission)
                    .await
            }
        }
    }

    async fn move_join(
        &self,
        mut request: JoinProjectRequest,
        next: JoinRequestStatus,
    ) -> Result<JoinProjectRequest, AppError> {
        let from = request.status;
        if !from.can_transition_to(next) {
            return Err(AppError::Validation(format!(
                "Cannot move join request from '{}' to '{}'",
                from.as_str(),
                next.as_str()
            )));
        }
        request.status = next;
        request.updated_at = Utc::now().to_rfc3339();

        let mut tx = self.repo.begin().await?;
        db::update_join_request(&mut *tx, &request, from).await?;
        tx.commit().await?;
        Ok(request)
    }
}

fn answered_join(
    mut request: JoinProjectRequest,
    answerer_id: &str,
    accept: bool,
) -> Result<JoinProjectRequest, AppError> {
    if !request.status.can_transition_to(JoinRequestStatus::Answered) {
        return Err(AppError::Validation(format!(
            "Join request is already {}",
            request.status.as_str()
        )));
    }
    request.status = JoinRequestStatus::Answered;
    request.answered_by = Some(answerer_id.to_string());
    request.accepted = Some(accept);
    request.updated_at = Utc::now().to_rfc3339();
    Ok(request)
}

/// Write the new status and append its history entry on the same connection.
async fn write_transition(
    conn: &mut SqliteConnection,
    project: &Project,
    to: ProjectStatus,
    reason: &str,
    actor_id: &str,
    fields: &ProjectFields,
    draft: &ProjectFields,
) -> Result<(), AppError> {
    db::update_project(
        &mut *conn,
        &ProjectWrite {
            id: &project.id,
            expected_version: project.version,
            status: to,
            status_reason: reason,
            fields,
            draft,
        },
    )
    .await?;
    db::append_history(
        &mut *conn,
        &project.id,
        &StatusHistoryEntry {
            status: to,
            reason: reason.to_string(),
            actor_id: actor_id.to_string(),
            created_at: Utc::now().to_rfc3339(),
        },
    )
    .await
}

async fn ensure_title_free(
    conn: &mut SqliteConnection,
    project_id: Option<&str>,
    fields: &ProjectFields,
) -> Result<(), AppError> {
    let Some(key) = fields.title_key() else {
        return Ok(());
    };
    if db::title_taken(conn, &key, project_id).await? {
        return Err(AppError::DuplicateTitle(
            fields.title.clone().unwrap_or_default(),
        ));
    }
    Ok(())
}

fn require_owner(project: &Project, user_id: &str, action: &str) -> Result<(), AppError> {
    if project.is_owner(user_id) {
        Ok(())
    } else {
        tracing::warn!(project_id = %project.id, user_id, "Non-owner tried to {}", action);
        Err(AppError::Unauthorized(format!(
            "Only the project owner can {}",
            action
        )))
    }
}

fn ensure_open_for_members(project: &Project) -> Result<(), AppError> {
    match project.status {
        ProjectStatus::Active | ProjectStatus::OnHold => Ok(()),
        other => Err(AppError::Validation(format!(
            "Project {} is {} and does not take new members",
            project.id, other
        ))),
    }
}

fn touches_category(updates: &Map<String, Value>) -> bool {
    updates.contains_key("category") || updates.contains_key("subCategory")
}

fn non_empty(updates: Map<String, Value>) -> Result<Map<String, Value>, AppError> {
    if updates.is_empty() {
        Err(AppError::Validation("No fields to update".to_string()))
    } else {
        Ok(updates)
    }
}

fn log_notification(project_id: &str, status: &NotificationStatus) {
    if let NotificationStatus::Failed { reason } = status {
        tracing::warn!(project_id, %reason, "Notification failed after commit");
    }
}
