//! Integration tests for the projects backend.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde::Serialize;
use serde_json::{json, Map, Value};
use tempfile::TempDir;

use crate::api::{ApiResponse, Caller, ProjectApi};
use crate::collaborators::{
    ApprovalEmail, CategoryCatalog, CollaboratorError, NotificationService, NotificationStatus,
    SubmissionEmail, User, UserDirectory,
};
use crate::config::Config;
use crate::db::{self, init_database, ProjectWrite, Repository};
use crate::errors::Outcome;
use crate::lifecycle::{Approval, ApprovalDecision, ProjectLifecycle};
use crate::models::{
    JoinRequestStatus, MemberRole, Permission, PermissionSet, ProjectRights, ProjectStatus,
};

const ADMIN_EMAIL: &str = "review@example.com";

struct FakeUsers {
    users: Vec<User>,
}

impl FakeUsers {
    fn new() -> Self {
        let user = |id: &str, name: &str| User {
            id: id.to_string(),
            display_name: name.to_string(),
            email: format!("{}@example.com", id),
        };
        Self {
            users: vec![
                user("alice", "Alice"),
                user("bob", "Bob"),
                user("carol", "Carol"),
                user("admin", "Admin"),
            ],
        }
    }
}

#[async_trait]
impl UserDirectory for FakeUsers {
    async fn retrieve_user_by_id(&self, id: &str) -> Result<Option<User>, CollaboratorError> {
        Ok(self.users.iter().find(|u| u.id == id).cloned())
    }

    async fn get_user_by_identifier(
        &self,
        identifier: &str,
    ) -> Result<Option<User>, CollaboratorError> {
        Ok(self
            .users
            .iter()
            .find(|u| u.email == identifier || u.id == identifier)
            .cloned())
    }
}

/// Knows `environment` (with `garden` and `energy`). `offline` simulates an outage.
struct FakeCatalog;

#[async_trait]
impl CategoryCatalog for FakeCatalog {
    async fn verify_category_and_sub_category_exist(
        &self,
        category_id: &str,
        sub_category: Option<&str>,
    ) -> Result<(), CollaboratorError> {
        match (category_id, sub_category) {
            ("offline", _) => Err(CollaboratorError::Unavailable(
                "category catalog unreachable".to_string(),
            )),
            ("environment", None | Some("garden") | Some("energy")) => Ok(()),
            ("environment", Some(sub)) => Err(CollaboratorError::NotFound(format!(
                "Sub-category {}",
                sub
            ))),
            (other, _) => Err(CollaboratorError::NotFound(format!("Category {}", other))),
        }
    }
}

#[derive(Default)]
struct RecordingNotifier {
    submissions: Mutex<Vec<SubmissionEmail>>,
    approvals: Mutex<Vec<ApprovalEmail>>,
    fail: AtomicBool,
}

impl RecordingNotifier {
    fn check(&self) -> Result<(), CollaboratorError> {
        if self.fail.load(Ordering::SeqCst) {
            Err(CollaboratorError::Unavailable("smtp timeout".to_string()))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl NotificationService for RecordingNotifier {
    async fn send_project_submission_email(
        &self,
        email: &SubmissionEmail,
    ) -> Result<(), CollaboratorError> {
        self.check()?;
        self.submissions.lock().unwrap().push(email.clone());
        Ok(())
    }

    async fn send_project_approval_email(
        &self,
        email: &ApprovalEmail,
    ) -> Result<(), CollaboratorError> {
        self.check()?;
        self.approvals.lock().unwrap().push(email.clone());
        Ok(())
    }
}

/// Test fixture for integration tests.
struct TestFixture {
    api: ProjectApi,
    repo: Repository,
    notifier: Arc<RecordingNotifier>,
    alice: Caller,
    bob: Caller,
    carol: Caller,
    admin: Caller,
    _temp_dir: TempDir,
}

impl TestFixture {
    async fn new() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let db_path = temp_dir.path().join("test.sqlite");

        let pool = init_database(&db_path, 5).await.expect("Failed to init DB");
        let repo = Repository::new(pool);

        let config = Config {
            db_path,
            admin_email: ADMIN_EMAIL.to_string(),
            log_level: "warn".to_string(),
            ..Config::default()
        };

        let notifier = Arc::new(RecordingNotifier::default());
        let lifecycle = ProjectLifecycle::new(
            repo.clone(),
            Arc::new(FakeUsers::new()),
            Arc::new(FakeCatalog),
            notifier.clone(),
            Arc::new(config),
        );

        TestFixture {
            api: ProjectApi::new(Arc::new(lifecycle)),
            repo,
            notifier,
            alice: Caller::user("alice"),
            bob: Caller::user("bob"),
            carol: Caller::user("carol"),
            admin: Caller::admin("admin"),
            _temp_dir: temp_dir,
        }
    }

    /// Alice submits the garden and the admin approves it.
    async fn active_garden(&self) -> String {
        let receipt = ok(self.api.submit(&self.alice, None, &garden()).await);
        let id = receipt.project.id;
        ok(self
            .api
            .process_approval(&self.admin, &id, approve())
            .await);
        id
    }

    /// An active garden with Bob accepted as a member.
    async fn garden_with_bob(&self) -> String {
        let id = self.active_garden().await;
        let request = ok(self
            .api
            .send_join_request(&self.bob, &id, Some("carpentry".to_string()))
            .await);
        ok(self
            .api
            .answer_join_request(&self.alice, &request.id, true)
            .await);
        id
    }
}

fn fields(value: Value) -> Map<String, Value> {
    value.as_object().cloned().unwrap_or_default()
}

fn garden() -> Map<String, Value> {
    fields(json!({
        "title": "Community Garden",
        "goal": "Grow vegetables together",
        "summary": "A shared garden on the empty lot",
        "description": "Raised beds, a tool shed and a compost corner",
        "category": "environment",
        "subCategory": "garden",
        "talentsNeeded": ["gardener", "carpenter"],
        "tags": ["green"]
    }))
}

fn approve() -> ApprovalDecision {
    ApprovalDecision {
        approval: Approval::Approved,
        reason: None,
    }
}

fn ok<T: Serialize + std::fmt::Debug>(resp: ApiResponse<T>) -> T {
    match resp.data {
        Some(data) if resp.outcome == Outcome::Success => data,
        _ => panic!("expected success, got {:?}", resp.error),
    }
}

fn assert_err<T: Serialize>(resp: ApiResponse<T>, outcome: Outcome, code: &str) {
    assert_eq!(resp.outcome, outcome, "error: {:?}", resp.error);
    assert_eq!(resp.error_code(), Some(code));
}

fn only(permissions: &[Permission]) -> PermissionSet {
    permissions.iter().copied().collect()
}

// ==================== SUBMISSION AND APPROVAL ====================

#[tokio::test]
async fn test_garden_submit_and_approve() {
    let f = TestFixture::new().await;

    let receipt = ok(f.api.submit(&f.alice, None, &garden()).await);
    let project = receipt.project;
    assert_eq!(project.status, ProjectStatus::Submitted);
    assert_eq!(project.owner_id, "alice");
    assert_eq!(project.fields.title.as_deref(), Some("Community Garden"));
    assert_eq!(project.fields, project.draft);
    assert_eq!(receipt.notification, NotificationStatus::Sent);

    let submissions = f.notifier.submissions.lock().unwrap().clone();
    assert_eq!(submissions.len(), 1);
    assert_eq!(submissions[0].to, ADMIN_EMAIL);
    assert_eq!(submissions[0].title, "Community Garden");
    assert_eq!(submissions[0].submitter, "Alice");

    let receipt = ok(f
        .api
        .process_approval(&f.admin, &project.id, approve())
        .await);
    assert_eq!(receipt.project.status, ProjectStatus::Active);
    assert_eq!(receipt.notification, NotificationStatus::Sent);

    let approvals = f.notifier.approvals.lock().unwrap().clone();
    assert_eq!(approvals.len(), 1);
    assert_eq!(approvals[0].to, "alice@example.com");
    assert!(approvals[0].approved);

    let history = ok(f.api.get_status_history(&f.alice, &project.id).await);
    let statuses: Vec<_> = history.iter().map(|h| h.status).collect();
    assert_eq!(
        statuses,
        vec![ProjectStatus::Draft, ProjectStatus::Submitted, ProjectStatus::Active]
    );
    assert_eq!(history[0].reason, "creation before submission");
    assert_eq!(history[2].actor_id, "admin");

    let rights = ok(f.api.get_effective_rights(&f.alice, &project.id, None).await);
    assert!(rights.is_all());

    let stamped = f.repo.get_rights(&project.id, "alice").await.unwrap().unwrap();
    assert!(stamped.permissions.is_all());
    assert_eq!(stamped.updated_by, "admin");
}

#[tokio::test]
async fn test_rejection_keeps_draft_and_notifies_owner() {
    let f = TestFixture::new().await;
    let id = ok(f.api.submit(&f.alice, None, &garden()).await).project.id;

    let decision = ApprovalDecision {
        approval: Approval::Rejected,
        reason: Some("Too vague".to_string()),
    };
    let receipt = ok(f.api.process_approval(&f.admin, &id, decision).await);
    assert_eq!(receipt.project.status, ProjectStatus::Rejected);
    assert_eq!(receipt.project.status_reason, "Too vague");

    let approvals = f.notifier.approvals.lock().unwrap().clone();
    assert!(!approvals[0].approved);
    assert_eq!(approvals[0].reason, "Too vague");

    // Rejected projects can go back to draft
    let project = ok(f
        .api
        .update_status(&f.alice, &id, ProjectStatus::Draft, "reworking")
        .await);
    assert_eq!(project.status, ProjectStatus::Draft);
}

#[tokio::test]
async fn test_only_admins_process_approvals() {
    let f = TestFixture::new().await;
    let id = ok(f.api.submit(&f.alice, None, &garden()).await).project.id;

    let resp = f.api.process_approval(&f.alice, &id, approve()).await;
    assert_err(resp, Outcome::Unauthorized, "UNAUTHORIZED");

    let project = ok(f.api.get_project(&f.alice, &id).await);
    assert_eq!(project.status, ProjectStatus::Submitted);
}

#[tokio::test]
async fn test_approval_requires_submitted_project() {
    let f = TestFixture::new().await;
    let draft = ok(f.api.create_draft(&f.alice, &garden()).await);

    let resp = f.api.process_approval(&f.admin, &draft.id, approve()).await;
    assert_err(resp, Outcome::ClientError, "INVALID_TRANSITION");
}

#[tokio::test]
async fn test_submit_missing_fields_keeps_created_draft() {
    let f = TestFixture::new().await;

    let resp = f
        .api
        .submit(&f.alice, None, &fields(json!({"title": "Bike Repair Cafe"})))
        .await;
    let message = resp
        .error
        .as_ref()
        .map(|e| e.message.clone())
        .unwrap_or_default();
    assert!(message.contains("goal"));
    assert!(message.contains("talentsNeeded"));
    assert_err(resp, Outcome::ClientError, "VALIDATION_ERROR");

    // The draft was persisted before submission failed
    let resp = f
        .api
        .create_draft(&f.alice, &fields(json!({"title": "bike repair cafe"})))
        .await;
    assert_err(resp, Outcome::ClientError, "DUPLICATE_TITLE");
}

#[tokio::test]
async fn test_submit_existing_draft_merges_fields() {
    let f = TestFixture::new().await;
    let draft = ok(f
        .api
        .create_draft(&f.alice, &fields(json!({"title": "Community Garden"})))
        .await);

    let mut rest = garden();
    rest.remove("title");
    let receipt = ok(f.api.submit(&f.alice, Some(&draft.id), &rest).await);
    assert_eq!(receipt.project.status, ProjectStatus::Submitted);
    assert_eq!(
        receipt.project.fields.title.as_deref(),
        Some("Community Garden")
    );
    assert_eq!(receipt.project.fields.talents_needed.len(), 2);

    let resp = f.api.submit(&f.alice, Some(&draft.id), &Map::new()).await;
    assert_err(resp, Outcome::ClientError, "ALREADY_IN_STATUS");
}

#[tokio::test]
async fn test_unknown_category_and_catalog_outage() {
    let f = TestFixture::new().await;

    let mut unknown = garden();
    unknown.insert("category".into(), json!("astrology"));
    unknown.remove("subCategory");
    let resp = f.api.submit(&f.alice, None, &unknown).await;
    assert_err(resp, Outcome::ClientError, "NOT_FOUND");

    let mut offline = garden();
    offline.insert("title".into(), json!("Solar Roofs"));
    offline.insert("category".into(), json!("offline"));
    offline.remove("subCategory");
    let resp = f.api.submit(&f.alice, None, &offline).await;
    assert_err(resp, Outcome::ServerError, "DEPENDENCY_ERROR");
}

#[tokio::test]
async fn test_notification_failure_still_commits() {
    let f = TestFixture::new().await;
    f.notifier.fail.store(true, Ordering::SeqCst);

    let receipt = ok(f.api.submit(&f.alice, None, &garden()).await);
    assert!(matches!(
        receipt.notification,
        NotificationStatus::Failed { ref reason } if reason.contains("smtp")
    ));

    let project = ok(f.api.get_project(&f.alice, &receipt.project.id).await);
    assert_eq!(project.status, ProjectStatus::Submitted);
    assert_eq!(project.status_history.len(), 2);
}

// ==================== DRAFTS ====================

#[tokio::test]
async fn test_create_draft_records_creation() {
    let f = TestFixture::new().await;
    let draft = ok(f
        .api
        .create_draft(&f.alice, &fields(json!({"title": "Garden", "goal": "Grow food"})))
        .await);

    assert_eq!(draft.status, ProjectStatus::Draft);
    assert_eq!(draft.owner_id, "alice");
    assert_eq!(draft.status_reason, "project creation");
    assert_eq!(draft.status_history.len(), 1);
    assert_eq!(draft.status_history[0].status, ProjectStatus::Draft);
    assert_eq!(draft.status_history[0].reason, "project creation");
    assert!(f.notifier.submissions.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_mistyped_clear_marker_rejected() {
    let f = TestFixture::new().await;
    let draft = ok(f
        .api
        .create_draft(&f.alice, &fields(json!({"title": "Seed Swap", "goal": "Grow", "tags": ["seeds"]})))
        .await);

    let resp = f
        .api
        .update_draft(&f.alice, &draft.id, &fields(json!({"goal": ["@--empty--string"]})))
        .await;
    assert_err(resp, Outcome::ClientError, "VALIDATION_ERROR");

    let resp = f
        .api
        .update_draft(&f.alice, &draft.id, &fields(json!({"tags": "@--empty--string"})))
        .await;
    assert_err(resp, Outcome::ClientError, "VALIDATION_ERROR");

    let project = ok(f.api.get_project(&f.alice, &draft.id).await);
    assert_eq!(project.draft.goal.as_deref(), Some("Grow"));
    assert_eq!(project.draft.tags, vec!["seeds".to_string()]);
    assert_eq!(project.version, draft.version);
}

#[tokio::test]
async fn test_draft_edit_and_remove() {
    let f = TestFixture::new().await;
    let draft = ok(f
        .api
        .create_draft(&f.alice, &fields(json!({"title": "Repair Cafe", "tags": []})))
        .await);
    assert_eq!(draft.status, ProjectStatus::Draft);
    assert!(draft.fields.title.is_none());
    assert_eq!(draft.draft.title.as_deref(), Some("Repair Cafe"));
    assert_eq!(draft.members.len(), 1);
    assert_eq!(draft.members[0].role, MemberRole::Owner);

    let updated = ok(f
        .api
        .update_draft(&f.alice, &draft.id, &fields(json!({"goal": "Fix things"})))
        .await);
    assert_eq!(updated.draft.goal.as_deref(), Some("Fix things"));
    assert_eq!(updated.version, draft.version + 1);

    let resp = f
        .api
        .update_draft(&f.bob, &draft.id, &fields(json!({"goal": "Break things"})))
        .await;
    assert_err(resp, Outcome::Unauthorized, "UNAUTHORIZED");

    let resp = f.api.remove_draft(&f.bob, &draft.id).await;
    assert_err(resp, Outcome::Unauthorized, "UNAUTHORIZED");

    assert!(f.api.remove_draft(&f.alice, &draft.id).await.is_success());
    let resp = f.api.get_project(&f.alice, &draft.id).await;
    assert_err(resp, Outcome::ClientError, "NOT_FOUND");
}

#[tokio::test]
async fn test_draft_operations_refuse_published_projects() {
    let f = TestFixture::new().await;
    let id = ok(f.api.submit(&f.alice, None, &garden()).await).project.id;

    let resp = f
        .api
        .update_draft(&f.alice, &id, &fields(json!({"goal": "Other"})))
        .await;
    assert_err(resp, Outcome::ClientError, "NOT_DRAFT");

    let resp = f.api.remove_draft(&f.alice, &id).await;
    assert_err(resp, Outcome::ClientError, "NOT_DRAFT");
}

#[tokio::test]
async fn test_duplicate_titles_rejected() {
    let f = TestFixture::new().await;
    ok(f.api.create_draft(&f.alice, &garden()).await);

    let resp = f
        .api
        .create_draft(&f.bob, &fields(json!({"title": "  community GARDEN "})))
        .await;
    assert_err(resp, Outcome::ClientError, "DUPLICATE_TITLE");
}

#[tokio::test]
async fn test_unknown_fields_rejected() {
    let f = TestFixture::new().await;
    let resp = f
        .api
        .create_draft(&f.alice, &fields(json!({"title": "Garden", "budget": 12})))
        .await;
    assert_err(resp, Outcome::ClientError, "VALIDATION_ERROR");
}

// ==================== PUBLISHED EDITS AND RIGHTS ====================

#[tokio::test]
async fn test_partial_rights_reject_whole_update() {
    let f = TestFixture::new().await;
    let id = f.garden_with_bob().await;

    ok(f
        .api
        .set_rights(&f.alice, &id, "bob", only(&[Permission::EditTags]))
        .await);

    let resp = f
        .api
        .update_published(
            &f.bob,
            &id,
            &fields(json!({"tags": ["urban"], "title": "Bob's Garden"})),
        )
        .await;
    assert_eq!(resp.outcome, Outcome::Unauthorized);
    let details = resp.error.as_ref().and_then(|e| e.details.clone());
    assert_eq!(details, Some(json!({"fields": ["title"]})));

    let project = ok(f.api.get_project(&f.bob, &id).await);
    assert_eq!(project.fields.tags, vec!["green".to_string()]);
    assert_eq!(project.fields.title.as_deref(), Some("Community Garden"));

    let project = ok(f
        .api
        .update_published(&f.bob, &id, &fields(json!({"tags": ["urban"]})))
        .await);
    assert_eq!(project.fields.tags, vec!["urban".to_string()]);
}

#[tokio::test]
async fn test_sentinel_clears_and_null_is_ignored() {
    let f = TestFixture::new().await;
    let id = f.active_garden().await;

    let project = ok(f
        .api
        .update_published(&f.alice, &id, &fields(json!({"location": "Lyon"})))
        .await);
    assert_eq!(project.fields.location.as_deref(), Some("Lyon"));

    let project = ok(f
        .api
        .update_published(
            &f.alice,
            &id,
            &fields(json!({"location": "@--empty--string", "tags": ["@--empty--string"]})),
        )
        .await);
    assert!(project.fields.location.is_none());
    assert!(project.fields.tags.is_empty());

    let resp = f
        .api
        .update_published(&f.alice, &id, &fields(json!({"goal": null, "summary": ""})))
        .await;
    assert_err(resp, Outcome::ClientError, "VALIDATION_ERROR");

    // Required fields cannot be cleared once published
    let resp = f
        .api
        .update_published(&f.alice, &id, &fields(json!({"goal": "@--empty--string"})))
        .await;
    assert_err(resp, Outcome::ClientError, "VALIDATION_ERROR");
}

#[tokio::test]
async fn test_set_rights_is_idempotent() {
    let f = TestFixture::new().await;
    let id = f.garden_with_bob().await;
    let rights = only(&[Permission::EditTags, Permission::EditGoal]);

    ok(f.api.set_rights(&f.alice, &id, "bob", rights.clone()).await);
    ok(f.api.set_rights(&f.alice, &id, "bob", rights.clone()).await);

    let rows: Vec<ProjectRights> = f
        .repo
        .list_rights(&id)
        .await
        .unwrap()
        .into_iter()
        .filter(|r| r.user_id == "bob")
        .collect();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].permissions, rights);

    let effective = ok(f.api.get_effective_rights(&f.bob, &id, None).await);
    assert_eq!(effective, rights);
}

#[tokio::test]
async fn test_set_rights_guards() {
    let f = TestFixture::new().await;
    let id = f.garden_with_bob().await;

    let resp = f
        .api
        .set_rights(&f.bob, &id, "bob", PermissionSet::all())
        .await;
    assert_err(resp, Outcome::Unauthorized, "UNAUTHORIZED");

    let resp = f
        .api
        .set_rights(&f.alice, &id, "alice", PermissionSet::none())
        .await;
    assert_err(resp, Outcome::ClientError, "VALIDATION_ERROR");

    let resp = f
        .api
        .set_rights(&f.alice, &id, "carol", PermissionSet::all())
        .await;
    assert_err(resp, Outcome::ClientError, "NOT_FOUND");
}

#[tokio::test]
async fn test_can_edit_resolves_field_sets() {
    let f = TestFixture::new().await;
    let id = f.garden_with_bob().await;
    ok(f
        .api
        .set_rights(&f.alice, &id, "bob", only(&[Permission::EditTags]))
        .await);

    let rights = f.api.lifecycle().rights();
    assert!(rights.can_edit("alice", &id, &["title", "tags", "status"]).await.unwrap());
    assert!(rights.can_edit("bob", &id, &["tags"]).await.unwrap());
    assert!(!rights.can_edit("bob", &id, &["tags", "title"]).await.unwrap());
    assert!(!rights.can_edit("carol", &id, &["tags"]).await.unwrap());
    assert!(!rights.can_edit("bob", &id, &["tags", "budget"]).await.unwrap());
    assert!(!rights.can_edit("alice", &id, &["budget"]).await.unwrap());
}

#[tokio::test]
async fn test_owner_override_beats_stored_row() {
    let f = TestFixture::new().await;
    let id = f.active_garden().await;

    let mut tx = f.repo.begin().await.unwrap();
    db::upsert_rights(
        &mut *tx,
        &ProjectRights {
            project_id: id.clone(),
            user_id: "alice".to_string(),
            permissions: PermissionSet::none(),
            updated_by: "alice".to_string(),
            updated_at: chrono::Utc::now().to_rfc3339(),
        },
    )
    .await
    .unwrap();
    tx.commit().await.unwrap();

    let rights = ok(f.api.get_effective_rights(&f.bob, &id, Some("alice")).await);
    assert!(rights.is_all());
}

#[tokio::test]
async fn test_non_member_has_no_rights() {
    let f = TestFixture::new().await;
    let id = f.active_garden().await;

    let rights = ok(f.api.get_effective_rights(&f.carol, &id, None).await);
    assert_eq!(rights, PermissionSet::none());

    let json = serde_json::to_value(&rights).unwrap();
    let map = json.as_object().unwrap();
    assert_eq!(map.len(), Permission::ALL.len());
    assert!(map.values().all(|v| v == &json!(false)));

    let resp = f
        .api
        .update_published(&f.carol, &id, &fields(json!({"goal": "Mine now"})))
        .await;
    assert_err(resp, Outcome::Unauthorized, "UNAUTHORIZED_FIELDS");
}

// ==================== STATUS CHANGES ====================

#[tokio::test]
async fn test_reserved_transitions_refused() {
    let f = TestFixture::new().await;
    let draft = ok(f.api.create_draft(&f.alice, &garden()).await);

    let resp = f
        .api
        .update_status(&f.alice, &draft.id, ProjectStatus::Submitted, "ready")
        .await;
    assert_err(resp, Outcome::ClientError, "VALIDATION_ERROR");

    let id = ok(f.api.submit(&f.alice, Some(&draft.id), &Map::new()).await)
        .project
        .id;
    let resp = f
        .api
        .update_status(&f.alice, &id, ProjectStatus::Active, "self approve")
        .await;
    assert_err(resp, Outcome::ClientError, "VALIDATION_ERROR");

    // Withdrawing a submission is a regular status change
    let project = ok(f
        .api
        .update_status(&f.alice, &id, ProjectStatus::Draft, "needs more work")
        .await);
    assert_eq!(project.status, ProjectStatus::Draft);
}

#[tokio::test]
async fn test_status_transitions_and_terminal_states() {
    let f = TestFixture::new().await;
    let id = f.active_garden().await;

    let resp = f
        .api
        .update_status(&f.alice, &id, ProjectStatus::Active, "still going")
        .await;
    assert_err(resp, Outcome::ClientError, "ALREADY_IN_STATUS");

    let resp = f
        .api
        .update_status(&f.alice, &id, ProjectStatus::Draft, "start over")
        .await;
    assert_err(resp, Outcome::ClientError, "INVALID_TRANSITION");

    let resp = f
        .api
        .update_status(&f.alice, &id, ProjectStatus::OnHold, "  ")
        .await;
    assert_err(resp, Outcome::ClientError, "VALIDATION_ERROR");

    let project = ok(f
        .api
        .update_status(&f.alice, &id, ProjectStatus::Cancelled, "lot was sold")
        .await);
    assert_eq!(project.status, ProjectStatus::Cancelled);
    assert_eq!(project.status_reason, "lot was sold");

    let resp = f
        .api
        .update_status(&f.alice, &id, ProjectStatus::Active, "reopen")
        .await;
    assert_err(resp, Outcome::ClientError, "ALREADY_FINALIZED");

    let resp = f
        .api
        .update_published(&f.alice, &id, &fields(json!({"goal": "Later"})))
        .await;
    assert_err(resp, Outcome::ClientError, "ALREADY_FINALIZED");
}

#[tokio::test]
async fn test_member_needs_status_right() {
    let f = TestFixture::new().await;
    let id = f.garden_with_bob().await;

    let resp = f
        .api
        .update_status(&f.bob, &id, ProjectStatus::OnHold, "winter")
        .await;
    assert_err(resp, Outcome::Unauthorized, "UNAUTHORIZED_FIELDS");

    ok(f
        .api
        .set_rights(&f.alice, &id, "bob", only(&[Permission::EditStatus]))
        .await);
    let project = ok(f
        .api
        .update_status(&f.bob, &id, ProjectStatus::OnHold, "winter")
        .await);
    assert_eq!(project.status, ProjectStatus::OnHold);
    let last = project.status_history.last().unwrap();
    assert_eq!(last.actor_id, "bob");
    assert_eq!(last.reason, "winter");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_edits_lose_with_version_mismatch() {
    let f = TestFixture::new().await;
    let id = f.active_garden().await;

    let mut handles = Vec::new();
    for i in 0..16 {
        let api = f.api.clone();
        let alice = f.alice.clone();
        let id = id.clone();
        handles.push(tokio::spawn(async move {
            let resp = api
                .update_published(&alice, &id, &fields(json!({"location": format!("L{}", i)})))
                .await;
            (resp.outcome, resp.error_code().map(str::to_string))
        }));
    }

    let mut successes = 0;
    for handle in handles {
        let (outcome, code) = handle.await.unwrap();
        match outcome {
            Outcome::Success => successes += 1,
            _ => {
                assert_eq!(outcome, Outcome::ClientError, "code: {:?}", code);
                assert_eq!(code.as_deref(), Some("VERSION_MISMATCH"));
            }
        }
    }
    assert!(successes >= 1);

    let project = ok(f.api.get_project(&f.alice, &id).await);
    assert!(project.fields.location.is_some());
    assert_eq!(project.version, 3 + successes);
}

#[tokio::test]
async fn test_stale_version_conflicts() {
    let f = TestFixture::new().await;
    let project = ok(f.api.create_draft(&f.alice, &garden()).await);

    let write = ProjectWrite {
        id: &project.id,
        expected_version: project.version,
        status: project.status,
        status_reason: &project.status_reason,
        fields: &project.fields,
        draft: &project.draft,
    };

    let mut tx = f.repo.begin().await.unwrap();
    let next = db::update_project(&mut *tx, &write).await.unwrap();
    assert_eq!(next, project.version + 1);
    let err = db::update_project(&mut *tx, &write).await.unwrap_err();
    assert_eq!(err.error_code(), "VERSION_MISMATCH");
}

// ==================== MEMBERSHIP ====================

#[tokio::test]
async fn test_join_request_accepted() {
    let f = TestFixture::new().await;
    let id = f.active_garden().await;

    let request = ok(f.api.send_join_request(&f.bob, &id, None).await);
    assert_eq!(request.status, JoinRequestStatus::Sent);

    let resp = f.api.send_join_request(&f.bob, &id, None).await;
    assert_err(resp, Outcome::ClientError, "VALIDATION_ERROR");

    let resp = f.api.answer_join_request(&f.carol, &request.id, true).await;
    assert_err(resp, Outcome::Unauthorized, "UNAUTHORIZED");

    let listed = ok(f.api.list_join_requests(&f.alice, &id).await);
    assert_eq!(listed.len(), 1);

    let read = ok(f.api.mark_join_request_read(&f.alice, &request.id).await);
    assert_eq!(read.status, JoinRequestStatus::Read);

    let answered = ok(f.api.answer_join_request(&f.alice, &request.id, true).await);
    assert_eq!(answered.status, JoinRequestStatus::Answered);
    assert_eq!(answered.accepted, Some(true));
    assert_eq!(answered.answered_by.as_deref(), Some("alice"));

    let members = ok(f.api.list_members(&f.alice, &id).await);
    assert!(members
        .iter()
        .any(|m| m.user_id == "bob" && m.role == MemberRole::Member));

    let rights = f.repo.get_rights(&id, "bob").await.unwrap();
    assert_eq!(rights.map(|r| r.permissions), Some(PermissionSet::none()));

    let resp = f.api.answer_join_request(&f.alice, &request.id, false).await;
    assert_err(resp, Outcome::ClientError, "VALIDATION_ERROR");
}

#[tokio::test]
async fn test_join_requests_need_open_project() {
    let f = TestFixture::new().await;
    let draft = ok(f.api.create_draft(&f.alice, &garden()).await);

    let resp = f.api.send_join_request(&f.bob, &draft.id, None).await;
    assert_err(resp, Outcome::ClientError, "VALIDATION_ERROR");
}

#[tokio::test]
async fn test_invitation_declined_and_cancelled() {
    let f = TestFixture::new().await;
    let id = f.active_garden().await;

    let invite = ok(f
        .api
        .invite_member(&f.alice, &id, "carol@example.com", Some("design".to_string()))
        .await);
    assert_eq!(invite.user_id, "carol");
    assert_eq!(invite.created_by, "alice");

    let resp = f.api.answer_join_request(&f.alice, &invite.id, true).await;
    assert_err(resp, Outcome::Unauthorized, "UNAUTHORIZED");

    let declined = ok(f.api.answer_join_request(&f.carol, &invite.id, false).await);
    assert_eq!(declined.accepted, Some(false));
    let project = ok(f.api.get_project(&f.alice, &id).await);
    assert!(!project.is_member("carol"));

    let second = ok(f.api.invite_member(&f.alice, &id, "carol", None).await);
    let resp = f.api.cancel_join_request(&f.carol, &second.id).await;
    assert_err(resp, Outcome::Unauthorized, "UNAUTHORIZED");
    let cancelled = ok(f.api.cancel_join_request(&f.alice, &second.id).await);
    assert_eq!(cancelled.status, JoinRequestStatus::Cancelled);

    let resp = f.api.invite_member(&f.alice, &id, "nobody@example.com", None).await;
    assert_err(resp, Outcome::ClientError, "NOT_FOUND");
}

#[tokio::test]
async fn test_remove_member() {
    let f = TestFixture::new().await;
    let id = f.garden_with_bob().await;

    let resp = f.api.remove_member(&f.carol, &id, "bob").await;
    assert_err(resp, Outcome::Unauthorized, "UNAUTHORIZED");

    let resp = f.api.remove_member(&f.alice, &id, "alice").await;
    assert_err(resp, Outcome::ClientError, "VALIDATION_ERROR");

    assert!(f.api.remove_member(&f.bob, &id, "bob").await.is_success());
    let project = ok(f.api.get_project(&f.alice, &id).await);
    assert!(!project.is_member("bob"));
    assert!(f.repo.get_rights(&id, "bob").await.unwrap().is_none());

    let resp = f.api.remove_member(&f.alice, &id, "bob").await;
    assert_err(resp, Outcome::ClientError, "NOT_FOUND");
}
