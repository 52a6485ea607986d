//! Effective rights of a user on a project.
//!
//! The owner override sits in front of the stored permission rows: owners
//! always resolve to every capability, whatever is stored for them.

use chrono::Utc;
use sqlx::sqlite::SqliteConnection;

use crate::db::{self, Repository};
use crate::errors::AppError;
use crate::models::{Permission, PermissionSet, Project, ProjectRights};

/// Combine the owner override with the stored set.
///
/// A missing row resolves to [`PermissionSet::none`].
pub fn resolve(owner_id: &str, user_id: &str, stored: Option<PermissionSet>) -> PermissionSet {
    if owner_id == user_id {
        return PermissionSet::all();
    }
    match stored {
        Some(permissions) => permissions,
        None => PermissionSet::none(),
    }
}

#[derive(Clone)]
pub struct RightsResolver {
    repo: Repository,
}

impl RightsResolver {
    pub fn new(repo: Repository) -> Self {
        Self { repo }
    }

    /// Effective rights of `user_id` on `project_id`.
    pub async fn effective_rights(
        &self,
        user_id: &str,
        project_id: &str,
    ) -> Result<PermissionSet, AppError> {
        let project = self
            .repo
            .get_project(project_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Project {} not found", project_id)))?;
        self.rights_on(&project, user_id).await
    }

    /// Effective rights on an already loaded project.
    pub async fn rights_on(
        &self,
        project: &Project,
        user_id: &str,
    ) -> Result<PermissionSet, AppError> {
        if project.is_owner(user_id) {
            return Ok(PermissionSet::all());
        }
        let stored = self.repo.get_rights(&project.id, user_id).await?;
        Ok(resolve(
            &project.owner_id,
            user_id,
            stored.map(|row| row.permissions),
        ))
    }

    /// True only if every field maps to a permission the user holds.
    pub async fn can_edit(
        &self,
        user_id: &str,
        project_id: &str,
        fields: &[&str],
    ) -> Result<bool, AppError> {
        let rights = self.effective_rights(user_id, project_id).await?;
        Ok(rights.can_edit(fields.iter().copied()))
    }

    /// Fail with `UnauthorizedFields` unless every field is allowed.
    pub async fn ensure_can_edit<'a, I>(
        &self,
        project: &Project,
        user_id: &str,
        fields: I,
    ) -> Result<(), AppError>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let rights = self.rights_on(project, user_id).await?;
        let missing = rights.missing_for(fields);
        if missing.is_empty() {
            return Ok(());
        }
        tracing::warn!(
            project_id = %project.id,
            user_id,
            fields = ?missing,
            "Field edit refused"
        );
        Err(AppError::UnauthorizedFields(missing))
    }

    /// Fail with `Unauthorized` unless the user holds `permission`.
    pub async fn ensure_permission(
        &self,
        project: &Project,
        user_id: &str,
        permission: Permission,
    ) -> Result<(), AppError> {
        if self.rights_on(project, user_id).await?.allows(permission) {
            return Ok(());
        }
        tracing::warn!(project_id = %project.id, user_id, permission = permission.name(), "Operation refused");
        Err(AppError::Unauthorized(format!(
            "Missing permission {} on project {}",
            permission.name(),
            project.id
        )))
    }

    /// Replace the stored permissions of a non-owner member.
    pub async fn set_rights(
        &self,
        updater_id: &str,
        project_id: &str,
        target_user_id: &str,
        permissions: PermissionSet,
    ) -> Result<ProjectRights, AppError> {
        let project = self
            .repo
            .get_project(project_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Project {} not found", project_id)))?;

        self.ensure_permission(&project, updater_id, Permission::EditRights)
            .await?;

        if project.is_owner(target_user_id) {
            return Err(AppError::Validation(
                "The owner's rights cannot be changed".to_string(),
            ));
        }
        if !project.is_member(target_user_id) {
            return Err(AppError::NotFound(format!(
                "User {} is not a member of project {}",
                target_user_id, project_id
            )));
        }

        let rights = ProjectRights {
            project_id: project_id.to_string(),
            user_id: target_user_id.to_string(),
            permissions,
            updated_by: updater_id.to_string(),
            updated_at: Utc::now().to_rfc3339(),
        };

        let mut tx = self.repo.begin().await?;
        db::upsert_rights(&mut *tx, &rights).await?;
        tx.commit().await?;

        tracing::info!(project_id, target_user_id, updater_id, "Rights updated");
        Ok(rights)
    }

    /// Record full rights for the owner, for the audit trail.
    pub async fn stamp_owner(
        conn: &mut SqliteConnection,
        project: &Project,
        stamped_by: &str,
    ) -> Result<(), AppError> {
        db::upsert_rights(
            conn,
            &ProjectRights {
                project_id: project.id.clone(),
                user_id: project.owner_id.clone(),
                permissions: PermissionSet::all(),
                updated_by: stamped_by.to_string(),
                updated_at: Utc::now().to_rfc3339(),
            },
        )
        .await
    }

    /// Store the all-denied row every new non-owner member starts with.
    pub async fn create_default_rights(
        conn: &mut SqliteConnection,
        project_id: &str,
        user_id: &str,
        created_by: &str,
    ) -> Result<(), AppError> {
        db::upsert_rights(
            conn,
            &ProjectRights {
                project_id: project_id.to_string(),
                user_id: user_id.to_string(),
                permissions: PermissionSet::none(),
                updated_by: created_by.to_string(),
                updated_at: Utc::now().to_rfc3339(),
            },
        )
        .await
    }
}
