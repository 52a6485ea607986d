//! Database repository for projects, members, rights and history.
//!
//! Reads go through [`Repository`]. Writes take a connection so callers can
//! group them in one transaction; project rows are guarded by a version
//! compare-and-swap.

use chrono::Utc;
use sqlx::sqlite::{SqliteConnection, SqliteRow};
use sqlx::{Row, Sqlite, SqlitePool, Transaction};

use crate::errors::AppError;
use crate::models::{
    JoinKind, JoinProjectRequest, JoinRequestStatus, Member, MemberRole, PermissionSet, Project,
    ProjectFields, ProjectRights, ProjectStatus, StatusHistoryEntry,
};

/// Database repository for all data operations.
#[derive(Clone)]
pub struct Repository {
    pool: SqlitePool,
}

impl Repository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Start a write transaction holding the write lock from its first statement.
    pub async fn begin(&self) -> Result<Transaction<'static, Sqlite>, AppError> {
        Ok(self.pool.begin_with("BEGIN IMMEDIATE").await?)
    }

    /// Get a project with its history and members.
    pub async fn get_project(&self, id: &str) -> Result<Option<Project>, AppError> {
        let mut conn = self.pool.acquire().await?;
        load_project(&mut conn, id).await
    }

    /// Get the stored rights row for a member.
    pub async fn get_rights(
        &self,
        project_id: &str,
        user_id: &str,
    ) -> Result<Option<ProjectRights>, AppError> {
        let mut conn = self.pool.acquire().await?;
        find_rights(&mut conn, project_id, user_id).await
    }

    /// List every stored rights row of a project.
    pub async fn list_rights(&self, project_id: &str) -> Result<Vec<ProjectRights>, AppError> {
        let rows = sqlx::query(
            "SELECT project_id, user_id, permissions, updated_by, updated_at FROM project_rights WHERE project_id = ? ORDER BY user_id",
        )
        .bind(project_id)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(rights_from_row).collect()
    }

    pub async fn get_join_request(&self, id: &str) -> Result<Option<JoinProjectRequest>, AppError> {
        let mut conn = self.pool.acquire().await?;
        find_join_request(&mut conn, id).await
    }

    /// List join requests and invitations of a project, oldest first.
    pub async fn list_join_requests(
        &self,
        project_id: &str,
    ) -> Result<Vec<JoinProjectRequest>, AppError> {
        let rows = sqlx::query(
            r#"SELECT id, project_id, user_id, kind, talent, status, created_by,
                      answered_by, accepted, created_at, updated_at
               FROM join_requests WHERE project_id = ? ORDER BY created_at, rowid"#,
        )
        .bind(project_id)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(join_request_from_row).collect()
    }
}

// ==================== PROJECT OPERATIONS ====================

/// Load a project with its history and members.
pub async fn load_project(
    conn: &mut SqliteConnection,
    id: &str,
) -> Result<Option<Project>, AppError> {
    let row = sqlx::query(
        r#"SELECT id, owner_id, status, status_reason, published, draft,
                  created_at, updated_at, version
           FROM projects WHERE id = ?"#,
    )
    .bind(id)
    .fetch_optional(&mut *conn)
    .await?;

    let Some(row) = row else {
        return Ok(None);
    };

    let history = sqlx::query(
        "SELECT status, reason, actor_id, created_at FROM status_history WHERE project_id = ? ORDER BY id",
    )
    .bind(id)
    .fetch_all(&mut *conn)
    .await?;

    let members = sqlx::query(
        "SELECT project_id, user_id, role, talent, joined_at FROM members WHERE project_id = ? ORDER BY rowid",
    )
    .bind(id)
    .fetch_all(&mut *conn)
    .await?;

    let published: String = row.get("published");
    let draft: String = row.get("draft");
    let status: String = row.get("status");

    Ok(Some(Project {
        id: row.get("id"),
        owner_id: row.get("owner_id"),
        status: parse_status(&status)?,
        status_reason: row.get("status_reason"),
        fields: serde_json::from_str(&published)?,
        draft: serde_json::from_str(&draft)?,
        status_history: history
            .iter()
            .map(history_from_row)
            .collect::<Result<_, _>>()?,
        members: members
            .iter()
            .map(member_from_row)
            .collect::<Result<_, _>>()?,
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
        version: row.get("version"),
    }))
}

/// Whether another project already uses this title key.
pub async fn title_taken(
    conn: &mut SqliteConnection,
    title_key: &str,
    exclude_id: Option<&str>,
) -> Result<bool, AppError> {
    let row = sqlx::query("SELECT id FROM projects WHERE title_key = ? AND id != ?")
        .bind(title_key)
        .bind(exclude_id.unwrap_or(""))
        .fetch_optional(&mut *conn)
        .await?;
    Ok(row.is_some())
}

/// Values for a new project row.
pub struct NewProject<'a> {
    pub id: &'a str,
    pub owner_id: &'a str,
    pub status: ProjectStatus,
    pub status_reason: &'a str,
    pub draft: &'a ProjectFields,
    pub created_at: &'a str,
}

pub async fn insert_project(
    conn: &mut SqliteConnection,
    project: &NewProject<'_>,
) -> Result<(), AppError> {
    let published = serde_json::to_string(&ProjectFields::default())?;
    let draft = serde_json::to_string(project.draft)?;

    sqlx::query(
        r#"INSERT INTO projects (
            id, owner_id, status, status_reason, published, draft, title_key,
            created_at, updated_at, version
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, 1)"#,
    )
    .bind(project.id)
    .bind(project.owner_id)
    .bind(project.status.as_str())
    .bind(project.status_reason)
    .bind(&published)
    .bind(&draft)
    .bind(project.draft.title_key())
    .bind(project.created_at)
    .bind(project.created_at)
    .execute(&mut *conn)
    .await?;

    Ok(())
}

/// Full replacement of a project's mutable columns.
pub struct ProjectWrite<'a> {
    pub id: &'a str,
    pub expected_version: i64,
    pub status: ProjectStatus,
    pub status_reason: &'a str,
    pub fields: &'a ProjectFields,
    pub draft: &'a ProjectFields,
}

/// Write a project if it is still at `expected_version`. Returns the new version.
pub async fn update_project(
    conn: &mut SqliteConnection,
    write: &ProjectWrite<'_>,
) -> Result<i64, AppError> {
    let now = Utc::now().to_rfc3339();
    let new_version = write.expected_version + 1;
    let published = serde_json::to_string(write.fields)?;
    let draft = serde_json::to_string(write.draft)?;
    let title_key = if write.status == ProjectStatus::Draft {
        write.draft.title_key()
    } else {
        write.fields.title_key()
    };

    // Conditional UPDATE with version check to prevent lost updates
    let result = sqlx::query(
        r#"UPDATE projects SET
            status = ?, status_reason = ?, published = ?, draft = ?, title_key = ?,
            updated_at = ?, version = ?
        WHERE id = ? AND version = ?"#,
    )
    .bind(write.status.as_str())
    .bind(write.status_reason)
    .bind(&published)
    .bind(&draft)
    .bind(&title_key)
    .bind(&now)
    .bind(new_version)
    .bind(write.id)
    .bind(write.expected_version)
    .execute(&mut *conn)
    .await?;

    if result.rows_affected() == 0 {
        return Err(version_conflict(conn, write.id).await);
    }

    Ok(new_version)
}

/// Delete a project and everything attached to it.
pub async fn delete_project(
    conn: &mut SqliteConnection,
    id: &str,
    expected_version: i64,
) -> Result<(), AppError> {
    for table in ["join_requests", "project_rights", "members", "status_history"] {
        sqlx::query(&format!("DELETE FROM {} WHERE project_id = ?", table))
            .bind(id)
            .execute(&mut *conn)
            .await?;
    }

    let result = sqlx::query("DELETE FROM projects WHERE id = ? AND version = ?")
        .bind(id)
        .bind(expected_version)
        .execute(&mut *conn)
        .await?;

    if result.rows_affected() == 0 {
        return Err(version_conflict(conn, id).await);
    }
    Ok(())
}

async fn version_conflict(conn: &mut SqliteConnection, id: &str) -> AppError {
    let current = sqlx::query("SELECT version FROM projects WHERE id = ?")
        .bind(id)
        .fetch_optional(&mut *conn)
        .await;

    match current {
        Ok(Some(row)) => AppError::Conflict {
            message: "Concurrent modification detected".to_string(),
            current_version: row.get("version"),
        },
        Ok(None) => AppError::NotFound(format!("Project {} not found", id)),
        Err(e) => e.into(),
    }
}

/// Append one entry to a project's status history.
pub async fn append_history(
    conn: &mut SqliteConnection,
    project_id: &str,
    entry: &StatusHistoryEntry,
) -> Result<(), AppError> {
    sqlx::query(
        "INSERT INTO status_history (project_id, status, reason, actor_id, created_at) VALUES (?, ?, ?, ?, ?)",
    )
    .bind(project_id)
    .bind(entry.status.as_str())
    .bind(&entry.reason)
    .bind(&entry.actor_id)
    .bind(&entry.created_at)
    .execute(&mut *conn)
    .await?;
    Ok(())
}

// ==================== MEMBER OPERATIONS ====================

pub async fn insert_member(conn: &mut SqliteConnection, member: &Member) -> Result<(), AppError> {
    sqlx::query(
        "INSERT INTO members (project_id, user_id, role, talent, joined_at) VALUES (?, ?, ?, ?, ?)",
    )
    .bind(&member.project_id)
    .bind(&member.user_id)
    .bind(member.role.as_str())
    .bind(&member.talent)
    .bind(&member.joined_at)
    .execute(&mut *conn)
    .await?;
    Ok(())
}

/// Remove a member. Returns false when there was no such member.
pub async fn delete_member(
    conn: &mut SqliteConnection,
    project_id: &str,
    user_id: &str,
) -> Result<bool, AppError> {
    let result = sqlx::query("DELETE FROM members WHERE project_id = ? AND user_id = ?")
        .bind(project_id)
        .bind(user_id)
        .execute(&mut *conn)
        .await?;
    Ok(result.rows_affected() > 0)
}

// ==================== RIGHTS OPERATIONS ====================

pub async fn find_rights(
    conn: &mut SqliteConnection,
    project_id: &str,
    user_id: &str,
) -> Result<Option<ProjectRights>, AppError> {
    let row = sqlx::query(
        "SELECT project_id, user_id, permissions, updated_by, updated_at FROM project_rights WHERE project_id = ? AND user_id = ?",
    )
    .bind(project_id)
    .bind(user_id)
    .fetch_optional(&mut *conn)
    .await?;

    row.as_ref().map(rights_from_row).transpose()
}

/// Insert or fully replace the rights row for a member.
pub async fn upsert_rights(
    conn: &mut SqliteConnection,
    rights: &ProjectRights,
) -> Result<(), AppError> {
    let permissions = serde_json::to_string(&rights.permissions)?;
    sqlx::query(
        r#"INSERT INTO project_rights (project_id, user_id, permissions, updated_by, updated_at)
           VALUES (?, ?, ?, ?, ?)
           ON CONFLICT (project_id, user_id) DO UPDATE SET
               permissions = excluded.permissions,
               updated_by = excluded.updated_by,
               updated_at = excluded.updated_at"#,
    )
    .bind(&rights.project_id)
    .bind(&rights.user_id)
    .bind(&permissions)
    .bind(&rights.updated_by)
    .bind(&rights.updated_at)
    .execute(&mut *conn)
    .await?;
    Ok(())
}

pub async fn delete_rights(
    conn: &mut SqliteConnection,
    project_id: &str,
    user_id: &str,
) -> Result<(), AppError> {
    sqlx::query("DELETE FROM project_rights WHERE project_id = ? AND user_id = ?")
        .bind(project_id)
        .bind(user_id)
        .execute(&mut *conn)
        .await?;
    Ok(())
}

// ==================== JOIN REQUEST OPERATIONS ====================

pub async fn find_join_request(
    conn: &mut SqliteConnection,
    id: &str,
) -> Result<Option<JoinProjectRequest>, AppError> {
    let row = sqlx::query(
        r#"SELECT id, project_id, user_id, kind, talent, status, created_by,
                  answered_by, accepted, created_at, updated_at
           FROM join_requests WHERE id = ?"#,
    )
    .bind(id)
    .fetch_optional(&mut *conn)
    .await?;

    row.as_ref().map(join_request_from_row).transpose()
}

/// Whether the user has a request or invitation still awaiting an answer.
pub async fn has_pending_join(
    conn: &mut SqliteConnection,
    project_id: &str,
    user_id: &str,
) -> Result<bool, AppError> {
    let row = sqlx::query(
        "SELECT id FROM join_requests WHERE project_id = ? AND user_id = ? AND status IN ('sent', 'read')",
    )
    .bind(project_id)
    .bind(user_id)
    .fetch_optional(&mut *conn)
    .await?;
    Ok(row.is_some())
}

pub async fn insert_join_request(
    conn: &mut SqliteConnection,
    request: &JoinProjectRequest,
) -> Result<(), AppError> {
    sqlx::query(
        r#"INSERT INTO join_requests (
            id, project_id, user_id, kind, talent, status, created_by,
            answered_by, accepted, created_at, updated_at
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"#,
    )
    .bind(&request.id)
    .bind(&request.project_id)
    .bind(&request.user_id)
    .bind(request.kind.as_str())
    .bind(&request.talent)
    .bind(request.status.as_str())
    .bind(&request.created_by)
    .bind(&request.answered_by)
    .bind(request.accepted.map(|b| b as i32))
    .bind(&request.created_at)
    .bind(&request.updated_at)
    .execute(&mut *conn)
    .await?;
    Ok(())
}

/// Move a join request from `from` to its new status, guarded on the old one.
pub async fn update_join_request(
    conn: &mut SqliteConnection,
    request: &JoinProjectRequest,
    from: JoinRequestStatus,
) -> Result<(), AppError> {
    let result = sqlx::query(
        r#"UPDATE join_requests SET status = ?, answered_by = ?, accepted = ?, updated_at = ?
           WHERE id = ? AND status = ?"#,
    )
    .bind(request.status.as_str())
    .bind(&request.answered_by)
    .bind(request.accepted.map(|b| b as i32))
    .bind(&request.updated_at)
    .bind(&request.id)
    .bind(from.as_str())
    .execute(&mut *conn)
    .await?;

    if result.rows_affected() == 0 {
        return Err(AppError::Conflict {
            message: format!("Join request {} changed concurrently", request.id),
            current_version: 0,
        });
    }
    Ok(())
}

// Helper functions for row conversion

fn parse_status(s: &str) -> Result<ProjectStatus, AppError> {
    ProjectStatus::from_str(s)
        .ok_or_else(|| AppError::Database(format!("Unknown project status '{}'", s)))
}

fn history_from_row(row: &SqliteRow) -> Result<StatusHistoryEntry, AppError> {
    let status: String = row.get("status");
    Ok(StatusHistoryEntry {
        status: parse_status(&status)?,
        reason: row.get("reason"),
        actor_id: row.get("actor_id"),
        created_at: row.get("created_at"),
    })
}

fn member_from_row(row: &SqliteRow) -> Result<Member, AppError> {
    let role: String = row.get("role");
    Ok(Member {
        project_id: row.get("project_id"),
        user_id: row.get("user_id"),
        role: MemberRole::from_str(&role)
            .ok_or_else(|| AppError::Database(format!("Unknown member role '{}'", role)))?,
        talent: row.get("talent"),
        joined_at: row.get("joined_at"),
    })
}

fn rights_from_row(row: &SqliteRow) -> Result<ProjectRights, AppError> {
    let permissions: String = row.get("permissions");
    let permissions: PermissionSet = serde_json::from_str(&permissions)?;
    Ok(ProjectRights {
        project_id: row.get("project_id"),
        user_id: row.get("user_id"),
        permissions,
        updated_by: row.get("updated_by"),
        updated_at: row.get("updated_at"),
    })
}

fn join_request_from_row(row: &SqliteRow) -> Result<JoinProjectRequest, AppError> {
    let kind: String = row.get("kind");
    let status: String = row.get("status");
    let accepted: Option<i32> = row.get("accepted");
    Ok(JoinProjectRequest {
        id: row.get("id"),
        project_id: row.get("project_id"),
        user_id: row.get("user_id"),
        kind: JoinKind::from_str(&kind)
            .ok_or_else(|| AppError::Database(format!("Unknown join kind '{}'", kind)))?,
        talent: row.get("talent"),
        status: JoinRequestStatus::from_str(&status)
            .ok_or_else(|| AppError::Database(format!("Unknown join status '{}'", status)))?,
        created_by: row.get("created_by"),
        answered_by: row.get("answered_by"),
        accepted: accepted.map(|v| v != 0),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    })
}
