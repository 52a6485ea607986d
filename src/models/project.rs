//! Project aggregate and its editable field record.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::{Member, ProjectStatus, StatusHistoryEntry};

/// Wire names of every editable project field.
pub const FIELD_NAMES: &[&str] = &[
    "title",
    "goal",
    "summary",
    "description",
    "cover",
    "category",
    "subCategory",
    "location",
    "startDate",
    "motivation",
    "tags",
    "talentsNeeded",
    "objectives",
    "visibility",
];

/// Who can discover a project.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Visibility {
    Public,
    Private,
}

/// Editable project content. Used for both the published record and the draft.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectFields {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub goal: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cover: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sub_category: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_date: Option<NaiveDate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub motivation: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub talents_needed: Vec<String>,
    #[serde(default)]
    pub objectives: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub visibility: Option<Visibility>,
}

impl ProjectFields {
    /// Case-insensitive uniqueness key for the title, if one is set.
    pub fn title_key(&self) -> Option<String> {
        self.title
            .as_deref()
            .map(|t| t.trim().to_uppercase())
            .filter(|t| !t.is_empty())
    }
}

/// A collaborative project.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Project {
    pub id: String,
    pub owner_id: String,
    pub status: ProjectStatus,
    pub status_reason: String,
    /// Published content, populated at submission
    pub fields: ProjectFields,
    /// Pre-publication content
    pub draft: ProjectFields,
    pub status_history: Vec<StatusHistoryEntry>,
    pub members: Vec<Member>,
    pub created_at: String,
    pub updated_at: String,
    /// Internal version for optimistic concurrency control
    pub version: i64,
}

impl Project {
    pub fn is_owner(&self, user_id: &str) -> bool {
        self.owner_id == user_id
    }

    pub fn is_member(&self, user_id: &str) -> bool {
        self.members.iter().any(|m| m.user_id == user_id)
    }
}
