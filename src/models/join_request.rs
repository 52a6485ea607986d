//! Join requests and invitations that attach a prospective member to a project.

use serde::{Deserialize, Serialize};

/// Whether the prospective member asked to join or was invited.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JoinKind {
    Request,
    Invitation,
}

impl JoinKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            JoinKind::Request => "request",
            JoinKind::Invitation => "invitation",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "request" => Some(JoinKind::Request),
            "invitation" => Some(JoinKind::Invitation),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JoinRequestStatus {
    Draft,
    Sent,
    Read,
    Answered,
    Cancelled,
}

impl JoinRequestStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JoinRequestStatus::Draft => "draft",
            JoinRequestStatus::Sent => "sent",
            JoinRequestStatus::Read => "read",
            JoinRequestStatus::Answered => "answered",
            JoinRequestStatus::Cancelled => "cancelled",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "draft" => Some(JoinRequestStatus::Draft),
            "sent" => Some(JoinRequestStatus::Sent),
            "read" => Some(JoinRequestStatus::Read),
            "answered" => Some(JoinRequestStatus::Answered),
            "cancelled" => Some(JoinRequestStatus::Cancelled),
            _ => None,
        }
    }

    pub fn can_transition_to(&self, next: JoinRequestStatus) -> bool {
        use JoinRequestStatus::*;
        matches!(
            (self, next),
            (Draft, Sent)
                | (Draft, Cancelled)
                | (Sent, Read)
                | (Sent, Answered)
                | (Sent, Cancelled)
                | (Read, Answered)
                | (Read, Cancelled)
        )
    }

    /// Still waiting for an answer.
    pub fn is_pending(&self) -> bool {
        matches!(self, JoinRequestStatus::Sent | JoinRequestStatus::Read)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JoinProjectRequest {
    pub id: String,
    pub project_id: String,
    /// Prospective member
    pub user_id: String,
    pub kind: JoinKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub talent: Option<String>,
    pub status: JoinRequestStatus,
    /// Requester for requests, inviter for invitations
    pub created_by: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub answered_by: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub accepted: Option<bool>,
    pub created_at: String,
    pub updated_at: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_answered_and_cancelled_are_terminal() {
        for next in [
            JoinRequestStatus::Draft,
            JoinRequestStatus::Sent,
            JoinRequestStatus::Read,
            JoinRequestStatus::Answered,
            JoinRequestStatus::Cancelled,
        ] {
            assert!(!JoinRequestStatus::Answered.can_transition_to(next));
            assert!(!JoinRequestStatus::Cancelled.can_transition_to(next));
        }
    }

    #[test]
    fn test_read_is_optional_before_answer() {
        assert!(JoinRequestStatus::Sent.can_transition_to(JoinRequestStatus::Answered));
        assert!(JoinRequestStatus::Read.can_transition_to(JoinRequestStatus::Answered));
        assert!(!JoinRequestStatus::Read.can_transition_to(JoinRequestStatus::Sent));
    }
}
