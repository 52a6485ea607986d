//! Named permissions and per-member permission sets.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

/// A single capability a member can hold on a project.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Permission {
    EditTitle,
    EditGoal,
    EditSummary,
    EditDescription,
    EditCategory,
    EditSubCategory,
    EditTags,
    EditLocation,
    EditTalentsNeeded,
    EditStartDate,
    EditStatus,
    EditPhase,
    EditObjectives,
    EditCreatorMotivation,
    EditVisibility,
    EditAttachments,
    SeeJoinProjectRequests,
    AnswerJoinProjectRequests,
    SendJoinProjectInvitations,
    EditMembers,
    RemoveMembers,
    EditRights,
}

impl Permission {
    pub const ALL: [Permission; 22] = [
        Permission::EditTitle,
        Permission::EditGoal,
        Permission::EditSummary,
        Permission::EditDescription,
        Permission::EditCategory,
        Permission::EditSubCategory,
        Permission::EditTags,
        Permission::EditLocation,
        Permission::EditTalentsNeeded,
        Permission::EditStartDate,
        Permission::EditStatus,
        Permission::EditPhase,
        Permission::EditObjectives,
        Permission::EditCreatorMotivation,
        Permission::EditVisibility,
        Permission::EditAttachments,
        Permission::SeeJoinProjectRequests,
        Permission::AnswerJoinProjectRequests,
        Permission::SendJoinProjectInvitations,
        Permission::EditMembers,
        Permission::RemoveMembers,
        Permission::EditRights,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Permission::EditTitle => "canEditTitle",
            Permission::EditGoal => "canEditGoal",
            Permission::EditSummary => "canEditSummary",
            Permission::EditDescription => "canEditDescription",
            Permission::EditCategory => "canEditCategory",
            Permission::EditSubCategory => "canEditSubCategory",
            Permission::EditTags => "canEditTags",
            Permission::EditLocation => "canEditLocation",
            Permission::EditTalentsNeeded => "canEditTalentsNeeded",
            Permission::EditStartDate => "canEditStartDate",
            Permission::EditStatus => "canEditStatus",
            Permission::EditPhase => "canEditPhase",
            Permission::EditObjectives => "canEditObjectives",
            Permission::EditCreatorMotivation => "canEditCreatorMotivation",
            Permission::EditVisibility => "canEditVisibility",
            Permission::EditAttachments => "canEditAttachments",
            Permission::SeeJoinProjectRequests => "canSeeJoinProjectRequests",
            Permission::AnswerJoinProjectRequests => "canAnswerJoinProjectRequests",
            Permission::SendJoinProjectInvitations => "canSendJoinProjectInvitations",
            Permission::EditMembers => "canEditMembers",
            Permission::RemoveMembers => "canRemoveMembers",
            Permission::EditRights => "canEditRights",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Permission::ALL.into_iter().find(|p| p.name() == name)
    }

    /// Permission guarding an editable project field, by wire name.
    pub fn for_field(field: &str) -> Option<Self> {
        match field {
            "title" => Some(Permission::EditTitle),
            "goal" => Some(Permission::EditGoal),
            "summary" => Some(Permission::EditSummary),
            "description" => Some(Permission::EditDescription),
            "cover" => Some(Permission::EditAttachments),
            "category" => Some(Permission::EditCategory),
            "subCategory" => Some(Permission::EditSubCategory),
            "location" => Some(Permission::EditLocation),
            "startDate" => Some(Permission::EditStartDate),
            "motivation" => Some(Permission::EditCreatorMotivation),
            "tags" => Some(Permission::EditTags),
            "talentsNeeded" => Some(Permission::EditTalentsNeeded),
            "objectives" => Some(Permission::EditObjectives),
            "visibility" => Some(Permission::EditVisibility),
            "status" => Some(Permission::EditStatus),
            _ => None,
        }
    }
}

/// The granted capabilities of one member on one project.
///
/// Serialized as the full `name -> bool` map so every capability is explicit
/// on the wire and in storage.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(
    into = "BTreeMap<String, bool>",
    try_from = "BTreeMap<String, bool>"
)]
pub struct PermissionSet {
    granted: BTreeSet<Permission>,
}

impl PermissionSet {
    /// Every capability denied.
    pub fn none() -> Self {
        Self::default()
    }

    /// Every capability granted.
    pub fn all() -> Self {
        Permission::ALL.into_iter().collect()
    }

    pub fn allows(&self, permission: Permission) -> bool {
        self.granted.contains(&permission)
    }

    pub fn grant(&mut self, permission: Permission) {
        self.granted.insert(permission);
    }

    pub fn is_all(&self) -> bool {
        self.granted.len() == Permission::ALL.len()
    }

    /// Union of both sets.
    pub fn merge(&self, other: &PermissionSet) -> PermissionSet {
        self.granted.union(&other.granted).copied().collect()
    }

    /// Requested fields this set does not allow, in request order.
    ///
    /// Fields that map to no permission are always reported.
    pub fn missing_for<'a, I>(&self, fields: I) -> Vec<String>
    where
        I: IntoIterator<Item = &'a str>,
    {
        fields
            .into_iter()
            .filter(|field| match Permission::for_field(field) {
                Some(permission) => !self.allows(permission),
                None => true,
            })
            .map(str::to_string)
            .collect()
    }

    /// True only if every requested field maps to a granted permission.
    pub fn can_edit<'a, I>(&self, fields: I) -> bool
    where
        I: IntoIterator<Item = &'a str>,
    {
        self.missing_for(fields).is_empty()
    }
}

impl FromIterator<Permission> for PermissionSet {
    fn from_iter<T: IntoIterator<Item = Permission>>(iter: T) -> Self {
        Self {
            granted: iter.into_iter().collect(),
        }
    }
}

impl From<PermissionSet> for BTreeMap<String, bool> {
    fn from(set: PermissionSet) -> Self {
        Permission::ALL
            .into_iter()
            .map(|p| (p.name().to_string(), set.allows(p)))
            .collect()
    }
}

impl TryFrom<BTreeMap<String, bool>> for PermissionSet {
    type Error = String;

    /// Keys left out of the map are denied. Unknown keys are an error.
    fn try_from(map: BTreeMap<String, bool>) -> Result<Self, Self::Error> {
        let mut set = PermissionSet::none();
        for (name, granted) in map {
            let permission =
                Permission::from_name(&name).ok_or_else(|| format!("Unknown permission '{name}'"))?;
            if granted {
                set.grant(permission);
            }
        }
        Ok(set)
    }
}

/// Stored rights row for a non-owner member.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectRights {
    pub project_id: String,
    pub user_id: String,
    pub permissions: PermissionSet,
    pub updated_by: String,
    pub updated_at: String,
}
