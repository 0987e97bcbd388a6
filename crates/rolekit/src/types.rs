//! Core types for declarative role sync

use crate::diff::string_sets_equal;
use crate::error::Error;
use crate::members::MemberReport;
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;

/// Allow/deny resource patterns of a role.
///
/// Both lists are treated as sets: order never matters and a missing list is
/// the same as an empty one.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Resources {
    #[serde(default, deserialize_with = "nullable_list")]
    pub allowed: Vec<String>,
    #[serde(default, deserialize_with = "nullable_list")]
    pub denied: Vec<String>,
}

impl Resources {
    pub fn new<A, D>(allowed: A, denied: D) -> Self
    where
        A: IntoIterator,
        A::Item: Into<String>,
        D: IntoIterator,
        D::Item: Into<String>,
    {
        Self {
            allowed: allowed.into_iter().map(Into::into).collect(),
            denied: denied.into_iter().map(Into::into).collect(),
        }
    }
}

impl PartialEq for Resources {
    fn eq(&self, other: &Self) -> bool {
        string_sets_equal(&self.allowed, &other.allowed)
            && string_sets_equal(&self.denied, &other.denied)
    }
}

impl Eq for Resources {}

/// A named bundle of resource patterns plus the members holding it.
///
/// Equality compares name, resources and members. The remote `id` is not
/// part of equality: a local role that was never created has no id but can
/// still describe exactly what the remote holds.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Role {
    pub name: String,
    /// Opaque identifier assigned by the remote service
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default)]
    pub resources: Resources,
    #[serde(default, deserialize_with = "nullable_list")]
    pub members: Vec<String>,
}

impl Role {
    /// Create a role with no resources and no members
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn allow<I>(mut self, patterns: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<String>,
    {
        self.resources
            .allowed
            .extend(patterns.into_iter().map(Into::into));
        self
    }

    pub fn deny<I>(mut self, patterns: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<String>,
    {
        self.resources
            .denied
            .extend(patterns.into_iter().map(Into::into));
        self
    }

    pub fn with_members<I>(mut self, members: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<String>,
    {
        self.members.extend(members.into_iter().map(Into::into));
        self
    }
}

impl PartialEq for Role {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
            && self.resources == other.resources
            && string_sets_equal(&self.members, &other.members)
    }
}

impl Eq for Role {}

/// A role present on both sides whose content differs
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoleUpdate {
    /// Desired version, the one pushed on update
    pub local: Role,
    /// Version currently held by the remote service
    pub remote: Role,
}

impl RoleUpdate {
    pub fn name(&self) -> &str {
        &self.local.name
    }
}

/// Operations needed to converge the remote role set to the local one
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncPlan {
    pub creates: Vec<Role>,
    pub updates: Vec<RoleUpdate>,
    pub deletes: Vec<String>,
}

impl SyncPlan {
    /// Check if the plan has nothing to do
    pub fn is_empty(&self) -> bool {
        self.creates.is_empty() && self.updates.is_empty() && self.deletes.is_empty()
    }

    /// Total number of role operations in the plan
    pub fn total_changes(&self) -> usize {
        self.creates.len() + self.updates.len() + self.deletes.len()
    }

    /// Order every phase by role name
    pub fn sort(&mut self) {
        self.creates.sort_by(|a, b| a.name.cmp(&b.name));
        self.updates.sort_by(|a, b| a.name().cmp(b.name()));
        self.deletes.sort();
    }

    /// Sorted copy of the plan
    pub fn sorted(mut self) -> Self {
        self.sort();
        self
    }
}

/// Kind of role operation, also the phase it runs in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Operation {
    Create,
    Update,
    Delete,
}

impl Operation {
    /// Verb used in log and error messages
    pub fn verb(self) -> &'static str {
        match self {
            Self::Create => "create",
            Self::Update => "update",
            Self::Delete => "delete",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.verb())
    }
}

/// A member of the remote team, or a pending invitation
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TeamMember {
    /// Opaque identifier assigned by the remote service
    #[serde(default)]
    pub id: String,
    pub email: String,
    /// Policy (role id) currently assigned, empty when unassigned
    #[serde(default)]
    pub policy_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub invite_id: Option<String>,
}

impl TeamMember {
    pub fn new(email: impl Into<String>, policy_id: impl Into<String>) -> Self {
        let email = email.into();
        Self {
            id: format!("user-{email}"),
            email,
            policy_id: policy_id.into(),
            status: None,
            invite_id: None,
        }
    }

    /// Whether this entry is a pending invitation rather than an active user
    pub fn is_pending_invite(&self) -> bool {
        crate::members::is_pending_invite(self)
    }
}

/// Response returned by the remote service when inviting a user
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InviteStatus {
    pub email: String,
    #[serde(default)]
    pub status: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub invite_id: Option<String>,
}

/// Remote members and invites that no local role references.
///
/// These are reported, never removed, by a sync run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemberDeletions {
    pub orphaned_users: Vec<String>,
    pub orphaned_invites: Vec<String>,
}

impl MemberDeletions {
    pub fn is_empty(&self) -> bool {
        self.orphaned_users.is_empty() && self.orphaned_invites.is_empty()
    }

    pub fn total(&self) -> usize {
        self.orphaned_users.len() + self.orphaned_invites.len()
    }
}

/// Outcome of executing a plan
#[derive(Debug, Default)]
pub struct ExecutionResult {
    pub created: usize,
    pub updated: usize,
    pub deleted: usize,
    /// First fatal error; execution stopped here
    pub error: Option<Error>,
    pub dry_run: bool,
    /// Rendered plan, only for dry runs that asked for it
    pub diff: Option<String>,
    pub member_deletions: Option<MemberDeletions>,
    /// Membership changes made (or previewed on dry runs)
    pub members: Option<MemberReport>,
}

impl ExecutionResult {
    /// Result of a dry run over a plan: counts only, no error possible
    pub fn dry_run(plan: &SyncPlan) -> Self {
        Self {
            created: plan.creates.len(),
            updated: plan.updates.len(),
            deleted: plan.deletes.len(),
            dry_run: true,
            ..Default::default()
        }
    }

    /// Total number of role changes made (or that would be made)
    pub fn total_changes(&self) -> usize {
        self.created + self.updated + self.deleted
    }

    /// Check if execution finished without error
    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }
}

/// Accepts a missing or `null` list as an empty one
fn nullable_list<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<Vec<String>>::deserialize(deserializer)?.unwrap_or_default())
}
