//! Membership reconciliation
//!
//! Every member email in the local role set maps to exactly one role. After
//! role CRUD, the reconciler makes the remote team match that mapping:
//! existing members are (re)assigned, missing ones are invited when
//! auto-invite is on, and remote members no role references are reported as
//! orphans. Orphans are only removed by an explicit call to
//! [`delete_members_and_invites`].

use crate::client::MemberClient;
use crate::context::ProgressSink;
use crate::error::{Error, Result};
use crate::types::{MemberDeletions, Role, TeamMember};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet};

/// Build the global `member -> role name` mapping.
///
/// # Errors
///
/// Returns `Error::MemberConflict` naming both roles when a member appears in
/// two different roles.
pub fn member_assignments(roles: &[Role]) -> Result<BTreeMap<String, String>> {
    let mut assignments: BTreeMap<String, String> = BTreeMap::new();

    for role in roles {
        for member in &role.members {
            match assignments.get(member) {
                Some(existing) if *existing != role.name => {
                    return Err(Error::MemberConflict {
                        member: member.clone(),
                        first: existing.clone(),
                        second: role.name.clone(),
                    });
                }
                Some(_) => {}
                None => {
                    assignments.insert(member.clone(), role.name.clone());
                }
            }
        }
    }

    Ok(assignments)
}

/// Whether a remote team member is a pending invitation.
///
/// An explicit status decides when present; otherwise an invite id marks an
/// invitation. As a last resort an entry whose opaque id equals its email is
/// treated as an invitation, since some services report invites that way.
/// That fallback misclassifies an active user whose id happens to be their
/// email.
pub fn is_pending_invite(member: &TeamMember) -> bool {
    if let Some(status) = member.status.as_deref().map(str::trim)
        && !status.is_empty()
    {
        return status.eq_ignore_ascii_case("pending") || status.eq_ignore_ascii_case("invited");
    }

    if member.invite_id.as_deref().is_some_and(|id| !id.is_empty()) {
        return true;
    }

    id_matches_email(member)
}

/// Fallback heuristic for services that give invitations the email as id
fn id_matches_email(member: &TeamMember) -> bool {
    !member.id.is_empty() && member.id == member.email
}

/// Remote members that no local role references, split into active users and
/// pending invitations. Both lists are sorted.
pub fn find_orphans(roles: &[Role], remote: &[TeamMember]) -> MemberDeletions {
    let referenced: HashSet<&str> = roles
        .iter()
        .flat_map(|r| r.members.iter().map(String::as_str))
        .collect();

    let mut deletions = MemberDeletions::default();
    for member in remote {
        if referenced.contains(member.email.as_str()) {
            continue;
        }
        if is_pending_invite(member) {
            deletions.orphaned_invites.push(member.email.clone());
        } else {
            deletions.orphaned_users.push(member.email.clone());
        }
    }
    deletions.orphaned_users.sort();
    deletions.orphaned_users.dedup();
    deletions.orphaned_invites.sort();
    deletions.orphaned_invites.dedup();
    deletions
}

/// What reconciliation does (or would do) for one member
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MemberAction {
    /// Already assigned the right role
    Unchanged { email: String, role: String },
    /// Assign an existing member; `previous` is their current role id, if any.
    /// `role_id` is `None` when the role does not exist remotely yet.
    Assign {
        email: String,
        role: String,
        role_id: Option<String>,
        previous: Option<String>,
    },
    /// Invite a member who is not on the team
    Invite {
        email: String,
        role: String,
        role_id: Option<String>,
    },
    /// Not on the team and auto-invite is off
    Skip { email: String, role: String },
}

/// Decide the action for one `(member, role)` pair
fn decide(
    email: &str,
    role: &str,
    role_id: Option<&str>,
    remote: Option<&TeamMember>,
    auto_invite: bool,
) -> MemberAction {
    let email = email.to_string();
    let role = role.to_string();
    match remote {
        Some(member) if role_id.is_some_and(|id| id == member.policy_id) => {
            MemberAction::Unchanged { email, role }
        }
        Some(member) => MemberAction::Assign {
            email,
            role,
            role_id: role_id.map(str::to_string),
            previous: Some(member.policy_id.clone()).filter(|p| !p.is_empty()),
        },
        None if auto_invite => MemberAction::Invite {
            email,
            role,
            role_id: role_id.map(str::to_string),
        },
        None => MemberAction::Skip { email, role },
    }
}

/// Outcome of a membership pass (applied or previewed)
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemberReport {
    /// Previously unassigned members given a role
    pub assigned: Vec<String>,
    /// Members moved from another role
    pub reassigned: Vec<String>,
    pub invited: Vec<String>,
    /// Missing members left alone because auto-invite is off
    pub skipped: Vec<String>,
    pub unchanged: usize,
    pub deletions: MemberDeletions,
}

impl MemberReport {
    /// Number of membership changes
    pub fn total_changes(&self) -> usize {
        self.assigned.len() + self.reassigned.len() + self.invited.len()
    }

    fn record(&mut self, action: &MemberAction) {
        match action {
            MemberAction::Unchanged { .. } => self.unchanged += 1,
            MemberAction::Assign {
                email,
                previous: Some(_),
                ..
            } => self.reassigned.push(email.clone()),
            MemberAction::Assign { email, .. } => self.assigned.push(email.clone()),
            MemberAction::Invite { email, .. } => self.invited.push(email.clone()),
            MemberAction::Skip { email, .. } => self.skipped.push(email.clone()),
        }
    }
}

/// Membership changes computed without touching the remote service
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MembershipPlan {
    pub actions: Vec<MemberAction>,
    pub deletions: MemberDeletions,
}

impl MembershipPlan {
    /// Summarise the plan as a report of what would happen
    pub fn to_report(&self) -> MemberReport {
        let mut report = MemberReport::default();
        for action in &self.actions {
            report.record(action);
        }
        report.deletions = self.deletions.clone();
        report
    }
}

/// Preview membership reconciliation.
///
/// Role ids come from `remote_roles`; members of roles that do not exist
/// remotely yet are planned with no role id.
pub fn plan_memberships(
    roles: &[Role],
    remote_roles: &[Role],
    members: &[TeamMember],
    auto_invite: bool,
) -> Result<MembershipPlan> {
    let assignments = member_assignments(roles)?;
    let role_ids: HashMap<&str, &str> = remote_roles
        .iter()
        .filter_map(|r| r.id.as_deref().map(|id| (r.name.as_str(), id)))
        .collect();
    let by_email: HashMap<&str, &TeamMember> =
        members.iter().map(|m| (m.email.as_str(), m)).collect();

    let actions = assignments
        .iter()
        .map(|(email, role)| {
            decide(
                email,
                role,
                role_ids.get(role.as_str()).copied(),
                by_email.get(email.as_str()).copied(),
                auto_invite,
            )
        })
        .collect();

    Ok(MembershipPlan {
        actions,
        deletions: find_orphans(roles, members),
    })
}

/// Applies the member mapping of a role set to the remote team
#[derive(Debug, Clone, Copy, Default)]
pub struct MemberReconciler {
    auto_invite: bool,
}

impl MemberReconciler {
    pub fn new(auto_invite: bool) -> Self {
        Self { auto_invite }
    }

    /// Reconcile remote membership against the full local role set.
    ///
    /// Stops at the first failed lookup, assignment or invitation. Orphans are
    /// reported in the returned report, not removed.
    pub fn reconcile<C: MemberClient + ?Sized>(
        &self,
        roles: &[Role],
        client: &C,
        progress: &dyn ProgressSink,
    ) -> Result<MemberReport> {
        let assignments = member_assignments(roles)?;
        let remote = client
            .get_team_members()
            .map_err(|source| Error::Fetch {
                what: "team members",
                source,
            })?;
        let by_email: HashMap<&str, &TeamMember> =
            remote.iter().map(|m| (m.email.as_str(), m)).collect();

        let mut role_ids: HashMap<&str, String> = HashMap::new();
        let mut report = MemberReport::default();

        for (email, role) in &assignments {
            let role_id = match role_ids.get(role.as_str()) {
                Some(id) => id.clone(),
                None => {
                    let id = resolve_role_id(client, role)?;
                    role_ids.insert(role.as_str(), id.clone());
                    id
                }
            };

            let action = decide(
                email,
                role,
                Some(&role_id),
                by_email.get(email.as_str()).copied(),
                self.auto_invite,
            );
            self.apply(&action, &role_id, client, progress)?;
            report.record(&action);
        }

        report.deletions = find_orphans(roles, &remote);
        log::info!(
            "membership: {} assigned, {} reassigned, {} invited, {} unchanged, {} skipped",
            report.assigned.len(),
            report.reassigned.len(),
            report.invited.len(),
            report.unchanged,
            report.skipped.len()
        );
        Ok(report)
    }

    fn apply<C: MemberClient + ?Sized>(
        &self,
        action: &MemberAction,
        role_id: &str,
        client: &C,
        progress: &dyn ProgressSink,
    ) -> Result<()> {
        match action {
            MemberAction::Unchanged { .. } => {}
            MemberAction::Assign { email, role, .. } => {
                client
                    .assign_member_role(email, role_id)
                    .map_err(|source| Error::Membership {
                        action: "assign",
                        member: email.clone(),
                        source,
                    })?;
                progress.message(&format!("assigned {email} to {role}"));
            }
            MemberAction::Invite { email, role, .. } => {
                let status =
                    client
                        .invite_user(email, role_id)
                        .map_err(|source| Error::Membership {
                            action: "invite",
                            member: email.clone(),
                            source,
                        })?;
                log::debug!("invited {email}: {}", status.status);
                progress.message(&format!("invited {email} as {role}"));
            }
            MemberAction::Skip { email, role } => {
                log::warn!(
                    "{email} is listed in role {role} but is not a team member (auto-invite is off)"
                );
            }
        }
        Ok(())
    }
}

fn resolve_role_id<C: MemberClient + ?Sized>(client: &C, role: &str) -> Result<String> {
    let remote = client.get_role(role).map_err(|source| Error::RoleLookup {
        role: role.to_string(),
        source,
    })?;
    remote
        .id
        .filter(|id| !id.is_empty())
        .ok_or_else(|| Error::MissingRoleId(role.to_string()))
}

/// Counts from removing orphaned members and invites
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeletionSummary {
    pub invites_cancelled: usize,
    pub users_removed: usize,
}

/// Cancel orphaned invites and remove orphaned users.
///
/// Destructive: callers should show `deletions` and confirm first. Stops at
/// the first failure.
pub fn delete_members_and_invites<C: MemberClient + ?Sized>(
    client: &C,
    deletions: &MemberDeletions,
    progress: &dyn ProgressSink,
) -> Result<DeletionSummary> {
    let mut summary = DeletionSummary::default();

    for email in &deletions.orphaned_invites {
        client
            .delete_invite(email)
            .map_err(|source| Error::Membership {
                action: "cancel invite for",
                member: email.clone(),
                source,
            })?;
        summary.invites_cancelled += 1;
        progress.message(&format!("cancelled invite for {email}"));
    }

    for email in &deletions.orphaned_users {
        client
            .remove_member(email)
            .map_err(|source| Error::Membership {
                action: "remove",
                member: email.clone(),
                source,
            })?;
        summary.users_removed += 1;
        progress.message(&format!("removed {email}"));
    }

    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::{Call, MockClient};
    use crate::context::NoProgress;

    fn invite(email: &str) -> TeamMember {
        TeamMember {
            id: "inv-1".into(),
            email: email.into(),
            status: Some("pending".into()),
            ..Default::default()
        }
    }

    #[test]
    fn test_member_in_two_roles_is_error() {
        let roles = vec![
            Role::new("admin").with_members(["x@example.com"]),
            Role::new("editor").with_members(["x@example.com"]),
        ];
        let err = member_assignments(&roles).unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("appears in multiple roles"));
        assert!(msg.contains("admin") && msg.contains("editor"));
    }

    #[test]
    fn test_member_assignments() {
        let roles = vec![
            Role::new("admin").with_members(["a@example.com"]),
            Role::new("viewer").with_members(["b@example.com", "c@example.com"]),
        ];
        let map = member_assignments(&roles).unwrap();
        assert_eq!(map.len(), 3);
        assert_eq!(map["c@example.com"], "viewer");
    }

    #[test]
    fn test_is_pending_invite() {
        assert!(is_pending_invite(&invite("a@example.com")));

        let by_invite_id = TeamMember {
            id: "u1".into(),
            email: "b@example.com".into(),
            invite_id: Some("inv-9".into()),
            ..Default::default()
        };
        assert!(is_pending_invite(&by_invite_id));

        let by_heuristic = TeamMember {
            id: "c@example.com".into(),
            email: "c@example.com".into(),
            ..Default::default()
        };
        assert!(is_pending_invite(&by_heuristic));

        let explicit_active = TeamMember {
            status: Some("active".into()),
            ..by_heuristic.clone()
        };
        assert!(!is_pending_invite(&explicit_active));

        assert!(!is_pending_invite(&TeamMember::new("d@example.com", "r1")));
    }

    #[test]
    fn test_find_orphans_partitions() {
        let roles = vec![Role::new("admin").with_members(["kept@example.com"])];
        let remote = vec![
            TeamMember::new("kept@example.com", "r1"),
            TeamMember::new("gone@example.com", "r1"),
            invite("pending@example.com"),
        ];
        let orphans = find_orphans(&roles, &remote);
        assert_eq!(orphans.orphaned_users, vec!["gone@example.com".to_string()]);
        assert_eq!(
            orphans.orphaned_invites,
            vec!["pending@example.com".to_string()]
        );
    }

    #[test]
    fn test_reconcile_assigns_reassigns_and_skips() {
        let mock = MockClient::new()
            .with_roles([
                Role::new("admin").with_id("r-admin"),
                Role::new("viewer").with_id("r-viewer"),
            ])
            .with_members([
                TeamMember::new("same@example.com", "r-admin"),
                TeamMember::new("moved@example.com", "r-viewer"),
                TeamMember::new("fresh@example.com", ""),
                TeamMember::new("orphan@example.com", "r-viewer"),
            ]);
        let roles = vec![
            Role::new("admin").with_members(["same@example.com", "moved@example.com"]),
            Role::new("viewer").with_members(["fresh@example.com", "new@example.com"]),
        ];

        let report = MemberReconciler::new(false)
            .reconcile(&roles, &mock, &NoProgress)
            .unwrap();

        assert_eq!(report.unchanged, 1);
        assert_eq!(report.reassigned, vec!["moved@example.com".to_string()]);
        assert_eq!(report.assigned, vec!["fresh@example.com".to_string()]);
        assert_eq!(report.skipped, vec!["new@example.com".to_string()]);
        assert!(report.invited.is_empty());
        assert_eq!(
            report.deletions.orphaned_users,
            vec!["orphan@example.com".to_string()]
        );

        // Orphans are reported, not touched; no invite without auto-invite
        let mutations = mock.mutations();
        assert_eq!(mutations.len(), 2);
        assert!(mutations.contains(&Call::AssignMemberRole(
            "moved@example.com".into(),
            "r-admin".into()
        )));
        assert!(!mutations.iter().any(|c| matches!(c, Call::InviteUser(..))));
    }

    #[test]
    fn test_reconcile_is_idempotent() {
        let mock = MockClient::new()
            .with_roles([Role::new("admin").with_id("r-admin")])
            .with_members([TeamMember::new("a@example.com", "r-admin")]);
        let roles = vec![Role::new("admin").with_members(["a@example.com"])];

        let report = MemberReconciler::new(true)
            .reconcile(&roles, &mock, &NoProgress)
            .unwrap();
        assert_eq!(report.total_changes(), 0);
        assert!(mock.mutations().is_empty());
    }

    #[test]
    fn test_reconcile_invites_with_auto_invite() {
        let mock = MockClient::new().with_roles([Role::new("admin").with_id("r-admin")]);
        let roles = vec![Role::new("admin").with_members(["new@example.com"])];

        let report = MemberReconciler::new(true)
            .reconcile(&roles, &mock, &NoProgress)
            .unwrap();
        assert_eq!(report.invited, vec!["new@example.com".to_string()]);
        assert_eq!(
            mock.mutations(),
            vec![Call::InviteUser("new@example.com".into(), "r-admin".into())]
        );
    }

    #[test]
    fn test_invite_failure_is_fatal() {
        let mock = MockClient::new().with_roles([Role::new("admin").with_id("r-admin")]);
        mock.fail_member("new@example.com");
        let roles = vec![Role::new("admin").with_members(["new@example.com"])];

        let err = MemberReconciler::new(true)
            .reconcile(&roles, &mock, &NoProgress)
            .unwrap_err();
        assert!(err.to_string().contains("invite member new@example.com"));
    }

    #[test]
    fn test_role_lookup_failure_is_fatal() {
        let mock = MockClient::new().with_roles([Role::new("admin").with_id("r-admin")]);
        mock.fail_lookup("admin");
        let roles = vec![Role::new("admin").with_members(["a@example.com"])];

        let err = MemberReconciler::new(true)
            .reconcile(&roles, &mock, &NoProgress)
            .unwrap_err();
        assert!(matches!(err, Error::RoleLookup { ref role, .. } if role == "admin"));
    }

    #[test]
    fn test_conflict_detected_before_remote_calls() {
        let mock = MockClient::new();
        let roles = vec![
            Role::new("a").with_members(["x@example.com"]),
            Role::new("b").with_members(["x@example.com"]),
        ];
        let err = MemberReconciler::new(false)
            .reconcile(&roles, &mock, &NoProgress)
            .unwrap_err();
        assert!(err.is_validation());
        assert!(mock.calls().is_empty());
    }

    #[test]
    fn test_plan_memberships_preview() {
        let remote_roles = vec![Role::new("admin").with_id("r-admin")];
        let members = vec![
            TeamMember::new("a@example.com", "r-admin"),
            TeamMember::new("b@example.com", "r-admin"),
            invite("old@example.com"),
        ];
        let roles = vec![
            Role::new("admin").with_members(["a@example.com"]),
            Role::new("support").with_members(["b@example.com", "c@example.com"]),
        ];

        let plan = plan_memberships(&roles, &remote_roles, &members, true).unwrap();
        assert!(plan.actions.contains(&MemberAction::Assign {
            email: "b@example.com".into(),
            role: "support".into(),
            role_id: None,
            previous: Some("r-admin".into()),
        }));
        assert!(plan.actions.contains(&MemberAction::Invite {
            email: "c@example.com".into(),
            role: "support".into(),
            role_id: None,
        }));

        let report = plan.to_report();
        assert_eq!(report.unchanged, 1);
        assert_eq!(report.total_changes(), 2);
        assert_eq!(
            report.deletions.orphaned_invites,
            vec!["old@example.com".to_string()]
        );
    }

    #[test]
    fn test_delete_members_and_invites() {
        let mock = MockClient::new().with_members([
            TeamMember::new("gone@example.com", "r1"),
            invite("pending@example.com"),
        ]);
        let deletions = MemberDeletions {
            orphaned_users: vec!["gone@example.com".into()],
            orphaned_invites: vec!["pending@example.com".into()],
        };

        let summary = delete_members_and_invites(&mock, &deletions, &NoProgress).unwrap();
        assert_eq!(summary.invites_cancelled, 1);
        assert_eq!(summary.users_removed, 1);

        let members = mock.members();
        assert_eq!(members.len(), 1);
        assert!(members[0].policy_id.is_empty());
    }

    #[test]
    fn test_delete_stops_at_first_failure() {
        let mock = MockClient::new().with_members([invite("a@example.com")]);
        mock.fail_member("a@example.com");
        let deletions = MemberDeletions {
            orphaned_users: vec!["b@example.com".into()],
            orphaned_invites: vec!["a@example.com".into()],
        };

        let err = delete_members_and_invites(&mock, &deletions, &NoProgress).unwrap_err();
        assert!(err.to_string().contains("cancel invite for member a@example.com"));
        assert_eq!(mock.calls().len(), 1);
    }
}
