//! Sync orchestration - plan, execute, then reconcile membership

use crate::client::MemberClient;
use crate::concurrent::ConcurrentExecutor;
use crate::context::{CancelFlag, ProgressSink};
use crate::error::Error;
use crate::executor::{execute_plan, execute_plan_dry_run, execute_plan_dry_run_with_diff};
use crate::members::{MemberReconciler, member_assignments, plan_memberships};
use crate::planner::{compare_roles, validate_roles};
use crate::types::{ExecutionResult, Role};

/// Options for a sync run
#[derive(Debug, Clone)]
pub struct SyncOptions {
    /// Don't make changes, just compute what would happen
    pub dry_run: bool,
    /// Render the plan text on dry runs
    pub show_diff: bool,
    /// Maximum concurrent remote calls; 1 runs sequentially
    pub jobs: usize,
    /// Invite members who are not on the team yet
    pub auto_invite: bool,
    /// Reconcile team membership after role changes
    pub manage_members: bool,
    /// Flag the caller can trip to stop the run
    pub cancel: Option<CancelFlag>,
}

impl Default for SyncOptions {
    fn default() -> Self {
        Self {
            dry_run: false,
            show_diff: false,
            jobs: 4,
            auto_invite: false,
            manage_members: true,
            cancel: None,
        }
    }
}

/// Converge the remote service to `local`.
///
/// Local roles are validated (including one-role-per-member) before any
/// remote call. The plan then runs on the sequential executor when `jobs` is
/// 1 and on the concurrent one otherwise. Membership is reconciled only if
/// every role operation succeeded. On dry runs, membership is previewed from
/// a read-only member listing instead.
pub fn sync<C: MemberClient + ?Sized>(
    local: &[Role],
    remote: &[Role],
    client: &C,
    opts: &SyncOptions,
    progress: &dyn ProgressSink,
) -> ExecutionResult {
    let failed = |error: Error| ExecutionResult {
        error: Some(error),
        dry_run: opts.dry_run,
        ..Default::default()
    };

    if let Err(e) = validate_roles(local) {
        return failed(e);
    }
    // One role per member holds for every role set, managed or not
    if let Err(e) = member_assignments(local) {
        return failed(e);
    }
    if opts.jobs == 0 {
        return failed(Error::InvalidParallelism(0));
    }

    let plan = compare_roles(local, remote).sorted();
    log::info!(
        "plan: {} to create, {} to update, {} to delete",
        plan.creates.len(),
        plan.updates.len(),
        plan.deletes.len()
    );

    if opts.dry_run {
        let mut result = if opts.show_diff {
            execute_plan_dry_run_with_diff(&plan)
        } else {
            execute_plan_dry_run(&plan)
        };
        if opts.manage_members {
            let preview = client
                .get_team_members()
                .map_err(|source| Error::Fetch {
                    what: "team members",
                    source,
                })
                .and_then(|members| plan_memberships(local, remote, &members, opts.auto_invite));
            match preview {
                Ok(preview) => {
                    let report = preview.to_report();
                    result.member_deletions = Some(report.deletions.clone());
                    result.members = Some(report);
                }
                Err(e) => result.error = Some(e),
            }
        }
        return result;
    }

    let mut result = if opts.jobs == 1 {
        execute_plan(&plan, client, progress, opts.cancel.as_ref())
    } else {
        match ConcurrentExecutor::new(opts.jobs) {
            Ok(executor) => {
                let executor = match &opts.cancel {
                    Some(cancel) => executor.with_cancel(cancel.clone()),
                    None => executor,
                };
                executor.execute(&plan, client, progress)
            }
            Err(e) => return failed(e),
        }
    };

    if result.error.is_some() || !opts.manage_members {
        return result;
    }

    match MemberReconciler::new(opts.auto_invite).reconcile(local, client, progress) {
        Ok(report) => {
            result.member_deletions = Some(report.deletions.clone());
            result.members = Some(report);
        }
        Err(e) => result.error = Some(e),
    }
    result
}

/// Fetch the remote role set, then [`sync`] against it
pub fn sync_remote<C: MemberClient + ?Sized>(
    local: &[Role],
    client: &C,
    opts: &SyncOptions,
    progress: &dyn ProgressSink,
) -> ExecutionResult {
    match client.list_roles() {
        Ok(remote) => sync(local, &remote, client, opts, progress),
        Err(source) => ExecutionResult {
            error: Some(Error::Fetch {
                what: "roles",
                source,
            }),
            dry_run: opts.dry_run,
            ..Default::default()
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::{Call, MockClient};
    use crate::context::NoProgress;
    use crate::types::{Operation, TeamMember};

    fn opts(jobs: usize) -> SyncOptions {
        SyncOptions {
            jobs,
            ..Default::default()
        }
    }

    #[test]
    fn test_empty_sync_is_zero_change() {
        let mock = MockClient::new();
        let result = sync(&[], &[], &mock, &opts(1), &NoProgress);
        assert!(result.is_success());
        assert_eq!(result.total_changes(), 0);
        assert_eq!(result.member_deletions, Some(Default::default()));
    }

    #[test]
    fn test_member_conflict_before_any_remote_call() {
        let mock = MockClient::new();
        let local = vec![
            Role::new("admin").with_members(["x@example.com"]),
            Role::new("editor").with_members(["x@example.com"]),
        ];
        for jobs in [1, 4] {
            let result = sync(&local, &[], &mock, &opts(jobs), &NoProgress);
            let msg = result.error.unwrap().to_string();
            assert!(msg.contains("appears in multiple roles"));
            assert!(msg.contains("admin") && msg.contains("editor"));
        }
        assert!(mock.calls().is_empty());
    }

    #[test]
    fn test_full_sync_creates_and_assigns() {
        let mock = MockClient::new()
            .with_roles([Role::new("legacy")])
            .with_members([
                TeamMember::new("a@example.com", ""),
                TeamMember {
                    id: "old@example.com".into(),
                    email: "old@example.com".into(),
                    ..Default::default()
                },
                TeamMember::new("left@example.com", "role-1"),
            ]);
        let local = vec![Role::new("admin").allow(["*"]).with_members(["a@example.com"])];

        let result = sync_remote(&local, &mock, &opts(2), &NoProgress);
        assert!(result.is_success(), "{:?}", result.error);
        assert_eq!((result.created, result.updated, result.deleted), (1, 0, 1));

        let admin_id = mock
            .roles()
            .into_iter()
            .find(|r| r.name == "admin")
            .and_then(|r| r.id)
            .unwrap();
        assert!(
            mock.calls()
                .contains(&Call::AssignMemberRole("a@example.com".into(), admin_id))
        );

        let deletions = result.member_deletions.unwrap();
        assert_eq!(deletions.orphaned_users, vec!["left@example.com".to_string()]);
        assert_eq!(deletions.orphaned_invites, vec!["old@example.com".to_string()]);
    }

    #[test]
    fn test_failed_crud_skips_membership() {
        let mock = MockClient::new();
        mock.fail_role(Operation::Create, "admin");
        let local = vec![Role::new("admin").with_members(["a@example.com"])];

        let result = sync(&local, &[], &mock, &opts(1), &NoProgress);
        assert!(result.error.is_some());
        assert!(result.members.is_none());
        assert!(!mock.calls().contains(&Call::GetTeamMembers));
    }

    #[test]
    fn test_dry_run_only_reads() {
        let remote = vec![Role::new("editor").allow(["read"]).with_id("r-editor")];
        let mock = MockClient::new()
            .with_roles(remote.clone())
            .with_members([TeamMember::new("e@example.com", "r-editor")]);
        let local = vec![
            Role::new("editor")
                .allow(["read", "write"])
                .deny(["delete"])
                .with_members(["e@example.com"]),
        ];

        let result = sync(
            &local,
            &remote,
            &mock,
            &SyncOptions {
                dry_run: true,
                show_diff: true,
                ..Default::default()
            },
            &NoProgress,
        );
        assert!(result.dry_run);
        assert_eq!(result.updated, 1);
        assert!(result.diff.unwrap().contains("+ allowed: write"));
        assert_eq!(result.members.unwrap().unchanged, 1);
        assert!(mock.mutations().is_empty());
    }

    #[test]
    fn test_member_conflict_rejected_when_members_unmanaged() {
        let mock = MockClient::new();
        let local = vec![
            Role::new("a").with_members(["x@example.com"]),
            Role::new("b").with_members(["x@example.com"]),
        ];
        let unmanaged = SyncOptions {
            manage_members: false,
            jobs: 1,
            ..Default::default()
        };
        let result = sync(&local, &[], &mock, &unmanaged, &NoProgress);
        let err = result.error.unwrap();
        assert!(err.is_validation());
        assert!(err.to_string().contains("appears in multiple roles"));
        assert_eq!(result.created, 0);
        assert!(mock.calls().is_empty());
    }

    #[test]
    fn test_unmanaged_members_are_not_reconciled() {
        let mock = MockClient::new();
        let local = vec![
            Role::new("a").with_members(["x@example.com"]),
            Role::new("b").with_members(["y@example.com"]),
        ];
        let result = sync(
            &local,
            &[],
            &mock,
            &SyncOptions {
                manage_members: false,
                jobs: 1,
                ..Default::default()
            },
            &NoProgress,
        );
        assert!(result.is_success());
        assert_eq!(result.created, 2);
        assert!(result.member_deletions.is_none());
        assert!(!mock.calls().contains(&Call::GetTeamMembers));
    }

    #[test]
    fn test_zero_jobs_rejected() {
        let mock = MockClient::new();
        let result = sync(&[Role::new("a")], &[], &mock, &opts(0), &NoProgress);
        assert!(matches!(result.error, Some(Error::InvalidParallelism(0))));
        assert!(mock.calls().is_empty());
    }
}
