//! Sequential execution engine - applies a plan one operation at a time

use crate::client::RoleClient;
use crate::context::{CancelFlag, NoProgress, ProgressSink};
use crate::diff::render_plan;
use crate::error::{Error, Result};
use crate::types::{ExecutionResult, Operation, Role, SyncPlan};

/// A single role operation taken from a plan
#[derive(Debug, Clone, Copy)]
pub(crate) enum Job<'a> {
    Create(&'a Role),
    Update(&'a Role),
    Delete(&'a str),
}

impl Job<'_> {
    pub(crate) fn operation(&self) -> Operation {
        match self {
            Self::Create(_) => Operation::Create,
            Self::Update(_) => Operation::Update,
            Self::Delete(_) => Operation::Delete,
        }
    }

    pub(crate) fn role_name(&self) -> &str {
        match self {
            Self::Create(role) | Self::Update(role) => &role.name,
            Self::Delete(name) => name,
        }
    }

    /// Send the operation to the remote service
    pub(crate) fn run<C: RoleClient + ?Sized>(&self, client: &C) -> Result<()> {
        let outcome = match self {
            Self::Create(role) => client.create_role(role),
            Self::Update(role) => client.update_role(role),
            Self::Delete(name) => client.delete_role(name),
        };
        outcome.map_err(|source| Error::RoleOperation {
            operation: self.operation(),
            role: self.role_name().to_string(),
            source,
        })
    }
}

/// Split a plan into its three phases, in execution order.
///
/// Updates always push the local (desired) version.
pub(crate) fn phases(plan: &SyncPlan) -> [(Operation, Vec<Job<'_>>); 3] {
    [
        (
            Operation::Create,
            plan.creates.iter().map(Job::Create).collect(),
        ),
        (
            Operation::Update,
            plan.updates.iter().map(|u| Job::Update(&u.local)).collect(),
        ),
        (
            Operation::Delete,
            plan.deletes.iter().map(|n| Job::Delete(n.as_str())).collect(),
        ),
    ]
}

pub(crate) fn count(result: &mut ExecutionResult, operation: Operation) {
    match operation {
        Operation::Create => result.created += 1,
        Operation::Update => result.updated += 1,
        Operation::Delete => result.deleted += 1,
    }
}

/// Execute a plan one operation at a time.
///
/// Creates run first, then updates, then deletes. The first failure stops the
/// run: nothing after it is attempted, and the counts only include operations
/// that succeeded before it.
///
/// # Arguments
/// * `plan` - The plan to apply
/// * `client` - Remote role client
/// * `progress` - Progress sink notified before and after each operation
/// * `cancel` - Optional flag checked before each operation
pub fn execute_plan<C: RoleClient + ?Sized>(
    plan: &SyncPlan,
    client: &C,
    progress: &dyn ProgressSink,
    cancel: Option<&CancelFlag>,
) -> ExecutionResult {
    let mut result = ExecutionResult::default();

    for (operation, jobs) in phases(plan) {
        if jobs.is_empty() {
            continue;
        }
        progress.on_phase_start(operation, jobs.len());

        for job in &jobs {
            if cancel.is_some_and(CancelFlag::is_cancelled) {
                result.error = Some(Error::Cancelled(operation));
                return result;
            }

            log::debug!("{} role {}", operation, job.role_name());
            progress.on_operation_start(operation, job.role_name());
            let outcome = job.run(client);
            progress.on_operation_complete(operation, job.role_name(), outcome.is_ok());

            if let Err(e) = outcome {
                log::debug!("stopping after failure: {e}");
                result.error = Some(e);
                return result;
            }
            count(&mut result, operation);
        }

        progress.on_phase_complete(operation);
    }

    log::info!(
        "applied plan: {} created, {} updated, {} deleted",
        result.created,
        result.updated,
        result.deleted
    );
    result
}

/// Simple sequential execution without progress or cancellation
pub fn execute_plan_simple<C: RoleClient + ?Sized>(plan: &SyncPlan, client: &C) -> ExecutionResult {
    execute_plan(plan, client, &NoProgress, None)
}

/// Count what a plan would do without touching any client
pub fn execute_plan_dry_run(plan: &SyncPlan) -> ExecutionResult {
    ExecutionResult::dry_run(plan)
}

/// Dry run that also renders the plan as text
pub fn execute_plan_dry_run_with_diff(plan: &SyncPlan) -> ExecutionResult {
    ExecutionResult {
        diff: Some(render_plan(plan)),
        ..ExecutionResult::dry_run(plan)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::{Call, MockClient};
    use crate::planner::compare_roles;
    use crate::types::RoleUpdate;
    use std::sync::Mutex;

    /// Progress sink that records notifications
    #[derive(Default)]
    struct Recorder(Mutex<Vec<String>>);

    impl ProgressSink for Recorder {
        fn on_operation_start(&self, operation: Operation, role: &str) {
            self.0.lock().unwrap().push(format!("start {operation} {role}"));
        }

        fn on_operation_complete(&self, operation: Operation, role: &str, success: bool) {
            self.0
                .lock()
                .unwrap()
                .push(format!("done {operation} {role} {success}"));
        }
    }

    fn mixed_plan() -> SyncPlan {
        SyncPlan {
            creates: vec![Role::new("a"), Role::new("b")],
            updates: vec![RoleUpdate {
                local: Role::new("c").allow(["x"]),
                remote: Role::new("c"),
            }],
            deletes: vec!["d".into()],
        }
    }

    #[test]
    fn test_execute_empty_plan() {
        let mock = MockClient::new();
        let result = execute_plan_simple(&SyncPlan::default(), &mock);
        assert_eq!(result.total_changes(), 0);
        assert!(result.is_success());
        assert!(mock.calls().is_empty());
    }

    #[test]
    fn test_execute_create_admin() {
        let local = vec![Role::new("admin").allow(["*"])];
        let plan = compare_roles(&local, &[]);
        let mock = MockClient::new();

        let result = execute_plan_simple(&plan, &mock);
        assert_eq!((result.created, result.updated, result.deleted), (1, 0, 0));
        assert!(result.error.is_none());
        assert_eq!(mock.roles().len(), 1);
    }

    #[test]
    fn test_phase_order() {
        let mock = MockClient::new().with_roles([Role::new("c"), Role::new("d")]);
        let result = execute_plan_simple(&mixed_plan(), &mock);

        assert!(result.is_success());
        assert_eq!(
            mock.calls(),
            vec![
                Call::CreateRole("a".into()),
                Call::CreateRole("b".into()),
                Call::UpdateRole("c".into()),
                Call::DeleteRole("d".into()),
            ]
        );
    }

    #[test]
    fn test_update_pushes_local_version() {
        let mock = MockClient::new().with_roles([Role::new("c")]);
        let plan = SyncPlan {
            updates: vec![RoleUpdate {
                local: Role::new("c").allow(["x"]),
                remote: Role::new("c"),
            }],
            ..Default::default()
        };
        execute_plan_simple(&plan, &mock);
        assert_eq!(mock.roles()[0].resources.allowed, vec!["x".to_string()]);
    }

    #[test]
    fn test_stops_at_first_failure() {
        let mock = MockClient::new().with_roles([Role::new("c"), Role::new("d")]);
        mock.fail_role(Operation::Create, "b");

        let result = execute_plan_simple(&mixed_plan(), &mock);
        assert_eq!(result.created, 1);
        assert_eq!(result.updated, 0);
        assert_eq!(result.deleted, 0);

        let err = result.error.unwrap();
        assert!(matches!(
            err,
            Error::RoleOperation { operation: Operation::Create, ref role, .. } if role == "b"
        ));
        assert!(err.to_string().contains("create role b"));
        // Nothing after the failing create was attempted
        assert_eq!(mock.calls().len(), 2);
    }

    #[test]
    fn test_progress_before_and_after() {
        let mock = MockClient::new();
        let recorder = Recorder::default();
        let plan = SyncPlan {
            creates: vec![Role::new("a")],
            ..Default::default()
        };
        execute_plan(&plan, &mock, &recorder, None);
        assert_eq!(
            *recorder.0.lock().unwrap(),
            vec!["start create a".to_string(), "done create a true".to_string()]
        );
    }

    #[test]
    fn test_cancelled_before_start() {
        let mock = MockClient::new();
        let cancel = CancelFlag::new();
        cancel.cancel();

        let result = execute_plan(&mixed_plan(), &mock, &NoProgress, Some(&cancel));
        assert!(matches!(result.error, Some(Error::Cancelled(Operation::Create))));
        assert!(mock.calls().is_empty());
    }

    #[test]
    fn test_dry_run_never_calls_client() {
        let plan = mixed_plan();
        let result = execute_plan_dry_run(&plan);
        assert!(result.dry_run);
        assert!(result.diff.is_none());
        assert_eq!((result.created, result.updated, result.deleted), (2, 1, 1));
    }

    #[test]
    fn test_dry_run_with_diff() {
        let local = vec![
            Role::new("editor")
                .allow(["read", "write"])
                .deny(["delete"]),
        ];
        let remote = vec![Role::new("editor").allow(["read"])];
        let plan = compare_roles(&local, &remote);

        let result = execute_plan_dry_run_with_diff(&plan);
        assert_eq!(result.updated, 1);
        let diff = result.diff.unwrap();
        assert!(diff.contains("UPDATE: editor"));
        assert!(diff.contains("+ allowed: write"));
        assert!(diff.contains("+ denied: delete"));
    }
}
