//! Remote client capabilities and an in-memory mock.
//!
//! Executors only need [`RoleClient`]; membership reconciliation needs the
//! wider [`MemberClient`]. Keeping them apart lets tests and callers supply
//! only the capability a component uses.
//!
//! # Testing
//!
//! Use [`MockClient`] to run the engine without a network:
//!
//! ```
//! use rolekit::client::{MockClient, RoleClient};
//! use rolekit::Role;
//!
//! let mock = MockClient::new();
//! mock.create_role(&Role::new("admin").allow(["*"])).unwrap();
//! assert_eq!(mock.list_roles().unwrap().len(), 1);
//! ```

use crate::error::ClientError;
use crate::types::{InviteStatus, Operation, Role, TeamMember};
use std::collections::{BTreeMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread;
use std::time::Duration;

/// Role CRUD against the remote access-control service.
pub trait RoleClient: Send + Sync {
    /// Fetch every role the service holds, with ids.
    fn list_roles(&self) -> Result<Vec<Role>, ClientError>;

    /// Fetch one role by name, with its id.
    ///
    /// # Errors
    ///
    /// Returns `ClientError::NotFound` if no role has that name.
    fn get_role(&self, name: &str) -> Result<Role, ClientError>;

    /// Create a role.
    fn create_role(&self, role: &Role) -> Result<(), ClientError>;

    /// Replace a role's content with `role`, matched by name.
    fn update_role(&self, role: &Role) -> Result<(), ClientError>;

    /// Delete a role by name.
    fn delete_role(&self, name: &str) -> Result<(), ClientError>;
}

/// Role CRUD plus team membership operations.
pub trait MemberClient: RoleClient {
    /// Fetch all team members, including pending invitations.
    fn get_team_members(&self) -> Result<Vec<TeamMember>, ClientError>;

    /// Assign the role (policy) `role_id` to an existing member.
    fn assign_member_role(&self, email: &str, role_id: &str) -> Result<(), ClientError>;

    /// Invite a new member with `role_id` as their initial role.
    fn invite_user(&self, email: &str, role_id: &str) -> Result<InviteStatus, ClientError>;

    /// Cancel a pending invitation.
    fn delete_invite(&self, email: &str) -> Result<(), ClientError>;

    /// Remove an active member by clearing their role assignment.
    fn remove_member(&self, email: &str) -> Result<(), ClientError> {
        self.assign_member_role(email, "")
    }
}

/// A call recorded by [`MockClient`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    ListRoles,
    GetRole(String),
    CreateRole(String),
    UpdateRole(String),
    DeleteRole(String),
    GetTeamMembers,
    AssignMemberRole(String, String),
    InviteUser(String, String),
    DeleteInvite(String),
}

#[derive(Debug, Default)]
struct MockState {
    roles: BTreeMap<String, Role>,
    members: Vec<TeamMember>,
    calls: Vec<Call>,
    role_failures: HashSet<(Operation, String)>,
    lookup_failures: HashSet<String>,
    member_failures: HashSet<String>,
    next_id: usize,
}

/// In-memory client for tests.
///
/// Records every call, can fail chosen operations, can sleep inside each call,
/// and tracks the highest number of calls in flight at once.
#[derive(Debug, Clone, Default)]
pub struct MockClient {
    state: Arc<Mutex<MockState>>,
    in_flight: Arc<AtomicUsize>,
    max_in_flight: Arc<AtomicUsize>,
    delay: Duration,
}

impl MockClient {
    /// Create a new empty mock client.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed remote roles; roles without an id get one.
    #[must_use]
    pub fn with_roles(self, roles: impl IntoIterator<Item = Role>) -> Self {
        {
            let mut state = self.lock();
            for mut role in roles {
                if role.id.is_none() {
                    state.next_id += 1;
                    role.id = Some(format!("role-{}", state.next_id));
                }
                state.roles.insert(role.name.clone(), role);
            }
        }
        self
    }

    /// Seed remote team members.
    #[must_use]
    pub fn with_members(self, members: impl IntoIterator<Item = TeamMember>) -> Self {
        self.lock().members.extend(members);
        self
    }

    /// Sleep this long inside every call.
    #[must_use]
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Make `operation` on role `name` fail.
    pub fn fail_role(&self, operation: Operation, name: impl Into<String>) {
        self.lock().role_failures.insert((operation, name.into()));
    }

    /// Make `get_role(name)` fail.
    pub fn fail_lookup(&self, name: impl Into<String>) {
        self.lock().lookup_failures.insert(name.into());
    }

    /// Make every membership call for `email` fail.
    pub fn fail_member(&self, email: impl Into<String>) {
        self.lock().member_failures.insert(email.into());
    }

    /// Current remote roles, sorted by name.
    pub fn roles(&self) -> Vec<Role> {
        self.lock().roles.values().cloned().collect()
    }

    /// Current remote members.
    pub fn members(&self) -> Vec<TeamMember> {
        self.lock().members.clone()
    }

    /// All calls made so far, in order.
    pub fn calls(&self) -> Vec<Call> {
        self.lock().calls.clone()
    }

    /// Calls that changed remote state.
    pub fn mutations(&self) -> Vec<Call> {
        self.calls()
            .into_iter()
            .filter(|c| {
                !matches!(
                    c,
                    Call::ListRoles | Call::GetRole(_) | Call::GetTeamMembers
                )
            })
            .collect()
    }

    /// Highest number of calls observed in flight at the same time.
    pub fn max_concurrent_calls(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    fn lock(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn record<T>(&self, call: Call, f: impl FnOnce(&mut MockState) -> T) -> T {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        if !self.delay.is_zero() {
            thread::sleep(self.delay);
        }
        let result = {
            let mut state = self.lock();
            state.calls.push(call);
            f(&mut state)
        };
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        result
    }

    fn check_role(state: &MockState, operation: Operation, name: &str) -> Result<(), ClientError> {
        if state
            .role_failures
            .contains(&(operation, name.to_string()))
        {
            return Err(ClientError::Http {
                status: 500,
                message: format!("injected {operation} failure"),
            });
        }
        Ok(())
    }

    fn check_member(state: &MockState, email: &str) -> Result<(), ClientError> {
        if state.member_failures.contains(email) {
            return Err(ClientError::Http {
                status: 500,
                message: "injected member failure".to_string(),
            });
        }
        Ok(())
    }
}

impl RoleClient for MockClient {
    fn list_roles(&self) -> Result<Vec<Role>, ClientError> {
        self.record(Call::ListRoles, |state| {
            Ok(state.roles.values().cloned().collect())
        })
    }

    fn get_role(&self, name: &str) -> Result<Role, ClientError> {
        self.record(Call::GetRole(name.to_string()), |state| {
            if state.lookup_failures.contains(name) {
                return Err(ClientError::Transport("injected lookup failure".into()));
            }
            state
                .roles
                .get(name)
                .cloned()
                .ok_or_else(|| ClientError::NotFound(name.to_string()))
        })
    }

    fn create_role(&self, role: &Role) -> Result<(), ClientError> {
        self.record(Call::CreateRole(role.name.clone()), |state| {
            Self::check_role(state, Operation::Create, &role.name)?;
            if state.roles.contains_key(&role.name) {
                return Err(ClientError::Http {
                    status: 409,
                    message: format!("role {} already exists", role.name),
                });
            }
            state.next_id += 1;
            let mut stored = role.clone();
            stored.id = Some(format!("role-{}", state.next_id));
            state.roles.insert(role.name.clone(), stored);
            Ok(())
        })
    }

    fn update_role(&self, role: &Role) -> Result<(), ClientError> {
        self.record(Call::UpdateRole(role.name.clone()), |state| {
            Self::check_role(state, Operation::Update, &role.name)?;
            let stored = state
                .roles
                .get_mut(&role.name)
                .ok_or_else(|| ClientError::NotFound(role.name.clone()))?;
            let id = stored.id.take();
            *stored = role.clone();
            stored.id = id;
            Ok(())
        })
    }

    fn delete_role(&self, name: &str) -> Result<(), ClientError> {
        self.record(Call::DeleteRole(name.to_string()), |state| {
            Self::check_role(state, Operation::Delete, name)?;
            state
                .roles
                .remove(name)
                .map(|_| ())
                .ok_or_else(|| ClientError::NotFound(name.to_string()))
        })
    }
}

impl MemberClient for MockClient {
    fn get_team_members(&self) -> Result<Vec<TeamMember>, ClientError> {
        self.record(Call::GetTeamMembers, |state| Ok(state.members.clone()))
    }

    fn assign_member_role(&self, email: &str, role_id: &str) -> Result<(), ClientError> {
        self.record(
            Call::AssignMemberRole(email.to_string(), role_id.to_string()),
            |state| {
                Self::check_member(state, email)?;
                let member = state
                    .members
                    .iter_mut()
                    .find(|m| m.email == email)
                    .ok_or_else(|| ClientError::NotFound(email.to_string()))?;
                member.policy_id = role_id.to_string();
                Ok(())
            },
        )
    }

    fn invite_user(&self, email: &str, role_id: &str) -> Result<InviteStatus, ClientError> {
        self.record(
            Call::InviteUser(email.to_string(), role_id.to_string()),
            |state| {
                Self::check_member(state, email)?;
                let invite_id = format!("invite-{}", state.members.len() + 1);
                state.members.push(TeamMember {
                    id: email.to_string(),
                    email: email.to_string(),
                    policy_id: role_id.to_string(),
                    status: Some("pending".to_string()),
                    invite_id: Some(invite_id.clone()),
                });
                Ok(InviteStatus {
                    email: email.to_string(),
                    status: "pending".to_string(),
                    invite_id: Some(invite_id),
                })
            },
        )
    }

    fn delete_invite(&self, email: &str) -> Result<(), ClientError> {
        self.record(Call::DeleteInvite(email.to_string()), |state| {
            Self::check_member(state, email)?;
            let before = state.members.len();
            state.members.retain(|m| m.email != email);
            if state.members.len() == before {
                return Err(ClientError::NotFound(email.to_string()));
            }
            Ok(())
        })
    }
}
