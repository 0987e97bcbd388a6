//! # Rolekit
//!
//! Declarative sync of role-based access control definitions.
//!
//! The caller supplies a desired (local) role set and the actual (remote) one;
//! rolekit computes the create/update/delete operations that converge remote
//! to local, applies them through a client, and then makes team membership
//! match the one-role-per-member mapping of the local set.
//!
//! ## Core Concepts
//!
//! - **Role**: a named bundle of allowed/denied resource patterns plus members
//! - **SyncPlan**: creates, updates and deletes, built by [`compare_roles`]
//! - **Executors**: [`execute_plan`] runs one operation at a time;
//!   [`ConcurrentExecutor`] runs each phase on a bounded worker pool and rolls
//!   back its creates on failure
//! - **MemberReconciler**: assigns, reassigns and invites members, and reports
//!   orphans without deleting them
//!
//! ## Example
//!
//! ```
//! use rolekit::{MockClient, NoProgress, Role, SyncOptions, sync};
//!
//! let client = MockClient::new();
//! let local = vec![Role::new("admin").allow(["*"])];
//!
//! let result = sync(&local, &[], &client, &SyncOptions::default(), &NoProgress);
//! assert!(result.is_success());
//! assert_eq!(result.created, 1);
//! ```
//!
//! ## Provider Traits
//!
//! - [`RoleClient`]: role CRUD, all the executors need
//! - [`MemberClient`]: role CRUD plus membership operations
//! - [`ProgressSink`]: receives progress notifications

pub mod client;
pub mod concurrent;
pub mod context;
pub mod diff;
pub mod error;
pub mod executor;
pub mod members;
pub mod planner;
pub mod sync;
pub mod types;

// Re-export main types at crate root
pub use client::{Call, MemberClient, MockClient, RoleClient};
pub use concurrent::ConcurrentExecutor;
pub use context::{CancelFlag, LogProgress, NoProgress, ProgressSink};
pub use diff::{
    DiffSummary, Field, FieldChange, RoleDiff, render_create, render_plan, set_difference,
    string_sets_equal,
};
pub use error::{ClientError, Error, ErrorCategory, Result};
pub use executor::{
    execute_plan, execute_plan_dry_run, execute_plan_dry_run_with_diff, execute_plan_simple,
};
pub use members::{
    DeletionSummary, MemberAction, MemberReconciler, MemberReport, MembershipPlan,
    delete_members_and_invites, find_orphans, is_pending_invite, member_assignments,
    plan_memberships,
};
pub use planner::{compare_roles, validate_roles};
pub use sync::{SyncOptions, sync, sync_remote};
pub use types::{
    ExecutionResult, InviteStatus, MemberDeletions, Operation, Resources, Role, RoleUpdate,
    SyncPlan, TeamMember,
};
