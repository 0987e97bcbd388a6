//! Set comparison and plan rendering

use crate::types::{Role, RoleUpdate, SyncPlan};
use std::collections::HashMap;
use std::fmt::Write as _;

/// Order-independent comparison of two string lists.
///
/// Equal when both hold the same elements the same number of times.
pub fn string_sets_equal(a: &[String], b: &[String]) -> bool {
    if a.len() != b.len() {
        return false;
    }

    let mut counts: HashMap<&str, isize> = HashMap::with_capacity(a.len());
    for s in a {
        *counts.entry(s.as_str()).or_default() += 1;
    }
    for s in b {
        match counts.get_mut(s.as_str()) {
            Some(n) if *n > 0 => *n -= 1,
            _ => return false,
        }
    }
    true
}

/// Elements of `a` not matched by an element of `b`, in `a`'s order.
///
/// Counts occurrences the way [`string_sets_equal`] does: `[x, x]` minus
/// `[x]` leaves one `x`.
pub fn set_difference(a: &[String], b: &[String]) -> Vec<String> {
    let mut available: HashMap<&str, usize> = HashMap::with_capacity(b.len());
    for s in b {
        *available.entry(s.as_str()).or_default() += 1;
    }

    a.iter()
        .filter(|s| match available.get_mut(s.as_str()) {
            Some(n) if *n > 0 => {
                *n -= 1;
                false
            }
            _ => true,
        })
        .cloned()
        .collect()
}

/// Role field a change applies to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    Allowed,
    Denied,
    Members,
}

impl Field {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Allowed => "allowed",
            Self::Denied => "denied",
            Self::Members => "members",
        }
    }
}

/// One element added to or removed from a role field
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldChange {
    pub field: Field,
    pub value: String,
}

/// Field-level differences of one updated role
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoleDiff {
    pub name: String,
    pub added: Vec<FieldChange>,
    pub removed: Vec<FieldChange>,
}

impl RoleDiff {
    /// Compute additions (local only) and removals (remote only) of an update
    pub fn from_update(update: &RoleUpdate) -> Self {
        let local = &update.local;
        let remote = &update.remote;
        let mut added = Vec::new();
        let mut removed = Vec::new();

        for (field, l, r) in [
            (
                Field::Allowed,
                &local.resources.allowed,
                &remote.resources.allowed,
            ),
            (
                Field::Denied,
                &local.resources.denied,
                &remote.resources.denied,
            ),
            (Field::Members, &local.members, &remote.members),
        ] {
            added.extend(
                set_difference(l, r)
                    .into_iter()
                    .map(|value| FieldChange { field, value }),
            );
            removed.extend(
                set_difference(r, l)
                    .into_iter()
                    .map(|value| FieldChange { field, value }),
            );
        }

        Self {
            name: local.name.clone(),
            added,
            removed,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty()
    }
}

/// Diff summary statistics
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DiffSummary {
    pub creates: usize,
    pub updates: usize,
    pub deletes: usize,
    /// Elements added across all updated roles
    pub additions: usize,
    /// Elements removed across all updated roles
    pub removals: usize,
}

impl DiffSummary {
    pub fn from_plan(plan: &SyncPlan) -> Self {
        let mut summary = Self {
            creates: plan.creates.len(),
            updates: plan.updates.len(),
            deletes: plan.deletes.len(),
            ..Default::default()
        };
        for update in &plan.updates {
            let diff = RoleDiff::from_update(update);
            summary.additions += diff.added.len();
            summary.removals += diff.removed.len();
        }
        summary
    }

    /// Total number of role operations
    pub fn total(&self) -> usize {
        self.creates + self.updates + self.deletes
    }

    pub fn has_changes(&self) -> bool {
        self.total() > 0
    }
}

/// Render a plan as plain text, one block per operation.
///
/// Creates come first, then updates with their `+`/`-` lines, then deletes.
pub fn render_plan(plan: &SyncPlan) -> String {
    let mut out = String::new();

    for role in &plan.creates {
        let _ = writeln!(out, "{}", render_create(role));
    }

    for update in &plan.updates {
        let diff = RoleDiff::from_update(update);
        let _ = writeln!(out, "UPDATE: {}", diff.name);
        for change in &diff.added {
            let _ = writeln!(out, "  + {}: {}", change.field.as_str(), change.value);
        }
        for change in &diff.removed {
            let _ = writeln!(out, "  - {}: {}", change.field.as_str(), change.value);
        }
    }

    for name in &plan.deletes {
        let _ = writeln!(out, "DELETE: {name}");
    }

    out
}

/// `CREATE: name (allowed: [...], denied: [...], members: [...])`
pub fn render_create(role: &Role) -> String {
    format!(
        "CREATE: {} (allowed: [{}], denied: [{}], members: [{}])",
        role.name,
        role.resources.allowed.join(", "),
        role.resources.denied.join(", "),
        role.members.join(", ")
    )
}
