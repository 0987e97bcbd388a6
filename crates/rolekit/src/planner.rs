//! Plan builder - compares local and remote role sets

use crate::error::{Error, Result};
use crate::types::{Role, RoleUpdate, SyncPlan};
use std::collections::{HashMap, HashSet};

/// Compute the operations that converge `remote` to `local`.
///
/// Roles only in `local` are created, roles in both but differing are
/// updated, roles only in `remote` are deleted. Phases follow the input order;
/// call [`SyncPlan::sort`] for name order. Each list is expected to be unique
/// by name; on duplicates the last entry wins.
pub fn compare_roles(local: &[Role], remote: &[Role]) -> SyncPlan {
    let local_index: HashMap<&str, &Role> = local.iter().map(|r| (r.name.as_str(), r)).collect();
    let remote_index: HashMap<&str, &Role> =
        remote.iter().map(|r| (r.name.as_str(), r)).collect();

    let mut plan = SyncPlan::default();
    let mut seen = HashSet::new();

    for role in local {
        if !seen.insert(role.name.as_str()) {
            continue;
        }
        let Some(desired) = local_index.get(role.name.as_str()) else {
            continue;
        };
        match remote_index.get(role.name.as_str()) {
            None => plan.creates.push((*desired).clone()),
            Some(current) if *current != *desired => plan.updates.push(RoleUpdate {
                local: (*desired).clone(),
                remote: (*current).clone(),
            }),
            Some(_) => {}
        }
    }

    let mut seen = HashSet::new();
    for role in remote {
        if !local_index.contains_key(role.name.as_str()) && seen.insert(role.name.as_str()) {
            plan.deletes.push(role.name.clone());
        }
    }

    plan
}

/// Validate a local role set.
///
/// Checks that every role has a name, names are unique, and no role lists an
/// empty, whitespace-only or repeated member. Cross-role member conflicts are
/// checked by [`crate::members::member_assignments`].
pub fn validate_roles(roles: &[Role]) -> Result<()> {
    let mut names = HashSet::new();

    for role in roles {
        if role.name.trim().is_empty() {
            return Err(Error::invalid_role(&role.name, "missing name"));
        }
        if !names.insert(role.name.as_str()) {
            return Err(Error::DuplicateRole(role.name.clone()));
        }

        let mut members = HashSet::new();
        for member in &role.members {
            if member.trim().is_empty() {
                return Err(Error::invalid_role(&role.name, "empty member entry"));
            }
            if !members.insert(member.as_str()) {
                return Err(Error::invalid_role(
                    &role.name,
                    format!("duplicate member {member}"),
                ));
            }
        }
    }

    Ok(())
}
