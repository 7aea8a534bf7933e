//! Permission resolution over the role graph

use crate::catalog::RoleCatalog;
use crate::domain::{PermissionSet, RoleId};
use std::collections::HashSet;
use std::panic::{catch_unwind, AssertUnwindSafe};

/// Transitive union of the permissions of `role_ids` and all their ancestors.
///
/// Unknown roles contribute nothing. A role already visited during this call is
/// skipped, so a cyclic graph terminates.
pub fn effective_permissions<'a, I>(catalog: &RoleCatalog, role_ids: I) -> PermissionSet
where
    I: IntoIterator<Item = &'a RoleId>,
{
    let mut permissions = PermissionSet::new();
    let mut visited: HashSet<&RoleId> = HashSet::new();
    let mut stack: Vec<&RoleId> = Vec::new();

    for role_id in role_ids {
        stack.push(role_id);
        while let Some(current) = stack.pop() {
            if !visited.insert(current) {
                continue;
            }
            if let Some(role) = catalog.role(current) {
                permissions.extend_from(&role.default_permissions);
            }
            for parent in catalog.parents_of(current).iter().rev() {
                if !visited.contains(parent) {
                    stack.push(parent);
                }
            }
        }
    }

    permissions
}

/// [`effective_permissions`] with a deny-all fallback.
///
/// Resolution is not expected to fail; if it ever panics the caller gets an
/// empty set instead of an unwinding authorization check.
pub fn resolve_or_deny(catalog: &RoleCatalog, role_ids: &[RoleId]) -> PermissionSet {
    match catch_unwind(AssertUnwindSafe(|| {
        effective_permissions(catalog, role_ids.iter())
    })) {
        Ok(permissions) => permissions,
        Err(_) => {
            tracing::error!(
                roles = ?role_ids,
                "Permission resolution panicked; denying all permissions"
            );
            PermissionSet::new()
        }
    }
}
