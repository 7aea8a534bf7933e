//! Role graph and permission catalog
//!
//! A [`RoleCatalog`] is immutable once built. Dynamic overrides produce a new
//! catalog which is published through [`CatalogStore`].

pub mod defaults;
pub mod store;

pub use defaults::{default_roles, PERMISSION_CATALOG};
pub use store::CatalogStore;

use crate::domain::{
    Permission, PermissionSet, RoleDefinition, RoleId, RoleParentOverride, RolePermissionOverride,
};
use crate::error::{AppError, Result};
use serde::Serialize;
use std::collections::{HashMap, HashSet};

/// Where a catalog's role matrix came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CatalogSource {
    StaticDefault,
    DynamicOverride,
}

#[derive(Debug, Clone)]
pub struct RoleCatalog {
    roles: HashMap<RoleId, RoleDefinition>,
    source: CatalogSource,
}

impl RoleCatalog {
    pub fn new(roles: impl IntoIterator<Item = RoleDefinition>) -> Self {
        Self {
            roles: roles.into_iter().map(|r| (r.id.clone(), r)).collect(),
            source: CatalogSource::StaticDefault,
        }
    }

    /// The built-in role matrix
    pub fn static_default() -> Self {
        Self::new(default_roles())
    }

    pub fn source(&self) -> CatalogSource {
        self.source
    }

    pub fn role(&self, id: &RoleId) -> Option<&RoleDefinition> {
        self.roles.get(id)
    }

    pub fn contains(&self, id: &RoleId) -> bool {
        self.roles.contains_key(id)
    }

    pub fn roles(&self) -> impl Iterator<Item = &RoleDefinition> {
        self.roles.values()
    }

    /// Permissions declared directly on the role. Unknown roles yield an empty set.
    pub fn resolve_base_permissions(&self, id: &RoleId) -> PermissionSet {
        self.roles
            .get(id)
            .map(|r| r.default_permissions.clone())
            .unwrap_or_default()
    }

    /// Declared parents of the role. Unknown roles have none.
    pub fn parents_of(&self, id: &RoleId) -> &[RoleId] {
        self.roles
            .get(id)
            .map(|r| r.parent_roles.as_slice())
            .unwrap_or(&[])
    }

    /// Return some role that sits on a parent cycle, if any.
    pub fn find_cycle(&self) -> Option<RoleId> {
        // 0 = unvisited, 1 = on stack, 2 = done
        let mut state: HashMap<&RoleId, u8> = HashMap::new();
        let mut ids: Vec<&RoleId> = self.roles.keys().collect();
        ids.sort();

        for start in ids {
            if state.get(start).copied().unwrap_or(0) != 0 {
                continue;
            }
            let mut stack: Vec<(&RoleId, usize)> = vec![(start, 0)];
            state.insert(start, 1);
            while let Some((node, next)) = stack.pop() {
                let parents = self.parents_of(node);
                if next < parents.len() {
                    stack.push((node, next + 1));
                    let parent = &parents[next];
                    match state.get(parent).copied().unwrap_or(0) {
                        1 => return Some(parent.clone()),
                        0 => {
                            state.insert(parent, 1);
                            stack.push((parent, 0));
                        }
                        _ => {}
                    }
                } else {
                    state.insert(node, 2);
                }
            }
        }
        None
    }

    /// Build a new catalog with dynamic overrides applied on top of this one.
    ///
    /// Permission overrides add (`granted`) or remove tags on the named role.
    /// Parent overrides replace the full parent list of every role they mention.
    /// Any reference to an unknown role or tag is a configuration error.
    pub fn with_overrides(
        &self,
        permission_overrides: &[RolePermissionOverride],
        parent_overrides: &[RoleParentOverride],
    ) -> Result<RoleCatalog> {
        let mut roles = self.roles.clone();

        for entry in permission_overrides {
            let permission = Permission::parse(&entry.permission).map_err(|_| {
                AppError::Configuration(format!(
                    "role override for '{}' uses malformed permission '{}'",
                    entry.role_id, entry.permission
                ))
            })?;
            if let Permission::Named(tag) = &permission {
                if !defaults::is_catalogued(tag) {
                    return Err(AppError::Configuration(format!(
                        "role override for '{}' uses unknown permission '{}'",
                        entry.role_id, tag
                    )));
                }
            }
            let role = roles
                .get_mut(&RoleId::new(entry.role_id.as_str()))
                .ok_or_else(|| {
                    AppError::Configuration(format!(
                        "role override references unknown role '{}'",
                        entry.role_id
                    ))
                })?;
            if entry.granted {
                role.default_permissions.insert(permission);
            } else {
                role.default_permissions.remove(&permission);
            }
        }

        let mut replaced: HashSet<RoleId> = HashSet::new();
        for entry in parent_overrides {
            let parent = RoleId::new(entry.parent_role_id.as_str());
            if !roles.contains_key(&parent) {
                return Err(AppError::Configuration(format!(
                    "parent override references unknown role '{}'",
                    entry.parent_role_id
                )));
            }
            let child = RoleId::new(entry.role_id.as_str());
            let role = roles.get_mut(&child).ok_or_else(|| {
                AppError::Configuration(format!(
                    "parent override references unknown role '{}'",
                    entry.role_id
                ))
            })?;
            if replaced.insert(child) {
                role.parent_roles.clear();
            }
            if !role.parent_roles.contains(&parent) {
                role.parent_roles.push(parent);
            }
        }

        let catalog = RoleCatalog {
            roles,
            source: CatalogSource::DynamicOverride,
        };
        if let Some(role) = catalog.find_cycle() {
            tracing::warn!(role = %role, "Role overrides introduce an inheritance cycle");
        }
        Ok(catalog)
    }
}

impl Default for RoleCatalog {
    fn default() -> Self {
        Self::static_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn perm_override(role: &str, permission: &str, granted: bool) -> RolePermissionOverride {
        RolePermissionOverride {
            role_id: role.to_string(),
            permission: permission.to_string(),
            granted,
        }
    }

    fn parent_override(role: &str, parent: &str) -> RoleParentOverride {
        RoleParentOverride {
            role_id: role.to_string(),
            parent_role_id: parent.to_string(),
        }
    }

    #[test]
    fn test_static_default_is_acyclic() {
        let catalog = RoleCatalog::static_default();
        assert_eq!(catalog.find_cycle(), None);
        assert_eq!(catalog.source(), CatalogSource::StaticDefault);
    }

    #[test]
    fn test_unknown_role_resolves_empty() {
        let catalog = RoleCatalog::static_default();
        let ghost = RoleId::from("ghost");
        assert!(catalog.resolve_base_permissions(&ghost).is_empty());
        assert!(catalog.parents_of(&ghost).is_empty());
        assert!(!catalog.contains(&ghost));
    }

    #[test]
    fn test_base_permissions_exclude_inherited() {
        let catalog = RoleCatalog::static_default();
        let base = catalog.resolve_base_permissions(&RoleId::tenant_admin());
        assert!(base.grants("accounts.delete"));
        assert!(!base.grants("leads.view"));
    }

    #[test]
    fn test_find_cycle_detects_two_node_loop() {
        let catalog = RoleCatalog::new([
            RoleDefinition::new("x", 1).with_parents(["y"]),
            RoleDefinition::new("y", 1).with_parents(["x"]),
        ]);
        assert!(catalog.find_cycle().is_some());
    }

    #[test]
    fn test_overrides_grant_and_revoke() {
        let catalog = RoleCatalog::static_default()
            .with_overrides(
                &[
                    perm_override("user", "accounts.create", true),
                    perm_override("user", "leads.edit", false),
                ],
                &[],
            )
            .unwrap();

        let base = catalog.resolve_base_permissions(&RoleId::user());
        assert!(base.grants("accounts.create"));
        assert!(!base.grants("leads.edit"));
        assert_eq!(catalog.source(), CatalogSource::DynamicOverride);
    }

    #[test]
    fn test_overrides_do_not_touch_original() {
        let original = RoleCatalog::static_default();
        let _ = original
            .with_overrides(&[perm_override("user", "accounts.delete", true)], &[])
            .unwrap();
        assert!(!original
            .resolve_base_permissions(&RoleId::user())
            .grants("accounts.delete"));
    }

    #[test]
    fn test_parent_override_replaces_parents() {
        let catalog = RoleCatalog::static_default()
            .with_overrides(&[], &[parent_override("tenant_admin", "user")])
            .unwrap();
        assert_eq!(
            catalog.parents_of(&RoleId::tenant_admin()),
            &[RoleId::user()]
        );
    }

    #[test]
    fn test_cyclic_parent_override_is_tolerated() {
        let catalog = RoleCatalog::static_default()
            .with_overrides(&[], &[parent_override("user", "tenant_admin")])
            .unwrap();
        assert!(catalog.find_cycle().is_some());
    }

    #[test]
    fn test_override_unknown_role_is_configuration_error() {
        let result = RoleCatalog::static_default()
            .with_overrides(&[perm_override("auditor", "leads.view", true)], &[]);
        assert!(matches!(result, Err(AppError::Configuration(_))));
    }

    #[test]
    fn test_override_unknown_permission_is_configuration_error() {
        let result = RoleCatalog::static_default()
            .with_overrides(&[perm_override("user", "rockets.launch", true)], &[]);
        assert!(matches!(result, Err(AppError::Configuration(_))));
    }

    #[test]
    fn test_override_malformed_permission_is_configuration_error() {
        let result = RoleCatalog::static_default()
            .with_overrides(&[perm_override("user", "everything", true)], &[]);
        assert!(matches!(result, Err(AppError::Configuration(_))));
    }

    #[test]
    fn test_override_unknown_parent_is_configuration_error() {
        let result = RoleCatalog::static_default()
            .with_overrides(&[], &[parent_override("user", "auditor")]);
        assert!(matches!(result, Err(AppError::Configuration(_))));
    }
}
