//! Static permission catalog and default role matrix

use crate::domain::{ManagedScope, RoleDefinition, RoleId};

/// Every concrete capability the platform knows about.
pub const PERMISSION_CATALOG: &[&str] = &[
    "accounts.view",
    "accounts.create",
    "accounts.edit",
    "accounts.delete",
    "contacts.view",
    "contacts.create",
    "contacts.edit",
    "contacts.delete",
    "leads.view",
    "leads.create",
    "leads.edit",
    "leads.delete",
    "opportunities.view",
    "opportunities.create",
    "opportunities.edit",
    "opportunities.delete",
    "quotes.view",
    "quotes.create",
    "quotes.edit",
    "quotes.delete",
    "shipments.view",
    "shipments.create",
    "shipments.edit",
    "shipments.delete",
    "carriers.view",
    "carriers.manage",
    "ports.view",
    "ports.manage",
    "franchises.view",
    "franchises.manage",
    "users.view",
    "users.manage",
    "roles.view",
    "roles.manage",
    "settings.manage",
    "tenants.view",
    "tenants.manage",
];

const USER_PERMISSIONS: &[&str] = &[
    "accounts.view",
    "contacts.view",
    "leads.view",
    "leads.create",
    "leads.edit",
    "opportunities.view",
    "quotes.view",
    "quotes.create",
    "quotes.edit",
    "shipments.view",
    "carriers.view",
    "ports.view",
];

const FRANCHISE_ADMIN_PERMISSIONS: &[&str] = &[
    "accounts.create",
    "accounts.edit",
    "contacts.create",
    "contacts.edit",
    "leads.delete",
    "opportunities.create",
    "opportunities.edit",
    "quotes.delete",
    "shipments.create",
    "shipments.edit",
    "users.view",
    "users.manage",
];

const TENANT_ADMIN_PERMISSIONS: &[&str] = &[
    "accounts.delete",
    "contacts.delete",
    "opportunities.delete",
    "shipments.delete",
    "carriers.manage",
    "franchises.view",
    "franchises.manage",
    "roles.view",
    "roles.manage",
    "settings.manage",
];

/// The acyclic default role matrix.
///
/// Parent edges point from the more privileged tier to the one below it, so a
/// tenant admin holds everything a franchise admin and a user hold. The
/// resolver walks whatever edges the catalog declares; a graph wired the other
/// way round (user -> franchise_admin -> tenant_admin) resolves the same way.
/// The platform admin holds the wildcard and needs no parents.
pub fn default_roles() -> Vec<RoleDefinition> {
    vec![
        RoleDefinition::new(RoleId::PLATFORM_ADMIN, 0)
            .with_permissions(["*"])
            .with_scopes([
                ManagedScope::Global,
                ManagedScope::Tenant,
                ManagedScope::Franchise,
            ]),
        RoleDefinition::new(RoleId::TENANT_ADMIN, 1)
            .with_permissions(TENANT_ADMIN_PERMISSIONS.iter().copied())
            .with_scopes([ManagedScope::Tenant, ManagedScope::Franchise])
            .with_parents([RoleId::FRANCHISE_ADMIN]),
        RoleDefinition::new(RoleId::FRANCHISE_ADMIN, 2)
            .with_permissions(FRANCHISE_ADMIN_PERMISSIONS.iter().copied())
            .with_scopes([ManagedScope::Franchise])
            .with_parents([RoleId::USER]),
        RoleDefinition::new(RoleId::USER, 3).with_permissions(USER_PERMISSIONS.iter().copied()),
    ]
}

pub fn is_catalogued(tag: &str) -> bool {
    PERMISSION_CATALOG.contains(&tag)
}
