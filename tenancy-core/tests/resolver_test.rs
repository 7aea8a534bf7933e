//! Permission resolution properties over the static and overridden role graph

use pretty_assertions::assert_eq;
use rstest::rstest;
use tenancy_core::catalog::RoleCatalog;
use tenancy_core::domain::{RoleDefinition, RoleId, RoleParentOverride};
use tenancy_core::policy::effective_permissions;

fn ids(values: &[&str]) -> Vec<RoleId> {
    values.iter().map(|v| RoleId::from(*v)).collect()
}

const ROLES: &[&str] = &[
    "platform_admin",
    "tenant_admin",
    "franchise_admin",
    "user",
    "ghost",
];

#[test]
fn test_union_distributes_over_role_sets() {
    let catalog = RoleCatalog::static_default();
    for a in ROLES {
        for b in ROLES {
            let combined = effective_permissions(&catalog, &ids(&[*a, *b]));
            let separate = effective_permissions(&catalog, &ids(&[*a]))
                .union(&effective_permissions(&catalog, &ids(&[*b])));
            assert_eq!(combined, separate, "roles {} and {}", a, b);
        }
    }
}

#[test]
fn test_resolution_is_idempotent() {
    let catalog = RoleCatalog::static_default();
    let once = effective_permissions(&catalog, &ids(&["franchise_admin"]));
    let twice = effective_permissions(&catalog, &ids(&["franchise_admin", "franchise_admin"]));
    assert_eq!(once, twice);
}

#[test]
fn test_three_level_chain_scenario() {
    let catalog = RoleCatalog::new([
        RoleDefinition::new("tenant_admin", 1).with_permissions(["accounts.delete"]),
        RoleDefinition::new("franchise_admin", 2)
            .with_permissions(["contacts.edit"])
            .with_parents(["tenant_admin"]),
        RoleDefinition::new("user", 3)
            .with_permissions(["leads.view"])
            .with_parents(["franchise_admin"]),
    ]);

    let permissions = effective_permissions(&catalog, &ids(&["user"]));
    for tag in ["accounts.delete", "contacts.edit", "leads.view"] {
        assert!(permissions.grants(tag), "missing {}", tag);
    }
}

#[test]
fn test_override_induced_cycle_terminates() {
    // Defaults already have tenant_admin -> franchise_admin -> user; pointing
    // user back at tenant_admin closes the loop.
    let catalog = RoleCatalog::static_default()
        .with_overrides(
            &[],
            &[RoleParentOverride {
                role_id: "user".to_string(),
                parent_role_id: "tenant_admin".to_string(),
            }],
        )
        .unwrap();
    assert!(catalog.find_cycle().is_some());

    let from_user = effective_permissions(&catalog, &ids(&["user"]));
    let from_admin = effective_permissions(&catalog, &ids(&["tenant_admin"]));
    assert_eq!(from_user, from_admin);
    assert!(from_user.grants("accounts.delete"));
    assert!(from_user.grants("leads.view"));
    assert!(!from_user.is_all());
}

#[test]
fn test_static_matrix_is_acyclic() {
    assert_eq!(RoleCatalog::static_default().find_cycle(), None);
}

#[rstest]
#[case("user", "leads.view", true)]
#[case("user", "accounts.delete", false)]
#[case("franchise_admin", "leads.view", true)]
#[case("franchise_admin", "contacts.edit", true)]
#[case("franchise_admin", "roles.manage", false)]
#[case("tenant_admin", "contacts.edit", true)]
#[case("tenant_admin", "tenants.manage", false)]
#[case("platform_admin", "tenants.manage", true)]
#[case("ghost", "leads.view", false)]
fn test_default_matrix_grants(#[case] role: &str, #[case] tag: &str, #[case] expected: bool) {
    let catalog = RoleCatalog::static_default();
    assert_eq!(effective_permissions(&catalog, &ids(&[role])).grants(tag), expected);
}

#[test]
fn test_every_default_grant_is_catalogued() {
    let catalog = RoleCatalog::static_default();
    for role in catalog.roles() {
        for permission in role.default_permissions.iter() {
            let tag = permission.as_tag();
            assert!(
                tag == "*" || tenancy_core::catalog::PERMISSION_CATALOG.contains(&tag),
                "role {} grants uncatalogued {}",
                role.id,
                tag
            );
        }
    }
}
