//! Scoped query gateway behaviour end to end through the in-memory executor

mod common;

use common::{context, object, test_gateway, InMemoryExecutor};
use pretty_assertions::assert_eq;
use rstest::rstest;
use serde_json::{json, Value};
use tenancy_core::domain::EffectiveScope;
use tenancy_core::error::AppError;
use tenancy_core::repository::{Predicate, QueryOptions, ScopedExecutor};
use uuid::Uuid;

fn ids(rows: &[Value]) -> Vec<String> {
    let mut ids: Vec<String> = rows
        .iter()
        .map(|r| r["id"].as_str().unwrap_or_default().to_string())
        .collect();
    ids.sort();
    ids
}

struct TwoTenants {
    executor: InMemoryExecutor,
    tenant_a: Uuid,
    tenant_b: Uuid,
    franchise_a1: Uuid,
    franchise_a2: Uuid,
}

async fn two_tenants() -> TwoTenants {
    let executor = InMemoryExecutor::new();
    let tenant_a = Uuid::new_v4();
    let tenant_b = Uuid::new_v4();
    let franchise_a1 = Uuid::new_v4();
    let franchise_a2 = Uuid::new_v4();

    for (id, tenant, franchise) in [
        ("a1-lead", tenant_a, franchise_a1),
        ("a2-lead", tenant_a, franchise_a2),
        ("b-lead", tenant_b, Uuid::new_v4()),
    ] {
        executor
            .seed(
                "leads",
                json!({"id": id, "tenant_id": tenant, "franchise_id": franchise, "name": id}),
            )
            .await;
    }
    executor
        .seed("ports", json!({"id": "NLRTM", "name": "Rotterdam"}))
        .await;

    TwoTenants {
        executor,
        tenant_a,
        tenant_b,
        franchise_a1,
        franchise_a2,
    }
}

#[tokio::test]
async fn test_platform_admin_without_override_sees_every_tenant() {
    let fixture = two_tenants().await;
    let admin = context(&["platform_admin"], None, None);

    let query = test_gateway()
        .scoped_query(&admin, "leads", QueryOptions::default())
        .unwrap();
    let rows = fixture.executor.fetch_all(&query, &[]).await.unwrap();

    assert_eq!(ids(&rows), vec!["a1-lead", "a2-lead", "b-lead"]);
}

#[tokio::test]
async fn test_platform_admin_override_sees_one_tenant_without_franchise_filter() {
    let fixture = two_tenants().await;
    let admin = context(&["platform_admin"], None, None)
        .with_admin_override(fixture.tenant_a)
        .unwrap();

    let query = test_gateway()
        .scoped_query(&admin, "leads", QueryOptions::default())
        .unwrap();
    assert_eq!(
        query.scope(),
        Some(EffectiveScope::Tenant {
            tenant_id: fixture.tenant_a
        })
    );
    let rows = fixture.executor.fetch_all(&query, &[]).await.unwrap();
    assert_eq!(ids(&rows), vec!["a1-lead", "a2-lead"]);
}

#[tokio::test]
async fn test_override_does_not_leak_into_original_context() {
    let fixture = two_tenants().await;
    let admin = context(&["platform_admin"], None, None);
    let _scoped = admin.with_admin_override(fixture.tenant_b).unwrap();

    let query = test_gateway()
        .scoped_query(&admin, "leads", QueryOptions::default())
        .unwrap();
    assert_eq!(query.scope(), Some(EffectiveScope::Global));
}

#[rstest]
#[case(&["tenant_admin"], false, vec!["a1-lead", "a2-lead"])]
#[case(&["franchise_admin"], true, vec!["a1-lead"])]
#[case(&["user"], true, vec!["a1-lead"])]
#[case(&["user"], false, vec!["a1-lead", "a2-lead"])]
#[tokio::test]
async fn test_tenant_and_franchise_visibility(
    #[case] roles: &[&str],
    #[case] franchise_scoped: bool,
    #[case] expected: Vec<&str>,
) {
    let fixture = two_tenants().await;
    let franchise = franchise_scoped.then_some(fixture.franchise_a1);
    let ctx = context(roles, Some(fixture.tenant_a), franchise);

    let query = test_gateway()
        .scoped_query(&ctx, "leads", QueryOptions::default())
        .unwrap();
    let rows = fixture.executor.fetch_all(&query, &[]).await.unwrap();
    assert_eq!(ids(&rows), expected);
}

#[tokio::test]
async fn test_scope_is_identical_on_every_call() {
    let ctx = context(&["user"], Some(Uuid::new_v4()), Some(Uuid::new_v4()));
    let gateway = test_gateway();
    let scopes: Vec<_> = (0..25)
        .map(|_| {
            gateway
                .scoped_query(&ctx, "opportunities", QueryOptions::default())
                .unwrap()
                .scope()
        })
        .collect();
    assert!(scopes.windows(2).all(|w| w[0] == w[1]));
}

#[tokio::test]
async fn test_smuggled_tenant_id_is_replaced_on_insert() {
    let fixture = two_tenants().await;
    let ctx = context(&["user"], Some(fixture.tenant_a), Some(fixture.franchise_a2));
    let query = test_gateway()
        .scoped_query(&ctx, "leads", QueryOptions::default())
        .unwrap();

    let inserted = fixture
        .executor
        .insert(
            &query,
            object(json!({
                "id": "smuggled",
                "name": "Sneaky",
                "tenant_id": fixture.tenant_b,
                "franchise_id": Uuid::new_v4()
            })),
        )
        .await
        .unwrap();

    assert_eq!(inserted["tenant_id"], json!(fixture.tenant_a.to_string()));

    let stored = fixture.executor.raw_rows("leads").await;
    let row = stored.iter().find(|r| r["id"] == json!("smuggled")).unwrap();
    assert_eq!(row["tenant_id"], json!(fixture.tenant_a.to_string()));
    assert_eq!(row["franchise_id"], json!(fixture.franchise_a2.to_string()));
}

#[tokio::test]
async fn test_update_cannot_move_rows_or_touch_other_tenants() {
    let fixture = two_tenants().await;
    let ctx = context(&["tenant_admin"], Some(fixture.tenant_a), None);
    let query = test_gateway()
        .scoped_query(&ctx, "leads", QueryOptions::default())
        .unwrap();

    let updated = fixture
        .executor
        .update(
            &query,
            &[Predicate::eq("id", "b-lead").unwrap()],
            object(json!({"name": "hijacked"})),
        )
        .await
        .unwrap();
    assert!(updated.is_empty());

    let updated = fixture
        .executor
        .update(
            &query,
            &[Predicate::eq("id", "a1-lead").unwrap()],
            object(json!({"name": "renamed", "tenant_id": fixture.tenant_b})),
        )
        .await
        .unwrap();
    assert_eq!(updated.len(), 1);
    assert_eq!(updated[0]["name"], json!("renamed"));
    assert_eq!(updated[0]["tenant_id"], json!(fixture.tenant_a.to_string()));
}

#[tokio::test]
async fn test_bypass_rejected_outside_allow_list() {
    let admin = context(&["platform_admin"], None, None);
    for table in ["leads", "carriers", "quote_versions"] {
        let result = test_gateway().scoped_query(&admin, table, QueryOptions::bypass());
        assert!(
            matches!(result, Err(AppError::ScopeViolation(_))),
            "bypass honoured on {}",
            table
        );
    }
}

#[tokio::test]
async fn test_bypass_reads_reference_data_for_any_actor() {
    let fixture = two_tenants().await;
    let ctx = context(&["user"], Some(fixture.tenant_b), None);
    let query = test_gateway()
        .scoped_query(&ctx, "ports", QueryOptions::bypass())
        .unwrap();
    let rows = fixture.executor.fetch_all(&query, &[]).await.unwrap();
    assert_eq!(ids(&rows), vec!["NLRTM"]);
}

#[tokio::test]
async fn test_unscoped_admin_insert_requires_target_tenant() {
    let fixture = two_tenants().await;
    let admin = context(&["platform_admin"], None, None);
    let query = test_gateway()
        .scoped_query(&admin, "leads", QueryOptions::default())
        .unwrap();

    let result = fixture
        .executor
        .insert(&query, object(json!({"name": "Orphan"})))
        .await;
    assert!(matches!(result, Err(AppError::BadRequest(_))));

    let row = fixture
        .executor
        .insert(
            &query,
            object(json!({"name": "Placed", "tenant_id": fixture.tenant_b})),
        )
        .await
        .unwrap();
    assert_eq!(row["tenant_id"], json!(fixture.tenant_b.to_string()));
}

#[tokio::test]
async fn test_roleless_context_is_denied_by_gateway() {
    let ctx = context(&[], None, None);
    let result = test_gateway().scoped_query(&ctx, "leads", QueryOptions::default());
    assert!(matches!(result, Err(AppError::Forbidden(_))));
}
