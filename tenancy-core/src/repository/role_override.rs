//! Dynamic role override repository

use crate::domain::{RoleParentOverride, RolePermissionOverride};
use crate::error::Result;
use async_trait::async_trait;
use sqlx::PgPool;

/// Administrator-maintained adjustments to the static role matrix
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait RoleOverrideRepository: Send + Sync {
    async fn list_permission_overrides(&self) -> Result<Vec<RolePermissionOverride>>;
    async fn list_parent_overrides(&self) -> Result<Vec<RoleParentOverride>>;
}

pub struct RoleOverrideRepositoryImpl {
    pool: PgPool,
}

impl RoleOverrideRepositoryImpl {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl RoleOverrideRepository for RoleOverrideRepositoryImpl {
    async fn list_permission_overrides(&self) -> Result<Vec<RolePermissionOverride>> {
        let overrides = sqlx::query_as::<_, RolePermissionOverride>(
            r#"
            SELECT role_id, permission, granted
            FROM role_permission_overrides
            ORDER BY role_id, permission
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(overrides)
    }

    async fn list_parent_overrides(&self) -> Result<Vec<RoleParentOverride>> {
        let overrides = sqlx::query_as::<_, RoleParentOverride>(
            r#"
            SELECT role_id, parent_role_id
            FROM role_parent_overrides
            ORDER BY role_id, parent_role_id
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(overrides)
    }
}
