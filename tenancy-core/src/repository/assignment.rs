//! Role assignment repository

use crate::domain::RoleAssignment;
use crate::error::Result;
use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

/// Read access to the identity provider's role assignments
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait RoleAssignmentRepository: Send + Sync {
    async fn find_by_user(&self, user_id: Uuid) -> Result<Vec<RoleAssignment>>;
}

pub struct RoleAssignmentRepositoryImpl {
    pool: PgPool,
}

impl RoleAssignmentRepositoryImpl {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl RoleAssignmentRepository for RoleAssignmentRepositoryImpl {
    async fn find_by_user(&self, user_id: Uuid) -> Result<Vec<RoleAssignment>> {
        let assignments = sqlx::query_as::<_, RoleAssignment>(
            r#"
            SELECT user_id, role_id, tenant_id, franchise_id
            FROM user_role_assignments
            WHERE user_id = $1
            ORDER BY role_id
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(assignments)
    }
}
