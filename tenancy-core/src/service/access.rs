//! Access context construction and session authorization

use crate::catalog::{CatalogStore, RoleCatalog};
use crate::config::AccessConfig;
use crate::domain::{AccessContext, EffectiveScope, PermissionSet, RoleAssignment, RoleId};
use crate::error::{AppError, Result};
use crate::policy::{self, GuardRequirements};
use crate::repository::{RoleAssignmentRepository, RoleOverrideRepository};
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{error, info, warn};
use uuid::Uuid;

/// An access context paired with the role catalog snapshot taken when the
/// session was opened. Permission checks always use that snapshot.
#[derive(Debug, Clone)]
pub struct AuthorizedSession {
    context: AccessContext,
    catalog: Arc<RoleCatalog>,
}

impl AuthorizedSession {
    pub fn new(context: AccessContext, catalog: Arc<RoleCatalog>) -> Self {
        Self { context, catalog }
    }

    pub fn context(&self) -> &AccessContext {
        &self.context
    }

    pub fn catalog(&self) -> &RoleCatalog {
        &self.catalog
    }

    /// Effective permissions of the actor; deny-all if resolution fails.
    pub fn permissions(&self) -> PermissionSet {
        let roles: Vec<RoleId> = self.context.roles().iter().cloned().collect();
        policy::resolve_or_deny(&self.catalog, &roles)
    }

    pub fn effective_scope(&self) -> Result<EffectiveScope> {
        EffectiveScope::for_context(&self.context)
    }

    pub fn allow(&self, requirements: &GuardRequirements) -> bool {
        policy::allow(&self.context, &self.catalog, requirements)
    }

    pub fn enforce(&self, requirements: &GuardRequirements) -> Result<()> {
        policy::enforce(&self.context, &self.catalog, requirements)
    }

    /// A new session operating inside `tenant_id`. The current one is untouched.
    pub fn with_admin_override(&self, tenant_id: Uuid) -> Result<Self> {
        let context = self.context.with_admin_override(tenant_id)?;
        info!(
            target: "audit",
            user_id = %context.user_id(),
            tenant_id = %tenant_id,
            "Platform admin override enabled"
        );
        Ok(Self {
            context,
            catalog: self.catalog.clone(),
        })
    }
}

/// Why a set of assignment rows cannot become an access context
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AssignmentConflict {
    #[error("user {user_id} has no role assignment")]
    NoRole { user_id: Uuid },
    #[error("assignment for user {found} returned while resolving user {user_id}")]
    ForeignUser { user_id: Uuid, found: Uuid },
    #[error("unknown role '{role}' assigned to user {user_id}")]
    UnknownRole { user_id: Uuid, role: RoleId },
    #[error("user {user_id} is assigned to {count} tenants")]
    MultipleTenants { user_id: Uuid, count: usize },
    #[error("user {user_id} is assigned to {count} franchises")]
    MultipleFranchises { user_id: Uuid, count: usize },
    /// Rows were consistent but the resulting context is not valid
    #[error("{0}")]
    InvalidContext(String),
}

impl AssignmentConflict {
    /// Metric label
    pub fn reason(&self) -> &'static str {
        match self {
            AssignmentConflict::NoRole { .. } => "no_role",
            AssignmentConflict::ForeignUser { .. } => "foreign_user",
            AssignmentConflict::UnknownRole { .. } => "unknown_role",
            AssignmentConflict::MultipleTenants { .. } => "tenant_conflict",
            AssignmentConflict::MultipleFranchises { .. } => "franchise_conflict",
            AssignmentConflict::InvalidContext(_) => "invalid_context",
        }
    }
}

/// Build the access context from the identity provider's assignment rows.
///
/// Assignments are the only source of roles and scope. Conflicting or unknown
/// data is a configuration error rather than something to guess around.
pub fn build_access_context(
    user_id: Uuid,
    assignments: &[RoleAssignment],
    catalog: &RoleCatalog,
    require_assigned_role: bool,
) -> Result<AccessContext> {
    resolve_assignments(user_id, assignments, catalog, require_assigned_role).map_err(|conflict| {
        metrics::counter!(
            "tenancy_access_context_failures_total",
            "reason" => conflict.reason()
        )
        .increment(1);
        error!(
            user_id = %user_id,
            reason = conflict.reason(),
            error = %conflict,
            "Failed to build access context"
        );
        AppError::Configuration(conflict.to_string())
    })
}

fn new_context(
    user_id: Uuid,
    tenant_id: Option<Uuid>,
    franchise_id: Option<Uuid>,
    roles: BTreeSet<RoleId>,
) -> std::result::Result<AccessContext, AssignmentConflict> {
    AccessContext::new(user_id, tenant_id, franchise_id, roles).map_err(|e| match e {
        AppError::Configuration(msg) => AssignmentConflict::InvalidContext(msg),
        other => AssignmentConflict::InvalidContext(other.to_string()),
    })
}

fn resolve_assignments(
    user_id: Uuid,
    assignments: &[RoleAssignment],
    catalog: &RoleCatalog,
    require_assigned_role: bool,
) -> std::result::Result<AccessContext, AssignmentConflict> {
    if assignments.is_empty() {
        if require_assigned_role {
            return Err(AssignmentConflict::NoRole { user_id });
        }
        warn!(user_id = %user_id, "User has no role assignment; building roleless context");
        return new_context(user_id, None, None, BTreeSet::new());
    }

    let mut roles = BTreeSet::new();
    let mut tenants = BTreeSet::new();
    let mut franchises = BTreeSet::new();

    for assignment in assignments {
        if assignment.user_id != user_id {
            return Err(AssignmentConflict::ForeignUser {
                user_id,
                found: assignment.user_id,
            });
        }
        let role = RoleId::from(assignment.role_id.as_str());
        if !catalog.contains(&role) {
            return Err(AssignmentConflict::UnknownRole { user_id, role });
        }
        roles.insert(role);
        tenants.extend(assignment.tenant_id);
        franchises.extend(assignment.franchise_id);
    }

    if tenants.len() > 1 {
        return Err(AssignmentConflict::MultipleTenants {
            user_id,
            count: tenants.len(),
        });
    }
    if franchises.len() > 1 {
        return Err(AssignmentConflict::MultipleFranchises {
            user_id,
            count: franchises.len(),
        });
    }

    new_context(
        user_id,
        tenants.into_iter().next(),
        franchises.into_iter().next(),
        roles,
    )
}

pub struct AccessService<A: RoleAssignmentRepository, O: RoleOverrideRepository> {
    assignment_repo: Arc<A>,
    override_repo: Arc<O>,
    store: Arc<CatalogStore>,
    config: AccessConfig,
}

impl<A: RoleAssignmentRepository, O: RoleOverrideRepository> AccessService<A, O> {
    pub fn new(
        assignment_repo: Arc<A>,
        override_repo: Arc<O>,
        store: Arc<CatalogStore>,
        config: AccessConfig,
    ) -> Self {
        Self {
            assignment_repo,
            override_repo,
            store,
            config,
        }
    }

    pub fn store(&self) -> &CatalogStore {
        &self.store
    }

    /// Resolve the actor's context against the published catalog.
    ///
    /// Never touches the override source; see [`Self::reload_catalog`].
    pub async fn open_session(&self, user_id: Uuid) -> Result<AuthorizedSession> {
        let catalog = self.store.snapshot().await;
        let assignments = self.assignment_repo.find_by_user(user_id).await?;
        let context = build_access_context(
            user_id,
            &assignments,
            &catalog,
            self.config.require_assigned_role,
        )?;
        Ok(AuthorizedSession::new(context, catalog))
    }

    /// Load overrides, build a new catalog and publish it.
    ///
    /// Transient failures are retried with linear backoff. When the load
    /// cannot succeed the static matrix is published instead, so the store
    /// always holds the catalog sessions actually use.
    pub async fn reload_catalog(&self) -> Arc<RoleCatalog> {
        let catalog = if self.config.role_overrides_enabled {
            match self.load_with_retry().await {
                Ok(catalog) => Arc::new(catalog),
                Err(e) => {
                    metrics::counter!("tenancy_role_override_fallback_total").increment(1);
                    error!(
                        target: "audit",
                        error = %e,
                        "Role override load failed; publishing static role matrix"
                    );
                    self.store.static_default()
                }
            }
        } else {
            self.store.static_default()
        };

        self.store.replace(catalog.clone()).await;
        info!(source = ?catalog.source(), "Role catalog published");
        catalog
    }

    /// Reload the catalog every `every` until the task is aborted.
    pub fn spawn_refresh(self: Arc<Self>, every: Duration) -> tokio::task::JoinHandle<()>
    where
        A: 'static,
        O: 'static,
    {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(every);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            // First tick fires immediately; startup already loaded once
            ticker.tick().await;
            loop {
                ticker.tick().await;
                self.reload_catalog().await;
            }
        })
    }

    async fn load_with_retry(&self) -> Result<RoleCatalog> {
        let attempts = self.config.role_override_load_attempts.max(1);
        let mut attempt = 1;
        loop {
            match self.try_load_overrides().await {
                Ok(catalog) => return Ok(catalog),
                Err(e) if e.is_transient() && attempt < attempts => {
                    warn!(attempt, error = %e, "Role override load failed, retrying");
                    let backoff = self.config.role_override_retry_backoff_ms * u64::from(attempt);
                    tokio::time::sleep(Duration::from_millis(backoff)).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn try_load_overrides(&self) -> Result<RoleCatalog> {
        let permissions = self.override_repo.list_permission_overrides().await?;
        let parents = self.override_repo.list_parent_overrides().await?;
        self.store
            .static_default()
            .with_overrides(&permissions, &parents)
    }
}
