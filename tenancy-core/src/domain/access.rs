//! Per-session access context and effective scope

use super::rbac::{ManagedScope, RoleId};
use crate::error::{AppError, Result};
use serde::Serialize;
use std::collections::BTreeSet;
use uuid::Uuid;

/// Platform-admin opt-in to operate inside one tenant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct AdminOverride {
    pub tenant_id: Uuid,
}

/// Snapshot of the acting identity for one session.
///
/// Immutable once built. Enabling the admin override produces a new value via
/// [`AccessContext::with_admin_override`], so two in-flight requests of the same
/// session never observe each other's override state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AccessContext {
    user_id: Uuid,
    tenant_id: Option<Uuid>,
    franchise_id: Option<Uuid>,
    roles: BTreeSet<RoleId>,
    is_platform_admin: bool,
    is_tenant_admin: bool,
    is_franchise_admin: bool,
    admin_override: Option<AdminOverride>,
}

impl AccessContext {
    /// Build a context; the admin flags are derived from `roles`.
    ///
    /// A tenant id is mandatory for every actor that holds a role below the
    /// platform tier.
    pub fn new(
        user_id: Uuid,
        tenant_id: Option<Uuid>,
        franchise_id: Option<Uuid>,
        roles: BTreeSet<RoleId>,
    ) -> Result<Self> {
        let is_platform_admin = roles.contains(&RoleId::platform_admin());
        let is_tenant_admin = roles.contains(&RoleId::tenant_admin());
        let is_franchise_admin = roles.contains(&RoleId::franchise_admin());

        if franchise_id.is_some() && tenant_id.is_none() {
            return Err(AppError::Configuration(format!(
                "user {} has a franchise assignment without a tenant",
                user_id
            )));
        }
        if !is_platform_admin && !roles.is_empty() && tenant_id.is_none() {
            return Err(AppError::Configuration(format!(
                "user {} holds tenant-level roles but no tenant assignment",
                user_id
            )));
        }
        if is_franchise_admin && !is_tenant_admin && !is_platform_admin && franchise_id.is_none()
        {
            return Err(AppError::Configuration(format!(
                "user {} is a franchise admin without a franchise assignment",
                user_id
            )));
        }

        Ok(Self {
            user_id,
            tenant_id,
            franchise_id,
            roles,
            is_platform_admin,
            is_tenant_admin,
            is_franchise_admin,
            admin_override: None,
        })
    }

    /// Return a copy operating inside `tenant_id`. Only platform admins may do this.
    pub fn with_admin_override(&self, tenant_id: Uuid) -> Result<Self> {
        if !self.is_platform_admin {
            return Err(AppError::Forbidden(
                "Admin override requires platform admin".to_string(),
            ));
        }
        Ok(Self {
            admin_override: Some(AdminOverride { tenant_id }),
            ..self.clone()
        })
    }

    pub fn without_admin_override(&self) -> Self {
        Self {
            admin_override: None,
            ..self.clone()
        }
    }

    pub fn user_id(&self) -> Uuid {
        self.user_id
    }

    pub fn tenant_id(&self) -> Option<Uuid> {
        self.tenant_id
    }

    pub fn franchise_id(&self) -> Option<Uuid> {
        self.franchise_id
    }

    pub fn roles(&self) -> &BTreeSet<RoleId> {
        &self.roles
    }

    pub fn is_platform_admin(&self) -> bool {
        self.is_platform_admin
    }

    pub fn is_tenant_admin(&self) -> bool {
        self.is_tenant_admin
    }

    pub fn is_franchise_admin(&self) -> bool {
        self.is_franchise_admin
    }

    pub fn admin_override(&self) -> Option<AdminOverride> {
        self.admin_override
    }

    pub fn admin_override_enabled(&self) -> bool {
        self.admin_override.is_some()
    }
}

/// The visibility boundary enforced for one operation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "level", rename_all = "snake_case")]
pub enum EffectiveScope {
    Global,
    Tenant { tenant_id: Uuid },
    Franchise { tenant_id: Uuid, franchise_id: Uuid },
}

impl EffectiveScope {
    /// Derive the scope from the context alone. Pure: no state, no caller input.
    pub fn for_context(ctx: &AccessContext) -> Result<Self> {
        if let Some(admin_override) = ctx.admin_override {
            if !ctx.is_platform_admin {
                return Err(AppError::ScopeViolation(format!(
                    "admin override present on non-platform context for user {}",
                    ctx.user_id
                )));
            }
            return Ok(EffectiveScope::Tenant {
                tenant_id: admin_override.tenant_id,
            });
        }

        if ctx.is_platform_admin {
            return Ok(EffectiveScope::Global);
        }

        let tenant_id = ctx.tenant_id.ok_or_else(|| {
            AppError::Forbidden("No tenant scope available for this account".to_string())
        })?;

        if ctx.is_tenant_admin {
            return Ok(EffectiveScope::Tenant { tenant_id });
        }

        Ok(match ctx.franchise_id {
            Some(franchise_id) => EffectiveScope::Franchise {
                tenant_id,
                franchise_id,
            },
            None => EffectiveScope::Tenant { tenant_id },
        })
    }

    pub fn level(&self) -> ManagedScope {
        match self {
            EffectiveScope::Global => ManagedScope::Global,
            EffectiveScope::Tenant { .. } => ManagedScope::Tenant,
            EffectiveScope::Franchise { .. } => ManagedScope::Franchise,
        }
    }

    pub fn tenant_id(&self) -> Option<Uuid> {
        match self {
            EffectiveScope::Global => None,
            EffectiveScope::Tenant { tenant_id } | EffectiveScope::Franchise { tenant_id, .. } => {
                Some(*tenant_id)
            }
        }
    }

    pub fn franchise_id(&self) -> Option<Uuid> {
        match self {
            EffectiveScope::Franchise { franchise_id, .. } => Some(*franchise_id),
            _ => None,
        }
    }
}
