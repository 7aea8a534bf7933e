//! Permission guard: advisory allow/deny for exposing an action

use super::resolver;
use crate::catalog::RoleCatalog;
use crate::domain::{AccessContext, ManagedScope, RoleId, PERMISSION_TAG_REGEX};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use validator::Validate;

fn validate_permission_tag(tag: &str) -> Result<(), validator::ValidationError> {
    if PERMISSION_TAG_REGEX.is_match(tag) {
        Ok(())
    } else {
        Err(validator::ValidationError::new("invalid_permission_tag"))
    }
}

/// Checks an action may require. Unset checks are not evaluated.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, Validate)]
pub struct GuardRequirements {
    #[serde(default)]
    pub required_role_level: Option<u8>,
    #[serde(default)]
    #[validate(custom(function = "validate_permission_tag"))]
    pub required_permission: Option<String>,
    #[serde(default)]
    pub require_scope: Option<ManagedScope>,
}

impl GuardRequirements {
    pub fn permission(tag: impl Into<String>) -> Self {
        Self {
            required_permission: Some(tag.into()),
            ..Default::default()
        }
    }

    pub fn role_level(level: u8) -> Self {
        Self {
            required_role_level: Some(level),
            ..Default::default()
        }
    }

    pub fn scope(scope: ManagedScope) -> Self {
        Self {
            require_scope: Some(scope),
            ..Default::default()
        }
    }
}

/// Most privileged (lowest) level among the actor's known roles.
pub fn actor_role_level(ctx: &AccessContext, catalog: &RoleCatalog) -> Option<u8> {
    ctx.roles()
        .iter()
        .filter_map(|id| catalog.role(id))
        .map(|role| role.level)
        .min()
}

/// Union of `can_manage_scopes` over the actor's known roles.
pub fn manageable_scopes(ctx: &AccessContext, catalog: &RoleCatalog) -> BTreeSet<ManagedScope> {
    ctx.roles()
        .iter()
        .filter_map(|id| catalog.role(id))
        .flat_map(|role| role.can_manage_scopes.iter().copied())
        .collect()
}

/// Every requirement that is set must pass.
pub fn allow(ctx: &AccessContext, catalog: &RoleCatalog, requirements: &GuardRequirements) -> bool {
    let allowed = evaluate(ctx, catalog, requirements);
    let outcome = if allowed { "allow" } else { "deny" };
    metrics::counter!("tenancy_guard_decisions_total", "outcome" => outcome).increment(1);
    tracing::debug!(
        user_id = %ctx.user_id(),
        ?requirements,
        outcome,
        "Permission guard evaluated"
    );
    allowed
}

fn evaluate(ctx: &AccessContext, catalog: &RoleCatalog, requirements: &GuardRequirements) -> bool {
    if let Some(required) = requirements.required_role_level {
        match actor_role_level(ctx, catalog) {
            Some(level) if level <= required => {}
            _ => return false,
        }
    }

    if let Some(tag) = &requirements.required_permission {
        let roles: Vec<RoleId> = ctx.roles().iter().cloned().collect();
        if !resolver::resolve_or_deny(catalog, &roles).grants(tag) {
            return false;
        }
    }

    if let Some(scope) = requirements.require_scope {
        if !manageable_scopes(ctx, catalog).contains(&scope) {
            return false;
        }
    }

    true
}
