//! RBAC (Role-Based Access Control) domain models

use crate::error::{AppError, Result};
use serde::{de, Deserialize, Deserializer, Serialize, Serializer};
use sqlx::FromRow;
use std::collections::BTreeSet;
use std::fmt;
use uuid::Uuid;

/// Tag form of [`Permission::All`]
pub const WILDCARD_TAG: &str = "*";

/// Role identifier (e.g., "platform_admin", "user")
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RoleId(String);

impl RoleId {
    pub const PLATFORM_ADMIN: &'static str = "platform_admin";
    pub const TENANT_ADMIN: &'static str = "tenant_admin";
    pub const FRANCHISE_ADMIN: &'static str = "franchise_admin";
    pub const USER: &'static str = "user";

    pub fn new(id: impl Into<String>) -> Self {
        RoleId(id.into())
    }

    pub fn platform_admin() -> Self {
        Self::new(Self::PLATFORM_ADMIN)
    }

    pub fn tenant_admin() -> Self {
        Self::new(Self::TENANT_ADMIN)
    }

    pub fn franchise_admin() -> Self {
        Self::new(Self::FRANCHISE_ADMIN)
    }

    pub fn user() -> Self {
        Self::new(Self::USER)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for RoleId {
    fn from(id: &str) -> Self {
        RoleId(id.to_string())
    }
}

impl fmt::Display for RoleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A capability tag.
///
/// The wildcard is its own variant so the "grants everything" path never hides
/// behind a string comparison.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Permission {
    All,
    Named(String),
}

impl Permission {
    /// Parse a tag: `*` or `<resource>.<action>`
    pub fn parse(tag: &str) -> Result<Self> {
        if tag == WILDCARD_TAG {
            return Ok(Permission::All);
        }
        if PERMISSION_TAG_REGEX.is_match(tag) {
            Ok(Permission::Named(tag.to_string()))
        } else {
            Err(AppError::Validation(format!(
                "Invalid permission tag '{}': expected <resource>.<action>",
                tag
            )))
        }
    }

    pub fn as_tag(&self) -> &str {
        match self {
            Permission::All => WILDCARD_TAG,
            Permission::Named(tag) => tag,
        }
    }
}

impl fmt::Display for Permission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_tag())
    }
}

impl Serialize for Permission {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_tag())
    }
}

impl<'de> Deserialize<'de> for Permission {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let tag = String::deserialize(deserializer)?;
        Permission::parse(&tag).map_err(de::Error::custom)
    }
}

/// A set of permissions with wildcard-aware membership.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PermissionSet(BTreeSet<Permission>);

impl PermissionSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from tags that are known to be well formed (static matrix, tests).
    pub fn from_tags<'a>(tags: impl IntoIterator<Item = &'a str>) -> Self {
        tags.into_iter()
            .map(|tag| {
                if tag == WILDCARD_TAG {
                    Permission::All
                } else {
                    Permission::Named(tag.to_string())
                }
            })
            .collect()
    }

    /// True if the set holds the wildcard or exactly `tag`.
    pub fn grants(&self, tag: &str) -> bool {
        if self.is_all() {
            return true;
        }
        self.0.contains(&Permission::Named(tag.to_string()))
    }

    pub fn is_all(&self) -> bool {
        self.0.contains(&Permission::All)
    }

    pub fn insert(&mut self, permission: Permission) -> bool {
        self.0.insert(permission)
    }

    pub fn remove(&mut self, permission: &Permission) -> bool {
        self.0.remove(permission)
    }

    pub fn contains(&self, permission: &Permission) -> bool {
        self.0.contains(permission)
    }

    pub fn extend_from(&mut self, other: &PermissionSet) {
        self.0.extend(other.0.iter().cloned());
    }

    pub fn union(&self, other: &PermissionSet) -> PermissionSet {
        PermissionSet(self.0.union(&other.0).cloned().collect())
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Permission> {
        self.0.iter()
    }

    pub fn tags(&self) -> Vec<String> {
        self.0.iter().map(|p| p.as_tag().to_string()).collect()
    }
}

impl FromIterator<Permission> for PermissionSet {
    fn from_iter<I: IntoIterator<Item = Permission>>(iter: I) -> Self {
        PermissionSet(iter.into_iter().collect())
    }
}

/// Scope level a role is allowed to administer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ManagedScope {
    Global,
    Tenant,
    Franchise,
}

impl fmt::Display for ManagedScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ManagedScope::Global => "global",
            ManagedScope::Tenant => "tenant",
            ManagedScope::Franchise => "franchise",
        };
        f.write_str(s)
    }
}

/// Role definition in the role graph
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RoleDefinition {
    pub id: RoleId,
    /// Privilege level, lower is more privileged
    pub level: u8,
    /// Permissions declared on this role (no inheritance)
    pub default_permissions: PermissionSet,
    pub can_manage_scopes: BTreeSet<ManagedScope>,
    /// Roles this role inherits from
    pub parent_roles: Vec<RoleId>,
}

impl RoleDefinition {
    pub fn new(id: impl Into<String>, level: u8) -> Self {
        Self {
            id: RoleId::new(id),
            level,
            default_permissions: PermissionSet::new(),
            can_manage_scopes: BTreeSet::new(),
            parent_roles: vec![],
        }
    }

    pub fn with_permissions<'a>(mut self, tags: impl IntoIterator<Item = &'a str>) -> Self {
        self.default_permissions = PermissionSet::from_tags(tags);
        self
    }

    pub fn with_scopes(mut self, scopes: impl IntoIterator<Item = ManagedScope>) -> Self {
        self.can_manage_scopes = scopes.into_iter().collect();
        self
    }

    pub fn with_parents<'a>(mut self, parents: impl IntoIterator<Item = &'a str>) -> Self {
        self.parent_roles = parents.into_iter().map(RoleId::from).collect();
        self
    }
}

/// Role assignment row supplied by the identity provider
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct RoleAssignment {
    pub user_id: Uuid,
    pub role_id: String,
    pub tenant_id: Option<Uuid>,
    pub franchise_id: Option<Uuid>,
}

/// Dynamic grant (or revoke) of a permission on a role
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct RolePermissionOverride {
    pub role_id: String,
    pub permission: String,
    pub granted: bool,
}

/// Dynamic replacement of a role's parent edges
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct RoleParentOverride {
    pub role_id: String,
    pub parent_role_id: String,
}

// Regex for permission tag validation
lazy_static::lazy_static! {
    pub static ref PERMISSION_TAG_REGEX: regex::Regex =
        regex::Regex::new(r"^[a-z][a-z0-9_]*\.[a-z][a-z0-9_]*$").unwrap();
}
