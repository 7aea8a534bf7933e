//! Data access layer (Repository pattern)
//!
//! Tenant-owned tables are only reachable through [`ScopedGateway`] plans run
//! by a [`ScopedExecutor`].

pub mod assignment;
pub mod executor;
pub mod gateway;
pub mod role_override;

pub use assignment::RoleAssignmentRepository;
pub use executor::{PgScopedExecutor, ScopedExecutor};
pub use gateway::{
    Predicate, QueryOptions, ScopeColumn, ScopeFilter, ScopeMode, ScopedGateway, ScopedQuery,
    SqlValue, TableKind, TableRegistry,
};
pub use role_override::RoleOverrideRepository;
