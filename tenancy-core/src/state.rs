//! Application state traits for dependency injection
//!
//! Handlers are generic over [`HasServices`] so the same code runs against the
//! production `AppState` and in-memory test states.

use crate::jwt::JwtManager;
use crate::repository::{
    RoleAssignmentRepository, RoleOverrideRepository, ScopedExecutor, ScopedGateway,
};
use crate::service::{AccessService, QuoteLifecycleService};

/// Trait for application state that provides access to all services.
pub trait HasServices: Clone + Send + Sync + 'static {
    /// Role assignment source
    type AssignmentRepo: RoleAssignmentRepository;
    /// Dynamic role override source
    type OverrideRepo: RoleOverrideRepository;
    /// Runs scoped queries
    type Executor: ScopedExecutor;

    fn jwt_manager(&self) -> &JwtManager;

    fn access_service(&self) -> &AccessService<Self::AssignmentRepo, Self::OverrideRepo>;

    fn gateway(&self) -> &ScopedGateway;

    fn executor(&self) -> &Self::Executor;

    fn quote_service(&self) -> &QuoteLifecycleService<Self::Executor>;

    /// True when the database answers
    fn check_ready(&self) -> impl std::future::Future<Output = bool> + Send;
}
