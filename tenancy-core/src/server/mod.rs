//! Server initialization and routing

use crate::api;
use crate::catalog::CatalogStore;
use crate::config::Config;
use crate::jwt::JwtManager;
use crate::middleware::ObservabilityLayer;
use crate::repository::{
    assignment::RoleAssignmentRepositoryImpl, role_override::RoleOverrideRepositoryImpl,
    PgScopedExecutor, ScopedGateway, TableRegistry,
};
use crate::service::{AccessService, QuoteLifecycleService};
use crate::state::HasServices;
use anyhow::Result;
use axum::{
    routing::{get, post},
    Router,
};
use metrics_exporter_prometheus::PrometheusHandle;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub db_pool: PgPool,
    pub jwt_manager: JwtManager,
    pub access_service: Arc<AccessService<RoleAssignmentRepositoryImpl, RoleOverrideRepositoryImpl>>,
    pub gateway: ScopedGateway,
    pub executor: Arc<PgScopedExecutor>,
    pub quote_service: Arc<QuoteLifecycleService<PgScopedExecutor>>,
}

impl HasServices for AppState {
    type AssignmentRepo = RoleAssignmentRepositoryImpl;
    type OverrideRepo = RoleOverrideRepositoryImpl;
    type Executor = PgScopedExecutor;

    fn jwt_manager(&self) -> &JwtManager {
        &self.jwt_manager
    }

    fn access_service(&self) -> &AccessService<Self::AssignmentRepo, Self::OverrideRepo> {
        &self.access_service
    }

    fn gateway(&self) -> &ScopedGateway {
        &self.gateway
    }

    fn executor(&self) -> &Self::Executor {
        &self.executor
    }

    fn quote_service(&self) -> &QuoteLifecycleService<Self::Executor> {
        &self.quote_service
    }

    async fn check_ready(&self) -> bool {
        sqlx::query("SELECT 1")
            .execute(&self.db_pool)
            .await
            .is_ok()
    }
}

/// Run the server
pub async fn run(config: Config, prometheus_handle: Option<PrometheusHandle>) -> Result<()> {
    let db_pool = PgPoolOptions::new()
        .max_connections(config.database.max_connections)
        .min_connections(config.database.min_connections)
        .connect(&config.database.url)
        .await?;

    info!("Connected to database");

    let registry = TableRegistry::from_config(&config.access)?;
    let gateway = ScopedGateway::new(registry);

    let assignment_repo = Arc::new(RoleAssignmentRepositoryImpl::new(db_pool.clone()));
    let override_repo = Arc::new(RoleOverrideRepositoryImpl::new(db_pool.clone()));
    let executor = Arc::new(PgScopedExecutor::new(db_pool.clone()));

    let catalog_store = Arc::new(CatalogStore::default());
    if let Some(role) = catalog_store.static_default().find_cycle() {
        anyhow::bail!("Static role matrix contains a cycle through role '{}'", role);
    }

    let access_service = Arc::new(AccessService::new(
        assignment_repo,
        override_repo,
        catalog_store,
        config.access.clone(),
    ));
    access_service.reload_catalog().await;
    if config.access.role_overrides_enabled && config.access.role_override_refresh_secs > 0 {
        let _refresh = access_service
            .clone()
            .spawn_refresh(Duration::from_secs(config.access.role_override_refresh_secs));
        info!(
            every_secs = config.access.role_override_refresh_secs,
            "Role override refresh scheduled"
        );
    }
    let quote_service = Arc::new(QuoteLifecycleService::new(
        gateway.clone(),
        executor.clone(),
    ));

    let state = AppState {
        db_pool,
        jwt_manager: JwtManager::new(config.jwt.clone()),
        access_service,
        gateway,
        executor,
        quote_service,
    };

    let app = build_router(state, prometheus_handle);

    let http_addr = config.http_addr();
    let listener = TcpListener::bind(&http_addr).await?;
    info!("HTTP server started on {}", http_addr);
    axum::serve(listener, app).await?;

    Ok(())
}

/// Build the HTTP router with generic state type
///
/// Generic over the state so tests can drive the same routes with in-memory
/// repositories.
pub fn build_router<S: HasServices>(state: S, prometheus_handle: Option<PrometheusHandle>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let metrics_router = Router::new()
        .route("/metrics", get(api::metrics::metrics_handler))
        .with_state(Arc::new(prometheus_handle));

    Router::new()
        // Health endpoints
        .route("/health", get(api::health::health))
        .route("/ready", get(api::health::ready::<S>))
        // Access introspection
        .route("/api/v1/access/me", get(api::access::me))
        .route("/api/v1/access/check", post(api::access::check))
        .route(
            "/api/v1/access/catalog/reload",
            post(api::access::reload_catalog::<S>),
        )
        // Scoped records
        .route(
            "/api/v1/records/{table}",
            get(api::records::list::<S>).post(api::records::create::<S>),
        )
        // Quote lifecycle
        .route(
            "/api/v1/quotes/{id}/versions",
            post(api::quote::create_version::<S>),
        )
        .route(
            "/api/v1/quote-versions/{id}/transition",
            post(api::quote::transition::<S>),
        )
        .route(
            "/api/v1/quote-versions/{id}/make-current",
            post(api::quote::make_current::<S>),
        )
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
        .merge(metrics_router)
        .layer(ObservabilityLayer)
}
