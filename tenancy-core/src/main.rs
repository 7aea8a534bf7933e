use anyhow::Result;
use tenancy_core::{config::Config, server, telemetry};
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let config = Config::from_env()?;
    let prometheus_handle = telemetry::init(&config.telemetry)?;

    info!(
        addr = %config.http_addr(),
        role_overrides = config.access.role_overrides_enabled,
        reference_tables = config.access.global_reference_tables.len(),
        "Starting tenancy core"
    );

    server::run(config, prometheus_handle).await
}
