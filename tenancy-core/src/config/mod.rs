//! Configuration management for Tenancy Core

use anyhow::{Context, Result};
use std::env;

/// Application configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// HTTP server host
    pub http_host: String,
    /// HTTP server port
    pub http_port: u16,
    /// Database configuration
    pub database: DatabaseConfig,
    /// JWT configuration of the identity provider
    pub jwt: JwtConfig,
    /// Tenancy and role resolution configuration
    pub access: AccessConfig,
    /// Logging and metrics configuration
    pub telemetry: TelemetryConfig,
}

#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub min_connections: u32,
}

#[derive(Debug, Clone)]
pub struct JwtConfig {
    pub secret: String,
    pub issuer: String,
}

/// Access-layer configuration, fixed at deploy time
#[derive(Debug, Clone)]
pub struct AccessConfig {
    /// Tables eligible for `bypass_scope`
    pub global_reference_tables: Vec<String>,
    /// Tables carrying `tenant_id` only
    pub tenant_scoped_tables: Vec<String>,
    /// Tables carrying both `tenant_id` and `franchise_id`
    pub franchise_scoped_tables: Vec<String>,
    /// Load dynamic role overrides at session start
    pub role_overrides_enabled: bool,
    /// Attempts before falling back to the static matrix
    pub role_override_load_attempts: u32,
    /// Linear backoff step between attempts
    pub role_override_retry_backoff_ms: u64,
    /// Interval of the background override reload; 0 loads once at startup only
    pub role_override_refresh_secs: u64,
    /// Treat an actor without any role assignment as a configuration error
    pub require_assigned_role: bool,
}

const DEFAULT_GLOBAL_REFERENCE_TABLES: &[&str] = &[
    "ports",
    "countries",
    "currencies",
    "incoterms",
    "service_types",
    "cargo_types",
    "container_types",
];

const DEFAULT_TENANT_SCOPED_TABLES: &[&str] =
    &["franchises", "carriers", "warehouses", "tenant_settings"];

const DEFAULT_FRANCHISE_SCOPED_TABLES: &[&str] = &[
    "accounts",
    "contacts",
    "leads",
    "opportunities",
    "activities",
    "quotes",
    "quote_versions",
    "shipments",
    "invoices",
];

fn to_owned_list(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

fn parse_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

impl Default for AccessConfig {
    fn default() -> Self {
        Self {
            global_reference_tables: to_owned_list(DEFAULT_GLOBAL_REFERENCE_TABLES),
            tenant_scoped_tables: to_owned_list(DEFAULT_TENANT_SCOPED_TABLES),
            franchise_scoped_tables: to_owned_list(DEFAULT_FRANCHISE_SCOPED_TABLES),
            role_overrides_enabled: true,
            role_override_load_attempts: 3,
            role_override_retry_backoff_ms: 50,
            role_override_refresh_secs: 60,
            require_assigned_role: true,
        }
    }
}

/// Telemetry configuration
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    /// "text" or "json"
    pub log_format: String,
    pub metrics_enabled: bool,
    pub service_name: String,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            log_format: "text".to_string(),
            metrics_enabled: false,
            service_name: "tenancy-core".to_string(),
        }
    }
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        let access_defaults = AccessConfig::default();

        Ok(Self {
            http_host: env::var("HTTP_HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            http_port: env::var("HTTP_PORT")
                .unwrap_or_else(|_| "8080".to_string())
                .parse()
                .context("Invalid HTTP_PORT")?,
            database: DatabaseConfig {
                url: env::var("DATABASE_URL").context("DATABASE_URL is required")?,
                max_connections: env::var("DATABASE_MAX_CONNECTIONS")
                    .unwrap_or_else(|_| "10".to_string())
                    .parse()
                    .unwrap_or(10),
                min_connections: env::var("DATABASE_MIN_CONNECTIONS")
                    .unwrap_or_else(|_| "2".to_string())
                    .parse()
                    .unwrap_or(2),
            },
            jwt: JwtConfig {
                secret: env::var("JWT_SECRET").context("JWT_SECRET is required")?,
                issuer: env::var("JWT_ISSUER")
                    .unwrap_or_else(|_| "https://identity.local".to_string()),
            },
            access: AccessConfig {
                global_reference_tables: env::var("GLOBAL_REFERENCE_TABLES")
                    .map(|s| parse_list(&s))
                    .unwrap_or(access_defaults.global_reference_tables),
                tenant_scoped_tables: env::var("TENANT_SCOPED_TABLES")
                    .map(|s| parse_list(&s))
                    .unwrap_or(access_defaults.tenant_scoped_tables),
                franchise_scoped_tables: env::var("FRANCHISE_SCOPED_TABLES")
                    .map(|s| parse_list(&s))
                    .unwrap_or(access_defaults.franchise_scoped_tables),
                role_overrides_enabled: env::var("ROLE_OVERRIDES_ENABLED")
                    .map(|s| s.to_lowercase() == "true")
                    .unwrap_or(access_defaults.role_overrides_enabled),
                role_override_load_attempts: env::var("ROLE_OVERRIDE_LOAD_ATTEMPTS")
                    .ok()
                    .map(|s| s.parse::<u32>())
                    .transpose()
                    .context("Invalid ROLE_OVERRIDE_LOAD_ATTEMPTS")?
                    .unwrap_or(access_defaults.role_override_load_attempts),
                role_override_retry_backoff_ms: env::var("ROLE_OVERRIDE_RETRY_BACKOFF_MS")
                    .ok()
                    .map(|s| s.parse::<u64>())
                    .transpose()
                    .context("Invalid ROLE_OVERRIDE_RETRY_BACKOFF_MS")?
                    .unwrap_or(access_defaults.role_override_retry_backoff_ms),
                role_override_refresh_secs: env::var("ROLE_OVERRIDE_REFRESH_SECS")
                    .ok()
                    .map(|s| s.parse::<u64>())
                    .transpose()
                    .context("Invalid ROLE_OVERRIDE_REFRESH_SECS")?
                    .unwrap_or(access_defaults.role_override_refresh_secs),
                require_assigned_role: env::var("REQUIRE_ASSIGNED_ROLE")
                    .map(|s| s.to_lowercase() != "false")
                    .unwrap_or(access_defaults.require_assigned_role),
            },
            telemetry: TelemetryConfig {
                log_format: env::var("LOG_FORMAT").unwrap_or_else(|_| "text".to_string()),
                metrics_enabled: env::var("METRICS_ENABLED")
                    .map(|s| s.to_lowercase() == "true")
                    .unwrap_or(false),
                service_name: env::var("SERVICE_NAME")
                    .unwrap_or_else(|_| "tenancy-core".to_string()),
            },
        })
    }

    /// Get HTTP server address
    pub fn http_addr(&self) -> String {
        format!("{}:{}", self.http_host, self.http_port)
    }
}
