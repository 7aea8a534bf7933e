//! HTTP middleware: session extraction and request observability

pub mod auth;
pub mod metrics;

pub use auth::{admin_override_target, extract_bearer_token, ADMIN_OVERRIDE_HEADER};
pub use metrics::ObservabilityLayer;
