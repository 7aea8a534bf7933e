//! Tenancy Core - tenant-scoped data access and permission resolution
//!
//! Resolves what an actor may do (role graph, permission resolver, guard) and
//! what an actor may see (access context, scoped query gateway) for a
//! multi-tenant logistics CRM, plus the quote version lifecycle built on top.

pub mod api;
pub mod catalog;
pub mod config;
pub mod domain;
pub mod error;
pub mod jwt;
pub mod middleware;
pub mod policy;
pub mod repository;
pub mod server;
pub mod service;
pub mod state;
pub mod telemetry;

// Re-export commonly used types
pub use config::Config;
pub use error::{AppError, Result};
