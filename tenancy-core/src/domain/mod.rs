//! Domain models for Tenancy Core

pub mod access;
pub mod quote;
pub mod rbac;

pub use access::*;
pub use quote::*;
pub use rbac::*;
