//! Business logic layer

pub mod access;
pub mod quote;

pub use access::{build_access_context, AccessService, AuthorizedSession};
pub use quote::QuoteLifecycleService;
