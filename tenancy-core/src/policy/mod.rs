//! Authorization policy: permission resolution and the permission guard.

pub mod guard;
pub mod resolver;

pub use guard::{allow, GuardRequirements};
pub use resolver::{effective_permissions, resolve_or_deny};

use crate::catalog::RoleCatalog;
use crate::domain::AccessContext;
use crate::error::AppError;

pub type PolicyResult<T> = std::result::Result<T, AppError>;

/// Guard check for handlers: a denial becomes `Forbidden`.
///
/// Advisory only. The scoped gateway still enforces tenancy on the data path.
pub fn enforce(
    ctx: &AccessContext,
    catalog: &RoleCatalog,
    requirements: &GuardRequirements,
) -> PolicyResult<()> {
    if allow(ctx, catalog, requirements) {
        Ok(())
    } else {
        Err(AppError::Forbidden(
            "You do not have access to this action".to_string(),
        ))
    }
}
