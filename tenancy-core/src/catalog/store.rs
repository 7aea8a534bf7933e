//! Process-wide holder of the current role catalog

use super::RoleCatalog;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Publishes role catalogs by swapping an `Arc`.
///
/// Readers take a snapshot and keep using it; a reload never mutates a catalog
/// that someone else is reading.
pub struct CatalogStore {
    static_default: Arc<RoleCatalog>,
    current: RwLock<Arc<RoleCatalog>>,
}

impl CatalogStore {
    pub fn new(static_default: RoleCatalog) -> Self {
        let static_default = Arc::new(static_default);
        Self {
            current: RwLock::new(static_default.clone()),
            static_default,
        }
    }

    /// The known-good built-in matrix used when overrides cannot be loaded.
    pub fn static_default(&self) -> Arc<RoleCatalog> {
        self.static_default.clone()
    }

    pub async fn snapshot(&self) -> Arc<RoleCatalog> {
        self.current.read().await.clone()
    }

    /// Publish `catalog` and return the one it replaced.
    pub async fn replace(&self, catalog: Arc<RoleCatalog>) -> Arc<RoleCatalog> {
        let mut guard = self.current.write().await;
        std::mem::replace(&mut *guard, catalog)
    }
}

impl Default for CatalogStore {
    fn default() -> Self {
        Self::new(RoleCatalog::static_default())
    }
}
