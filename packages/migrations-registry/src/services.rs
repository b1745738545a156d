//! Host-side services that can replace pieces of the migration backend.
//!
//! The host hands the registry a [`ServiceCatalog`] instead of exposing a
//! global container. Each target may name catalog entries under backend
//! service keys; the execution context resolves them when asked.

use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::tenant::TenantRepository;

/// Backend-internal service keys that a target may override.
pub mod backend_service {
    pub const METADATA_STORAGE: &str = "MetadataStorage";
    pub const MIGRATIONS_REPOSITORY: &str = "MigrationsRepository";
    pub const VERSION_COMPARATOR: &str = "VersionComparator";
    pub const MIGRATION_FACTORY: &str = "MigrationFactory";
    pub const CLOCK: &str = "Clock";
    pub const LOGGER: &str = "Logger";
}

/// A service living in the host application.
pub trait HostService: Any + Send + Sync {
    /// Capability accessor used by the tenant-repository check.
    fn as_tenant_repository(self: Arc<Self>) -> Option<Arc<dyn TenantRepository>> {
        None
    }

    fn as_any(&self) -> &dyn Any;
}

/// Lookup of host services by identifier.
pub trait ServiceCatalog: Send + Sync {
    fn resolve(&self, id: &str) -> Option<Arc<dyn HostService>>;
}

#[derive(Default, Clone)]
pub struct StaticServiceCatalog {
    services: HashMap<String, Arc<dyn HostService>>,
}

impl StaticServiceCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, id: impl Into<String>, service: Arc<dyn HostService>) {
        self.services.insert(id.into(), service);
    }

    pub fn with(mut self, id: impl Into<String>, service: Arc<dyn HostService>) -> Self {
        self.insert(id, service);
        self
    }
}

impl ServiceCatalog for StaticServiceCatalog {
    fn resolve(&self, id: &str) -> Option<Arc<dyn HostService>> {
        self.services.get(id).cloned()
    }
}

impl fmt::Debug for StaticServiceCatalog {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut ids: Vec<&String> = self.services.keys().collect();
        ids.sort();
        f.debug_struct("StaticServiceCatalog")
            .field("services", &ids)
            .finish()
    }
}

/// How an overridden backend service is supplied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServiceOverride {
    /// Resolved from the catalog on first use.
    Lazy(String),
    /// Resolved once, when the execution context is built.
    Factory(String),
}

impl ServiceOverride {
    pub fn service_id(&self) -> &str {
        match self {
            ServiceOverride::Lazy(id) | ServiceOverride::Factory(id) => id,
        }
    }
}
