//! Host-side collaborators for registry tests.

use std::any::Any;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use migrations_registry::{
    ConnectionProvider, HostService, RegistryError, StaticModuleResolver, TenantRepository,
};
use sea_orm::{DatabaseConnection, DbErr};

/// Tenant repository returning a fixed list of schemas.
#[derive(Debug, Clone)]
pub struct FixedTenants {
    tenants: Vec<String>,
}

impl FixedTenants {
    pub fn new<I, S>(tenants: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            tenants: tenants.into_iter().map(Into::into).collect(),
        }
    }
}

#[async_trait]
impl TenantRepository for FixedTenants {
    async fn tenant_ids(&self, _conn: &DatabaseConnection) -> Result<Vec<String>, DbErr> {
        Ok(self.tenants.clone())
    }
}

impl HostService for FixedTenants {
    fn as_tenant_repository(self: Arc<Self>) -> Option<Arc<dyn TenantRepository>> {
        Some(self)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// A host service with no capabilities beyond being resolvable.
#[derive(Debug, Clone, Default)]
pub struct PlainService {
    pub label: &'static str,
}

impl PlainService {
    pub fn new(label: &'static str) -> Self {
        Self { label }
    }
}

impl HostService for PlainService {
    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Hands out disconnected handles and counts how often it was asked.
#[derive(Debug, Default)]
pub struct CountingConnections {
    calls: AtomicUsize,
}

impl CountingConnections {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl ConnectionProvider for CountingConnections {
    fn connection(&self, _name: &str) -> Result<DatabaseConnection, RegistryError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(DatabaseConnection::Disconnected)
    }
}

/// Module roots used across the integration tests.
pub fn modules() -> StaticModuleResolver {
    StaticModuleResolver::new()
        .with("ModuleA", "/app/modules/a")
        .with("Billing", "/app/modules/billing")
}
