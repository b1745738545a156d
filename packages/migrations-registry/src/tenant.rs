use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use sea_orm::{DatabaseConnection, DbErr};

use crate::services::HostService;

/// Enumerates the tenant schemas sharing one physical connection.
#[async_trait]
pub trait TenantRepository: Send + Sync {
    async fn tenant_ids(&self, conn: &DatabaseConnection) -> Result<Vec<String>, DbErr>;
}

/// A tenant repository together with the host identifier it came from.
#[derive(Clone)]
pub struct TenantRepositoryHandle {
    service_id: String,
    repository: Arc<dyn TenantRepository>,
}

impl TenantRepositoryHandle {
    pub fn new(service_id: impl Into<String>, repository: Arc<dyn TenantRepository>) -> Self {
        Self {
            service_id: service_id.into(),
            repository,
        }
    }

    pub fn service_id(&self) -> &str {
        &self.service_id
    }

    pub fn repository(&self) -> &Arc<dyn TenantRepository> {
        &self.repository
    }
}

impl fmt::Debug for TenantRepositoryHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TenantRepositoryHandle")
            .field("service_id", &self.service_id)
            .finish_non_exhaustive()
    }
}

/// Outcome of checking a host service for the tenant-listing capability.
pub enum CapabilityCheck {
    Satisfied(Arc<dyn TenantRepository>),
    NotSatisfied,
}

impl CapabilityCheck {
    pub fn is_satisfied(&self) -> bool {
        matches!(self, CapabilityCheck::Satisfied(_))
    }
}

impl fmt::Debug for CapabilityCheck {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CapabilityCheck::Satisfied(_) => f.write_str("Satisfied"),
            CapabilityCheck::NotSatisfied => f.write_str("NotSatisfied"),
        }
    }
}

pub fn check_tenant_capability(service: Arc<dyn HostService>) -> CapabilityCheck {
    match service.as_tenant_repository() {
        Some(repository) => CapabilityCheck::Satisfied(repository),
        None => CapabilityCheck::NotSatisfied,
    }
}
