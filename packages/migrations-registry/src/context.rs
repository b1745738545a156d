//! The per-target object a migration backend consumes.
//!
//! An [`ExecutionContext`] is assembled once from a frozen [`MigrationTarget`],
//! the live connection for that target and the host's service catalog. It never
//! runs migrations itself; it answers the questions a backend asks before doing
//! so: where migrations live, where bookkeeping goes, which services are swapped
//! out, whether a run is all-or-nothing, and which tenants share the connection.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use once_cell::sync::OnceCell;
use sea_orm::{DatabaseConnection, DbErr};
use time::OffsetDateTime;
use tracing::{debug, info};

use crate::error::RegistryError;
use crate::layout::{migration_version, GenerationTarget, MigrationOrganization, MigrationTemplate};
use crate::services::{backend_service, HostService, ServiceCatalog, ServiceOverride};
use crate::target::{MigrationSource, MigrationTarget, TableStorageConfig};

/// Where executed-migration bookkeeping is kept.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MetadataStorage {
    Table(TableStorageConfig),
    /// Host-supplied storage; no table configuration exists for the target.
    Custom { service_id: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionMode {
    /// The whole run executes inside one transaction.
    AllOrNothing,
    PerMigration,
}

pub struct ExecutionContext {
    target: MigrationTarget,
    connection: DatabaseConnection,
    storage: MetadataStorage,
    overrides: BTreeMap<String, ServiceOverride>,
    factories: BTreeMap<String, Arc<dyn HostService>>,
    lazy: BTreeMap<String, OnceCell<Arc<dyn HostService>>>,
    catalog: Arc<dyn ServiceCatalog>,
}

impl ExecutionContext {
    pub(crate) fn build(
        target: MigrationTarget,
        connection: DatabaseConnection,
        catalog: Arc<dyn ServiceCatalog>,
    ) -> Result<Self, RegistryError> {
        let mut overrides = BTreeMap::new();
        for (key, id) in &target.service_overrides {
            overrides.insert(key.clone(), ServiceOverride::Lazy(id.clone()));
        }
        for (key, id) in &target.factory_overrides {
            if let Some(previous) = overrides.insert(key.clone(), ServiceOverride::Factory(id.clone())) {
                debug!(
                    "context=override_replaced target={} key={} previous={}",
                    target.name,
                    key,
                    previous.service_id()
                );
            }
        }

        let mut factories = BTreeMap::new();
        let mut lazy = BTreeMap::new();
        for (key, service) in &overrides {
            match service {
                ServiceOverride::Factory(id) => {
                    let resolved = catalog.resolve(id).ok_or_else(|| RegistryError::UnknownService {
                        name: target.name.clone(),
                        service: id.clone(),
                    })?;
                    factories.insert(key.clone(), resolved);
                }
                ServiceOverride::Lazy(_) => {
                    lazy.insert(key.clone(), OnceCell::new());
                }
            }
        }

        let storage = match target.custom_metadata_storage() {
            Some(service_id) => MetadataStorage::Custom {
                service_id: service_id.to_string(),
            },
            None => MetadataStorage::Table(TableStorageConfig::from_overrides(&target.storage)),
        };

        info!(
            "context=built target={} sources={} overrides={} multi_tenant={}",
            target.name,
            target.migration_directories.len() + target.migration_classes.len(),
            overrides.len(),
            target.is_multi_tenant()
        );

        Ok(Self {
            target,
            connection,
            storage,
            overrides,
            factories,
            lazy,
            catalog,
        })
    }

    pub fn name(&self) -> &str {
        &self.target.name
    }

    pub fn target(&self) -> &MigrationTarget {
        &self.target
    }

    pub fn connection(&self) -> &DatabaseConnection {
        &self.connection
    }

    /// Directories first, then explicit classes, each in configuration order.
    pub fn migration_sources(&self) -> Vec<MigrationSource> {
        let directories = self
            .target
            .migration_directories
            .iter()
            .map(|(namespace, path)| MigrationSource::Directory {
                namespace: namespace.clone(),
                path: path.clone(),
            });
        let classes = self
            .target
            .migration_classes
            .iter()
            .cloned()
            .map(MigrationSource::Class);
        directories.chain(classes).collect()
    }

    pub fn storage(&self) -> &MetadataStorage {
        &self.storage
    }

    pub fn transaction_mode(&self) -> TransactionMode {
        if self.target.all_or_nothing {
            TransactionMode::AllOrNothing
        } else {
            TransactionMode::PerMigration
        }
    }

    pub fn checks_database_platform(&self) -> bool {
        self.target.check_database_platform
    }

    pub fn organization(&self) -> Option<MigrationOrganization> {
        self.target.organize_migrations
    }

    pub fn template(&self) -> MigrationTemplate {
        match &self.target.custom_template {
            Some(path) => MigrationTemplate::Custom(path.clone()),
            None => MigrationTemplate::Builtin,
        }
    }

    pub fn overrides(&self) -> &BTreeMap<String, ServiceOverride> {
        &self.overrides
    }

    /// The host replacement for a backend service, if the target configured one.
    pub fn service(&self, key: &str) -> Result<Option<Arc<dyn HostService>>, RegistryError> {
        if let Some(service) = self.factories.get(key) {
            return Ok(Some(Arc::clone(service)));
        }
        let (Some(cell), Some(ServiceOverride::Lazy(id))) = (self.lazy.get(key), self.overrides.get(key)) else {
            return Ok(None);
        };
        let service = cell.get_or_try_init(|| {
            debug!("context=resolve_lazy target={} key={} service={}", self.target.name, key, id);
            self.catalog
                .resolve(id)
                .ok_or_else(|| RegistryError::UnknownService {
                    name: self.target.name.clone(),
                    service: id.clone(),
                })
        })?;
        Ok(Some(Arc::clone(service)))
    }

    /// Tenants sharing this target's connection; empty for single-tenant targets.
    pub async fn tenant_ids(&self) -> Result<Vec<String>, DbErr> {
        match &self.target.tenant_repository {
            Some(handle) => handle.repository().tenant_ids(&self.connection).await,
            None => Ok(Vec::new()),
        }
    }

    /// Placement for a migration generated at `at`, using the first configured directory.
    pub fn generation_target(
        &self,
        at: OffsetDateTime,
    ) -> Result<Option<GenerationTarget>, RegistryError> {
        let Some((namespace, base)) = self.target.migration_directories.first() else {
            return Ok(None);
        };
        Ok(Some(GenerationTarget {
            namespace: namespace.clone(),
            directory: MigrationOrganization::directory_for(self.organization(), base, at),
            version: migration_version(at)?,
            template: self.template(),
        }))
    }
}

impl fmt::Debug for ExecutionContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExecutionContext")
            .field("target", &self.target)
            .field("storage", &self.storage)
            .field("overrides", &self.overrides)
            .finish_non_exhaustive()
    }
}
