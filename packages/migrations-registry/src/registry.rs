use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use once_cell::sync::OnceCell;
use sea_orm::DatabaseConnection;
use tracing::{debug, info};

use crate::config::MigrationsConfig;
use crate::context::ExecutionContext;
use crate::error::RegistryError;
use crate::modules::{resolve_directory, ModuleResolver};
use crate::services::ServiceCatalog;
use crate::target::MigrationTarget;
use crate::tenant::TenantRepositoryHandle;

/// Supplies the live database handle for a target name.
pub trait ConnectionProvider: Send + Sync {
    fn connection(&self, name: &str) -> Result<DatabaseConnection, RegistryError>;
}

#[derive(Debug, Default, Clone)]
pub struct StaticConnectionProvider {
    connections: HashMap<String, DatabaseConnection>,
}

impl StaticConnectionProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: impl Into<String>, connection: DatabaseConnection) -> Self {
        self.connections.insert(name.into(), connection);
        self
    }
}

impl ConnectionProvider for StaticConnectionProvider {
    fn connection(&self, name: &str) -> Result<DatabaseConnection, RegistryError> {
        self.connections
            .get(name)
            .cloned()
            .ok_or_else(|| RegistryError::MissingConnection {
                name: name.to_string(),
            })
    }
}

struct TargetEntry {
    target: MigrationTarget,
    connections: Arc<dyn ConnectionProvider>,
    context: OnceCell<Arc<ExecutionContext>>,
}

/// Named migration targets, each with its own lazily built execution context.
///
/// Populated sequentially at startup through `&mut self`; afterwards it can be
/// shared and contexts are built on demand, at most once per name.
pub struct MigrationRegistry {
    modules: Arc<dyn ModuleResolver>,
    services: Arc<dyn ServiceCatalog>,
    entries: HashMap<String, TargetEntry>,
    order: Vec<String>,
}

impl MigrationRegistry {
    pub fn new(modules: Arc<dyn ModuleResolver>, services: Arc<dyn ServiceCatalog>) -> Self {
        Self {
            modules,
            services,
            entries: HashMap::new(),
            order: Vec::new(),
        }
    }

    /// Registers every target of `config` in document order, stopping at the first error.
    pub fn from_config(
        config: MigrationsConfig,
        modules: Arc<dyn ModuleResolver>,
        services: Arc<dyn ServiceCatalog>,
        connections: Arc<dyn ConnectionProvider>,
    ) -> Result<Self, RegistryError> {
        let mut registry = Self::new(modules, services);
        for (name, target_config) in config.entity_managers {
            let target = target_config.into_target(&name, registry.services.as_ref())?;
            registry.register(target, Arc::clone(&connections))?;
        }
        info!("registry=loaded targets={}", registry.len());
        Ok(registry)
    }

    pub fn resolve_directory(&self, path: &str) -> Result<PathBuf, RegistryError> {
        resolve_directory(path, self.modules.as_ref())
    }

    /// Stores `target` under its name. Module-relative directories are resolved
    /// here, once; nothing is stored if any step fails.
    pub fn register(
        &mut self,
        mut target: MigrationTarget,
        connections: Arc<dyn ConnectionProvider>,
    ) -> Result<(), RegistryError> {
        if self.entries.contains_key(&target.name) {
            return Err(RegistryError::DuplicateTarget { name: target.name });
        }

        let mut directories = Vec::with_capacity(target.migration_directories.len());
        for (namespace, path) in &target.migration_directories {
            let resolved = match path.to_str() {
                Some(raw) => self.resolve_directory(raw)?,
                None => path.clone(),
            };
            debug!(
                "registry=directory target={} namespace={} path={}",
                target.name,
                namespace,
                resolved.display()
            );
            directories.push((namespace.clone(), resolved));
        }
        target.migration_directories = directories;

        info!(
            "registry=register target={} directories={} classes={} multi_tenant={}",
            target.name,
            target.migration_directories.len(),
            target.migration_classes.len(),
            target.is_multi_tenant()
        );

        let name = target.name.clone();
        self.entries.insert(
            name.clone(),
            TargetEntry {
                target,
                connections,
                context: OnceCell::new(),
            },
        );
        self.order.push(name);
        Ok(())
    }

    /// Attaches the tenant enumerator for a multi-tenant target.
    pub fn add_tenant_repository(
        &mut self,
        name: &str,
        repository: TenantRepositoryHandle,
    ) -> Result<(), RegistryError> {
        let entry = self
            .entries
            .get_mut(name)
            .ok_or_else(|| RegistryError::UnknownTarget {
                name: name.to_string(),
            })?;

        if entry.context.get().is_some() {
            return Err(RegistryError::ContextAlreadyBuilt {
                name: name.to_string(),
            });
        }
        if entry.target.tenant_repository.is_some() {
            return Err(RegistryError::DuplicateTenantRepository {
                name: name.to_string(),
            });
        }

        info!(
            "registry=tenant_repository target={} service={}",
            name,
            repository.service_id()
        );
        entry.target.tenant_repository = Some(repository);
        Ok(())
    }

    /// Builds the context on first request and returns the cached one afterwards.
    pub fn build_execution_context(&self, name: &str) -> Result<Arc<ExecutionContext>, RegistryError> {
        let entry = self
            .entries
            .get(name)
            .ok_or_else(|| RegistryError::UnknownTarget {
                name: name.to_string(),
            })?;

        entry
            .context
            .get_or_try_init(|| {
                let connection = entry.connections.connection(name)?;
                ExecutionContext::build(
                    entry.target.clone(),
                    connection,
                    Arc::clone(&self.services),
                )
                .map(Arc::new)
            })
            .map(Arc::clone)
    }

    pub fn target(&self, name: &str) -> Option<&MigrationTarget> {
        self.entries.get(name).map(|entry| &entry.target)
    }

    /// Target names in registration order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.order.iter().map(String::as_str)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}
